//! Named OS threads that can be asked to stop.
//!
//! A [`Worker`] runs a body that receives a [`StopToken`]. Stopping is
//! cooperative: the body polls [`StopToken::stop_requested`] between units of
//! work, e.g. between two `dequeue` calls.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use tracing::{debug, warn};

use crate::error::WorkerError;

#[derive(Clone, Debug, Default)]
pub struct StopToken {
    stop: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

pub struct Worker<R> {
    name: String,
    stop: StopToken,
    thread: Option<JoinHandle<R>>,
}

impl<R: Send + 'static> Worker<R> {
    pub fn spawn<F>(name: impl Into<String>, body: F) -> Result<Self, WorkerError>
    where
        F: FnOnce(StopToken) -> R + Send + 'static,
    {
        let name = name.into();
        let stop = StopToken::new();
        let token = stop.clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || body(token))
            .map_err(|source| WorkerError::Spawn {
                name: name.clone(),
                source,
            })?;
        debug!(worker = %name, "worker started");
        Ok(Self {
            name,
            stop,
            thread: Some(thread),
        })
    }
}

impl<R> Worker<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A token sharing this worker's stop flag.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Requests a stop and waits for the body to return.
    pub fn stop(&mut self) -> Result<R, WorkerError> {
        self.stop.request_stop();
        self.join()
    }

    /// Waits for the body to return without requesting a stop.
    pub fn join(&mut self) -> Result<R, WorkerError> {
        let thread = self.thread.take().ok_or_else(|| WorkerError::NotRunning {
            name: self.name.clone(),
        })?;
        let result = thread.join().map_err(|_| WorkerError::Panicked {
            name: self.name.clone(),
        });
        debug!(worker = %self.name, ok = result.is_ok(), "worker joined");
        result
    }
}

impl<R> Drop for Worker<R> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(err) = self.stop() {
                warn!(worker = %self.name, %err, "worker failed while shutting down");
            }
        }
    }
}
