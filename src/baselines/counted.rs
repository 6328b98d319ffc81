use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{ConcurrentQueue, Handle};

/// Wraps a queue and counts the enqueues and successful dequeues made through
/// its handles.
pub struct Counted<Q> {
    queue: Q,
    enq_count: AtomicUsize,
    deq_count: AtomicUsize,
}

impl<Q> Counted<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            enq_count: 0.into(),
            deq_count: 0.into(),
        }
    }

    pub fn inner(&self) -> &Q {
        &self.queue
    }

    pub fn enq_count(&self) -> usize {
        self.enq_count.load(Ordering::Relaxed)
    }

    pub fn deq_count(&self) -> usize {
        self.deq_count.load(Ordering::Relaxed)
    }
}

impl<T, Q: ConcurrentQueue<T>> ConcurrentQueue<T> for Counted<Q> {
    fn new() -> Self {
        Counted::new(Q::new())
    }

    fn register(&self) -> impl Handle<T> {
        CountedHandle {
            handle: self.queue.register(),
            enq_count: &self.enq_count,
            deq_count: &self.deq_count,
        }
    }
}

struct CountedHandle<'q, H> {
    handle: H,
    enq_count: &'q AtomicUsize,
    deq_count: &'q AtomicUsize,
}

impl<T, H: Handle<T>> Handle<T> for CountedHandle<'_, H> {
    fn enqueue(&mut self, item: T) {
        self.handle.enqueue(item);
        self.enq_count.fetch_add(1, Ordering::Relaxed);
    }

    fn dequeue(&mut self) -> Option<T> {
        let item = self.handle.dequeue();
        if item.is_some() {
            self.deq_count.fetch_add(1, Ordering::Relaxed);
        }
        item
    }
}
