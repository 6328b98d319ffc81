pub mod baselines;
pub mod concurrent_queue;
pub mod error;
pub mod momentum;
pub mod trading;
pub mod worker;

pub use crate::concurrent_queue::{
    Borrowed, ByValue, HandleQueue, Owned, Ownership, PointerQueue, TwoLockQueue, ValueQueue,
};
pub use error::{ConfigError, Error, WorkerError};

pub trait ConcurrentQueue<T> {
    /// Creates a new concurrent queue, with default configuration
    fn new() -> Self;
    /// Returns a thread handle to the queue, which can be used for enqueues and dequeues
    fn register(&self) -> impl Handle<T>;
}

pub trait Handle<T> {
    fn enqueue(&mut self, item: T);

    /// Never blocks; `None` means the queue was observed empty.
    fn dequeue(&mut self) -> Option<T>;
}
