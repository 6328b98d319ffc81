//! Third-party unbounded queues behind the crate's [`ConcurrentQueue`]
//! interface, so the benchmark can run them side by side with
//! [`TwoLockQueue`](crate::TwoLockQueue).

use crossbeam_queue::SegQueue;
use lockfree::queue::Queue;

use crate::ConcurrentQueue;

pub mod counted;

pub use counted::Counted;

/// Push and pop of an unbounded queue that is shared by reference.
trait Unbounded<T> {
    fn push(&self, item: T);
    fn pop(&self) -> Option<T>;
}

impl<T> Unbounded<T> for SegQueue<T> {
    fn push(&self, item: T) {
        SegQueue::push(self, item);
    }

    fn pop(&self) -> Option<T> {
        SegQueue::pop(self)
    }
}

impl<T> Unbounded<T> for ::concurrent_queue::ConcurrentQueue<T> {
    fn push(&self, item: T) {
        // Only a closed queue rejects pushes, and these are never closed.
        let _ = ::concurrent_queue::ConcurrentQueue::push(self, item);
    }

    fn pop(&self) -> Option<T> {
        ::concurrent_queue::ConcurrentQueue::pop(self).ok()
    }
}

impl<T> Unbounded<T> for Queue<T> {
    fn push(&self, item: T) {
        Queue::push(self, item);
    }

    fn pop(&self) -> Option<T> {
        Queue::pop(self)
    }
}

struct BaselineHandle<'q, Q> {
    queue: &'q Q,
}

impl<T, Q: Unbounded<T>> crate::Handle<T> for BaselineHandle<'_, Q> {
    fn enqueue(&mut self, item: T) {
        self.queue.push(item);
    }

    fn dequeue(&mut self) -> Option<T> {
        self.queue.pop()
    }
}

impl<T> ConcurrentQueue<T> for SegQueue<T> {
    fn new() -> Self {
        SegQueue::new()
    }

    fn register(&self) -> impl crate::Handle<T> {
        BaselineHandle { queue: self }
    }
}

impl<T> ConcurrentQueue<T> for ::concurrent_queue::ConcurrentQueue<T> {
    fn new() -> Self {
        ::concurrent_queue::ConcurrentQueue::unbounded()
    }

    fn register(&self) -> impl crate::Handle<T> {
        BaselineHandle { queue: self }
    }
}

impl<T> ConcurrentQueue<T> for Queue<T> {
    fn new() -> Self {
        Queue::new()
    }

    fn register(&self) -> impl crate::Handle<T> {
        BaselineHandle { queue: self }
    }
}
