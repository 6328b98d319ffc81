use std::{
    marker::PhantomData,
    ptr,
    sync::atomic::{AtomicPtr, Ordering},
};

use crossbeam_utils::CachePadded;

use super::{
    ownership::{Borrowed, ByValue, Owned, Ownership},
    wait_lock::WaitLock,
};
use crate::{ConcurrentQueue, Handle};

struct Node<Slot> {
    next: AtomicPtr<Node<Slot>>,
    /// `None` only while the node is the placeholder at `first`.
    slot: Option<Slot>,
}

impl<Slot> Node<Slot> {
    fn new(slot: Option<Slot>) -> *mut Self {
        Box::into_raw(Box::new(Self {
            next: AtomicPtr::new(ptr::null_mut()),
            slot,
        }))
    }
}

/// Unbounded FIFO queue with one lock for producers and another for
/// consumers, so the two sides never wait on each other.
///
/// `first` always points at a placeholder node whose successor holds the
/// oldest element; the queue is empty when `first == last`. Elements are held
/// according to the ownership strategy `S`.
pub struct TwoLockQueue<T, S: Ownership<T> = ByValue> {
    first: CachePadded<AtomicPtr<Node<S::Slot>>>,
    consumer_lock: CachePadded<WaitLock>,
    last: CachePadded<AtomicPtr<Node<S::Slot>>>,
    producer_lock: CachePadded<WaitLock>,
    _owns: PhantomData<(fn(T) -> T, Box<Node<S::Slot>>)>,
}

/// Queue of plain values, boxed while in transit.
pub type ValueQueue<T> = TwoLockQueue<T, ByValue>;
/// Queue forwarding pointers to storage owned by the caller.
pub type PointerQueue<T> = TwoLockQueue<*mut T, Borrowed>;
/// Queue moving boxed handles from producers to consumers.
pub type HandleQueue<T> = TwoLockQueue<Box<T>, Owned>;

// Nodes are only reachable through the queue. Slots are written by the
// producer before publication and taken by exactly one consumer, so a `Send`
// slot is all that sharing the queue needs.
unsafe impl<T, S: Ownership<T>> Send for TwoLockQueue<T, S> where S::Slot: Send {}
unsafe impl<T, S: Ownership<T>> Sync for TwoLockQueue<T, S> where S::Slot: Send {}

impl<T, S: Ownership<T>> TwoLockQueue<T, S> {
    pub fn new() -> Self {
        let placeholder = Node::new(None);
        Self {
            first: CachePadded::new(AtomicPtr::new(placeholder)),
            consumer_lock: CachePadded::new(WaitLock::new()),
            last: CachePadded::new(AtomicPtr::new(placeholder)),
            producer_lock: CachePadded::new(WaitLock::new()),
            _owns: PhantomData,
        }
    }

    pub fn enqueue(&self, item: T) {
        // Allocate before locking to keep the critical section short.
        let node = Node::new(Some(S::store(item)));

        let _guard = self.producer_lock.lock();
        let last = self.last.load(Ordering::Relaxed);
        // SAFETY: the tail node is never freed. Consumers only free a node
        // after moving `first` past it, and `first` cannot move past `last`.
        unsafe { (*last).next.store(node, Ordering::Release) };
        self.last.store(node, Ordering::Release);
    }

    /// Removes the oldest element, or returns `None` straight away if the
    /// queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        let guard = self.consumer_lock.lock();
        let first = self.first.load(Ordering::Relaxed);
        // SAFETY: `first` is never null, and only the consumer lock holder
        // frees it.
        let next = unsafe { (*first).next.load(Ordering::Acquire) };
        if next.is_null() {
            return None;
        }

        // SAFETY: `next` was published with release ordering and slots are
        // only touched by the consumer lock holder once linked.
        let slot = unsafe { (*next).slot.take() };
        debug_assert!(slot.is_some(), "linked node without an element");
        self.first.store(next, Ordering::Release);
        drop(guard);

        // The old placeholder is unreachable now that `first` has moved on.
        drop(unsafe { Box::from_raw(first) });
        slot.map(S::extract)
    }

    /// Snapshot of whether the queue holds no elements. Only exact when no
    /// other thread is operating on the queue.
    pub fn is_empty(&self) -> bool {
        self.first.load(Ordering::Acquire) == self.last.load(Ordering::Acquire)
    }
}

impl<T, S: Ownership<T>> Default for TwoLockQueue<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S: Ownership<T>> Drop for TwoLockQueue<T, S> {
    fn drop(&mut self) {
        let mut current = *self.first.get_mut();
        while !current.is_null() {
            // SAFETY: `&mut self` rules out concurrent operations, and every
            // node in the chain is owned by the queue.
            let node = unsafe { Box::from_raw(current) };
            let Node { next, slot } = *node;
            current = next.into_inner();
            if let Some(slot) = slot {
                S::release(slot);
            }
        }
    }
}

impl<T, S: Ownership<T>> ConcurrentQueue<T> for TwoLockQueue<T, S> {
    fn new() -> Self {
        TwoLockQueue::new()
    }

    fn register(&self) -> impl Handle<T> {
        QueueHandle::new(self)
    }
}

pub struct QueueHandle<'q, T, S: Ownership<T>> {
    queue: &'q TwoLockQueue<T, S>,
}

impl<'q, T, S: Ownership<T>> QueueHandle<'q, T, S> {
    pub fn new(queue: &'q TwoLockQueue<T, S>) -> Self {
        Self { queue }
    }
}

impl<T, S: Ownership<T>> Handle<T> for QueueHandle<'_, T, S> {
    fn enqueue(&mut self, item: T) {
        self.queue.enqueue(item);
    }

    fn dequeue(&mut self) -> Option<T> {
        self.queue.dequeue()
    }
}

#[cfg(test)]
mod test {
    use std::{
        rc::Rc,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        thread,
    };

    use super::{Borrowed, HandleQueue, PointerQueue, QueueHandle, TwoLockQueue, ValueQueue};
    use crate::Handle;

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn simple_test() {
        let queue: ValueQueue<i32> = TwoLockQueue::new();
        let mut qh = QueueHandle::new(&queue);
        qh.enqueue(5);
        assert_eq!(qh.dequeue(), Some(5));
        assert_eq!(qh.dequeue(), None);
    }

    #[test]
    fn fifo_then_empty() {
        let queue = ValueQueue::new();
        queue.enqueue(10);
        queue.enqueue(20);
        queue.enqueue(30);
        assert!(!queue.is_empty());
        assert_eq!(queue.dequeue(), Some(10));
        assert_eq!(queue.dequeue(), Some(20));
        assert_eq!(queue.dequeue(), Some(30));
        assert_eq!(queue.dequeue(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_dequeue_has_no_side_effects() {
        let queue = ValueQueue::<u8>::new();
        for _ in 0..4 {
            assert_eq!(queue.dequeue(), None);
            assert!(queue.is_empty());
        }
        queue.enqueue(1);
        assert_eq!(queue.dequeue(), Some(1));
    }

    #[test]
    fn many_elem_test() {
        let queue = ValueQueue::new();
        let mut qh = QueueHandle::new(&queue);
        for i in 0..5 {
            qh.enqueue(i);
        }
        assert_eq!(qh.dequeue(), Some(0));
        assert_eq!(qh.dequeue(), Some(1));
        for i in 5..10 {
            qh.enqueue(i);
        }
        for i in 2..10 {
            assert_eq!(qh.dequeue(), Some(i));
        }
        assert_eq!(qh.dequeue(), None);
        assert_eq!(qh.dequeue(), None);
    }

    #[test]
    fn value_copies_are_isolated() {
        let queue = ValueQueue::new();
        let original = vec![1, 2, 3];
        queue.enqueue(original.clone());
        let mut received = queue.dequeue().unwrap();
        received.push(4);
        assert_eq!(original, vec![1, 2, 3]);
        assert_eq!(received, vec![1, 2, 3, 4]);
    }

    #[test]
    fn pointers_pass_through_untouched() {
        let mut storage = [11u32, 22, 33];
        let queue = PointerQueue::new();
        let ptrs: Vec<*mut u32> = storage.iter_mut().map(|v| v as *mut u32).collect();
        for &p in &ptrs {
            queue.enqueue(p);
        }
        for &p in &ptrs {
            assert_eq!(queue.dequeue(), Some(p));
        }
        assert_eq!(queue.dequeue(), None);
        drop(queue);
        assert_eq!(storage, [11, 22, 33]);
    }

    #[test]
    fn dropping_a_pointer_queue_leaves_pointees_alone() {
        let mut storage = [7u64, 8, 9, 10];
        let queue = PointerQueue::new();
        for v in storage.iter_mut() {
            queue.enqueue(v as *mut u64);
        }
        assert!(queue.dequeue().is_some());
        drop(queue);
        assert_eq!(storage, [7, 8, 9, 10]);

        let shared = Rc::new(String::from("kept"));
        let queue = TwoLockQueue::<*const String, Borrowed>::new();
        for _ in 0..3 {
            queue.enqueue(Rc::as_ptr(&shared));
        }
        drop(queue);
        assert_eq!(Rc::strong_count(&shared), 1);
        assert_eq!(*shared, "kept");
    }

    #[test]
    fn producer_lock_does_not_block_dequeue() {
        let queue = ValueQueue::new();
        queue.enqueue(1);
        let _producers = queue.producer_lock.lock();
        thread::scope(|s| {
            let dequeued = s.spawn(|| queue.dequeue()).join().unwrap();
            assert_eq!(dequeued, Some(1));
        });
    }

    #[test]
    fn consumer_lock_does_not_block_enqueue() {
        let queue = ValueQueue::new();
        {
            let _consumers = queue.consumer_lock.lock();
            thread::scope(|s| {
                s.spawn(|| queue.enqueue(2)).join().unwrap();
            });
            assert!(!queue.is_empty());
        }
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn handles_move_through_the_queue() {
        let drops = Arc::new(AtomicUsize::new(0));
        let queue = HandleQueue::new();
        let handle = Box::new(DropCounter(drops.clone()));
        let address: *const DropCounter = &*handle;
        queue.enqueue(handle);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        let received = queue.dequeue().unwrap();
        assert!(std::ptr::eq(&*received, address));
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(received);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_remaining_elements_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let values = ValueQueue::new();
            let handles = HandleQueue::new();
            for _ in 0..5 {
                values.enqueue(DropCounter(drops.clone()));
                handles.enqueue(Box::new(DropCounter(drops.clone())));
            }
            drop(values.dequeue());
            drop(handles.dequeue());
            assert_eq!(drops.load(Ordering::SeqCst), 2);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn simple_multi_threaded_enqueue_test() {
        let queue = ValueQueue::new();
        std::thread::scope(|s| {
            let queue = &queue;
            for c in 0..3 {
                s.spawn(move || {
                    let mut qh = QueueHandle::new(queue);
                    for i in (c * 100)..((c + 1) * 100) {
                        qh.enqueue(i);
                    }
                });
            }
        });

        let mut qh = QueueHandle::new(&queue);
        let mut next_expected = [0, 100, 200];
        for _ in 0..300 {
            let val = qh.dequeue().expect("should have more elements");
            assert_eq!(next_expected[val / 100], val);
            next_expected[val / 100] = val + 1;
        }
        assert_eq!(qh.dequeue(), None);
    }

    #[test]
    fn multi_threaded_check_all_exists() {
        let queue = ValueQueue::new();
        std::thread::scope(|s| {
            let queue = &queue;
            for c in 0..10 {
                s.spawn(move || {
                    let mut qh = QueueHandle::new(queue);
                    for i in (c * 100)..((c + 1) * 100) {
                        qh.enqueue(i);
                    }
                });
            }
            for _ in 0..10 {
                s.spawn(move || {
                    let mut qh = QueueHandle::new(queue);
                    let mut successful = 0;
                    while successful < 100 {
                        if let Some(val) = qh.dequeue() {
                            successful += 1;
                            qh.enqueue(val);
                        }
                    }
                });
            }
        });
        let collected_elements = Mutex::new(Vec::new());
        std::thread::scope(|s| {
            for _ in 0..10 {
                s.spawn(|| {
                    let mut qh = QueueHandle::new(&queue);
                    while let Some(v) = qh.dequeue() {
                        collected_elements.lock().unwrap().push(v);
                    }
                });
            }
        });
        let mut collected_elements = collected_elements.into_inner().unwrap();
        while let Some(v) = queue.dequeue() {
            collected_elements.push(v);
        }
        assert_eq!(collected_elements.len(), 1000);
        collected_elements.sort_unstable();
        for (i, v) in collected_elements.into_iter().enumerate() {
            assert_eq!(v, i);
        }
    }
}
