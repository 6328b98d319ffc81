//! How elements are held while they travel through a queue.
//!
//! A queue is parameterised by one of the strategies below, so the choice is
//! made at compile time and the queue itself never inspects element types:
//!
//! - [`ByValue`] boxes plain values so every node has the same small size.
//! - [`Borrowed`] forwards raw pointers to caller-managed storage untouched.
//! - [`Owned`] moves an owning [`Box`] through the queue without re-boxing.

/// Storage, transfer and release policy for elements of type `T`.
pub trait Ownership<T> {
    /// What a queue node holds while the element is in transit.
    type Slot;

    /// Converts an incoming element into node storage.
    fn store(item: T) -> Self::Slot;

    /// Hands a dequeued element back to the caller.
    fn extract(slot: Self::Slot) -> T;

    /// Disposes of an element that is never dequeued.
    fn release(slot: Self::Slot);
}

/// Owns plain values on the heap while they are queued.
pub struct ByValue;

impl<T> Ownership<T> for ByValue {
    type Slot = Box<T>;

    fn store(item: T) -> Self::Slot {
        Box::new(item)
    }

    fn extract(slot: Self::Slot) -> T {
        *slot
    }

    fn release(slot: Self::Slot) {
        drop(slot);
    }
}

/// Passes pointers through as-is. The pointee is never read, copied or freed.
pub struct Borrowed;

/// A raw pointer parked in a queue node.
pub struct RawSlot<P>(P);

// Raw pointers are only usable through `unsafe`, so carrying one to another
// thread cannot by itself cause a data race.
unsafe impl<T: ?Sized> Send for RawSlot<*mut T> {}
unsafe impl<T: ?Sized> Send for RawSlot<*const T> {}

impl<T: ?Sized> Ownership<*mut T> for Borrowed {
    type Slot = RawSlot<*mut T>;

    fn store(item: *mut T) -> Self::Slot {
        RawSlot(item)
    }

    fn extract(slot: Self::Slot) -> *mut T {
        slot.0
    }

    fn release(_slot: Self::Slot) {}
}

impl<T: ?Sized> Ownership<*const T> for Borrowed {
    type Slot = RawSlot<*const T>;

    fn store(item: *const T) -> Self::Slot {
        RawSlot(item)
    }

    fn extract(slot: Self::Slot) -> *const T {
        slot.0
    }

    fn release(_slot: Self::Slot) {}
}

/// Moves exclusive ownership of a boxed element through the queue.
pub struct Owned;

impl<T: ?Sized> Ownership<Box<T>> for Owned {
    type Slot = Box<T>;

    fn store(item: Box<T>) -> Self::Slot {
        item
    }

    fn extract(slot: Self::Slot) -> Box<T> {
        slot
    }

    fn release(slot: Self::Slot) {
        drop(slot);
    }
}

#[cfg(test)]
mod test {
    use std::{
        rc::Rc,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::{Borrowed, ByValue, Owned, Ownership};

    #[test]
    fn by_value_round_trips_through_the_heap() {
        let slot = <ByValue as Ownership<String>>::store("abc".to_owned());
        assert_eq!(*slot, "abc");
        let value: String = ByValue::extract(slot);
        assert_eq!(value, "abc");
    }

    #[test]
    fn borrowed_keeps_identity() {
        let mut target = 7u64;
        let ptr: *mut u64 = &mut target;
        let slot = Borrowed::store(ptr);
        assert_eq!(<Borrowed as Ownership<*mut u64>>::extract(slot), ptr);

        let cptr: *const u64 = &target;
        <Borrowed as Ownership<*const u64>>::release(Borrowed::store(cptr));
        assert_eq!(target, 7);
    }

    #[test]
    fn owned_moves_the_same_allocation() {
        let handle = Box::new([1u8; 32]);
        let address = handle.as_ptr();
        let slot = Owned::store(handle);
        let back: Box<[u8; 32]> = Owned::extract(slot);
        assert_eq!(back.as_ptr(), address);
    }

    #[test]
    fn release_drops_exactly_once() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);
        struct Tracked;
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        <ByValue as Ownership<Tracked>>::release(ByValue::store(Tracked));
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
        <Owned as Ownership<Box<Tracked>>>::release(Owned::store(Box::new(Tracked)));
        assert_eq!(DROPS.load(Ordering::SeqCst), 2);

        let shared = Rc::new(());
        let raw = Rc::into_raw(shared.clone());
        <Borrowed as Ownership<*const ()>>::release(Borrowed::store(raw));
        assert_eq!(Rc::strong_count(&shared), 2);
        drop(unsafe { Rc::from_raw(raw) });
        assert_eq!(Rc::strong_count(&shared), 1);
    }
}
