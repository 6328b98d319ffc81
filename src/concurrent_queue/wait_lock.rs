//! A lock over a single atomic flag that parks contended threads instead of
//! spinning on the flag.
//!
//! The uncontended path is one successful compare-and-swap to lock and one
//! store plus one swap to unlock. Only when the compare-and-swap fails does a
//! thread block, keyed on the address of the flag, until the holder releases
//! it and wakes every waiter. Wakeups are unordered, so the lock is not fair.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot_core::{DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};

const LOCKED: bool = true;
const UNLOCKED: bool = false;

fn key(flag: &AtomicBool) -> usize {
    flag as *const AtomicBool as usize
}

/// Blocks the calling thread for as long as `flag` holds `value`.
///
/// `parked` is raised before the thread goes to sleep so that [`notify_all`]
/// can skip the wakeup when nobody waits. Returns immediately if the flag
/// already differs, and may return spuriously, so callers re-check their
/// condition in a loop.
pub fn wait(flag: &AtomicBool, value: bool, parked: &AtomicBool) {
    // SAFETY: the key is the address of an atomic that outlives this call, and
    // neither callback re-enters parking_lot_core.
    unsafe {
        parking_lot_core::park(
            key(flag),
            || {
                parked.store(true, Ordering::SeqCst);
                flag.load(Ordering::SeqCst) == value
            },
            || {},
            |_, _| {},
            DEFAULT_PARK_TOKEN,
            None,
        );
    }
}

/// Wakes every thread blocked in [`wait`] on `flag`. Call after changing
/// `flag` with sequentially consistent ordering.
pub fn notify_all(flag: &AtomicBool, parked: &AtomicBool) {
    // Either a waiter's validation sees the new flag value and does not
    // sleep, or this swap sees its announcement and wakes it.
    if !parked.swap(false, Ordering::SeqCst) {
        return;
    }
    // SAFETY: see `wait`.
    unsafe {
        parking_lot_core::unpark_all(key(flag), DEFAULT_UNPARK_TOKEN);
    }
}

pub struct WaitLock {
    locked: AtomicBool,
    parked: AtomicBool,
}

impl WaitLock {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(UNLOCKED),
            parked: AtomicBool::new(false),
        }
    }

    /// Acquires the lock, blocking while another thread holds it.
    pub fn lock(&self) -> WaitLockGuard<'_> {
        while self
            .locked
            .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            wait(&self.locked, LOCKED, &self.parked);
        }
        WaitLockGuard { lock: self }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    fn unlock(&self) {
        self.locked.store(UNLOCKED, Ordering::SeqCst);
        notify_all(&self.locked, &self.parked);
    }
}

impl Default for WaitLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the lock and wakes all waiters when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct WaitLockGuard<'a> {
    lock: &'a WaitLock,
}

impl Drop for WaitLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
