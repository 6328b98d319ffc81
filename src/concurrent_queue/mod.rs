pub mod ownership;
pub mod two_lock;
pub mod wait_lock;

pub use ownership::{Borrowed, ByValue, Owned, Ownership};
pub use two_lock::{HandleQueue, PointerQueue, QueueHandle, TwoLockQueue, ValueQueue};
