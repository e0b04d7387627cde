//! # Kernel synchronization primitives
//!
//! Two classes of lock are provided, and the resource managers built on top of
//! them rely on the distinction:
//!
//! * [`SpinLock`] guards short, O(1) critical sections (directory buckets,
//!   allocator shards, the eviction coordinator). It must never be held across
//!   I/O or while waiting for another lock of the same class.
//! * [`SleepLock`] guards long-held content (a cached block while its owner
//!   reads, modifies and writes it). Waiters are served in arrival order via a
//!   [`RawTicket`].
//!
//! Every lock carries a static name that shows up in `Debug` output and in the
//! panic messages of the code using it.

#![cfg_attr(not(any(test, doctest, feature = "std")), no_std)]
#![allow(unsafe_code)]

mod raw_ticket;
mod sleep_lock;
mod spin_lock;

pub use raw_ticket::RawTicket;
pub use sleep_lock::{SleepLock, SleepLockGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};

/// Number of busy-wait iterations before a waiter yields its time slice.
///
/// Only meaningful with the `std` feature, where waiters are host threads that
/// may be descheduled while holding a lock.
#[cfg(feature = "std")]
const SPINS_BEFORE_YIELD: u32 = 64;

/// Back off inside a wait loop.
#[inline]
pub(crate) fn relax(spins: &mut u32) {
    core::hint::spin_loop();
    *spins = spins.wrapping_add(1);

    #[cfg(feature = "std")]
    if *spins % SPINS_BEFORE_YIELD == 0 {
        std::thread::yield_now();
    }
}
