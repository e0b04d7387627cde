use core::sync::atomic::{AtomicU64, Ordering};

/// Monotonic source of recency stamps for released slots.
///
/// Only the ordering of returned values matters; two calls may return the same
/// token, in which case eviction falls back to scan order.
pub trait Clock {
    fn now(&self) -> u64;
}

impl<F: Fn() -> u64> Clock for F {
    #[inline]
    fn now(&self) -> u64 {
        self()
    }
}

/// A tick counter advanced by the timer interrupt.
#[derive(Debug, Default)]
pub struct Ticks {
    ticks: AtomicU64,
}

impl Ticks {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Advance by one tick and return the new value.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Clock for Ticks {
    #[inline]
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}
