use core::sync::atomic::{AtomicUsize, Ordering};

use crate::relax;

/// A FIFO ticket lock without a protected value.
///
/// Each waiter draws a ticket and is admitted strictly in ticket order, which is
/// what gives [`SleepLock`](crate::SleepLock) its acquisition-order guarantee.
pub struct RawTicket {
    next: AtomicUsize,
    serving: AtomicUsize,
}

impl Default for RawTicket {
    fn default() -> Self {
        Self::new()
    }
}

impl RawTicket {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
            serving: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn lock(&self) {
        let ticket = self.next.fetch_add(1, Ordering::Relaxed);
        let mut spins = 0;
        // Acquire when we observe our turn
        while self.serving.load(Ordering::Acquire) != ticket {
            relax(&mut spins);
        }
    }

    /// Take the lock only if nobody holds it and nobody is queued.
    #[inline]
    pub fn try_lock(&self) -> bool {
        let serving = self.serving.load(Ordering::Relaxed);
        self.next
            .compare_exchange(
                serving,
                serving.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Whether the lock is held or has queued waiters.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.next.load(Ordering::Relaxed) != self.serving.load(Ordering::Relaxed)
    }

    /// Number of contexts holding or waiting for the lock.
    #[inline]
    #[must_use]
    pub fn queued(&self) -> usize {
        let next = self.next.load(Ordering::Relaxed);
        next.wrapping_sub(self.serving.load(Ordering::Relaxed))
    }

    /// Admit the next ticket.
    ///
    /// # Safety
    /// The caller must be the current holder.
    #[inline]
    pub unsafe fn unlock(&self) {
        // Only the holder writes `serving`, so a plain load + store is enough.
        let t = self.serving.load(Ordering::Relaxed);
        self.serving.store(t.wrapping_add(1), Ordering::Release);
    }
}
