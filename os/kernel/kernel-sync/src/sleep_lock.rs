use core::{
    cell::UnsafeCell,
    fmt,
    ops::{Deref, DerefMut},
};

use crate::RawTicket;

/// An exclusive lock for contents that are held across long operations.
///
/// Unlike [`SpinLock`](crate::SpinLock), the holder may perform I/O while the
/// lock is held. Waiters queue in FIFO order, so contexts contending for the
/// same contents are served in the order they asked. There is no timeout and
/// no cancellation: a holder that never releases stalls every waiter.
pub struct SleepLock<T: ?Sized> {
    name: &'static str,
    ticket: RawTicket,
    inner: UnsafeCell<T>,
}

// Safety: the ticket lock provides mutual exclusion over `inner`.
unsafe impl<T: ?Sized + Send> Sync for SleepLock<T> {}

impl<T> SleepLock<T> {
    pub const fn new(name: &'static str, inner: T) -> Self {
        Self {
            name,
            ticket: RawTicket::new(),
            inner: UnsafeCell::new(inner),
        }
    }
}

impl<T: ?Sized> SleepLock<T> {
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Wait for the contents, in arrival order.
    #[inline]
    pub fn lock(&self) -> SleepLockGuard<'_, T> {
        self.ticket.lock();
        SleepLockGuard { lock: self }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<SleepLockGuard<'_, T>> {
        self.ticket.try_lock().then(|| SleepLockGuard { lock: self })
    }

    /// Whether the contents are held or awaited by any context.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.ticket.is_locked()
    }

    /// Number of holders plus waiters.
    #[inline]
    #[must_use]
    pub fn queued(&self) -> usize {
        self.ticket.queued()
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T: ?Sized> fmt::Debug for SleepLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SleepLock")
            .field("name", &self.name)
            .field("queued", &self.queued())
            .finish_non_exhaustive()
    }
}

pub struct SleepLockGuard<'a, T: ?Sized> {
    lock: &'a SleepLock<T>,
}

// Safety: a shared guard only hands out `&T`.
unsafe impl<T: ?Sized + Sync> Sync for SleepLockGuard<'_, T> {}

impl<T: ?Sized> SleepLockGuard<'_, T> {
    /// Whether this guard holds `lock`.
    #[inline]
    #[must_use]
    pub fn holding(&self, lock: &SleepLock<T>) -> bool {
        core::ptr::eq(self.lock, lock) && lock.is_locked()
    }
}

impl<T: ?Sized> Deref for SleepLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: the guard holds the lock, so no `&mut T` exists elsewhere.
        unsafe { &*self.lock.inner.get() }
    }
}

impl<T: ?Sized> DerefMut for SleepLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the guard holds the lock and `&mut self` excludes other views.
        unsafe { &mut *self.lock.inner.get() }
    }
}

impl<T: ?Sized> Drop for SleepLockGuard<'_, T> {
    fn drop(&mut self) {
        // Safety: a guard exists only while its ticket is being served.
        unsafe { self.lock.ticket.unlock() }
    }
}
