//! # Physical Addresses

use core::fmt;

/// A **physical** memory address.
///
/// Newtype over `u64` so page addresses cannot be mixed up with page indices or
/// byte counts. No alignment guarantees by itself.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysAddr(u64);

impl PhysAddr {
    #[must_use]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Round up to a multiple of `align` (a power of two).
    ///
    /// Returns `None` on overflow.
    #[must_use]
    pub const fn align_up(self, align: u64) -> Option<Self> {
        match self.0.checked_add(align - 1) {
            Some(x) => Some(Self(x & !(align - 1))),
            None => None,
        }
    }

    #[must_use]
    pub const fn is_aligned(self, align: u64) -> bool {
        self.0 & (align - 1) == 0
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Half-open range of physical memory handed to the allocator, `[start, end)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PhysRange {
    pub start: PhysAddr,
    pub end: PhysAddr,
}

impl PhysRange {
    #[must_use]
    pub const fn new(start: PhysAddr, end: PhysAddr) -> Self {
        Self { start, end }
    }

    /// First page-aligned address and number of whole pages in the range.
    #[must_use]
    pub const fn pages(&self, page_size: u64) -> (PhysAddr, u64) {
        let Some(first) = self.start.align_up(page_size) else {
            return (self.start, 0);
        };
        if first.0 >= self.end.0 {
            return (first, 0);
        }
        (first, (self.end.0 - first.0) / page_size)
    }
}
