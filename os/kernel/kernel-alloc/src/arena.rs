use alloc::boxed::Box;
use core::cell::UnsafeCell;

use crate::PhysAddr;

/// Backing storage for every page the allocator manages.
///
/// Page `i` occupies bytes `[i * page_size, (i + 1) * page_size)` and stands for
/// physical address `base + i * page_size`. The arena itself enforces nothing:
/// access is sound only for the single owner of a page (a free list while the
/// page is free, a [`Page`](crate::Page) handle while allocated).
pub(crate) struct PageArena {
    base: PhysAddr,
    page_size: usize,
    bytes: Box<[UnsafeCell<u8>]>,
}

// Safety: disjoint pages are handed to at most one owner at a time.
unsafe impl Sync for PageArena {}

impl PageArena {
    pub fn new(base: PhysAddr, pages: usize, page_size: usize) -> Self {
        let bytes = (0..pages * page_size).map(|_| UnsafeCell::new(0)).collect();
        Self {
            base,
            page_size,
            bytes,
        }
    }

    #[inline]
    pub fn pages(&self) -> usize {
        self.bytes.len() / self.page_size
    }

    #[inline]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub const fn addr_of(&self, index: usize) -> PhysAddr {
        PhysAddr::new(self.base.as_u64() + (index * self.page_size) as u64)
    }

    /// Index of the page starting exactly at `addr`.
    pub fn index_of(&self, addr: PhysAddr) -> Option<usize> {
        if !addr.is_aligned(self.page_size as u64) {
            return None;
        }
        let offset = usize::try_from(addr.as_u64().checked_sub(self.base.as_u64())?).ok()?;
        let index = offset / self.page_size;
        (index < self.pages()).then_some(index)
    }

    /// Mutable view of page `index`.
    ///
    /// # Safety
    /// The caller must own the page exclusively for the lifetime of the slice.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn page_mut(&self, index: usize) -> &mut [u8] {
        debug_assert!(index < self.pages());
        let start = index * self.page_size;
        // `UnsafeCell<u8>` has the layout of `u8`.
        unsafe {
            let ptr = UnsafeCell::raw_get(self.bytes.as_ptr().add(start));
            core::slice::from_raw_parts_mut(ptr, self.page_size)
        }
    }

    /// Shared view of page `index`.
    ///
    /// # Safety
    /// Nobody may mutate the page for the lifetime of the slice.
    #[inline]
    pub unsafe fn page(&self, index: usize) -> &[u8] {
        debug_assert!(index < self.pages());
        let start = index * self.page_size;
        unsafe {
            let ptr = UnsafeCell::raw_get(self.bytes.as_ptr().add(start)).cast_const();
            core::slice::from_raw_parts(ptr, self.page_size)
        }
    }

    /// Overwrite page `index` with `byte`.
    ///
    /// # Safety
    /// As [`page_mut`](Self::page_mut).
    #[inline]
    pub unsafe fn fill(&self, index: usize, byte: u8) {
        unsafe { self.page_mut(index) }.fill(byte);
    }
}
