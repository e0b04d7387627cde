use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::{PhysAddr, ShardedPageAlloc};

/// One allocated page, owned by the holder until handed back with
/// [`ShardedPageAlloc::free`].
///
/// Dropping a `Page` leaks it: the page stays allocated, as it would in a kernel
/// that lost track of a physical frame.
#[must_use = "dropping a page leaks it"]
pub struct Page<'a, P> {
    alloc: &'a ShardedPageAlloc<P>,
    index: usize,
}

impl<'a, P> Page<'a, P> {
    pub(crate) const fn new(alloc: &'a ShardedPageAlloc<P>, index: usize) -> Self {
        Self { alloc, index }
    }

    pub(crate) const fn owner(&self) -> &'a ShardedPageAlloc<P> {
        self.alloc
    }

    /// Position of the page within the managed range.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn addr(&self) -> PhysAddr {
        self.alloc.arena().addr_of(self.index)
    }

    /// Gives up the handle, keeping the page allocated, and returns its address.
    ///
    /// [`ShardedPageAlloc::from_addr`] turns the address back into a page.
    #[must_use]
    pub const fn into_addr(self) -> PhysAddr {
        self.addr()
    }
}

impl<P> Deref for Page<'_, P> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // Safety: the handle is the page's only owner.
        unsafe { self.alloc.arena().page(self.index) }
    }
}

impl<P> DerefMut for Page<'_, P> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // Safety: as above, and `&mut self` excludes other views.
        unsafe { self.alloc.arena().page_mut(self.index) }
    }
}

impl<P> fmt::Debug for Page<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("index", &self.index)
            .field("addr", &self.addr())
            .finish()
    }
}
