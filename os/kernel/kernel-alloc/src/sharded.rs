//! Per-CPU shards and the stealing balancer.
//!
//! ## Locks
//!
//! One `kmem` [`SpinLock`] per shard guards that shard's free list. Every path
//! holds at most one of them at a time. A steal checks each sibling under its
//! own lock and drops it before moving on, with the home shard's lock released.

use alloc::boxed::Box;
use core::fmt;
use core::ops::Range;
use core::ptr;
use core::sync::atomic::{AtomicU64, Ordering};

use kernel_info::param::{ALLOC_JUNK, FREE_JUNK};
use kernel_sync::SpinLock;
use log::{debug, error, trace, warn};

use crate::arena::PageArena;
use crate::free_list::{FreeList, Links};
use crate::{AllocConfig, AllocError, CpuId, Distribution, Page, PhysAddr, PhysRange};

struct Shard {
    free: SpinLock<FreeList>,
    steals_in: AtomicU64,
    steals_out: AtomicU64,
}

impl Shard {
    const fn new() -> Self {
        Self {
            free: SpinLock::new("kmem", FreeList::new()),
            steals_in: AtomicU64::new(0),
            steals_out: AtomicU64::new(0),
        }
    }

    fn pop(&self, links: &Links) -> Option<usize> {
        self.free.lock().pop(links)
    }

    fn push(&self, links: &Links, index: usize) {
        self.free.lock().push(links, index);
    }
}

/// Per-shard counters returned by [`ShardedPageAlloc::stats`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// Pages currently on the shard's free list.
    pub free: usize,
    /// Pages this shard's CPU took from other shards.
    pub steals_in: u64,
    /// Pages other CPUs took from this shard.
    pub steals_out: u64,
}

/// Physical page allocator with one free list per CPU.
///
/// A CPU allocates from and frees to its own shard, so CPUs only contend when
/// one of them runs dry and steals a page from another shard.
pub struct ShardedPageAlloc<P> {
    arena: PageArena,
    links: Links,
    shards: Box<[Shard]>,
    cpu: P,
}

impl<P: CpuId> ShardedPageAlloc<P> {
    /// Builds the allocator over every whole page in `range` and frees them all.
    ///
    /// Each page is filled with [`FREE_JUNK`] on the way in.
    ///
    /// # Errors
    /// Returns an [`AllocError`] if `config` is malformed or `range` holds no page.
    pub fn new(config: AllocConfig, range: PhysRange, cpu: P) -> Result<Self, AllocError> {
        config.validate()?;
        let page_size = config.page_size();
        let (first, count) = range.pages(page_size as u64);
        if count == 0 {
            return Err(AllocError::EmptyRange {
                start: range.start,
                end: range.end,
            });
        }
        let pages = usize::try_from(count)
            .ok()
            .filter(|n| n.checked_mul(page_size).is_some())
            .ok_or(AllocError::TooLarge(count))?;

        let this = Self {
            arena: PageArena::new(first, pages, page_size),
            links: Links::new(pages),
            shards: (0..config.shards()).map(|_| Shard::new()).collect(),
            cpu,
        };

        match config.distribution() {
            Distribution::SingleCpu => this.free_range(this.home(), 0..pages),
            Distribution::Partitioned => {
                let n = this.shards.len();
                for shard in 0..n {
                    this.free_range(shard, pages * shard / n..pages * (shard + 1) / n);
                }
            }
        }

        debug!(
            "kinit: {pages} pages of {page_size} bytes at {first}, {} shards, {:?}",
            this.shards.len(),
            config.distribution()
        );
        Ok(this)
    }

    /// Hands every page in `pages` to `shard`.
    fn free_range(&self, shard: usize, pages: Range<usize>) {
        for index in pages.clone() {
            // Safety: during construction every page is owned by the allocator.
            unsafe { self.arena.fill(index, FREE_JUNK) };
        }
        let mut list = self.shards[shard].free.lock();
        for index in pages {
            list.push(&self.links, index);
        }
    }

    fn home(&self) -> usize {
        let cpu = self.cpu.cpu_id();
        debug_assert!(cpu < self.shards.len(), "cpuid {cpu} out of range");
        cpu % self.shards.len()
    }

    /// Takes one page, or `None` if every shard is empty.
    ///
    /// Tries the caller's own shard first, then steals from the other shards in
    /// index order. The page is filled with [`ALLOC_JUNK`].
    #[must_use]
    pub fn allocate(&self) -> Option<Page<'_, P>> {
        let home = self.home();
        let index = match self.shards[home].pop(&self.links) {
            Some(index) => index,
            None => self.steal(home)?,
        };
        // Safety: the page just left a free list; nobody else can reach it.
        unsafe { self.arena.fill(index, ALLOC_JUNK) };
        Some(Page::new(self, index))
    }

    fn steal(&self, home: usize) -> Option<usize> {
        for (victim, shard) in self.shards.iter().enumerate() {
            if victim == home {
                continue;
            }
            if let Some(index) = shard.pop(&self.links) {
                shard.steals_out.fetch_add(1, Ordering::Relaxed);
                self.shards[home].steals_in.fetch_add(1, Ordering::Relaxed);
                trace!("kalloc: cpu {home} took page {index} from shard {victim}");
                return Some(index);
            }
        }
        warn!("kalloc: out of pages on cpu {home}");
        None
    }

    /// Returns `page` to the caller's own shard.
    ///
    /// # Panics
    /// If `page` came from a different allocator.
    pub fn free(&self, page: Page<'_, P>) {
        self.free_to(self.home(), page);
    }

    /// Returns `page` to an explicit shard.
    ///
    /// # Panics
    /// If `shard` is out of range or `page` came from a different allocator.
    pub fn free_to(&self, shard: usize, page: Page<'_, P>) {
        if shard >= self.shards.len() {
            error!("kfree: shard {shard} of {}", self.shards.len());
            panic!("kfree: no shard {shard}");
        }
        let index = self.take(page);
        // Safety: `take` consumed the only handle to the page.
        unsafe { self.arena.fill(index, FREE_JUNK) };
        self.shards[shard].push(&self.links, index);
    }

    fn take(&self, page: Page<'_, P>) -> usize {
        if !ptr::eq(page.owner(), self) {
            error!("kfree: {} belongs to another allocator", page.addr());
            panic!("kfree: {} belongs to another allocator", page.addr());
        }
        page.index()
    }

    /// Turns an address obtained from [`Page::into_addr`] back into its page.
    ///
    /// # Errors
    /// [`AllocError::BadAddress`] if `addr` is not the start of a managed page.
    ///
    /// # Safety
    /// `addr` must come from `into_addr` on a page of this allocator, and must
    /// not have been reclaimed since.
    pub unsafe fn from_addr(&self, addr: PhysAddr) -> Result<Page<'_, P>, AllocError> {
        let index = self
            .arena
            .index_of(addr)
            .ok_or(AllocError::BadAddress(addr))?;
        Ok(Page::new(self, index))
    }
}

impl<P> ShardedPageAlloc<P> {
    #[must_use]
    pub const fn shards(&self) -> usize {
        self.shards.len()
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.arena.page_size()
    }

    /// Number of pages under management, free or not.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.arena.pages()
    }

    /// Free pages on one shard.
    ///
    /// # Panics
    /// If `shard` is out of range.
    #[must_use]
    pub fn free_pages(&self, shard: usize) -> usize {
        self.shards[shard].free.lock().len()
    }

    /// Free pages across all shards.
    ///
    /// Shards are counted one after another, so under concurrent use the sum is
    /// not a snapshot.
    #[must_use]
    pub fn total_free(&self) -> usize {
        self.shards.iter().map(|s| s.free.lock().len()).sum()
    }

    /// # Panics
    /// If `shard` is out of range.
    #[must_use]
    pub fn stats(&self, shard: usize) -> ShardStats {
        let s = &self.shards[shard];
        ShardStats {
            free: s.free.lock().len(),
            steals_in: s.steals_in.load(Ordering::Relaxed),
            steals_out: s.steals_out.load(Ordering::Relaxed),
        }
    }

    pub(crate) const fn arena(&self) -> &PageArena {
        &self.arena
    }
}

impl<P> fmt::Debug for ShardedPageAlloc<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedPageAlloc")
            .field("base", &self.arena.addr_of(0))
            .field("pages", &self.arena.pages())
            .field("page_size", &self.arena.page_size())
            .field("shards", &self.shards.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedCpu;

    fn range(pages: u64) -> PhysRange {
        PhysRange::new(PhysAddr::new(0x8000_0000), PhysAddr::new(0x8000_0000 + pages * 64))
    }

    fn config(shards: usize, distribution: Distribution) -> AllocConfig {
        AllocConfig::default()
            .with_shards(shards)
            .with_page_size(64)
            .with_distribution(distribution)
    }

    #[test]
    fn partitioned_spreads_contiguous_runs() {
        let a = ShardedPageAlloc::new(config(3, Distribution::Partitioned), range(10), FixedCpu(0))
            .unwrap();
        assert_eq!(a.pages(), 10);
        assert_eq!((a.free_pages(0), a.free_pages(1), a.free_pages(2)), (3, 3, 4));
        // LIFO: the last page of shard 0's run comes out first.
        let p = a.allocate().unwrap();
        assert_eq!(p.index(), 2);
        a.free(p);
    }

    #[test]
    fn single_cpu_gives_everything_to_the_constructor() {
        let a = ShardedPageAlloc::new(config(4, Distribution::SingleCpu), range(8), FixedCpu(2))
            .unwrap();
        assert_eq!(a.free_pages(2), 8);
        assert_eq!(a.total_free(), 8);
        for s in [0, 1, 3] {
            assert_eq!(a.free_pages(s), 0);
        }
    }

    #[test]
    fn steals_are_counted_on_both_sides() {
        let home = || 0usize;
        let b = ShardedPageAlloc::new(config(3, Distribution::SingleCpu), range(2), home).unwrap();

        // Move one page over to shard 1 so the second allocation has to steal it.
        let p = b.allocate().unwrap();
        b.free_to(1, p);
        assert_eq!((b.free_pages(0), b.free_pages(1)), (1, 1));

        let p = b.allocate().unwrap();
        let q = b.allocate().unwrap();
        assert_eq!(b.stats(0).steals_in, 1);
        assert_eq!(b.stats(1).steals_out, 1);
        assert!(b.allocate().is_none());
        b.free(p);
        b.free(q);
        assert_eq!(b.free_pages(0), 2);
    }

    #[test]
    fn freed_pages_are_filled_with_junk() {
        let a = ShardedPageAlloc::new(config(1, Distribution::SingleCpu), range(2), FixedCpu(0))
            .unwrap();
        assert!(unsafe { a.arena.page(0) }.iter().all(|&b| b == FREE_JUNK));

        let mut p = a.allocate().unwrap();
        let index = p.index();
        p.fill(0xEE);
        a.free(p);
        assert!(unsafe { a.arena.page(index) }.iter().all(|&b| b == FREE_JUNK));
    }

    #[test]
    fn shared_views_of_a_page_coexist() {
        let a = ShardedPageAlloc::new(config(1, Distribution::SingleCpu), range(1), FixedCpu(0))
            .unwrap();
        let p = a.allocate().unwrap();
        let x: &[u8] = &p;
        let y: &[u8] = &p;
        assert_eq!(x[0], y[0]);
        assert!(x.iter().zip(y).all(|(l, r)| l == r && *l == ALLOC_JUNK));
        a.free(p);
    }

    #[test]
    fn rejects_ranges_without_a_whole_page() {
        let r = PhysRange::new(PhysAddr::new(1), PhysAddr::new(64));
        let err = ShardedPageAlloc::new(config(1, Distribution::SingleCpu), r, FixedCpu(0))
            .unwrap_err();
        assert_eq!(
            err,
            AllocError::EmptyRange {
                start: PhysAddr::new(1),
                end: PhysAddr::new(64)
            }
        );
    }
}
