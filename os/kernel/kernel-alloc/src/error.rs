use crate::PhysAddr;

/// Why a [`ShardedPageAlloc`](crate::ShardedPageAlloc) could not be built, or a
/// raw address could not be turned back into a page.
///
/// Running out of pages is not an error; see
/// [`allocate`](crate::ShardedPageAlloc::allocate).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("at least one shard is required")]
    NoShards,
    #[error("page size {0} is not a power of two")]
    BadPageSize(usize),
    #[error("range {start}..{end} holds no whole page")]
    EmptyRange { start: PhysAddr, end: PhysAddr },
    #[error("range of {0} pages does not fit the address space")]
    TooLarge(u64),
    #[error("{0} is not the start of a page managed by this allocator")]
    BadAddress(PhysAddr),
}
