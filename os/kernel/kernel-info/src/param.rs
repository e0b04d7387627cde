//! # System Parameters

/// Maximum number of CPUs; one allocator shard per CPU.
pub const NCPU: usize = 8;

/// Maximum number of blocks any single file system operation writes.
pub const MAXOPBLOCKS: usize = 10;

/// Size of the disk block cache, in slots.
pub const NBUF: usize = MAXOPBLOCKS * 3;

/// Number of buckets in the block cache directory.
///
/// A prime keeps `(dev + blockno) % NBUCKET` spread evenly for sequential block numbers.
pub const NBUCKET: usize = 13;

/// Block size in bytes.
pub const BSIZE: usize = 1024;

/// Physical page size in bytes.
pub const PGSIZE: usize = 4096;

/// Byte pattern written over a page when it is freed.
///
/// Dangling references then read obvious garbage instead of stale data.
pub const FREE_JUNK: u8 = 0x01;

/// Byte pattern written over a page when it is handed out.
pub const ALLOC_JUNK: u8 = 0x05;

const _: () = {
    assert!(NCPU > 0);
    assert!(NBUCKET > 0);
    assert!(NBUF >= NBUCKET);
    assert!(PGSIZE.is_power_of_two());
    assert!(BSIZE.is_power_of_two());
    assert!(FREE_JUNK != ALLOC_JUNK);
};
