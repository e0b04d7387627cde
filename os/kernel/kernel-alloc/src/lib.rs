//! # Sharded Physical Page Allocator
//!
//! Hands out fixed-size physical pages from one contiguous range. Free pages are
//! kept on one list per CPU ("shard"), each behind its own lock, so CPUs that
//! allocate and free locally never contend with each other.
//!
//! ```text
//!   cpu 0          cpu 1          cpu 2          cpu 3
//!     │              │              │              │
//! ┌───▼────┐     ┌───▼────┐     ┌───▼────┐     ┌───▼────┐
//! │shard 0 │     │shard 1 │     │shard 2 │     │shard 3 │   one `kmem` SpinLock each
//! │ 7 ─► 3 │     │ (empty)│     │ 9 ─► 8 │     │ 5      │
//! └────────┘     └───┬────┘     └────────┘     └────────┘
//!                    │ empty: try shard 0, then 2, then 3,
//!                    └─────── one lock at a time
//!
//! ┌─────────────────────────── page arena ───────────────────────────┐
//! │ page 0 │ page 1 │ page 2 │ ...                                   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Free lists are stacks of page indices threaded through a side table of
//! links, never through the pages themselves. A shard that runs dry steals a
//! single page from the first non-empty shard; pages are never migrated in bulk,
//! and a freed page always goes to the freeing CPU's shard.
//!
//! Freed pages are filled with [`FREE_JUNK`](kernel_info::param::FREE_JUNK) and
//! allocated pages with [`ALLOC_JUNK`](kernel_info::param::ALLOC_JUNK), so
//! dangling or uninitialized reads show up as garbage.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::{AllocConfig, FixedCpu, PhysAddr, PhysRange, ShardedPageAlloc};
//!
//! let range = PhysRange::new(PhysAddr::new(0x8000_0000), PhysAddr::new(0x8001_0000));
//! let config = AllocConfig::default().with_shards(2);
//! let kmem = ShardedPageAlloc::new(config, range, FixedCpu(0)).unwrap();
//! assert_eq!(kmem.total_free(), 16);
//!
//! let mut page = kmem.allocate().unwrap();
//! assert!(page.iter().all(|&b| b == 5));
//! page[0] = 42;
//! kmem.free(page);
//! assert_eq!(kmem.total_free(), 16);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

mod addr;
mod arena;
mod config;
mod cpu;
mod error;
mod free_list;
mod page;
mod sharded;

pub use addr::{PhysAddr, PhysRange};
pub use config::{AllocConfig, Distribution};
pub use cpu::{CpuId, FixedCpu};
pub use error::AllocError;
pub use page::Page;
pub use sharded::{ShardStats, ShardedPageAlloc};
