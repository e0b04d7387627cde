//! # Block Buffer Cache
//!
//! A fixed pool of block-sized slots caching the contents of a
//! [`BlockDevice`], shared by every context that reads or writes file system
//! blocks. Besides avoiding redundant device reads, the cache is the point where
//! contexts synchronize on a block: at most one context at a time holds the
//! contents of any given block.
//!
//! ## Structure
//!
//! ```text
//!                 acquire(dev, blockno)
//!                          │
//!            hash (dev + blockno) % buckets
//!                          │
//!   ┌────────┬────────┬────▼───┬────────┐
//!   │bucket 0│bucket 1│bucket 2│   ...  │   one SpinLock each,
//!   │ meta   │ meta   │ meta   │        │   owns its slots' metadata
//!   └───┬────┴───┬────┴───┬────┴────────┘
//!       │        │        │
//!   ┌───▼──┐ ┌───▼──┐ ┌───▼──┐
//!   │slot 0│ │slot 1│ │slot 2│ ...          one SleepLock each,
//!   │ data │ │ data │ │ data │              guards the block contents
//!   └──────┘ └──────┘ └──────┘
//! ```
//!
//! * **Hit**: lock the bucket, bump the slot's reference count, unlock, wait for
//!   the slot's content lock.
//! * **Miss**: take the eviction coordinator, re-check the same bucket, then scan
//!   every bucket for the unreferenced slot with the oldest release stamp and
//!   relink it under the new identity, invalid.
//!
//! The cache never shrinks or grows and has no fallback when every slot is
//! referenced: that is a fatal sizing error.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_bio::{BlockCache, CacheConfig, RamDisk, Ticks};
//!
//! let disk = RamDisk::new(1, 64, 512);
//! let cache = BlockCache::new(CacheConfig::default(), disk, Ticks::new()).unwrap();
//!
//! let mut b = cache.bread(0, 7).unwrap();
//! b[0] = 0xAB;
//! b.write().unwrap();
//! let pin = b.pin(); // keep block 7 resident past the release
//! b.release();
//!
//! assert_eq!(cache.refcount(0, 7), Some(1));
//! pin.unpin();
//! assert_eq!(cache.refcount(0, 7), Some(0));
//! ```
//!
//! ## Liveness
//!
//! There are no timeouts. A context that never releases a block stalls every
//! other context that acquires it.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

mod bucket;
mod buf;
mod cache;
mod clock;
mod config;
mod device;
mod error;

pub use buf::{BlockPin, BlockRef};
pub use cache::{BlockCache, CacheStats};
pub use clock::{Clock, Ticks};
pub use config::CacheConfig;
pub use device::{BlockDevice, BlockId, RamDisk};
pub use error::{CacheError, DiskError};
