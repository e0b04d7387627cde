//! # Kernel Configuration Defaults
//!
//! This crate is the single source of the compile-time defaults shared by the
//! kernel's resource-management subsystems. The subsystems themselves never read
//! these values as ambient globals: each constructor takes an explicit
//! configuration struct whose `Default` impl is sourced from here, so tests and
//! embedders can size the pools independently.
//!
//! ## Parameters
//!
//! | Constant | Consumer | Meaning |
//! |----------|----------|---------|
//! | [`NBUF`](param::NBUF) | `kernel-bio` | number of cache slots (`N`) |
//! | [`NBUCKET`](param::NBUCKET) | `kernel-bio` | number of directory buckets |
//! | [`BSIZE`](param::BSIZE) | `kernel-bio` | bytes per block |
//! | [`NCPU`](param::NCPU) | `kernel-alloc` | number of allocator shards (`P`) |
//! | [`PGSIZE`](param::PGSIZE) | `kernel-alloc` | bytes per page |
//!
//! ## Sizing
//!
//! The buffer cache never degrades gracefully: once every slot is referenced, a
//! further miss is fatal. `NBUF` therefore has to cover the deepest nesting of
//! simultaneously held blocks the file system can produce. The defaults below
//! follow the classic teaching-kernel layout (`MAXOPBLOCKS * 3`).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod param;
