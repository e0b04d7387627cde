use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

use kernel_bio::{BlockCache, BlockId, CacheConfig, RamDisk, Ticks};

const BLOCK: usize = 64;
const THREADS: usize = 8;

fn counter(b: &[u8]) -> u64 {
    u64::from_le_bytes(b[..8].try_into().unwrap())
}

/// Every iteration reads a counter from a block, bumps it and writes it back.
/// A second resident copy of a block, or two simultaneous holders, would lose
/// increments.
#[test]
fn read_modify_write_under_eviction_loses_no_updates() {
    const BLOCKS: u32 = 12;
    const ITERS: usize = 200;

    let config = CacheConfig::default().with_slots(THREADS + 2).with_buckets(5);
    let cache = BlockCache::new(config, RamDisk::new(1, BLOCKS, BLOCK), Ticks::new()).unwrap();
    let holders: Vec<AtomicUsize> = (0..BLOCKS).map(|_| AtomicUsize::new(0)).collect();
    let start = Barrier::new(THREADS);

    thread::scope(|s| {
        for t in 0..THREADS {
            let (cache, holders, start) = (&cache, &holders, &start);
            s.spawn(move || {
                start.wait();
                for i in 0..ITERS {
                    let blockno = ((t * 7 + i * 5) % BLOCKS as usize) as u32;
                    let mut b = cache.bread(0, blockno).unwrap();

                    let inside = &holders[blockno as usize];
                    assert_eq!(
                        inside.fetch_add(1, Ordering::SeqCst),
                        0,
                        "two holders of block {blockno}"
                    );

                    let n = counter(&b) + 1;
                    b[..8].copy_from_slice(&n.to_le_bytes());
                    b.write().unwrap();

                    inside.fetch_sub(1, Ordering::SeqCst);
                    b.release();
                    cache.clock().tick();
                }
            });
        }
    });

    let total: u64 = (0..BLOCKS)
        .map(|blockno| counter(&cache.device().peek(BlockId::new(0, blockno)).unwrap()))
        .sum();
    assert_eq!(total, (THREADS * ITERS) as u64);
    assert!(cache.stats().evictions > 0, "workload should have forced evictions");
    for blockno in 0..BLOCKS {
        assert!(
            matches!(cache.refcount(0, blockno), None | Some(0)),
            "leaked reference on block {blockno}"
        );
    }
}

/// Many contexts hammering one block all end up on the same slot.
#[test]
fn concurrent_acquires_of_one_block_share_a_slot() {
    const ITERS: usize = 100;

    let config = CacheConfig::default().with_slots(4).with_buckets(3);
    let cache = BlockCache::new(config, RamDisk::new(1, 8, BLOCK), Ticks::new()).unwrap();
    let start = Barrier::new(THREADS);

    thread::scope(|s| {
        for _ in 0..THREADS {
            let (cache, start) = (&cache, &start);
            s.spawn(move || {
                start.wait();
                for _ in 0..ITERS {
                    let mut b = cache.acquire(0, 5);
                    b[0] = b[0].wrapping_add(1);
                    b.release();
                }
            });
        }
    });

    // No write-back and a single resident copy: the in-memory counter saw every bump.
    let b = cache.acquire(0, 5);
    assert_eq!(usize::from(b[0]), (THREADS * ITERS) % 256);
    assert_eq!(cache.stats().misses, 1);
}

/// A held block survives any amount of churn by other contexts.
#[test]
fn held_blocks_are_never_recycled() {
    const ITERS: u32 = 150;

    let config = CacheConfig::default().with_slots(THREADS + 2).with_buckets(4);
    let cache = BlockCache::new(config, RamDisk::new(1, 256, BLOCK), Ticks::new()).unwrap();

    let mut held = cache.acquire(0, 255);
    held.fill(0xEE);
    let pin = held.pin();
    held.release();

    let start = Barrier::new(THREADS - 1);
    thread::scope(|s| {
        for t in 0..THREADS - 1 {
            let (cache, start) = (&cache, &start);
            s.spawn(move || {
                start.wait();
                for i in 0..ITERS {
                    let blockno = (i * 13 + t as u32 * 31) % 200;
                    cache.acquire(0, blockno).release();
                    cache.clock().tick();
                }
            });
        }
    });

    assert_eq!(cache.refcount(0, 255), Some(1));
    pin.unpin();
    let b = cache.acquire(0, 255);
    assert_eq!(&b[..], &[0xEE; BLOCK][..]);
}
