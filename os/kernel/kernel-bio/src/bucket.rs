//! Directory buckets.
//!
//! A bucket owns the metadata of every slot currently linked into it, so the
//! bucket's lock is the lock for that metadata. Moving a slot to another bucket
//! moves its [`SlotMeta`] with it.

use alloc::vec::Vec;

use kernel_sync::{SpinLock, SpinLockGuard};

use crate::BlockId;

/// Per-slot bookkeeping, owned by whichever bucket the slot is linked into.
#[derive(Debug, Clone)]
pub(crate) struct SlotMeta {
    /// Index into the cache's slot pool.
    pub slot: usize,
    /// `None` until the slot is first assigned a block.
    pub id: Option<BlockId>,
    /// Holders plus pins; zero marks the slot evictable.
    pub refcnt: u32,
    /// Clock value when `refcnt` last dropped to zero.
    pub last_used: u64,
}

impl SlotMeta {
    pub const fn unassigned(slot: usize) -> Self {
        Self {
            slot,
            id: None,
            refcnt: 0,
            last_used: 0,
        }
    }
}

/// The slots linked into one bucket, most recently linked first.
#[derive(Debug, Default)]
pub(crate) struct Chain(Vec<SlotMeta>);

impl Chain {
    /// The slot mapping `id`, if resident here.
    pub fn find(&mut self, id: BlockId) -> Option<&mut SlotMeta> {
        self.0.iter_mut().find(|m| m.id == Some(id))
    }

    pub fn by_slot(&mut self, slot: usize) -> Option<&mut SlotMeta> {
        self.0.iter_mut().find(|m| m.slot == slot)
    }

    pub fn position(&self, slot: usize) -> Option<usize> {
        self.0.iter().position(|m| m.slot == slot)
    }

    pub fn get_mut(&mut self, pos: usize) -> Option<&mut SlotMeta> {
        self.0.get_mut(pos)
    }

    /// The unreferenced slot with the oldest release stamp.
    ///
    /// Ties go to the slot found first.
    pub fn lru_candidate(&self) -> Option<&SlotMeta> {
        self.0
            .iter()
            .filter(|m| m.refcnt == 0)
            .fold(None, |best: Option<&SlotMeta>, m| match best {
                Some(b) if b.last_used <= m.last_used => Some(b),
                _ => Some(m),
            })
    }

    pub fn unlink(&mut self, pos: usize) -> SlotMeta {
        self.0.remove(pos)
    }

    pub fn link(&mut self, meta: SlotMeta) {
        self.0.insert(0, meta);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// A lockable partition of the directory.
pub(crate) struct Bucket {
    chain: SpinLock<Chain>,
}

impl Bucket {
    pub fn new(chain: Vec<SlotMeta>) -> Self {
        Self {
            chain: SpinLock::new("bcache_bucket", Chain(chain)),
        }
    }

    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, Chain> {
        self.chain.lock()
    }
}
