use alloc::boxed::Box;
use core::fmt;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::Ordering;

use kernel_sync::SleepLockGuard;
use log::error;

use crate::{BlockCache, BlockDevice, BlockId, CacheError, Clock, DiskError};

/// Exclusive access to one cached block.
///
/// Holds one reference on the slot and its content lock. Dropping the handle
/// releases the content lock first, then the reference; the last reference
/// stamps the slot's recency. The handle cannot outlive that release.
pub struct BlockRef<'a, D: BlockDevice, C: Clock> {
    cache: &'a BlockCache<D, C>,
    id: BlockId,
    slot: usize,
    content: ManuallyDrop<SleepLockGuard<'a, Box<[u8]>>>,
}

impl<'a, D: BlockDevice, C: Clock> BlockRef<'a, D, C> {
    pub(crate) const fn new(
        cache: &'a BlockCache<D, C>,
        id: BlockId,
        slot: usize,
        content: SleepLockGuard<'a, Box<[u8]>>,
    ) -> Self {
        Self {
            cache,
            id,
            slot,
            content: ManuallyDrop::new(content),
        }
    }

    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub const fn dev(&self) -> u32 {
        self.id.dev
    }

    #[must_use]
    pub const fn blockno(&self) -> u32 {
        self.id.blockno
    }

    /// Whether the contents reflect the device.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.cache.slot(self.slot).valid.load(Ordering::Acquire)
    }

    /// Load the block from the device unless already valid.
    ///
    /// # Errors
    /// Whatever the device reports; the slot stays invalid.
    pub fn read(&mut self) -> Result<(), DiskError> {
        self.assert_holding("bread");
        if !self.is_valid() {
            self.cache.device().read_block(self.id, &mut self.content)?;
            self.cache.slot(self.slot).valid.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Write the contents through to the device, synchronously.
    ///
    /// # Errors
    /// Whatever the device reports.
    pub fn write(&mut self) -> Result<(), DiskError> {
        self.assert_holding("bwrite");
        self.cache.device().write_block(self.id, &self.content)
    }

    /// Keep the slot resident after this handle is released.
    ///
    /// The pin does not grant access to the contents.
    pub fn pin(&self) -> BlockPin<'a, D, C> {
        self.cache.add_ref(self.id, self.slot);
        BlockPin {
            cache: self.cache,
            id: self.id,
            slot: self.slot,
        }
    }

    /// Give the block back. Equivalent to dropping the handle.
    pub fn release(self) {
        drop(self);
    }

    fn assert_holding(&self, op: &'static str) {
        if !self.content.holding(&self.cache.slot(self.slot).content) {
            error!("{op}: {} accessed without its content lock", self.id);
            panic!("{}", CacheError::NotHeld(op));
        }
    }
}

impl<D: BlockDevice, C: Clock> Deref for BlockRef<'_, D, C> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.content
    }
}

impl<D: BlockDevice, C: Clock> DerefMut for BlockRef<'_, D, C> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.content
    }
}

impl<D: BlockDevice, C: Clock> Drop for BlockRef<'_, D, C> {
    fn drop(&mut self) {
        self.assert_holding("brelse");
        // Safety: `content` is not touched again after this point.
        unsafe { ManuallyDrop::drop(&mut self.content) };
        self.cache.drop_ref(self.id, self.slot);
    }
}

impl<D: BlockDevice, C: Clock> fmt::Debug for BlockRef<'_, D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockRef")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

/// A reference that keeps a slot resident without locking its contents.
///
/// Dropping the pin (or [`unpin`](Self::unpin)) gives the reference back.
#[must_use = "dropping a pin unpins the block immediately"]
pub struct BlockPin<'a, D: BlockDevice, C: Clock> {
    cache: &'a BlockCache<D, C>,
    id: BlockId,
    slot: usize,
}

impl<D: BlockDevice, C: Clock> BlockPin<'_, D, C> {
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    pub fn unpin(self) {
        drop(self);
    }
}

impl<D: BlockDevice, C: Clock> Drop for BlockPin<'_, D, C> {
    fn drop(&mut self) {
        self.cache.drop_ref(self.id, self.slot);
    }
}

impl<D: BlockDevice, C: Clock> fmt::Debug for BlockPin<'_, D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPin")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .finish()
    }
}
