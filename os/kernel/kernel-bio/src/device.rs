use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use kernel_info::param::BSIZE;
use kernel_sync::SpinLock;

use crate::DiskError;

/// Identity of a block on the backing store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId {
    pub dev: u32,
    pub blockno: u32,
}

impl BlockId {
    #[must_use]
    pub const fn new(dev: u32, blockno: u32) -> Self {
        Self { dev, blockno }
    }

    /// Directory bucket holding this identity.
    ///
    /// Every code path maps an identity to a bucket through this function, so an
    /// identity can only ever be found in one bucket.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn bucket(self, buckets: usize) -> usize {
        let sum = self.dev as u64 + self.blockno as u64;
        // The remainder is below `buckets`, so it fits a usize.
        (sum % buckets as u64) as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.blockno)
    }
}

/// Synchronous backing store underneath the cache.
///
/// Both calls complete before returning. Buffers are exactly
/// [`block_size`](Self::block_size) bytes long.
pub trait BlockDevice {
    /// Bytes per block; the file system's [`BSIZE`] unless overridden.
    fn block_size(&self) -> usize {
        BSIZE
    }

    /// Fill `buf` with the contents of block `id`.
    ///
    /// # Errors
    /// Implementation-defined; the cache leaves the slot invalid and passes the
    /// error to the caller.
    fn read_block(&self, id: BlockId, buf: &mut [u8]) -> Result<(), DiskError>;

    /// Persist `buf` as the contents of block `id`.
    ///
    /// # Errors
    /// Implementation-defined; passed through to the caller unchanged.
    fn write_block(&self, id: BlockId, buf: &[u8]) -> Result<(), DiskError>;
}

/// A memory-backed disk with a fixed number of devices and blocks per device.
///
/// Each device's storage sits behind its own lock; a transfer holds it for the
/// duration of one block copy.
pub struct RamDisk {
    block_size: usize,
    blocks: u32,
    devices: Box<[SpinLock<Box<[u8]>>]>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl RamDisk {
    /// Create `devices` zero-filled devices of `blocks` blocks each.
    #[must_use]
    pub fn new(devices: u32, blocks: u32, block_size: usize) -> Self {
        let bytes = blocks as usize * block_size;
        let devices = (0..devices)
            .map(|_| SpinLock::new("ramdisk", vec![0u8; bytes].into_boxed_slice()))
            .collect();
        Self {
            block_size,
            blocks,
            devices,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of completed block reads.
    #[must_use]
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of completed block writes.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Copy of a block's contents, bypassing the counters.
    ///
    /// # Errors
    /// [`DiskError::OutOfRange`] for an unknown device or block.
    pub fn peek(&self, id: BlockId) -> Result<Vec<u8>, DiskError> {
        let (dev, range) = self.locate(id)?;
        Ok(dev.lock()[range].to_vec())
    }

    /// Overwrite a block's contents, bypassing the counters.
    ///
    /// # Errors
    /// [`DiskError::OutOfRange`] for an unknown device or block,
    /// [`DiskError::BadLength`] if `data` is not one block long.
    pub fn poke(&self, id: BlockId, data: &[u8]) -> Result<(), DiskError> {
        self.check_len(data.len())?;
        let (dev, range) = self.locate(id)?;
        dev.lock()[range].copy_from_slice(data);
        Ok(())
    }

    fn locate(
        &self,
        id: BlockId,
    ) -> Result<(&SpinLock<Box<[u8]>>, core::ops::Range<usize>), DiskError> {
        let out_of_range = DiskError::OutOfRange {
            dev: id.dev,
            blockno: id.blockno,
        };
        if id.blockno >= self.blocks {
            return Err(out_of_range);
        }
        let dev = self.devices.get(id.dev as usize).ok_or(out_of_range)?;
        let start = id.blockno as usize * self.block_size;
        Ok((dev, start..start + self.block_size))
    }

    const fn check_len(&self, got: usize) -> Result<(), DiskError> {
        if got == self.block_size {
            Ok(())
        } else {
            Err(DiskError::BadLength {
                expected: self.block_size,
                got,
            })
        }
    }
}

impl BlockDevice for RamDisk {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&self, id: BlockId, buf: &mut [u8]) -> Result<(), DiskError> {
        self.check_len(buf.len())?;
        let (dev, range) = self.locate(id)?;
        buf.copy_from_slice(&dev.lock()[range]);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_block(&self, id: BlockId, buf: &[u8]) -> Result<(), DiskError> {
        self.check_len(buf.len())?;
        let (dev, range) = self.locate(id)?;
        dev.lock()[range].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl fmt::Debug for RamDisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RamDisk")
            .field("devices", &self.devices.len())
            .field("blocks", &self.blocks)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_hash_to_one_bucket() {
        assert_eq!(BlockId::new(1, 10).bucket(13), 11);
        assert_eq!(BlockId::new(1, 12).bucket(13), 0);
        // dev + blockno must not overflow u32 arithmetic
        let expected = ((2 * u64::from(u32::MAX)) % 7) as usize;
        assert_eq!(BlockId::new(u32::MAX, u32::MAX).bucket(7), expected);
    }

    #[test]
    fn devices_default_to_the_file_system_block_size() {
        struct Zeroes;

        impl BlockDevice for Zeroes {
            fn read_block(&self, _: BlockId, buf: &mut [u8]) -> Result<(), DiskError> {
                buf.fill(0);
                Ok(())
            }

            fn write_block(&self, id: BlockId, _: &[u8]) -> Result<(), DiskError> {
                Err(DiskError::Io { dev: id.dev })
            }
        }

        assert_eq!(Zeroes.block_size(), BSIZE);
        assert_eq!(RamDisk::new(1, 1, 512).block_size(), 512);
    }

    #[test]
    fn ramdisk_round_trips_blocks() {
        let disk = RamDisk::new(2, 4, 8);
        let id = BlockId::new(1, 3);
        disk.write_block(id, &[9; 8]).unwrap();
        let mut buf = [0u8; 8];
        disk.read_block(id, &mut buf).unwrap();
        assert_eq!(buf, [9; 8]);
        assert_eq!(disk.peek(BlockId::new(0, 3)).unwrap(), vec![0; 8]);
        assert_eq!((disk.reads(), disk.writes()), (1, 1));
    }

    #[test]
    fn ramdisk_rejects_bad_requests() {
        let disk = RamDisk::new(1, 4, 8);
        let mut buf = [0u8; 8];
        assert_eq!(
            disk.read_block(BlockId::new(0, 4), &mut buf),
            Err(DiskError::OutOfRange { dev: 0, blockno: 4 })
        );
        assert_eq!(
            disk.read_block(BlockId::new(1, 0), &mut buf),
            Err(DiskError::OutOfRange { dev: 1, blockno: 0 })
        );
        assert_eq!(
            disk.write_block(BlockId::new(0, 0), &[0; 3]),
            Err(DiskError::BadLength { expected: 8, got: 3 })
        );
        assert_eq!(disk.writes(), 0);
    }
}
