/// Failures of the block cache itself.
///
/// [`NoBuffers`](Self::NoBuffers) and [`NotHeld`](Self::NotHeld) are fatal: they
/// are never returned, only rendered into the panic message of the offending
/// context. Only configuration errors are recoverable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Every slot is referenced; the cache is undersized for the workload.
    #[error("bget: no buffers")]
    NoBuffers,
    /// A block operation was attempted without holding the block's content lock.
    #[error("{0}: content lock not held")]
    NotHeld(&'static str),
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Failures reported by a [`BlockDevice`](crate::BlockDevice).
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiskError {
    #[error("block {blockno} of device {dev} is out of range")]
    OutOfRange { dev: u32, blockno: u32 },
    #[error("buffer of {got} bytes does not match the {expected}-byte block size")]
    BadLength { expected: usize, got: usize },
    #[error("device {dev}: I/O error")]
    Io { dev: u32 },
}
