//! # Execution Context Identity

/// Identifies the CPU the caller is running on.
///
/// The value picks the caller's home shard. It must be in `[0, shards)` and must
/// not change for the duration of a single allocator call; a kernel guarantees
/// the latter by keeping interrupts off, tests by pinning one identity per thread.
pub trait CpuId {
    fn cpu_id(&self) -> usize;
}

impl<F> CpuId for F
where
    F: Fn() -> usize,
{
    #[inline]
    fn cpu_id(&self) -> usize {
        self()
    }
}

/// Every caller runs on the same CPU.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FixedCpu(pub usize);

impl CpuId for FixedCpu {
    #[inline]
    fn cpu_id(&self) -> usize {
        self.0
    }
}
