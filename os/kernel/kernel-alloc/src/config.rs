use kernel_info::param::{NCPU, PGSIZE};
use utils_accessors_derive::Setters;

use crate::AllocError;

/// How the initial page range is spread over the shards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Distribution {
    /// Every page goes to the constructing CPU's shard; the others start empty
    /// and fill up by stealing and freeing. This is what a booting kernel does.
    SingleCpu,
    /// The range is cut into one contiguous run per shard.
    #[default]
    Partitioned,
}

/// Shape of a [`ShardedPageAlloc`](crate::ShardedPageAlloc), fixed at construction.
///
/// ```
/// # use kernel_alloc::{AllocConfig, Distribution};
/// let config = AllocConfig::default()
///     .with_shards(2)
///     .with_distribution(Distribution::SingleCpu);
/// assert_eq!(config.shards(), 2);
/// assert_eq!(config.page_size(), 4096);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Setters)]
pub struct AllocConfig {
    /// Number of shards (`P`), one per CPU.
    #[setters(get)]
    shards: usize,
    #[setters(get)]
    page_size: usize,
    #[setters(get)]
    distribution: Distribution,
}

impl Default for AllocConfig {
    fn default() -> Self {
        Self {
            shards: NCPU,
            page_size: PGSIZE,
            distribution: Distribution::default(),
        }
    }
}

impl AllocConfig {
    pub(crate) const fn validate(&self) -> Result<(), AllocError> {
        if self.shards == 0 {
            return Err(AllocError::NoShards);
        }
        if !self.page_size.is_power_of_two() {
            return Err(AllocError::BadPageSize(self.page_size));
        }
        Ok(())
    }
}
