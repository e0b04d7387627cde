use kernel_info::param::{NBUCKET, NBUF};
use utils_accessors_derive::Setters;

use crate::CacheError;

/// Sizing of a [`BlockCache`](crate::BlockCache), fixed at construction.
///
/// ```
/// # use kernel_bio::CacheConfig;
/// let config = CacheConfig::default().with_slots(4).with_buckets(3);
/// assert_eq!(config.slots(), 4);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Setters)]
pub struct CacheConfig {
    /// Number of slots (`N`), allocated once.
    #[setters(get)]
    slots: usize,
    /// Number of independently locked directory buckets.
    #[setters(get)]
    buckets: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            slots: NBUF,
            buckets: NBUCKET,
        }
    }
}

impl CacheConfig {
    pub(crate) const fn validate(&self) -> Result<(), CacheError> {
        if self.slots == 0 {
            return Err(CacheError::InvalidConfig("at least one slot is required"));
        }
        if self.buckets == 0 {
            return Err(CacheError::InvalidConfig("at least one bucket is required"));
        }
        Ok(())
    }
}
