//! Buffer cache strategies
//!
//! A strategy decides how requested sizes are normalized and whether a
//! released buffer is pooled for reuse. The set is closed and chosen once
//! at construction from configuration:
//!
//! - [`DisabledCache`]: exact allocate/destroy, zero caching overhead and
//!   zero risk of reuse bugs. Baseline and correctness fallback.
//! - [`SimpleCache`]: exact-size pooling with a single pool and unbounded
//!   capacity.
//! - [`BucketCache`]: fixed size-class table with per-class capacities and
//!   separate storage/uniform pool sets.
//!
//! All variants share the deferred-release protocol: a released buffer is
//! queued as pending and only becomes reusable once `on_refresh` runs at an
//! execution epoch boundary, after device command submission. The caller
//! guarantees that ordering; the strategies do not fence.

mod bucket;
mod disabled;
mod simple;

pub use bucket::{BucketCache, DEFAULT_BUCKET_TABLE};
pub use disabled::DisabledCache;
pub use simple::SimpleCache;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::device::{BufferUsage, DeviceBuffer, NativeDevice};
use crate::error::{BufferForgeError, BufferResult};

/// Minimum alignment of every allocated buffer size, in bytes.
pub const MIN_ALIGNMENT: usize = 16;

/// Round a requested size up to the minimum alignment.
pub(crate) fn align_up(size: usize) -> usize {
    (size + MIN_ALIGNMENT - 1) / MIN_ALIGNMENT * MIN_ALIGNMENT
}

/// Cache mode selected by engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Always exact allocate/destroy
    None,
    /// Size-exact pooling with a single pool
    Simple,
    /// Size-class pooling with separate storage/uniform pools (default)
    #[default]
    Bucket,
}

impl FromStr for CacheMode {
    type Err = BufferForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "disabled" => Ok(CacheMode::None),
            "simple" => Ok(CacheMode::Simple),
            "bucket" => Ok(CacheMode::Bucket),
            other => Err(BufferForgeError::Configuration(format!(
                "unknown cache mode: {}",
                other
            ))),
        }
    }
}

/// A cache strategy instance. Construct one per execution context.
#[derive(Debug)]
pub enum CacheStrategy {
    Disabled(DisabledCache),
    Simple(SimpleCache),
    Bucket(BucketCache),
}

impl CacheStrategy {
    /// Build a strategy for the given mode. Bucket mode uses the default
    /// size-class table.
    pub fn new(mode: CacheMode) -> BufferResult<Self> {
        match mode {
            CacheMode::None => Ok(CacheStrategy::Disabled(DisabledCache)),
            CacheMode::Simple => Ok(CacheStrategy::Simple(SimpleCache::new())),
            CacheMode::Bucket => Ok(CacheStrategy::Bucket(BucketCache::new(
                DEFAULT_BUCKET_TABLE,
            )?)),
        }
    }

    /// Build a bucket strategy over a custom `(class_size, capacity)` table.
    /// The table must be non-empty, strictly increasing, and 16-aligned.
    pub fn with_bucket_table(table: &[(usize, usize)]) -> BufferResult<Self> {
        Ok(CacheStrategy::Bucket(BucketCache::new(table)?))
    }

    /// Normalize a requested size to the size the device allocation will
    /// actually use. Never fails; always >= `requested` and 16-aligned.
    pub fn calculate_buffer_size(&self, requested: usize) -> usize {
        match self {
            CacheStrategy::Disabled(cache) => cache.calculate_buffer_size(requested),
            CacheStrategy::Simple(cache) => cache.calculate_buffer_size(requested),
            CacheStrategy::Bucket(cache) => cache.calculate_buffer_size(requested),
        }
    }

    /// Pop a free buffer matching `size` and `usage` if one is pooled.
    pub fn try_acquire(&mut self, size: usize, usage: BufferUsage) -> Option<DeviceBuffer> {
        match self {
            CacheStrategy::Disabled(cache) => cache.try_acquire(size, usage),
            CacheStrategy::Simple(cache) => cache.try_acquire(size, usage),
            CacheStrategy::Bucket(cache) => cache.try_acquire(size, usage),
        }
    }

    /// Bookkeeping hook called after a fresh device allocation.
    pub fn register(&mut self, buffer: &DeviceBuffer, requested: usize) {
        tracing::trace!(
            "cache register: id={} size={} requested={}",
            buffer.id(),
            buffer.size(),
            requested
        );
    }

    /// Hand a buffer back to the cache. It is queued as pending (or
    /// destroyed immediately in disabled mode / for unpoolable buffers) and
    /// is never returned by `try_acquire` before the next `on_refresh`.
    pub fn release(&mut self, device: &dyn NativeDevice, buffer: DeviceBuffer) {
        match self {
            CacheStrategy::Disabled(cache) => cache.release(device, buffer),
            CacheStrategy::Simple(cache) => cache.release(device, buffer),
            CacheStrategy::Bucket(cache) => cache.release(device, buffer),
        }
    }

    /// Promote pending buffers into the free pools, destroying any that
    /// would overflow a pool's capacity. Must run at an epoch boundary,
    /// after the commands referencing those buffers have been submitted.
    pub fn on_refresh(&mut self, device: &dyn NativeDevice) {
        match self {
            CacheStrategy::Disabled(cache) => cache.on_refresh(device),
            CacheStrategy::Simple(cache) => cache.on_refresh(device),
            CacheStrategy::Bucket(cache) => cache.on_refresh(device),
        }
    }

    /// Destroy every pooled and pending buffer. Called on context teardown.
    pub fn clear(&mut self, device: &dyn NativeDevice) {
        match self {
            CacheStrategy::Disabled(_) => {}
            CacheStrategy::Simple(cache) => cache.clear(device),
            CacheStrategy::Bucket(cache) => cache.clear(device),
        }
    }
}
