//! Bucket cache: fixed size-class table with per-class capacities

use std::collections::HashMap;

use crate::cache::align_up;
use crate::device::{BufferUsage, DeviceBuffer, NativeDevice};
use crate::error::{BufferForgeError, BufferResult};

/// Default `(class_size, capacity)` table, tuned on transformer workloads.
///
/// The tail entries (64 MiB and up) hold very few buffers, but not caching
/// them at all costs real throughput on image-diffusion style models.
pub const DEFAULT_BUCKET_TABLE: &[(usize, usize)] = &[
    (64, 250),
    (128, 200),
    (256, 200),
    (512, 200),
    (2048, 230),
    (4096, 200),
    (8192, 50),
    (16384, 50),
    (32768, 50),
    (65536, 50),
    (131072, 50),
    (262144, 50),
    (524288, 50),
    (1048576, 50),
    (2097152, 30),
    (4194304, 20),
    (8388608, 10),
    (12582912, 10),
    (16777216, 10),
    (26214400, 15),
    (33554432, 22),
    (44236800, 2),
    (58982400, 6),
    (67108864, 6),
    (134217728, 6),
    (167772160, 6),
];

#[derive(Debug, Clone, Copy)]
struct Bucket {
    size: usize,
    capacity: usize,
}

/// Free pools and the pending queue for one usage class.
#[derive(Debug, Default)]
struct UsagePools {
    pools: HashMap<usize, Vec<DeviceBuffer>>,
    pending: Vec<DeviceBuffer>,
}

impl UsagePools {
    fn promote(&mut self, device: &dyn NativeDevice, table: &[Bucket]) {
        for buffer in self.pending.drain(..) {
            let class = buffer.size();
            let capacity = table
                .iter()
                .find(|bucket| bucket.size == class)
                .map(|bucket| bucket.capacity)
                .unwrap_or(0);
            let pool = self.pools.entry(class).or_default();
            if pool.len() < capacity {
                pool.push(buffer);
            } else {
                tracing::debug!(
                    "bucket cache: pool for class {} at capacity {}, destroying id={}",
                    class,
                    capacity,
                    buffer.id()
                );
                device.destroy_buffer(buffer);
            }
        }
    }

    fn clear(&mut self, device: &dyn NativeDevice) {
        for buffer in self.pending.drain(..) {
            device.destroy_buffer(buffer);
        }
        for (_, pool) in self.pools.drain() {
            for buffer in pool {
                device.destroy_buffer(buffer);
            }
        }
    }
}

/// Size-class pooling over a fixed ascending table.
///
/// Storage and uniform buffers are held in two independent pool sets
/// because their bind-group layouts differ; a pooled storage buffer can
/// never satisfy a uniform request or vice versa. When a buffer carries
/// both flags, STORAGE takes precedence and the buffer lives in the
/// storage pools only.
///
/// Requests beyond the largest class fall back to exact alignment and are
/// never pooled, so a rare huge allocation cannot pin device memory.
#[derive(Debug)]
pub struct BucketCache {
    table: Vec<Bucket>,
    storage: UsagePools,
    uniform: UsagePools,
}

impl BucketCache {
    /// Validate and adopt a `(class_size, capacity)` table.
    ///
    /// The table must be non-empty, strictly increasing in class size, and
    /// every class must be a multiple of the 16-byte minimum alignment.
    pub fn new(table: &[(usize, usize)]) -> BufferResult<Self> {
        if table.is_empty() {
            return Err(BufferForgeError::Configuration(
                "bucket table must not be empty".to_string(),
            ));
        }

        let mut previous = 0usize;
        for &(size, _capacity) in table {
            if size % crate::cache::MIN_ALIGNMENT != 0 {
                return Err(BufferForgeError::Configuration(format!(
                    "bucket size {} is not a multiple of {}",
                    size,
                    crate::cache::MIN_ALIGNMENT
                )));
            }
            if size <= previous {
                return Err(BufferForgeError::Configuration(format!(
                    "bucket sizes must be strictly increasing: {} after {}",
                    size, previous
                )));
            }
            previous = size;
        }

        Ok(BucketCache {
            table: table
                .iter()
                .map(|&(size, capacity)| Bucket { size, capacity })
                .collect(),
            storage: UsagePools::default(),
            uniform: UsagePools::default(),
        })
    }

    pub fn calculate_buffer_size(&self, requested: usize) -> usize {
        match self.table.iter().find(|bucket| bucket.size >= requested) {
            Some(bucket) => bucket.size,
            // Beyond the largest class: exact alignment, never pooled.
            None => align_up(requested),
        }
    }

    pub fn try_acquire(&mut self, size: usize, usage: BufferUsage) -> Option<DeviceBuffer> {
        let pools = Self::route(&mut self.storage, &mut self.uniform, usage)?;
        let buffer = pools.pools.get_mut(&size)?.pop()?;
        tracing::debug!(
            "bucket cache hit: id={} class={} usage={:?}",
            buffer.id(),
            size,
            usage
        );
        Some(buffer)
    }

    pub fn release(&mut self, device: &dyn NativeDevice, buffer: DeviceBuffer) {
        if !self.is_class(buffer.size()) {
            tracing::trace!(
                "bucket cache: size {} is not a class, destroying id={}",
                buffer.size(),
                buffer.id()
            );
            device.destroy_buffer(buffer);
            return;
        }

        match Self::route(&mut self.storage, &mut self.uniform, buffer.usage()) {
            Some(pools) => pools.pending.push(buffer),
            None => {
                tracing::trace!(
                    "bucket cache: usage {:?} is not poolable, destroying id={}",
                    buffer.usage(),
                    buffer.id()
                );
                device.destroy_buffer(buffer);
            }
        }
    }

    pub fn on_refresh(&mut self, device: &dyn NativeDevice) {
        self.storage.promote(device, &self.table);
        self.uniform.promote(device, &self.table);
    }

    pub fn clear(&mut self, device: &dyn NativeDevice) {
        self.storage.clear(device);
        self.uniform.clear(device);
    }

    /// Select the pool set for a usage. STORAGE wins over UNIFORM when both
    /// flags are present; buffers with neither flag are not poolable.
    fn route<'a>(
        storage: &'a mut UsagePools,
        uniform: &'a mut UsagePools,
        usage: BufferUsage,
    ) -> Option<&'a mut UsagePools> {
        if usage.contains(BufferUsage::STORAGE) {
            Some(storage)
        } else if usage.contains(BufferUsage::UNIFORM) {
            Some(uniform)
        } else {
            None
        }
    }

    fn is_class(&self, size: usize) -> bool {
        self.table.iter().any(|bucket| bucket.size == size)
    }

    /// Number of idle buffers pooled for a class under a usage
    #[cfg(test)]
    pub(crate) fn pooled_count(&self, size: usize, usage: BufferUsage) -> usize {
        let pools = if usage.contains(BufferUsage::STORAGE) {
            &self.storage
        } else {
            &self.uniform
        };
        pools.pools.get(&size).map_or(0, Vec::len)
    }
}
