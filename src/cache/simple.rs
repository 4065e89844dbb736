//! Simple cache: exact-size pools, unbounded capacity

use std::collections::HashMap;

use crate::cache::align_up;
use crate::device::{BufferUsage, DeviceBuffer, NativeDevice};

/// Exact-size pooling keyed by the aligned requested size.
///
/// A single pool serves every usage; usage is only checked as a coarse
/// storage-versus-other filter. Non-storage buffers (uniforms, staging) are
/// destroyed on release rather than pooled. Capacity is unbounded: refresh
/// unconditionally promotes every pending buffer into its exact-size pool.
///
/// Pool membership is a containment check, not a bitwise OR: only buffers
/// whose usage actually contains STORAGE participate.
#[derive(Debug, Default)]
pub struct SimpleCache {
    pools: HashMap<usize, Vec<DeviceBuffer>>,
    pending: Vec<DeviceBuffer>,
}

impl SimpleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calculate_buffer_size(&self, requested: usize) -> usize {
        align_up(requested)
    }

    pub fn try_acquire(&mut self, size: usize, usage: BufferUsage) -> Option<DeviceBuffer> {
        if !usage.contains(BufferUsage::STORAGE) {
            return None;
        }
        let buffer = self.pools.get_mut(&size)?.pop()?;
        tracing::debug!("simple cache hit: id={} size={}", buffer.id(), size);
        Some(buffer)
    }

    pub fn release(&mut self, device: &dyn NativeDevice, buffer: DeviceBuffer) {
        if buffer.usage().contains(BufferUsage::STORAGE) {
            self.pending.push(buffer);
        } else {
            tracing::trace!(
                "simple cache: destroying non-storage buffer id={} on release",
                buffer.id()
            );
            device.destroy_buffer(buffer);
        }
    }

    pub fn on_refresh(&mut self, _device: &dyn NativeDevice) {
        for buffer in self.pending.drain(..) {
            self.pools.entry(buffer.size()).or_default().push(buffer);
        }
    }

    pub fn clear(&mut self, device: &dyn NativeDevice) {
        for buffer in self.pending.drain(..) {
            device.destroy_buffer(buffer);
        }
        for (_, pool) in self.pools.drain() {
            for buffer in pool {
                device.destroy_buffer(buffer);
            }
        }
    }

    /// Number of idle buffers pooled for an exact size
    #[cfg(test)]
    pub(crate) fn pooled_count(&self, size: usize) -> usize {
        self.pools.get(&size).map_or(0, Vec::len)
    }
}
