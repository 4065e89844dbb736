//! Disabled cache: exact allocate, immediate destroy

use crate::cache::align_up;
use crate::device::{BufferUsage, DeviceBuffer, NativeDevice};

/// No caching at all. Every acquire misses and every release destroys the
/// native buffer immediately. This is the correctness baseline: no pooling
/// means no possibility of handing out a buffer that in-flight commands
/// still reference.
#[derive(Debug, Default)]
pub struct DisabledCache;

impl DisabledCache {
    pub fn calculate_buffer_size(&self, requested: usize) -> usize {
        align_up(requested)
    }

    pub fn try_acquire(&mut self, _size: usize, _usage: BufferUsage) -> Option<DeviceBuffer> {
        None
    }

    pub fn release(&mut self, device: &dyn NativeDevice, buffer: DeviceBuffer) {
        tracing::trace!("disabled cache: destroying id={} on release", buffer.id());
        device.destroy_buffer(buffer);
    }

    pub fn on_refresh(&mut self, _device: &dyn NativeDevice) {}
}
