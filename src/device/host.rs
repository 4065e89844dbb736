//! In-process reference implementation of the device contract
//!
//! `HostDevice` backs every buffer with host memory and models the command
//! queue explicitly: recorded copies capture their source bytes when
//! recorded (the way a real queue retains resources until completion) and
//! execute at `submit`. Read-maps complete through the same channel-based
//! signaling a GPU implementation would use.
//!
//! The test suite runs entirely against this device; the allocation and
//! destruction counters make reuse-versus-reallocate behavior observable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::device::{BufferUsage, DeviceBuffer, NativeDevice, ReadMapTicket};
use crate::error::{BufferForgeError, BufferResult};

/// Host-memory device with an explicit command queue.
///
/// Cheap to clone; clones share the same device state, the way one native
/// backend is shared per execution context.
#[derive(Clone, Default)]
pub struct HostDevice {
    inner: Arc<Mutex<HostState>>,
}

#[derive(Default)]
struct HostState {
    buffers: HashMap<u64, Vec<u8>>,
    recorded: Vec<RecordedCopy>,
    next_id: u64,
    created: u64,
    destroyed: u64,
    fail_next_allocation: bool,
}

/// A copy command sitting in the queue. Source bytes are captured at record
/// time so the source handle may be destroyed before submission.
struct RecordedCopy {
    data: Vec<u8>,
    dst: u64,
}

impl HostDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers allocated so far
    pub fn created_count(&self) -> u64 {
        self.inner.lock().expect("host device lock poisoned").created
    }

    /// Number of buffers destroyed so far
    pub fn destroyed_count(&self) -> u64 {
        self.inner.lock().expect("host device lock poisoned").destroyed
    }

    /// Number of currently live buffers
    pub fn live_count(&self) -> usize {
        self.inner.lock().expect("host device lock poisoned").buffers.len()
    }

    /// Number of recorded, not yet submitted copy commands
    pub fn pending_command_count(&self) -> usize {
        self.inner.lock().expect("host device lock poisoned").recorded.len()
    }

    /// Make the next `create_buffer` call fail, for exercising the
    /// allocation-failure path without exhausting real memory.
    pub fn fail_next_allocation(&self) {
        self.inner
            .lock()
            .expect("host device lock poisoned")
            .fail_next_allocation = true;
    }

    /// Snapshot the contents of a live buffer (test observation hook).
    pub fn contents(&self, buffer: &DeviceBuffer) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .expect("host device lock poisoned")
            .buffers
            .get(&buffer.id())
            .cloned()
    }
}

impl NativeDevice for HostDevice {
    fn create_buffer(&self, size: usize, usage: BufferUsage) -> BufferResult<DeviceBuffer> {
        let mut state = self.inner.lock()?;

        if state.fail_next_allocation {
            state.fail_next_allocation = false;
            return Err(BufferForgeError::AllocationFailed(format!(
                "host allocation refused (injected): size={}, usage={:?}",
                size, usage
            )));
        }

        if size == 0 {
            tracing::warn!("HostDevice: zero-size allocation requested");
        }

        let id = state.next_id;
        state.next_id += 1;
        state.buffers.insert(id, vec![0u8; size]);
        state.created += 1;

        tracing::trace!("HostDevice: allocated buffer id={} size={} usage={:?}", id, size, usage);
        Ok(DeviceBuffer::new(id, size, usage))
    }

    fn destroy_buffer(&self, buffer: DeviceBuffer) {
        let mut state = match self.inner.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        if state.buffers.remove(&buffer.id()).is_none() {
            tracing::warn!("HostDevice: destroy of unknown buffer id={}", buffer.id());
            return;
        }
        state.destroyed += 1;
        tracing::trace!("HostDevice: destroyed buffer id={} size={}", buffer.id(), buffer.size());
    }

    fn write_buffer(&self, buffer: &DeviceBuffer, data: &[u8]) -> BufferResult<()> {
        if !buffer.usage().contains(BufferUsage::MAP_WRITE) {
            return Err(BufferForgeError::Device(format!(
                "buffer id={} is not MAP_WRITE",
                buffer.id()
            )));
        }
        if data.len() > buffer.size() {
            return Err(BufferForgeError::Device(format!(
                "write of {} bytes exceeds buffer capacity {}",
                data.len(),
                buffer.size()
            )));
        }

        let mut state = self.inner.lock()?;
        let storage = state.buffers.get_mut(&buffer.id()).ok_or_else(|| {
            BufferForgeError::Device(format!("write to unknown buffer id={}", buffer.id()))
        })?;
        storage[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn record_copy(
        &self,
        src: &DeviceBuffer,
        dst: &DeviceBuffer,
        size: usize,
    ) -> BufferResult<()> {
        if !src.usage().contains(BufferUsage::COPY_SRC) {
            return Err(BufferForgeError::Device(format!(
                "source buffer id={} is not COPY_SRC",
                src.id()
            )));
        }
        if !dst.usage().contains(BufferUsage::COPY_DST) {
            return Err(BufferForgeError::Device(format!(
                "destination buffer id={} is not COPY_DST",
                dst.id()
            )));
        }
        if size > src.size() || size > dst.size() {
            return Err(BufferForgeError::Device(format!(
                "copy of {} bytes exceeds capacity (src={}, dst={})",
                size,
                src.size(),
                dst.size()
            )));
        }

        let mut state = self.inner.lock()?;
        let data = state
            .buffers
            .get(&src.id())
            .map(|bytes| bytes[..size].to_vec())
            .ok_or_else(|| {
                BufferForgeError::Device(format!("copy from unknown buffer id={}", src.id()))
            })?;
        state.recorded.push(RecordedCopy { data, dst: dst.id() });

        tracing::trace!(
            "HostDevice: recorded copy id={} -> id={} ({} bytes)",
            src.id(),
            dst.id(),
            size
        );
        Ok(())
    }

    fn submit(&self) -> BufferResult<()> {
        let mut state = self.inner.lock()?;
        let commands = std::mem::take(&mut state.recorded);
        let count = commands.len();

        for command in commands {
            match state.buffers.get_mut(&command.dst) {
                Some(storage) => storage[..command.data.len()].copy_from_slice(&command.data),
                // The destination was destroyed between record and submit.
                // The caller broke the submission-before-release ordering.
                None => tracing::warn!(
                    "HostDevice: dropping copy into destroyed buffer id={}",
                    command.dst
                ),
            }
        }

        tracing::trace!("HostDevice: submitted {} commands", count);
        Ok(())
    }

    fn map_read_async(&self, buffer: &DeviceBuffer) -> BufferResult<ReadMapTicket> {
        if !buffer.usage().contains(BufferUsage::MAP_READ) {
            return Err(BufferForgeError::Device(format!(
                "buffer id={} is not MAP_READ",
                buffer.id()
            )));
        }

        let state = self.inner.lock()?;
        let (completion, ticket) = ReadMapTicket::pending();

        // The queue is already drained at this point (callers flush before
        // mapping), so completion is signaled immediately.
        match state.buffers.get(&buffer.id()) {
            Some(bytes) => completion.resolve(bytes.clone()),
            None => completion.fail(format!("map of unknown buffer id={}", buffer.id())),
        }

        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging_write_usage() -> BufferUsage {
        BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC
    }

    fn staging_read_usage() -> BufferUsage {
        BufferUsage::MAP_READ | BufferUsage::COPY_DST
    }

    #[test]
    fn test_allocation_counters() {
        let device = HostDevice::new();
        let a = device.create_buffer(64, BufferUsage::storage_default()).unwrap();
        let b = device.create_buffer(128, BufferUsage::storage_default()).unwrap();
        assert_eq!(device.created_count(), 2);
        assert_eq!(device.live_count(), 2);

        device.destroy_buffer(a);
        assert_eq!(device.destroyed_count(), 1);
        assert_eq!(device.live_count(), 1);
        device.destroy_buffer(b);
        assert_eq!(device.live_count(), 0);
    }

    #[test]
    fn test_write_copy_submit_map_roundtrip() {
        let device = HostDevice::new();
        let staging = device.create_buffer(16, staging_write_usage()).unwrap();
        let target = device
            .create_buffer(16, BufferUsage::storage_default() | BufferUsage::MAP_READ)
            .unwrap();

        device.write_buffer(&staging, &[7u8; 16]).unwrap();
        device.record_copy(&staging, &target, 16).unwrap();
        assert_eq!(device.pending_command_count(), 1);

        device.submit().unwrap();
        assert_eq!(device.pending_command_count(), 0);

        let bytes = device.map_read_async(&target).unwrap().wait().unwrap();
        assert_eq!(bytes, vec![7u8; 16]);
    }

    #[test]
    fn test_copy_source_may_be_destroyed_before_submit() {
        // Recorded commands capture their source, mirroring a queue that
        // retains resources until completion.
        let device = HostDevice::new();
        let staging = device.create_buffer(8, staging_write_usage()).unwrap();
        let target = device.create_buffer(8, staging_read_usage()).unwrap();

        device.write_buffer(&staging, &[3u8; 8]).unwrap();
        device.record_copy(&staging, &target, 8).unwrap();
        device.destroy_buffer(staging);

        device.submit().unwrap();
        let bytes = device.map_read_async(&target).unwrap().wait().unwrap();
        assert_eq!(bytes, vec![3u8; 8]);
    }

    #[test]
    fn test_injected_allocation_failure() {
        let device = HostDevice::new();
        device.fail_next_allocation();

        let err = device
            .create_buffer(64, BufferUsage::storage_default())
            .unwrap_err();
        assert!(matches!(err, BufferForgeError::AllocationFailed(_)));

        // Only the next allocation fails.
        assert!(device.create_buffer(64, BufferUsage::storage_default()).is_ok());
    }

    #[test]
    fn test_write_requires_map_write_usage() {
        let device = HostDevice::new();
        let buffer = device.create_buffer(16, BufferUsage::storage_default()).unwrap();
        let err = device.write_buffer(&buffer, &[0u8; 4]).unwrap_err();
        assert!(matches!(err, BufferForgeError::Device(_)));
        device.destroy_buffer(buffer);
    }

    #[test]
    fn test_oversized_copy_is_rejected() {
        let device = HostDevice::new();
        let small = device.create_buffer(8, BufferUsage::storage_default()).unwrap();
        let large = device.create_buffer(64, BufferUsage::storage_default()).unwrap();

        let err = device.record_copy(&small, &large, 64).unwrap_err();
        assert!(matches!(err, BufferForgeError::Device(_)));

        device.destroy_buffer(small);
        device.destroy_buffer(large);
    }

    #[test]
    fn test_copy_into_destroyed_destination_is_dropped() {
        let device = HostDevice::new();
        let src = device.create_buffer(8, staging_write_usage()).unwrap();
        let dst = device.create_buffer(8, staging_read_usage()).unwrap();

        device.write_buffer(&src, &[9u8; 8]).unwrap();
        device.record_copy(&src, &dst, 8).unwrap();
        device.destroy_buffer(dst);

        // Submission must not panic; the command is dropped with a warning.
        device.submit().unwrap();
        device.destroy_buffer(src);
    }
}
