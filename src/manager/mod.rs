//! Buffer front-end
//!
//! `BufferManager` is the only surface the rest of the engine calls. It
//! wraps a cache strategy, adds host/device data movement through temporary
//! staging buffers, and forwards the deferred-release bookkeeping.
//!
//! One manager exists per execution context and is driven from that
//! context's single dispatch thread, so its methods take `&mut self` and it
//! carries no internal lock. The surrounding engine must call
//! [`BufferManager::refresh_pending_buffers`] once per execution epoch,
//! after device command submission; nothing here fences released buffers
//! against still-unsubmitted work.

use crate::cache::{align_up, CacheMode, CacheStrategy};
use crate::device::{BufferUsage, DeviceBuffer, NativeDevice};
use crate::error::{BufferForgeError, BufferResult};

/// Front-end over one native device and one cache strategy.
pub struct BufferManager<D: NativeDevice> {
    device: D,
    cache: CacheStrategy,
}

impl<D: NativeDevice> BufferManager<D> {
    /// Build a manager for the given cache mode.
    pub fn new(device: D, mode: CacheMode) -> BufferResult<Self> {
        Ok(BufferManager {
            device,
            cache: CacheStrategy::new(mode)?,
        })
    }

    /// Build a manager around an already-configured strategy (custom
    /// bucket tables).
    pub fn with_strategy(device: D, cache: CacheStrategy) -> Self {
        BufferManager { device, cache }
    }

    /// The underlying native device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Request a buffer of at least `size` bytes with the given usage.
    ///
    /// The strategy normalizes the size first, so the returned handle may
    /// be larger than requested. On a cache miss a fresh native allocation
    /// is made; if the native allocator refuses, that failure is fatal for
    /// this call and surfaces unchanged - no retry at this layer.
    pub fn create(&mut self, size: usize, usage: BufferUsage) -> BufferResult<DeviceBuffer> {
        let buffer_size = self.cache.calculate_buffer_size(size);

        if let Some(buffer) = self.cache.try_acquire(buffer_size, usage) {
            return Ok(buffer);
        }

        let buffer = self.device.create_buffer(buffer_size, usage)?;
        self.cache.register(&buffer, size);
        tracing::trace!(
            "create miss: allocated id={} size={} (requested {})",
            buffer.id(),
            buffer_size,
            size
        );
        Ok(buffer)
    }

    /// Hand a buffer back. It becomes pending and is not reusable until
    /// the next refresh boundary has processed it.
    pub fn release(&mut self, buffer: DeviceBuffer) {
        self.cache.release(&self.device, buffer);
    }

    /// Copy host bytes into a device buffer through a temporary
    /// host-writable staging buffer. The copy is recorded on the queue; it
    /// executes when the engine next submits.
    pub fn upload(&mut self, src: &[u8], dst: &DeviceBuffer) -> BufferResult<()> {
        if src.len() > dst.size() {
            return Err(BufferForgeError::ContractViolation(format!(
                "upload of {} bytes into buffer id={} of capacity {}",
                src.len(),
                dst.id(),
                dst.size()
            )));
        }

        let staging = self.device.create_buffer(
            align_up(src.len()),
            BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC,
        )?;

        let result = self
            .device
            .write_buffer(&staging, src)
            .and_then(|_| self.device.record_copy(&staging, dst, src.len()));

        // Staging buffers never enter the cache; the recorded command
        // retains what it needs.
        self.device.destroy_buffer(staging);
        result
    }

    /// Copy device bytes back to the host. This is the one blocking
    /// operation: it flushes the queue, then waits for the asynchronous
    /// read-map of a temporary staging buffer to complete.
    pub fn download(&mut self, src: &DeviceBuffer, dst: &mut [u8]) -> BufferResult<()> {
        if dst.len() > src.size() {
            return Err(BufferForgeError::ContractViolation(format!(
                "download of {} bytes from buffer id={} of capacity {}",
                dst.len(),
                src.id(),
                src.size()
            )));
        }

        let staging = self.device.create_buffer(
            align_up(dst.len()),
            BufferUsage::MAP_READ | BufferUsage::COPY_DST,
        )?;

        let result = self
            .device
            .record_copy(src, &staging, dst.len())
            .and_then(|_| self.device.submit())
            .and_then(|_| self.device.map_read_async(&staging))
            .and_then(|ticket| ticket.wait())
            .map(|bytes| dst.copy_from_slice(&bytes[..dst.len()]));

        self.device.destroy_buffer(staging);
        result
    }

    /// Record a direct device-side copy of `size` bytes.
    ///
    /// Fails fast with a contract violation if source and destination are
    /// the same handle or either buffer's capacity is smaller than `size`.
    pub fn memcpy(
        &mut self,
        src: &DeviceBuffer,
        dst: &DeviceBuffer,
        size: usize,
    ) -> BufferResult<()> {
        if src.id() == dst.id() {
            return Err(BufferForgeError::ContractViolation(format!(
                "memcpy with src == dst (id={})",
                src.id()
            )));
        }
        if size > src.size() || size > dst.size() {
            return Err(BufferForgeError::ContractViolation(format!(
                "memcpy of {} bytes exceeds capacity (src={}, dst={})",
                size,
                src.size(),
                dst.size()
            )));
        }

        self.device.record_copy(src, dst, size)
    }

    /// Promote pending buffers into the free pools. The engine calls this
    /// once per execution epoch, after submitting device commands - never
    /// while released buffers may still be referenced by unsubmitted work.
    pub fn refresh_pending_buffers(&mut self) {
        self.cache.on_refresh(&self.device);
    }
}

impl<D: NativeDevice> Drop for BufferManager<D> {
    fn drop(&mut self) {
        self.cache.clear(&self.device);
    }
}
