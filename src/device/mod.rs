//! Native device collaborator contract
//!
//! The cache subsystem never talks to a GPU driver directly. Everything it
//! needs from the device/command layer is captured by the [`NativeDevice`]
//! trait: buffer allocate/destroy, a copy-command recorder, a write-map
//! primitive, a read-map primitive with asynchronous completion signaling,
//! and a queue flush. The usage-flag query required by the front-end is
//! carried on the handle itself ([`DeviceBuffer::usage`]).
//!
//! [`HostDevice`] is the in-process reference implementation used by the
//! test suite and by engines that want a CPU fallback with identical
//! semantics.

mod host;

pub use host::HostDevice;

use bitflags::bitflags;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{BufferForgeError, BufferResult};

bitflags! {
    /// Legal bind roles for a device buffer, fixed at creation.
    ///
    /// Pooling partitions buffers by this class: a storage buffer and a
    /// uniform buffer are not interchangeable because their bind-group
    /// layouts differ.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Host-readable after an asynchronous map
        const MAP_READ = 1 << 0;
        /// Host-writable through a mapped region
        const MAP_WRITE = 1 << 1;
        /// Legal source of a device-side copy
        const COPY_SRC = 1 << 2;
        /// Legal destination of a device-side copy
        const COPY_DST = 1 << 3;
        /// Bindable as a uniform buffer
        const UNIFORM = 1 << 4;
        /// Bindable as a storage buffer
        const STORAGE = 1 << 5;
    }
}

impl BufferUsage {
    /// Usage of an ordinary operator-output buffer.
    pub fn storage_default() -> Self {
        BufferUsage::STORAGE | BufferUsage::COPY_SRC | BufferUsage::COPY_DST
    }

    /// Usage of a uniform parameter buffer.
    pub fn uniform_default() -> Self {
        BufferUsage::UNIFORM | BufferUsage::COPY_DST
    }
}

/// Opaque handle to device-resident memory.
///
/// `(id, size, usage)` are immutable once created. The handle is
/// deliberately NOT `Clone`: it is exclusively owned by whichever component
/// currently holds it - the caller while acquired, a cache pool while free.
/// Ownership moves back into the subsystem on release and out of it on a
/// cache hit.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DeviceBuffer {
    id: u64,
    size: usize,
    usage: BufferUsage,
}

impl DeviceBuffer {
    /// Construct a handle. Only device implementations should call this;
    /// everyone else receives handles from [`NativeDevice::create_buffer`]
    /// or the buffer front-end.
    pub fn new(id: u64, size: usize, usage: BufferUsage) -> Self {
        DeviceBuffer { id, size, usage }
    }

    /// Device-unique buffer id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Allocated capacity in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Usage flags fixed at creation
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

/// Pending asynchronous read-map.
///
/// The device signals completion by resolving the ticket through its
/// [`ReadMapCompletion`] half; the caller blocks on [`ReadMapTicket::wait`].
/// There is no cancellation: a map either completes or fails for that call.
pub struct ReadMapTicket {
    rx: Receiver<Result<Vec<u8>, String>>,
}

/// Device-side half of a pending read-map.
pub struct ReadMapCompletion {
    tx: Sender<Result<Vec<u8>, String>>,
}

impl ReadMapTicket {
    /// Create a linked completion/ticket pair. Device implementations call
    /// this from `map_read_async` and keep the completion half until the
    /// mapped bytes are ready.
    pub fn pending() -> (ReadMapCompletion, ReadMapTicket) {
        let (tx, rx) = bounded(1);
        (ReadMapCompletion { tx }, ReadMapTicket { rx })
    }

    /// Block until the device queue signals completion.
    ///
    /// This is the one blocking primitive in the subsystem; only
    /// `BufferManager::download` uses it.
    pub fn wait(self) -> BufferResult<Vec<u8>> {
        match self.rx.recv() {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(msg)) => Err(BufferForgeError::MapFailed(msg)),
            Err(_) => Err(BufferForgeError::MapFailed(
                "device dropped the map request without completing it".to_string(),
            )),
        }
    }
}

impl ReadMapCompletion {
    /// Resolve the map with the buffer contents.
    pub fn resolve(self, bytes: Vec<u8>) {
        // A dropped ticket just means the caller gave up waiting.
        let _ = self.tx.send(Ok(bytes));
    }

    /// Resolve the map as failed.
    pub fn fail(self, message: impl Into<String>) {
        let _ = self.tx.send(Err(message.into()));
    }
}

/// Contract required from the native device/command layer.
///
/// One logical device and command queue is owned per execution context.
/// Create/destroy/record are expected to be invoked from a single dispatch
/// thread per context; implementations do not need per-call locking beyond
/// what their own internals require.
pub trait NativeDevice: Send + Sync {
    /// Allocate a device buffer. Failure is fatal for the requesting call;
    /// the cache layer never retries.
    fn create_buffer(&self, size: usize, usage: BufferUsage) -> BufferResult<DeviceBuffer>;

    /// Destroy a device buffer, returning its memory to the native
    /// allocator. Consumes the handle.
    fn destroy_buffer(&self, buffer: DeviceBuffer);

    /// Write host bytes through a mapped region of a `MAP_WRITE` buffer.
    fn write_buffer(&self, buffer: &DeviceBuffer, data: &[u8]) -> BufferResult<()>;

    /// Record a device-side buffer-to-buffer copy of `size` bytes. The copy
    /// executes when the queue is flushed; the recorded command retains
    /// whatever it needs from `src`, so the source may be destroyed before
    /// submission.
    fn record_copy(
        &self,
        src: &DeviceBuffer,
        dst: &DeviceBuffer,
        size: usize,
    ) -> BufferResult<()>;

    /// Flush recorded commands to the device queue.
    fn submit(&self) -> BufferResult<()>;

    /// Begin an asynchronous read-map of a `MAP_READ` buffer. Completion is
    /// signaled through the returned ticket once the queue has drained the
    /// work that produced the buffer contents; callers must flush first.
    fn map_read_async(&self, buffer: &DeviceBuffer) -> BufferResult<ReadMapTicket>;
}
