//! BufferForge - device buffer cache for tensor workloads
//!
//! A buffer cache/allocator that sits in front of a native GPU buffer API
//! and reuses short-lived device memory across thousands of per-step
//! allocations. Allocating and freeing a native buffer per operator output
//! is prohibitively slow; this crate amortizes that cost with pluggable
//! caching strategies, deferred recycling, and usage-aware pooling.
//!
//! The crate covers only the cache and its thin front-end. Kernel
//! compilation and dispatch, device initialization, and graph orchestration
//! live in the surrounding engine, which talks to the device through the
//! [`device::NativeDevice`] contract.

#![allow(clippy::collapsible_if)] // Sometimes clearer for control flow
#![allow(clippy::clone_on_copy)] // Sometimes needed for API clarity

pub mod cache;
pub mod device;
pub mod error;
pub mod logging;
pub mod manager;
pub mod registry;

pub use cache::{CacheMode, CacheStrategy, MIN_ALIGNMENT};
pub use device::{BufferUsage, DeviceBuffer, HostDevice, NativeDevice};
pub use error::{BufferForgeError, BufferResult, ErrorCategory};
pub use manager::BufferManager;
pub use registry::ContextRegistry;
