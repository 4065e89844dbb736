//! Context registry
//!
//! Hands out one buffer manager per logical execution context, keyed by an
//! integer context id. The registry is an explicitly owned instance passed
//! by reference to call sites - there is no hidden process-wide global.
//!
//! The map itself is mutex-guarded so independent contexts may be created
//! and looked up concurrently from different threads; each context's
//! manager is wrapped in its own `Mutex`, which its single dispatch thread
//! locks for the duration of a call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::device::NativeDevice;
use crate::error::BufferResult;
use crate::manager::BufferManager;

/// Shared handle to one context's buffer manager.
pub type SharedManager<D> = Arc<Mutex<BufferManager<D>>>;

/// Id-keyed table of per-context buffer managers.
#[derive(Default)]
pub struct ContextRegistry<D: NativeDevice> {
    contexts: Mutex<HashMap<u64, SharedManager<D>>>,
}

impl<D: NativeDevice> ContextRegistry<D> {
    pub fn new() -> Self {
        ContextRegistry {
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the manager for `context_id`, constructing it with `init`
    /// on first use. Construction happens under the registry lock, so two
    /// racing callers observe exactly one manager per id.
    pub fn get_or_create<F>(&self, context_id: u64, init: F) -> BufferResult<SharedManager<D>>
    where
        F: FnOnce() -> BufferResult<BufferManager<D>>,
    {
        let mut contexts = self.contexts.lock()?;

        if let Some(manager) = contexts.get(&context_id) {
            return Ok(Arc::clone(manager));
        }

        tracing::debug!("registry: creating buffer manager for context {}", context_id);
        let manager = Arc::new(Mutex::new(init()?));
        contexts.insert(context_id, Arc::clone(&manager));
        Ok(manager)
    }

    /// Look up an existing context without constructing one.
    pub fn get(&self, context_id: u64) -> BufferResult<Option<SharedManager<D>>> {
        Ok(self.contexts.lock()?.get(&context_id).map(Arc::clone))
    }

    /// Drop a context's manager from the registry. Its pooled buffers are
    /// destroyed once the last outstanding handle to it goes away.
    pub fn remove(&self, context_id: u64) -> BufferResult<Option<SharedManager<D>>> {
        Ok(self.contexts.lock()?.remove(&context_id))
    }

    /// Number of registered contexts
    pub fn len(&self) -> usize {
        self.contexts.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
