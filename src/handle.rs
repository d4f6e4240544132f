//! ResourceHandle: one opened resource and the configuration that opened it.

use crate::cache::{HandleCache, Shared};
use crate::config::OpenConfiguration;
use crate::config_key::ConfigKey;
use crate::driver::RawResource;
use crate::error::{Error, Result};
use crate::identity;
use crate::node::{Collection, Node};
use crate::path::NodePath;
use core::fmt;
use parking_lot::Mutex;
use serde_json::Value;
use slotmap::DefaultKey;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Slot of a handle in its cache's handle table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct HandleId(pub(crate) DefaultKey);

pub(crate) struct HandleInner {
    id: HandleId,
    config: OpenConfiguration,
    key: ConfigKey,
    skip_cache: bool,
    name: String,
    // `None` once closed.
    raw: Mutex<Option<Box<dyn RawResource>>>,
    cache: Weak<Shared>,
}

impl HandleInner {
    /// Run `f` against the open resource, or fail with `ResourceClosed`.
    pub(crate) fn with_raw<R>(&self, f: impl FnOnce(&mut dyn RawResource) -> Result<R>) -> Result<R> {
        let mut guard = self.raw.lock();
        match guard.as_deref_mut() {
            Some(raw) => f(raw),
            None => Err(Error::ResourceClosed),
        }
    }
}

// The last clone is gone without `close`. Never takes the cache lock: this
// can run while it is held.
impl Drop for HandleInner {
    fn drop(&mut self) {
        if let Some(mut raw) = self.raw.get_mut().take() {
            debug!(resource = %self.name, key = %self.key, "releasing dropped handle");
            if let Err(e) = raw.close() {
                warn!(resource = %self.name, error = %e, "failed to close dropped handle");
            }
        }
    }
}

/// A shared, clonable handle to one opened resource.
///
/// Clones are the same instance: they compare equal and closing one closes
/// them all. Handles are created only through [`ResourceHandle::open`] or
/// [`HandleCache::get_or_open`]. When the last clone drops, including the one
/// a cache keeps for an indexed handle, the resource is released.
#[derive(Clone)]
pub struct ResourceHandle {
    pub(crate) inner: Arc<HandleInner>,
}

impl ResourceHandle {
    pub(crate) fn new(
        id: HandleId,
        config: OpenConfiguration,
        key: ConfigKey,
        skip_cache: bool,
        raw: Box<dyn RawResource>,
        cache: Weak<Shared>,
    ) -> Self {
        let name = raw.name().to_string();
        Self {
            inner: Arc::new(HandleInner {
                id,
                config,
                key,
                skip_cache,
                name,
                raw: Mutex::new(Some(raw)),
                cache,
            }),
        }
    }

    /// Open through the process-wide cache. See [`HandleCache::get_or_open`].
    pub fn open(config: OpenConfiguration, skip_cache: bool) -> Result<Self> {
        HandleCache::global().get_or_open(config, skip_cache)
    }

    pub(crate) fn id(&self) -> HandleId {
        self.inner.id
    }

    pub fn config(&self) -> &OpenConfiguration {
        &self.inner.config
    }

    pub fn key(&self) -> ConfigKey {
        self.inner.key
    }

    pub fn skip_cache(&self) -> bool {
        self.inner.skip_cache
    }

    /// Name the backend reported at open time.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_open(&self) -> bool {
        self.inner.raw.lock().is_some()
    }

    /// Whether the resource accepts writes. Fails with `ResourceClosed`
    /// once the handle is closed.
    pub fn is_writable(&self) -> Result<bool> {
        self.inner.with_raw(|raw| Ok(raw.is_writable()))
    }

    /// True when both are the same handle instance.
    pub fn ptr_eq(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<HandleInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<HandleInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn is_tracked_by(&self, weak: &Weak<HandleInner>) -> bool {
        core::ptr::eq(weak.as_ptr(), Arc::as_ptr(&self.inner))
    }

    /// Resolve `path` from the root of the resource.
    pub fn navigate(&self, path: &str) -> Result<Node> {
        identity::resolve(&self.inner, NodePath::parse(path)?)
    }

    pub fn root(&self) -> Result<Collection> {
        identity::resolve(&self.inner, NodePath::root())?.into_collection()
    }

    pub fn create_collection(&self, path: &str) -> Result<Collection> {
        let path = NodePath::parse(path)?;
        self.inner.with_raw(|raw| raw.create_collection(&path))?;
        identity::resolve(&self.inner, path)?.into_collection()
    }

    /// Create or replace the leaf at `path`.
    pub fn write(&self, path: &str, value: impl Into<Value>) -> Result<Node> {
        let path = NodePath::parse(path)?;
        let value = value.into();
        self.inner.with_raw(|raw| raw.write(&path, value))?;
        identity::resolve(&self.inner, path)
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.with_raw(|raw| raw.flush())
    }

    /// Drop the handle from its cache, then release the resource.
    ///
    /// Closing an already closed handle is a no-op. The cache is updated
    /// before the resource is released, so no concurrent `get_or_open` can
    /// return a handle that is being closed.
    pub fn close(&self) -> Result<()> {
        if let Some(shared) = self.inner.cache.upgrade() {
            shared.forget(self);
        }
        let raw = self.inner.raw.lock().take();
        match raw {
            None => Ok(()),
            Some(mut raw) => {
                debug!(resource = self.name(), key = %self.key(), "closing handle");
                raw.close()
            }
        }
    }

    /// Release without touching the cache; failures are logged and dropped.
    /// Callers hold the cache lock and have already unlinked the handle.
    pub(crate) fn release_quietly(&self) {
        let raw = self.inner.raw.lock().take();
        if let Some(mut raw) = raw {
            if let Err(e) = raw.close() {
                warn!(resource = self.name(), error = %e, "failed to close evicted handle");
            }
        }
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ResourceHandle {}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("name", &self.inner.name)
            .field("key", &self.inner.key)
            .field("skip_cache", &self.inner.skip_cache)
            .field("open", &self.is_open())
            .finish()
    }
}
