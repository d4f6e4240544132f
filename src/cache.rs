//! HandleCache: memoizes open handles by configuration.
//!
//! Two structures live behind one mutex:
//! - the index, an [`LruHandleMap`] from configuration to handle, holding
//!   only cacheable handles and bounded by the configured capacity;
//! - the handle table, a `SlotMap` tracking every handle this cache has
//!   opened, cacheable or not. It holds them weakly: a handle stays open
//!   while the index or a caller holds it, and releases its resource when
//!   the last strong reference drops. The table is what `close_all` and
//!   teardown walk.
//!
//! Lookups, opens on a miss, inserts, evictions and removals all run under
//! the mutex, so two callers never both miss on the same configuration and
//! an eviction never interleaves with a touch of the same entry. Lock order
//! is always cache, then handle.

use crate::config::OpenConfiguration;
use crate::config_key::ConfigKey;
use crate::driver::Driver;
use crate::error::Result;
use crate::handle::{HandleId, HandleInner, ResourceHandle};
use crate::lru_handle_map::{InsertError, LruHandleMap};
use crate::settings::CacheSettings;
use crate::store::JsonDriver;
use core::fmt;
use core::num::NonZeroUsize;
use parking_lot::Mutex;
use slotmap::{DefaultKey, SlotMap};
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, error, warn};

struct State {
    index: LruHandleMap<OpenConfiguration, ResourceHandle>,
    table: SlotMap<DefaultKey, Weak<HandleInner>>,
}

impl State {
    // Unlink from the table. Only removes the slot if it still tracks this
    // exact handle.
    fn untrack(&mut self, handle: &ResourceHandle) {
        let HandleId(slot) = handle.id();
        if self.table.get(slot).is_some_and(|w| handle.is_tracked_by(w)) {
            self.table.remove(slot);
        }
    }

    // Forget slots whose handle was dropped without `close`.
    fn prune(&mut self) {
        self.table.retain(|_, w| w.strong_count() > 0);
    }

    fn live(&self) -> Vec<ResourceHandle> {
        self.table.values().filter_map(ResourceHandle::upgrade).collect()
    }

    fn live_count(&self) -> usize {
        self.table.values().filter(|w| w.strong_count() > 0).count()
    }

    // Untrack every handle and hand back the ones still alive.
    fn take_all(&mut self) -> Vec<ResourceHandle> {
        let live = self.live();
        self.table.clear();
        drop(self.index.drain());
        live
    }
}

pub(crate) struct Shared {
    driver: Box<dyn Driver>,
    settings: CacheSettings,
    state: Mutex<State>,
}

impl Shared {
    /// Called by `ResourceHandle::close` before the resource is released.
    pub(crate) fn forget(&self, handle: &ResourceHandle) {
        let mut state = self.state.lock();
        let removed = state.index.remove_where(|_, h| h.ptr_eq(handle));
        state.untrack(handle);
        drop(state);
        drop(removed);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let live = self.state.get_mut().take_all();
        if !live.is_empty() {
            debug!(count = live.len(), "closing handles left open at cache teardown");
        }
        for h in live {
            h.release_quietly();
        }
    }
}

/// A bounded, shareable cache of open resource handles.
///
/// Cloning is cheap and yields the same cache.
#[derive(Clone)]
pub struct HandleCache {
    shared: Arc<Shared>,
}

static GLOBAL: OnceLock<HandleCache> = OnceLock::new();

impl HandleCache {
    pub fn new(driver: impl Driver, settings: CacheSettings) -> Self {
        let index = LruHandleMap::new(settings.capacity);
        Self {
            shared: Arc::new(Shared {
                driver: Box::new(driver),
                settings,
                state: Mutex::new(State {
                    index,
                    table: SlotMap::with_key(),
                }),
            }),
        }
    }

    pub fn with_capacity(driver: impl Driver, capacity: NonZeroUsize) -> Self {
        Self::new(driver, CacheSettings::with_capacity(capacity))
    }

    /// The process-wide cache over [`JsonDriver`], created on first use with
    /// [`CacheSettings::from_env`]. Invalid settings fall back to defaults.
    pub fn global() -> &'static HandleCache {
        GLOBAL.get_or_init(|| {
            let settings = CacheSettings::from_env().unwrap_or_else(|e| {
                warn!(error = %e, "ignoring invalid cache settings");
                CacheSettings::default()
            });
            HandleCache::new(JsonDriver, settings)
        })
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.shared.settings
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.shared.settings.capacity
    }

    /// Number of cached (deduplicated) handles.
    pub fn len(&self) -> usize {
        self.shared.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().index.is_empty()
    }

    /// Number of open handles this cache opened, cached or not. Handles
    /// dropped without `close` no longer count.
    pub fn live_handles(&self) -> usize {
        self.shared.state.lock().live_count()
    }

    /// Whether a handle for `config` is cached. Does not touch recency.
    pub fn contains(&self, config: &OpenConfiguration) -> bool {
        let Ok(key) = ConfigKey::of(config) else {
            return false;
        };
        self.shared
            .state
            .lock()
            .index
            .contains_key(key.as_u64(), config)
    }

    /// Return the cached handle for `config`, or open one.
    ///
    /// With `skip_cache` a new handle is always opened and never enters the
    /// index, so it is never returned to another caller. Otherwise a hit marks
    /// the handle most recently used, and a miss opens, stores and returns a
    /// new handle, closing the least recently used one if the cache is full.
    /// A failed open leaves no trace in the cache.
    ///
    /// Uncached handles are released once the caller drops every clone.
    pub fn get_or_open(&self, config: OpenConfiguration, skip_cache: bool) -> Result<ResourceHandle> {
        let key = ConfigKey::of(&config)?;
        let mut state = self.shared.state.lock();

        if !skip_cache {
            if let Some(found) = state.index.find(key.as_u64(), &config) {
                if let Some(handle) = state.index.touch(found) {
                    debug!(resource = handle.name(), %key, "cache hit");
                    return Ok(handle.clone());
                }
            }
        }

        let raw = self.shared.driver.open(&config)?;
        state.prune();
        let cached_config = (!skip_cache).then(|| config.clone());
        let slot = state.table.insert(Weak::new());
        let handle = ResourceHandle::new(
            HandleId(slot),
            config,
            key,
            skip_cache,
            raw,
            Arc::downgrade(&self.shared),
        );
        state.table[slot] = handle.downgrade();
        debug!(resource = handle.name(), %key, skip_cache, "opened handle");

        if let Some(config) = cached_config {
            match state.index.insert(key.as_u64(), config, handle.clone()) {
                Ok(inserted) => {
                    if let Some((_, victim)) = inserted.evicted {
                        debug!(resource = victim.name(), key = %victim.key(), "evicting handle");
                        state.untrack(&victim);
                        victim.release_quietly();
                    }
                }
                // The miss above was observed under the same lock, so this
                // only happens if the index lost track of an entry. The new
                // handle stays usable, uncached.
                Err(InsertError::DuplicateKey) => {
                    error!(resource = handle.name(), %key, "configuration already indexed; handle left uncached");
                }
            }
        }
        Ok(handle)
    }

    /// Remove every index entry holding `handle`. The handle stays open
    /// until it is closed or its last clone drops. Returns the number of
    /// entries removed.
    pub fn remove(&self, handle: &ResourceHandle) -> usize {
        let removed = self
            .shared
            .state
            .lock()
            .index
            .remove_where(|_, h| h.ptr_eq(handle));
        removed.len()
    }

    /// Close and drop every cached handle. Uncached handles stay open.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        for (_, h) in state.index.drain() {
            state.untrack(&h);
            h.release_quietly();
        }
    }

    /// Close every handle this cache opened, cached or not.
    pub fn close_all(&self) {
        let live = self.shared.state.lock().take_all();
        for h in live {
            h.release_quietly();
        }
    }

    /// Cached configurations, most recently used first.
    pub fn cached_configs(&self) -> Vec<OpenConfiguration> {
        self.shared
            .state
            .lock()
            .index
            .iter()
            .map(|(_, cfg, _)| cfg.clone())
            .collect()
    }
}

impl fmt::Debug for HandleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("HandleCache")
            .field("capacity", &self.shared.settings.capacity)
            .field("cached", &state.index.len())
            .field("live", &state.live_count())
            .finish()
    }
}
