//! reopen-cache: a bounded cache of open resource handles, with nodes that
//! can be captured and rebuilt by reference.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: opening the same resource twice with the same arguments yields
//!   the same handle, and a node captured anywhere can be rebuilt from its
//!   path plus the arguments that opened its resource.
//! - Layers:
//!   - LruHandleMap<K, V>: structural map from a caller-supplied hash and
//!     key to a value, with stable handles and an intrusive recency list;
//!     includes a debug-only reentrancy guard.
//!   - HandleCache: a mutex around the LruHandleMap index plus a handle
//!     table that tracks every handle it opened. Opens on a miss and closes
//!     the least recently used handle when full.
//!   - ResourceHandle / Node: the public surface. Nodes are typed
//!     (`Collection` or `Leaf`) and always built by one resolver that
//!     attaches a non-owning back-reference to the owning handle.
//!   - protocol: serde records and seeds that capture and reconstruct
//!     handles and nodes through a cache.
//!
//! Constraints
//! - Thread-safe: the cache is `Send + Sync`; every lookup, open on a
//!   miss, insert, eviction and removal runs under one mutex.
//! - Bounded: the index never holds more than `capacity` handles.
//! - Keys are computed once per open with a deterministic hasher; lookups
//!   confirm hits with a full configuration equality check.
//! - Lock order: cache, then handle. Handle-level operations never take the
//!   cache lock while holding their own.
//!
//! Lifetime
//! - A handle stays open until it is closed explicitly, evicted, its cache
//!   is dropped, or its last clone drops. The index holds one clone of
//!   every cached handle; the handle table holds none.
//! - Nodes hold their handle weakly and never delay any of those, except
//!   nodes rebuilt from a skip-cache record, which keep their private
//!   handle alive.
//! - `skip_cache` handles never enter the index, so no other caller can
//!   receive them, and they are released when the caller drops them.
//!
//! Backends
//! - A backend is a [`Driver`] that opens [`RawResource`]s. The bundled
//!   [`store::JsonDriver`] stores a tree of JSON objects in a file and takes
//!   OS file locks according to its open mode, which is what makes a second
//!   exclusive open of the same file fail.
//!
//! Notes and non-goals
//! - No disk persistence of the cache itself, and no cross-process
//!   identity: reconstruction in another process reopens by arguments.
//! - No async API.

pub mod cache;
pub mod config;
pub mod config_key;
pub mod driver;
pub mod error;
pub mod handle;
mod identity;
#[cfg(feature = "bench_internal")]
pub mod lru_handle_map;
#[cfg(not(feature = "bench_internal"))]
mod lru_handle_map;
mod lru_handle_map_proptest;
pub mod node;
pub mod path;
pub mod protocol;
mod reentrancy;
pub mod settings;
pub mod store;

// Public surface
pub use cache::HandleCache;
pub use config::{ConfigValue, OpenConfiguration, SKIP_CACHE};
pub use config_key::ConfigKey;
pub use driver::{Driver, NodeKind, RawResource};
pub use error::{Error, Result};
pub use handle::ResourceHandle;
pub use node::{Collection, Leaf, Node, NodeRef};
pub use path::NodePath;
pub use protocol::{HandleRecord, HandleSeed, NodeRecord, NodeSeed};
pub use settings::CacheSettings;
pub use store::{JsonDriver, JsonStore, Mode};
