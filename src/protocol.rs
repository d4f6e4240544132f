//! Capture and reconstruct hooks: serialization by reference.
//!
//! A handle is captured as the arguments it was opened with, so rebuilding
//! it goes through the same cache lookup as any fresh open: within one
//! process a cached handle round-trips to the very same instance. A node is
//! captured as its path plus its owning handle's configuration; rebuilding
//! reopens the handle (a cache hit when possible) and navigates once.
//!
//! The records are plain serde types and say nothing about byte encoding.
//! `Serialize` on handles and nodes writes their records. `Deserialize`
//! rebuilds through [`HandleCache::global`]; use [`HandleSeed`] and
//! [`NodeSeed`] to rebuild through a specific cache. Reconstruction errors
//! surface as the format's custom error carrying the [`Error`] message.
//!
//! [`Error`]: crate::Error

use crate::cache::HandleCache;
use crate::config::{ConfigValue, OpenConfiguration, SKIP_CACHE};
use crate::error::Result;
use crate::handle::ResourceHandle;
use crate::node::{Collection, Leaf, Node, NodeRef};
use crate::path::NodePath;
use serde::de::{DeserializeSeed, Deserializer};
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Portable record of a handle: its open arguments, with `skip_cache` among
/// the named ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleRecord {
    pub args: Vec<ConfigValue>,
    pub kwargs: BTreeMap<String, ConfigValue>,
}

impl HandleRecord {
    /// Split back into a configuration and the skip flag.
    pub fn into_parts(self) -> Result<(OpenConfiguration, bool)> {
        OpenConfiguration::from_parts(self.args, self.kwargs)
    }

    /// Reopen through `cache`, exactly as `get_or_open` would.
    ///
    /// A record captured from a skip-cache handle always opens a new
    /// resource, which fails with `ResourceOpen` when the captured handle holds it
    /// exclusively.
    pub fn reconstruct(self, cache: &HandleCache) -> Result<ResourceHandle> {
        let (config, skip_cache) = self.into_parts()?;
        cache.get_or_open(config, skip_cache)
    }
}

/// Portable record of a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub path: NodePath,
    pub config: OpenConfiguration,
    pub skip_cache: bool,
}

impl NodeRecord {
    /// Reopen the owner through `cache` and navigate to the path.
    ///
    /// A node rebuilt from a skip-cache record holds its private handle, so
    /// it stays usable until the node and everything reached from it drop.
    pub fn reconstruct(&self, cache: &HandleCache) -> Result<Node> {
        let (handle, node) = self.reconstruct_with_handle(cache)?;
        Ok(if handle.skip_cache() { node.hold() } else { node })
    }

    /// Like [`reconstruct`](Self::reconstruct), but hands the owning handle
    /// to the caller instead of tying it to the node.
    pub fn reconstruct_with_handle(&self, cache: &HandleCache) -> Result<(ResourceHandle, Node)> {
        let handle = cache.get_or_open(self.config.clone(), self.skip_cache)?;
        let node = handle.navigate(self.path.as_str())?;
        Ok((handle, node))
    }
}

impl ResourceHandle {
    /// Capture the open arguments. Works on closed handles too; the record
    /// only describes how to open.
    pub fn capture(&self) -> HandleRecord {
        let config = self.config();
        let mut kwargs = config.kwargs().clone();
        kwargs.insert(SKIP_CACHE.to_string(), ConfigValue::Bool(self.skip_cache()));
        HandleRecord {
            args: config.args().to_vec(),
            kwargs,
        }
    }
}

impl NodeRef {
    /// Capture path and owner configuration. The owner must be open.
    pub fn capture(&self) -> Result<NodeRecord> {
        let handle = self.handle()?;
        Ok(NodeRecord {
            path: self.path().clone(),
            config: handle.config().clone(),
            skip_cache: handle.skip_cache(),
        })
    }
}

impl Serialize for ResourceHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.capture().serialize(serializer)
    }
}

impl Serialize for NodeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.capture()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.node_ref().serialize(serializer)
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (**self).serialize(serializer)
    }
}

impl Serialize for Leaf {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (**self).serialize(serializer)
    }
}

/// Rebuilds a [`ResourceHandle`] through a specific cache.
#[derive(Clone, Copy, Debug)]
pub struct HandleSeed<'c>(pub &'c HandleCache);

impl<'de> DeserializeSeed<'de> for HandleSeed<'_> {
    type Value = ResourceHandle;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        let record = HandleRecord::deserialize(deserializer)?;
        record
            .reconstruct(self.0)
            .map_err(serde::de::Error::custom)
    }
}

/// Rebuilds a [`Node`] through a specific cache.
#[derive(Clone, Copy, Debug)]
pub struct NodeSeed<'c>(pub &'c HandleCache);

impl<'de> DeserializeSeed<'de> for NodeSeed<'_> {
    type Value = Node;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        let record = NodeRecord::deserialize(deserializer)?;
        record
            .reconstruct(self.0)
            .map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for ResourceHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        HandleSeed(HandleCache::global()).deserialize(deserializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        NodeSeed(HandleCache::global()).deserialize(deserializer)
    }
}
