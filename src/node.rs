//! Typed references to nodes inside an open resource.

use crate::error::{Error, Result};
use crate::handle::{HandleInner, ResourceHandle};
use crate::identity;
use crate::path::NodePath;
use core::fmt;
use core::ops::Deref;
use serde_json::Value;
use std::sync::{Arc, Weak};

/// Path plus a back-reference to the owning handle.
///
/// The back-reference is non-owning: a `NodeRef` never delays eviction or
/// close, and once the handle is gone every operation fails with
/// [`Error::ResourceClosed`]. The one exception is a node rebuilt from a
/// skip-cache record, whose private handle has no other owner; such a node
/// and the nodes reached from it keep the handle alive until they drop.
#[derive(Clone)]
pub struct NodeRef {
    path: NodePath,
    owner: Weak<HandleInner>,
    held: Option<Arc<HandleInner>>,
}

impl NodeRef {
    pub(crate) fn new(owner: &Arc<HandleInner>, path: NodePath) -> Self {
        Self {
            path,
            owner: Arc::downgrade(owner),
            held: None,
        }
    }

    /// Same owner, and the same hold on it, at another path.
    pub(crate) fn at(&self, path: NodePath) -> Self {
        Self {
            path,
            owner: self.owner.clone(),
            held: self.held.clone(),
        }
    }

    pub(crate) fn hold(mut self) -> Self {
        self.held = self.owner.upgrade();
        self
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub(crate) fn owner(&self) -> Result<Arc<HandleInner>> {
        self.owner.upgrade().ok_or(Error::ResourceClosed)
    }

    /// The owning handle, if it is still open.
    pub fn handle(&self) -> Result<ResourceHandle> {
        let handle = ResourceHandle { inner: self.owner()? };
        if handle.is_open() {
            Ok(handle)
        } else {
            Err(Error::ResourceClosed)
        }
    }

    /// Whether the owning handle is still open.
    pub fn is_valid(&self) -> bool {
        self.handle().is_ok()
    }

    fn with_raw<R>(
        &self,
        f: impl FnOnce(&mut dyn crate::driver::RawResource) -> Result<R>,
    ) -> Result<R> {
        self.owner()?.with_raw(f)
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && Weak::ptr_eq(&self.owner, &other.owner)
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("path", &self.path)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// A node with named children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collection(NodeRef);

/// A node holding data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf(NodeRef);

/// A node of either kind, as returned by navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Collection(Collection),
    Leaf(Leaf),
}

impl Deref for Collection {
    type Target = NodeRef;
    fn deref(&self) -> &NodeRef {
        &self.0
    }
}

impl Deref for Leaf {
    type Target = NodeRef;
    fn deref(&self) -> &NodeRef {
        &self.0
    }
}

impl Collection {
    pub(crate) fn new(node: NodeRef) -> Self {
        Collection(node)
    }

    /// Navigate to `rel`: relative to this collection, or from the root when
    /// it starts with `/`.
    pub fn get(&self, rel: &str) -> Result<Node> {
        identity::resolve_from(&self.0, rel)
    }

    /// Child names, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        self.with_raw(|raw| raw.children(self.path()))
    }

    /// Whether `name` resolves. A closed handle is an error, not `false`.
    pub fn contains(&self, name: &str) -> Result<bool> {
        match self.get(name) {
            Ok(_) => Ok(true),
            Err(Error::Lookup { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn children(&self) -> Result<Vec<Node>> {
        self.names()?.iter().map(|n| self.get(n)).collect()
    }

    /// Every descendant, depth first, children in name order.
    pub fn walk(&self) -> Result<Vec<Node>> {
        let mut out = Vec::new();
        let mut stack: Vec<Node> = self.children()?.into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if let Node::Collection(c) = &node {
                stack.extend(c.children()?.into_iter().rev());
            }
            out.push(node);
        }
        Ok(out)
    }

    pub fn create_collection(&self, rel: &str) -> Result<Collection> {
        let path = self.path().join(rel)?;
        self.with_raw(|raw| raw.create_collection(&path))?;
        identity::resolve_at(self, path)?.into_collection()
    }

    /// Create or replace the leaf at `rel`.
    pub fn write(&self, rel: &str, value: impl Into<Value>) -> Result<Leaf> {
        let path = self.path().join(rel)?;
        let value = value.into();
        self.with_raw(|raw| raw.write(&path, value))?;
        identity::resolve_at(self, path)?.into_leaf()
    }
}

impl Leaf {
    pub(crate) fn new(node: NodeRef) -> Self {
        Leaf(node)
    }

    pub fn read(&self) -> Result<Value> {
        self.with_raw(|raw| raw.read(self.path()))
    }

    pub fn write(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.with_raw(|raw| raw.write(self.path(), value))
    }
}

impl Node {
    pub fn node_ref(&self) -> &NodeRef {
        match self {
            Node::Collection(c) => &c.0,
            Node::Leaf(l) => &l.0,
        }
    }

    pub fn path(&self) -> &NodePath {
        self.node_ref().path()
    }

    pub(crate) fn hold(self) -> Self {
        match self {
            Node::Collection(c) => Node::Collection(Collection(c.0.hold())),
            Node::Leaf(l) => Node::Leaf(Leaf(l.0.hold())),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Node::Collection(_))
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Node::Collection(c) => Some(c),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Node::Leaf(l) => Some(l),
            Node::Collection(_) => None,
        }
    }

    pub fn into_collection(self) -> Result<Collection> {
        match self {
            Node::Collection(c) => Ok(c),
            Node::Leaf(l) => Err(Error::lookup(l.path().as_str(), "not a collection")),
        }
    }

    pub fn into_leaf(self) -> Result<Leaf> {
        match self {
            Node::Leaf(l) => Ok(l),
            Node::Collection(c) => Err(Error::lookup(c.path().as_str(), "not a leaf")),
        }
    }

    /// Read a leaf's value; collections fail with `Error::Lookup`.
    pub fn read(&self) -> Result<Value> {
        match self {
            Node::Leaf(l) => l.read(),
            Node::Collection(c) => Err(Error::lookup(c.path().as_str(), "a collection holds no value")),
        }
    }
}

impl Deref for Node {
    type Target = NodeRef;
    fn deref(&self) -> &NodeRef {
        self.node_ref()
    }
}
