//! The one place nodes are made.
//!
//! Every navigation, whether from a handle, from a collection, from a walk
//! over children or from reconstructing a captured record, ends in
//! [`resolve`]. It asks the backend what kind of node lives at the path and
//! builds the matching typed variant with a back-reference to the owning
//! handle, so no node can exist without knowing which resource it belongs
//! to.

use crate::driver::NodeKind;
use crate::error::Result;
use crate::handle::HandleInner;
use crate::node::{Collection, Leaf, Node, NodeRef};
use crate::path::NodePath;
use std::sync::Arc;
use tracing::trace;

pub(crate) fn resolve(owner: &Arc<HandleInner>, path: NodePath) -> Result<Node> {
    let kind = owner.with_raw(|raw| raw.kind(&path))?;
    Ok(build(NodeRef::new(owner, path), kind))
}

/// Resolve the absolute `path`, inheriting the owner of `from`.
pub(crate) fn resolve_at(from: &NodeRef, path: NodePath) -> Result<Node> {
    let kind = from.owner()?.with_raw(|raw| raw.kind(&path))?;
    Ok(build(from.at(path), kind))
}

/// Resolve `rel` against `from`, inheriting its owner.
pub(crate) fn resolve_from(from: &NodeRef, rel: &str) -> Result<Node> {
    let path = from.path().join(rel)?;
    resolve_at(from, path)
}

fn build(node: NodeRef, kind: NodeKind) -> Node {
    trace!(path = %node.path(), ?kind, "resolved node");
    match kind {
        NodeKind::Collection => Node::Collection(Collection::new(node)),
        NodeKind::Leaf => Node::Leaf(Leaf::new(node)),
    }
}
