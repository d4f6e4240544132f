//! The narrow interface to the resource library.
//!
//! A [`Driver`] turns an [`OpenConfiguration`] into a [`RawResource`]; the
//! cache owns the raw resource from then on and is the only caller of its
//! methods. Drivers report failures with the crate's [`Error`] kinds:
//! `ResourceOpen` and `Configuration` from `open`, `Lookup` from
//! navigation, `ReadOnly` and `Store` from writes.
//!
//! [`Error`]: crate::Error

use crate::config::OpenConfiguration;
use crate::error::Result;
use crate::path::NodePath;
use serde_json::Value;

/// Kind of a node as reported by the backend.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeKind {
    /// Has named children.
    Collection,
    /// Holds data; cannot be navigated further.
    Leaf,
}

pub trait Driver: Send + Sync + 'static {
    fn open(&self, config: &OpenConfiguration) -> Result<Box<dyn RawResource>>;
}

impl<F> Driver for F
where
    F: Fn(&OpenConfiguration) -> Result<Box<dyn RawResource>> + Send + Sync + 'static,
{
    fn open(&self, config: &OpenConfiguration) -> Result<Box<dyn RawResource>> {
        self(config)
    }
}

pub trait RawResource: Send {
    /// Name of the underlying resource, typically its file path.
    fn name(&self) -> &str;

    /// Kind of the node at `path`; `Error::Lookup` when it does not exist.
    fn kind(&self, path: &NodePath) -> Result<NodeKind>;

    /// Child names of the collection at `path`, sorted.
    fn children(&self, path: &NodePath) -> Result<Vec<String>>;

    fn read(&self, path: &NodePath) -> Result<Value>;

    fn is_writable(&self) -> bool;

    /// Create an empty collection at `path`. The parent must exist.
    fn create_collection(&mut self, path: &NodePath) -> Result<()>;

    /// Create or replace the leaf at `path`. The parent must exist.
    fn write(&mut self, path: &NodePath, value: Value) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Release the resource. Called at most once.
    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}
