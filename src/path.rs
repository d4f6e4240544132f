//! Slash-delimited node paths inside a resource.

use crate::error::{Error, Result};
use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Normalized absolute path of a node: `/` for the root, otherwise
/// `/seg/seg` with no empty, `.` or `..` segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(String);

impl NodePath {
    pub fn root() -> Self {
        NodePath("/".to_string())
    }

    /// Parse a path relative to the root. Leading, trailing and repeated
    /// slashes are ignored, as are `.` segments.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::root().join(raw)
    }

    /// Resolve `rel` against this path. An absolute `rel` starts over at the
    /// root.
    pub fn join(&self, rel: &str) -> Result<Self> {
        let mut out = if rel.starts_with('/') {
            String::from("/")
        } else {
            self.0.clone()
        };
        for seg in rel.split('/') {
            match seg {
                "" | "." => {}
                ".." => return Err(Error::lookup(rel, "parent segments are not supported")),
                seg => {
                    if !out.ends_with('/') {
                        out.push('/');
                    }
                    out.push_str(seg);
                }
            }
        }
        Ok(NodePath(out))
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment, or `/` for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "/";
        }
        self.0.rsplit('/').next().unwrap_or_default()
    }

    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(i) => Some(NodePath(self.0[..i].to_string())),
        }
    }

    /// Segments below the root, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NodePath::parse(&raw).map_err(serde::de::Error::custom)
    }
}
