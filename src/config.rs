//! Open configurations: the arguments a handle was opened with.
//!
//! A configuration is an ordered list of positional arguments plus a map of
//! named arguments. Named arguments are kept in a `BTreeMap`, so they are
//! always sorted by name and two configurations built in a different order
//! compare equal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the flag that travels beside a configuration but is never part of
/// its identity.
pub const SKIP_CACHE: &str = "skip_cache";

/// A single open argument.
///
/// `Float` compares and hashes by bit pattern, so a NaN equals itself and
/// `0.0` differs from `-0.0`. `Map` values can be stored but cannot be
/// hashed into a [`ConfigKey`](crate::ConfigKey).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Int(_) => "int",
            ConfigValue::Float(_) => "float",
            ConfigValue::Str(_) => "str",
            ConfigValue::Bytes(_) => "bytes",
            ConfigValue::List(_) => "list",
            ConfigValue::Map(_) => "map",
        }
    }
}

impl PartialEq for ConfigValue {
    fn eq(&self, other: &Self) -> bool {
        use ConfigValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Str(a), Str(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConfigValue {}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(v.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Str(v)
    }
}

impl From<&Path> for ConfigValue {
    fn from(v: &Path) -> Self {
        ConfigValue::Str(v.to_string_lossy().into_owned())
    }
}

impl From<Vec<u8>> for ConfigValue {
    fn from(v: Vec<u8>) -> Self {
        ConfigValue::Bytes(v)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(v: Vec<ConfigValue>) -> Self {
        ConfigValue::List(v)
    }
}

impl From<BTreeMap<String, ConfigValue>> for ConfigValue {
    fn from(v: BTreeMap<String, ConfigValue>) -> Self {
        ConfigValue::Map(v)
    }
}

/// Positional and named arguments used to open a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenConfiguration {
    args: Vec<ConfigValue>,
    kwargs: BTreeMap<String, ConfigValue>,
}

impl OpenConfiguration {
    /// A configuration whose only positional argument is `target`.
    pub fn new(target: impl AsRef<Path>) -> Self {
        Self {
            args: vec![ConfigValue::from(target.as_ref())],
            kwargs: BTreeMap::new(),
        }
    }

    /// Build from raw parts, popping `skip_cache` out of the named arguments.
    ///
    /// Returns the configuration and the popped flag (`false` when absent). A
    /// `skip_cache` that is not a bool is a configuration error.
    pub fn from_parts(
        args: Vec<ConfigValue>,
        mut kwargs: BTreeMap<String, ConfigValue>,
    ) -> crate::Result<(Self, bool)> {
        let skip_cache = match kwargs.remove(SKIP_CACHE) {
            None => false,
            Some(ConfigValue::Bool(b)) => b,
            Some(other) => {
                return Err(crate::Error::Configuration(format!(
                    "{SKIP_CACHE} must be a bool, got {}",
                    other.type_name()
                )))
            }
        };
        Ok((Self { args, kwargs }, skip_cache))
    }

    /// Append a positional argument.
    pub fn with_arg(mut self, value: impl Into<ConfigValue>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append the open mode as the second positional argument.
    pub fn with_mode(self, mode: crate::store::Mode) -> Self {
        self.with_arg(mode.as_str())
    }

    /// Set a named argument. `skip_cache` is not an argument; pass it to
    /// `get_or_open` instead.
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        let name = name.into();
        if name != SKIP_CACHE {
            self.kwargs.insert(name, value.into());
        }
        self
    }

    pub fn args(&self) -> &[ConfigValue] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, ConfigValue> {
        &self.kwargs
    }

    pub fn arg(&self, i: usize) -> Option<&ConfigValue> {
        self.args.get(i)
    }

    pub fn option(&self, name: &str) -> Option<&ConfigValue> {
        self.kwargs.get(name)
    }

    /// Human-readable target for logs and errors: the first positional
    /// argument when it is a string.
    pub fn target(&self) -> &str {
        self.args
            .first()
            .and_then(ConfigValue::as_str)
            .unwrap_or("<unnamed>")
    }
}
