//! ConfigKey: the cache identity of an open configuration.

use crate::config::{ConfigValue, OpenConfiguration};
use crate::error::{Error, Result};
use core::fmt;
use core::hash::Hasher;
use rustc_hash::FxHasher;

/// Deterministic 64-bit hash of an [`OpenConfiguration`].
///
/// Equal configurations always produce equal keys, in every process, since
/// the hasher is unseeded. Unequal configurations may collide; the cache
/// compares full configurations on a hit.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ConfigKey(u64);

impl ConfigKey {
    /// Hash the positional arguments, then the named arguments in name order.
    ///
    /// Fails with [`Error::Configuration`] when an argument is unhashable.
    pub fn of(config: &OpenConfiguration) -> Result<Self> {
        let mut h = FxHasher::default();
        h.write_usize(config.args().len());
        for (i, v) in config.args().iter().enumerate() {
            hash_value(v, &mut h).map_err(|what| {
                Error::Configuration(format!("positional argument {i} is unhashable ({what})"))
            })?;
        }
        h.write_usize(config.kwargs().len());
        for (name, v) in config.kwargs() {
            h.write(name.as_bytes());
            h.write_u8(0xff);
            hash_value(v, &mut h).map_err(|what| {
                Error::Configuration(format!("argument {name:?} is unhashable ({what})"))
            })?;
        }
        Ok(ConfigKey(h.finish()))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

fn hash_value(v: &ConfigValue, h: &mut FxHasher) -> core::result::Result<(), &'static str> {
    match v {
        ConfigValue::Null => h.write_u8(0),
        ConfigValue::Bool(b) => {
            h.write_u8(1);
            h.write_u8(*b as u8);
        }
        ConfigValue::Int(i) => {
            h.write_u8(2);
            h.write_i64(*i);
        }
        ConfigValue::Float(x) => {
            h.write_u8(3);
            h.write_u64(x.to_bits());
        }
        ConfigValue::Str(s) => {
            h.write_u8(4);
            h.write_usize(s.len());
            h.write(s.as_bytes());
        }
        ConfigValue::Bytes(b) => {
            h.write_u8(5);
            h.write_usize(b.len());
            h.write(b);
        }
        ConfigValue::List(items) => {
            h.write_u8(6);
            h.write_usize(items.len());
            for item in items {
                hash_value(item, h)?;
            }
        }
        ConfigValue::Map(_) => return Err("map"),
    }
    Ok(())
}
