//! Cache settings and their environment overrides.

use crate::error::{Error, Result};
use core::num::NonZeroUsize;

/// Environment variable overriding the capacity of the global cache.
pub const CAPACITY_ENV: &str = "REOPEN_CACHE_CAPACITY";

/// Capacity used when nothing else is configured.
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum number of cached handles; the least recently used one is
    /// closed when an insert would exceed it.
    pub capacity: NonZeroUsize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl CacheSettings {
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self { capacity }
    }

    /// Defaults overlaid with [`CAPACITY_ENV`] when it is set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(raw) = lookup(CAPACITY_ENV) {
            settings.capacity = raw
                .trim()
                .parse::<NonZeroUsize>()
                .map_err(|e| Error::Configuration(format!("{CAPACITY_ENV}={raw:?}: {e}")))?;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity_is_one_hundred() {
        assert_eq!(CacheSettings::default().capacity.get(), 100);
    }

    #[test]
    fn unset_variable_keeps_defaults() {
        let s = CacheSettings::from_lookup(|_| None).unwrap();
        assert_eq!(s, CacheSettings::default());
    }

    #[test]
    fn variable_overrides_capacity() {
        let s = CacheSettings::from_lookup(|name| {
            assert_eq!(name, CAPACITY_ENV);
            Some(" 7 ".to_string())
        })
        .unwrap();
        assert_eq!(s.capacity.get(), 7);
    }

    #[test]
    fn zero_or_garbage_is_rejected() {
        for raw in ["0", "-3", "lots"] {
            let err = CacheSettings::from_lookup(|_| Some(raw.to_string())).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{raw}");
        }
    }
}
