// Shared fixtures for the integration tests: an in-memory driver that
// counts opens and closes, and helpers for JSON store files.
#![allow(dead_code)]

use parking_lot::Mutex;
use reopen_cache::{
    ConfigValue, Driver, Error, HandleCache, NodeKind, NodePath, OpenConfiguration, RawResource,
    Result,
};
use serde_json::{json, Value};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// What the memory driver has seen.
#[derive(Default)]
pub struct Log {
    opens: AtomicUsize,
    closed: Mutex<Vec<String>>,
}

impl Log {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closed.lock().len()
    }

    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().clone()
    }
}

/// Opens a fixed tree for any target. Targets starting with `fail` are
/// refused.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    pub log: Arc<Log>,
}

impl Driver for MemoryDriver {
    fn open(&self, config: &OpenConfiguration) -> Result<Box<dyn RawResource>> {
        let name = config.target().to_string();
        if name.starts_with("fail") {
            return Err(Error::ResourceOpen {
                target: name,
                source: "refused by test driver".into(),
            });
        }
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryResource {
            name,
            root: json!({
                "group": { "leaf": 1, "nested": { "deep": "x" } },
                "top": [1, 2, 3],
            }),
            log: self.log.clone(),
        }))
    }
}

struct MemoryResource {
    name: String,
    root: Value,
    log: Arc<Log>,
}

impl MemoryResource {
    fn node(&self, path: &NodePath) -> Result<&Value> {
        let mut cur = &self.root;
        for seg in path.segments() {
            cur = cur
                .as_object()
                .and_then(|m| m.get(seg))
                .ok_or_else(|| Error::Lookup {
                    path: path.as_str().to_string(),
                    reason: "missing".into(),
                })?;
        }
        Ok(cur)
    }
}

impl RawResource for MemoryResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self, path: &NodePath) -> Result<NodeKind> {
        Ok(if self.node(path)?.is_object() {
            NodeKind::Collection
        } else {
            NodeKind::Leaf
        })
    }

    fn children(&self, path: &NodePath) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .node(path)?
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    fn read(&self, path: &NodePath) -> Result<Value> {
        self.node(path).cloned()
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn create_collection(&mut self, _path: &NodePath) -> Result<()> {
        Err(Error::ReadOnly {
            target: self.name.clone(),
        })
    }

    fn write(&mut self, _path: &NodePath, _value: Value) -> Result<()> {
        Err(Error::ReadOnly {
            target: self.name.clone(),
        })
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.closed.lock().push(self.name.clone());
        Ok(())
    }
}

pub fn memory_cache(capacity: usize) -> (HandleCache, Arc<Log>) {
    let driver = MemoryDriver::default();
    let log = driver.log.clone();
    let cache = HandleCache::with_capacity(driver, NonZeroUsize::new(capacity).unwrap());
    (cache, log)
}

pub fn cfg(target: &str) -> OpenConfiguration {
    OpenConfiguration::new(target)
}

/// Write `doc` to `path` as JSON.
pub fn seed_json(path: &Path, doc: &Value) {
    std::fs::write(path, serde_json::to_vec(doc).unwrap()).unwrap();
}

pub fn with_mode(path: &Path, mode: &str) -> OpenConfiguration {
    OpenConfiguration::new(path).with_arg(ConfigValue::from(mode))
}
