use super::mode::Mode;
use crate::config::{ConfigValue, OpenConfiguration};
use crate::driver::{Driver, NodeKind, RawResource};
use crate::error::{Error, Result};
use crate::path::NodePath;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::debug;

const KNOWN_OPTIONS: &[&str] = &["mode", "pretty"];

/// Opens [`JsonStore`]s.
///
/// Configuration: positional `(path, [mode])`; named `mode` (instead of the
/// positional one) and `pretty` (bool, indent on write).
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDriver;

impl Driver for JsonDriver {
    fn open(&self, config: &OpenConfiguration) -> Result<Box<dyn RawResource>> {
        Ok(Box::new(JsonStore::open(config)?))
    }
}

/// An open JSON document. Holds the file lock until dropped.
#[derive(Debug)]
pub struct JsonStore {
    name: String,
    file: File,
    mode: Mode,
    root: Value,
    pretty: bool,
    dirty: bool,
}

struct Parsed<'a> {
    path: &'a str,
    mode: Mode,
    pretty: bool,
}

fn parse_config(config: &OpenConfiguration) -> Result<Parsed<'_>> {
    let path = config.arg(0).and_then(ConfigValue::as_str).ok_or_else(|| {
        Error::Configuration("first positional argument must be the target path".into())
    })?;
    if config.args().len() > 2 {
        return Err(Error::Configuration(format!(
            "expected at most 2 positional arguments, got {}",
            config.args().len()
        )));
    }
    if let Some(name) = config
        .kwargs()
        .keys()
        .find(|k| !KNOWN_OPTIONS.contains(&k.as_str()))
    {
        return Err(Error::Configuration(format!("unsupported option {name:?}")));
    }

    let mode = match (config.arg(1), config.option("mode")) {
        (Some(_), Some(_)) => {
            return Err(Error::Configuration("mode given both positionally and by name".into()))
        }
        (Some(v), None) | (None, Some(v)) => v
            .as_str()
            .ok_or_else(|| Error::Configuration(format!("mode must be a string, got {}", v.type_name())))?
            .parse()?,
        (None, None) => Mode::default(),
    };
    let pretty = match config.option("pretty") {
        None => false,
        Some(v) => v.as_bool().ok_or_else(|| {
            Error::Configuration(format!("pretty must be a bool, got {}", v.type_name()))
        })?,
    };
    Ok(Parsed { path, mode, pretty })
}

fn lock(file: &File, exclusive: bool) -> io::Result<()> {
    let res = if exclusive {
        file.try_lock()
    } else {
        file.try_lock_shared()
    };
    match res {
        Ok(()) => Ok(()),
        Err(TryLockError::WouldBlock) => Err(io::Error::new(
            io::ErrorKind::WouldBlock,
            "already open with a conflicting mode",
        )),
        Err(TryLockError::Error(e)) => Err(e),
    }
}

impl JsonStore {
    pub fn open(config: &OpenConfiguration) -> Result<Self> {
        let Parsed { path, mode, pretty } = parse_config(config)?;
        let mut opts = OpenOptions::new();
        opts.read(true);
        match mode {
            Mode::Read => {}
            Mode::ReadWrite => {
                opts.write(true);
            }
            Mode::Truncate | Mode::Append => {
                opts.write(true).create(true);
            }
            Mode::CreateNew => {
                opts.write(true).create_new(true);
            }
        }
        let mut file = opts.open(path).map_err(|e| Error::open(path, e))?;
        lock(&file, mode.is_exclusive()).map_err(|e| Error::open(path, e))?;

        // Truncate only once the exclusive lock is held.
        let root = match mode {
            Mode::Truncate | Mode::CreateNew => {
                file.set_len(0).map_err(|e| Error::open(path, e))?;
                Value::Object(Map::new())
            }
            _ => {
                let mut text = String::new();
                file.read_to_string(&mut text).map_err(|e| Error::open(path, e))?;
                if text.trim().is_empty() && mode == Mode::Append {
                    Value::Object(Map::new())
                } else {
                    let root: Value = serde_json::from_str(&text).map_err(|e| Error::open(path, e))?;
                    if !root.is_object() {
                        return Err(Error::open(path, "document root is not an object"));
                    }
                    root
                }
            }
        };

        debug!(path, %mode, "opened json store");
        Ok(Self {
            name: path.to_string(),
            file,
            mode,
            root,
            pretty,
            dirty: mode.is_exclusive(),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn node(&self, path: &NodePath) -> Result<&Value> {
        let mut cur = &self.root;
        for seg in path.segments() {
            cur = match cur {
                Value::Object(map) => map
                    .get(seg)
                    .ok_or_else(|| Error::lookup(path.as_str(), format!("{seg:?} does not exist")))?,
                _ => return Err(Error::lookup(path.as_str(), "a leaf has no children")),
            };
        }
        Ok(cur)
    }

    // Parent collection of `path`, for inserting a new child.
    fn parent_map(&mut self, path: &NodePath) -> Result<(&mut Map<String, Value>, String)> {
        if !self.mode.is_writable() {
            return Err(Error::ReadOnly {
                target: self.name.clone(),
            });
        }
        let parent = path
            .parent()
            .ok_or_else(|| Error::lookup(path.as_str(), "the root cannot be replaced"))?;
        let name = path.name().to_string();
        let mut cur = &mut self.root;
        for seg in parent.segments() {
            cur = match cur {
                Value::Object(map) => map
                    .get_mut(seg)
                    .ok_or_else(|| Error::lookup(path.as_str(), format!("{seg:?} does not exist")))?,
                _ => return Err(Error::lookup(path.as_str(), "a leaf has no children")),
            };
        }
        match cur {
            Value::Object(map) => Ok((map, name)),
            _ => Err(Error::lookup(path.as_str(), "parent is not a collection")),
        }
    }

    fn persist(&mut self) -> io::Result<()> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&self.root)?
        } else {
            serde_json::to_vec(&self.root)?
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.set_len(0)?;
        self.file.write_all(&bytes)?;
        self.file.flush()
    }
}

impl RawResource for JsonStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self, path: &NodePath) -> Result<NodeKind> {
        Ok(match self.node(path)? {
            Value::Object(_) => NodeKind::Collection,
            _ => NodeKind::Leaf,
        })
    }

    fn children(&self, path: &NodePath) -> Result<Vec<String>> {
        match self.node(path)? {
            Value::Object(map) => {
                let mut names: Vec<String> = map.keys().cloned().collect();
                names.sort();
                Ok(names)
            }
            _ => Err(Error::lookup(path.as_str(), "not a collection")),
        }
    }

    fn read(&self, path: &NodePath) -> Result<Value> {
        self.node(path).cloned()
    }

    fn is_writable(&self) -> bool {
        self.mode.is_writable()
    }

    fn create_collection(&mut self, path: &NodePath) -> Result<()> {
        let (map, name) = self.parent_map(path)?;
        if map.contains_key(&name) {
            return Err(Error::lookup(path.as_str(), "a node already exists there"));
        }
        map.insert(name, Value::Object(Map::new()));
        self.dirty = true;
        Ok(())
    }

    fn write(&mut self, path: &NodePath, value: Value) -> Result<()> {
        let (map, name) = self.parent_map(path)?;
        map.insert(name, value);
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty || !self.mode.is_writable() {
            return Ok(());
        }
        self.persist().map_err(|e| Error::store(self.name.clone(), e))?;
        self.dirty = false;
        Ok(())
    }
}
