//! Key-value persistence contract for session state
//!
//! The core never inspects what it stores; callers decide the shape. Two
//! implementations: an in-memory map, and a flat JSON file matching how the
//! demo app persisted its state.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Opaque key-value store for conversation/session state
pub trait SessionStore: Send + Sync {
    /// Fetch a value by key
    fn get(&self, key: &str) -> Option<Value>;

    /// Store a value under a key
    fn set(&mut self, key: &str, value: Value) -> io::Result<()>;
}

/// In-memory store; contents die with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Value>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> io::Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Flat-file store: one JSON object on disk, rewritten on every `set`
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: serde_json::Map<String, Value>,
}

impl JsonFileStore {
    /// Open a store at `path`, creating it on first write. A missing file
    /// is an empty store; a corrupt one is an error.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => serde_json::Map::new(),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => serde_json::Map::new(),
            Err(e) => return Err(e),
        };
        Ok(Self { path, entries })
    }

    /// Where this store lives on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, contents)
    }
}

impl SessionStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> io::Result<()> {
        self.entries.insert(key.to_string(), value);
        self.persist()
    }
}
