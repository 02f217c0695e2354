//! JSON document store for settings, overrides, usage and the AI score cache.
//!
//! Every document is read and written whole. There are no transactions: two
//! concurrent read-modify-write cycles on the same key resolve last-write-wins.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{DashboardError, Result};

pub const SETTINGS_KEY: &str = "settings";
pub const OVERRIDES_KEY: &str = "overrides";
pub const USAGE_KEY: &str = "usage";
pub const AI_SCORES_KEY: &str = "ai-scores";

/// Raw key/value access. Typed helpers live on `DocumentStoreExt`.
pub trait DocumentStore: Send + Sync {
    fn load_value(&self, key: &str) -> Result<Option<Value>>;
    fn save_value(&self, key: &str, value: &Value) -> Result<()>;
}

pub trait DocumentStoreExt: DocumentStore {
    /// Load and deserialize `key`, or return `default` if it was never written.
    fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        match self.load_value(key)? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| DashboardError::Parse(format!("document '{}': {}", key, e))),
            None => Ok(default),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.save_value(key, &value)
    }

    /// Shallow-merge the top-level fields of `patch` into the stored object.
    fn merge(&self, key: &str, patch: &Value) -> Result<Value> {
        let mut current = self
            .load_value(key)?
            .unwrap_or_else(|| Value::Object(Default::default()));

        match (current.as_object_mut(), patch.as_object()) {
            (Some(target), Some(fields)) => {
                for (k, v) in fields {
                    target.insert(k.clone(), v.clone());
                }
            }
            _ => {
                return Err(DashboardError::InvalidInput(format!(
                    "Cannot merge non-object document '{}'",
                    key
                )))
            }
        }

        self.save_value(key, &current)?;
        Ok(current)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

fn validate_key(key: &str) -> Result<()> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(DashboardError::InvalidInput(format!(
            "Invalid document key: {}",
            key
        )))
    }
}

/// One `<key>.json` file per document under a data directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                DashboardError::Store(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl DocumentStore for JsonFileStore {
    fn load_value(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| DashboardError::Store(format!("Failed to read {}: {}", key, e)))?;
        let value = serde_json::from_str(&content)
            .map_err(|e| DashboardError::Parse(format!("document '{}': {}", key, e)))?;
        Ok(Some(value))
    }

    fn save_value(&self, key: &str, value: &Value) -> Result<()> {
        validate_key(key)?;
        let content = serde_json::to_string_pretty(value)?;

        // Write to a sibling temp file, then rename over the target.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| DashboardError::Store(format!("Failed to create temp file: {}", e)))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| DashboardError::Store(format!("Failed to write {}: {}", key, e)))?;
        tmp.persist(self.path_for(key))
            .map_err(|e| DashboardError::Store(format!("Failed to persist {}: {}", key, e)))?;

        log::debug!("Store: wrote {}", key);
        Ok(())
    }
}

/// Process-local store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn load_value(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        Ok(self.docs.lock().get(key).cloned())
    }

    fn save_value(&self, key: &str, value: &Value) -> Result<()> {
        validate_key(key)?;
        self.docs.lock().insert(key.to_string(), value.clone());
        Ok(())
    }
}
