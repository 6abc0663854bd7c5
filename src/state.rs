// src/state.rs

//! Persistent build state
//!
//! A single JSON object under the distribution prefix records what has been
//! built. Keys are `"<recipe>.<phase>"`; values are whatever the writer
//! chose, usually `true` or an RFC 3339 timestamp.
//!
//! The file is read lazily on first access. A missing or unreadable file is
//! an empty state. Every `set`/`delete` rewrites the whole document before
//! returning. There is no locking; one kiln process per prefix.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Phase recorded once a recipe is built for every requested architecture
pub const BUILD_ALL: &str = "build_all";

/// Lazily loaded key/value store backed by one JSON file
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    data: Option<BTreeMap<String, Value>>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn data(&mut self) -> &mut BTreeMap<String, Value> {
        let path = &self.path;
        self.data.get_or_insert_with(|| load(path))
    }

    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.data().get(key).cloned()
    }

    pub fn contains(&mut self, key: &str) -> bool {
        self.data().contains_key(key)
    }

    /// Set `key` and persist the document
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.data().insert(key.to_string(), value.into());
        self.sync()
    }

    /// Remove `key` and persist the document; returns the old value
    pub fn delete(&mut self, key: &str) -> Result<Option<Value>> {
        let old = self.data().remove(key);
        if old.is_some() {
            self.sync()?;
        }
        Ok(old)
    }

    /// All keys starting with `prefix`
    pub fn keys_with_prefix(&mut self, prefix: &str) -> Vec<String> {
        self.data()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Record that `recipe` finished building for all requested architectures
    pub fn mark_built(&mut self, recipe: &str) -> Result<()> {
        self.set(&key(recipe, BUILD_ALL), true)?;
        self.set(&format!("{}.at", key(recipe, BUILD_ALL)), Utc::now().to_rfc3339())
    }

    pub fn is_built(&mut self, recipe: &str) -> bool {
        self.contains(&key(recipe, BUILD_ALL))
    }

    /// When `recipe` was last fully built
    pub fn built_at(&mut self, recipe: &str) -> Option<DateTime<Utc>> {
        let value = self.get(&format!("{}.at", key(recipe, BUILD_ALL)))?;
        DateTime::parse_from_rfc3339(value.as_str()?)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Drop every key belonging to `recipe`; returns how many were removed
    pub fn clear_recipe(&mut self, recipe: &str) -> Result<usize> {
        let keys = self.keys_with_prefix(&format!("{}.", recipe));
        let data = self.data();
        for k in &keys {
            data.remove(k);
        }
        if !keys.is_empty() {
            self.sync()?;
        }
        Ok(keys.len())
    }

    fn sync(&self) -> Result<()> {
        let Some(data) = &self.data else {
            return Ok(());
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let content = serde_json::to_string_pretty(data)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| {
            Error::io(format!("Failed to write state file {}", self.path.display()), e.error)
        })?;

        debug!("state written to {}", self.path.display());
        Ok(())
    }
}

/// `"<recipe>.<phase>"`
pub fn key(recipe: &str, phase: &str) -> String {
    format!("{}.{}", recipe, phase)
}

fn load(path: &Path) -> BTreeMap<String, Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Cannot read state file {}: {}", path.display(), e);
            }
            return BTreeMap::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(data) => data,
        Err(e) => {
            warn!("Ignoring unreadable state file {}: {}", path.display(), e);
            BTreeMap::new()
        }
    }
}
