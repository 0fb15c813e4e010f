//! Whole-document persistence for the ledger and the marketplace.
//!
//! A store hands out the full document on `load` and overwrites it on `save`.
//! Unreadable or corrupt files degrade to the default document; that loses
//! data silently from the user's point of view, so it is always logged.

use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Load/save contract shared by the ledger and marketplace stores.
pub trait DocumentStore<D>: Send {
    /// Return the stored document, or `D::default()` when none can be read.
    fn load(&self) -> D;

    /// Replace the stored document.
    fn save(&self, document: &D) -> Result<(), StoreError>;
}

/// JSON file on disk, rewritten through a temporary file on every save.
pub struct JsonFileStore<D> {
    path: PathBuf,
    _document: PhantomData<fn() -> D>,
}

impl<D> JsonFileStore<D> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _document: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<D> DocumentStore<D> for JsonFileStore<D>
where
    D: Serialize + DeserializeOwned + Default,
{
    fn load(&self) -> D {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store missing, starting empty");
                return D::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "store unreadable, starting empty");
                return D::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(document) => document,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "store corrupt, starting empty");
                D::default()
            }
        }
    }

    fn save(&self, document: &D) -> Result<(), StoreError> {
        let encoded = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&tmp, encoded).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

/// In-process store, used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore<D> {
    document: Mutex<D>,
}

impl<D> MemoryStore<D> {
    pub fn new(document: D) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }
}

impl<D> DocumentStore<D> for MemoryStore<D>
where
    D: Clone + Send,
{
    fn load(&self) -> D {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn save(&self, document: &D) -> Result<(), StoreError> {
        *self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = document.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Doc {
        counts: BTreeMap<u64, i64>,
        label: String,
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::<Doc>::new(dir.path().join("data.json"));
        assert_eq!(store.load(), Doc::default());
    }

    #[test]
    fn save_then_load_returns_document() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::<Doc>::new(dir.path().join("nested/data.json"));
        let mut doc = Doc::default();
        doc.counts.insert(1, 10);
        doc.label = "ledger".into();

        store.save(&doc).unwrap();
        assert_eq!(store.load(), doc);
        assert!(!dir.path().join("nested/data.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_degrades_to_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::<Doc>::new(&path);
        assert_eq!(store.load(), Doc::default());
    }

    #[test]
    fn missing_keys_take_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, r#"{"label":"old schema"}"#).unwrap();

        let store = JsonFileStore::<Doc>::new(&path);
        let doc = store.load();
        assert_eq!(doc.label, "old schema");
        assert!(doc.counts.is_empty());
    }

    #[test]
    fn memory_store_keeps_last_save() {
        let store = MemoryStore::new(Doc::default());
        let mut doc = store.load();
        doc.label = "updated".into();
        store.save(&doc).unwrap();
        assert_eq!(store.load().label, "updated");
    }
}
