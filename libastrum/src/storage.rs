//! Key/value document storage
//!
//! Every persisted collection (credential set, content list, media buffer,
//! platform toggles, weekly schedule, analytics log) is a single JSON
//! document stored under one key. Writers always replace the whole document.
//!
//! Two backends implement [`DocumentStore`]:
//! - [`JsonFileStore`]: one `<key>.json` file per document in a directory
//! - [`MemoryStore`]: an in-process map, used by tests
//!
//! ```no_run
//! use libastrum::storage::{load_json, save_json, JsonFileStore, keys};
//!
//! # fn example() -> libastrum::Result<()> {
//! let store = JsonFileStore::new("/tmp/astrum".into());
//! let tags: Vec<String> = load_json(&store, "example")?.unwrap_or_default();
//! save_json(&store, "example", &tags)?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StorageError};

/// Storage keys of every persisted document
pub mod keys {
    pub const CREDENTIALS: &str = "credentials";
    pub const CONTENT_ITEMS: &str = "content_items";
    pub const MEDIA_BUFFER: &str = "media_buffer";
    pub const PLATFORM_SETTINGS: &str = "platform_settings";
    pub const WEEKLY_SCHEDULE: &str = "weekly_schedule";
    pub const ANALYTICS_LOG: &str = "analytics_log";
}

/// Backend for whole-document reads and writes
pub trait DocumentStore: Send + Sync {
    /// Read the raw document stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the document stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the document stored under `key`
    ///
    /// Removing a missing document is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    fn backend_name(&self) -> &str;
}

/// Shared handle to a document store
pub type SharedStore = Arc<dyn DocumentStore>;

/// Load and deserialize the document under `key`
pub fn load_json<T: DeserializeOwned>(store: &dyn DocumentStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| {
                StorageError::Corrupt {
                    key: key.to_string(),
                    source,
                }
                .into()
            }),
        None => Ok(None),
    }
}

/// Serialize `value` and store it under `key`
pub fn save_json<T: Serialize + ?Sized>(store: &dyn DocumentStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value).map_err(|source| StorageError::Corrupt {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}

/// Stores each document as `<base_path>/<key>.json`
///
/// Writes go to a temporary file that is renamed into place, so a crash
/// never leaves a half-written document behind.
pub struct JsonFileStore {
    base_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }

    fn io_error(key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl DocumentStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let file_path = self.file_path(key);
        match std::fs::read_to_string(&file_path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e).into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.base_path).map_err(|e| Self::io_error(key, e))?;

        let file_path = self.file_path(key);
        let tmp_path = self.base_path.join(format!(".{}.json.tmp", key));
        {
            let mut options = std::fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            // Documents may hold API tokens
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&tmp_path).map_err(|e| Self::io_error(key, e))?;

            // A leftover temp file keeps its old mode
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(std::fs::Permissions::from_mode(0o600))
                    .map_err(|e| Self::io_error(key, e))?;
            }

            file.write_all(value.as_bytes())
                .map_err(|e| Self::io_error(key, e))?;
            file.sync_all().map_err(|e| Self::io_error(key, e))?;
        }

        std::fs::rename(&tmp_path, &file_path).map_err(|e| Self::io_error(key, e))?;
        tracing::debug!("Stored document '{}' at {:?}", key, file_path);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let file_path = self.file_path(key);
        match std::fs::remove_file(&file_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key, e).into()),
        }
    }

    fn backend_name(&self) -> &str {
        "json_file"
    }
}

/// In-memory document store
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        documents.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        documents.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

/// A JSON array document under one key
///
/// [`Collection::update`] serializes read-modify-write cycles within this
/// process; other processes writing the same key may still race.
pub struct Collection<T> {
    store: SharedStore,
    key: &'static str,
    write_lock: Mutex<()>,
    _items: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> Collection<T> {
    pub fn new(store: SharedStore, key: &'static str) -> Self {
        Self {
            store,
            key,
            write_lock: Mutex::new(()),
            _items: PhantomData,
        }
    }

    /// Current items; a missing document is an empty list
    pub fn load(&self) -> Result<Vec<T>> {
        Ok(load_json(self.store.as_ref(), self.key)?.unwrap_or_default())
    }

    /// Load, let `f` edit the list, then persist it
    pub fn update<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> Result<R> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.load()?;
        let result = f(&mut items);
        save_json(self.store.as_ref(), self.key, &items)?;
        Ok(result)
    }

    pub fn key(&self) -> &str {
        self.key
    }
}
