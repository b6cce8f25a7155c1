//! Durable client-side key/value state.
//!
//! The widget persists exactly three string values across restarts:
//! [`DEVICE_ID_KEY`], [`DEVICE_NAME_KEY`] and [`SOUND_ENABLED_KEY`]. They
//! are the sole source of identity continuity between sessions.
//!
//! Implementations:
//! - [`FileStorage`] -- a JSON object on disk (default
//!   `<data_dir>/guestchat/state.json`)
//! - [`MemoryStorage`] -- process-local, for tests and ephemeral sessions

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Key of the persisted anonymous device identifier.
pub const DEVICE_ID_KEY: &str = "deviceId";

/// Key of the persisted device display name.
pub const DEVICE_NAME_KEY: &str = "deviceName";

/// Key of the persisted sound preference (`"true"` / `"false"`).
pub const SOUND_ENABLED_KEY: &str = "soundEnabled";

/// Errors that can occur while persisting client state.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error on {path}: {source}")]
    Io {
        /// File that was accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The state could not be encoded.
    #[error("failed to encode client state: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backend refused the write.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Could not determine the user's data directory.
    #[error("could not determine data directory")]
    NoDataDir,
}

/// Durable string key/value storage.
///
/// Reads never fail: a missing or unreadable value is simply absent, and
/// callers regenerate what they need.
pub trait ClientStorage: Send + Sync {
    /// Return the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the value could not be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<T: ClientStorage + ?Sized> ClientStorage for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}

/// In-memory [`ClientStorage`].
///
/// Writes can be switched to fail, to exercise the degraded paths.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given entries.
    #[must_use]
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            entries: Mutex::new(map),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ClientStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// [`ClientStorage`] backed by a JSON object file.
///
/// The whole map is cached in memory and rewritten on every `set` through a
/// temporary file and rename, so a crash never leaves a half-written state.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the state file at `path`.
    ///
    /// A missing file is an empty state. A corrupt file is logged and
    /// treated as empty; it is overwritten on the next write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let cache = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "client state file is corrupt, starting fresh");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StorageError::Io { path, source: e }),
        };
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    /// Default location: `<data_dir>/guestchat/state.json`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoDataDir`] if the platform has no data dir.
    pub fn default_path() -> Result<PathBuf, StorageError> {
        dirs::data_dir()
            .map(|d| d.join("guestchat").join("state.json"))
            .ok_or(StorageError::NoDataDir)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let encoded = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, encoded).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl ClientStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut cache = self.cache.lock();
        let previous = cache.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush(&cache) {
            // Keep memory and disk in agreement.
            match previous {
                Some(old) => cache.insert(key.to_string(), old),
                None => cache.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}
