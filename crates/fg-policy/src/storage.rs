// storage.rs — Persistence collaborator for the policy store.
//
// The store reads its allowlist and grants from a key-value store with two
// independent areas: `Sync` (follows the operator across devices; holds the
// permanent allowlist) and `Local` (this device only; holds grants and the
// unlock countdown). Every write is announced on a broadcast channel so
// running pages can pick up changes without polling.
//
// Reads never fail from the caller's point of view: `get()` falls back to
// the supplied default and logs the underlying error.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::PolicyError;

/// Key of the permanent allowlist (sync area).
pub const SECTIONS_KEY: &str = "allowed_sections";
/// Key of the temporary grant list (local area).
pub const GRANTS_KEY: &str = "temp_allowed_sections";
/// Key of the in-progress unlock countdown (local area).
pub const UNLOCK_KEY: &str = "temp_unlock_state";

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// The two independent storage areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageArea {
    Sync,
    Local,
}

impl StorageArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
        }
    }
}

impl std::fmt::Display for StorageArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change notification: `key` in `area` now holds `new_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageChange {
    pub area: StorageArea,
    pub key: String,
    pub new_value: Value,
}

/// Key-value persistence with change notifications.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a key. `Ok(None)` means the key was never written.
    async fn load(&self, area: StorageArea, key: &str) -> Result<Option<Value>, PolicyError>;

    /// Write a key and notify subscribers.
    fn set(&self, area: StorageArea, key: &str, value: Value) -> Result<(), PolicyError>;

    /// Subscribe to change notifications for both areas.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;

    /// Read a key, falling back to `default` when it is absent or the
    /// backend fails.
    async fn get(&self, area: StorageArea, key: &str, default: Value) -> Value {
        match self.load(area, key).await {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(area = %area, key, error = %e, "storage read failed; using default");
                default
            }
        }
    }
}

/// In-process storage. Used by tests and by embedders that persist elsewhere.
pub struct MemoryStorage {
    values: Mutex<HashMap<(StorageArea, String), Value>>,
    changes: broadcast::Sender<StorageChange>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `load()` fail, simulating a missing backend.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Read a key synchronously, bypassing the availability switch.
    pub fn peek(&self, area: StorageArea, key: &str) -> Option<Value> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(&(area, key.to_string())).cloned()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn load(&self, area: StorageArea, key: &str) -> Result<Option<Value>, PolicyError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PolicyError::ConfigUnavailable {
                reason: "memory storage marked unavailable".to_string(),
            });
        }
        Ok(self.peek(area, key))
    }

    fn set(&self, area: StorageArea, key: &str, value: Value) -> Result<(), PolicyError> {
        {
            let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
            values.insert((area, key.to_string()), value.clone());
        }
        // No subscribers is fine.
        let _ = self.changes.send(StorageChange {
            area,
            key: key.to_string(),
            new_value: value,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

/// File-backed storage: one pretty-printed JSON object per area
/// (`<dir>/sync.json`, `<dir>/local.json`).
pub struct JsonFileStorage {
    dir: PathBuf,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<StorageChange>,
}

impl JsonFileStorage {
    /// Open (and create if needed) a storage directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| PolicyError::Storage {
            path: dir.display().to_string(),
            source,
        })?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
            changes,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn area_file(&self, area: StorageArea) -> PathBuf {
        self.dir.join(format!("{}.json", area.as_str()))
    }

    fn read_area(path: &Path, json: &str) -> Result<Map<String, Value>, PolicyError> {
        if json.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => Ok(map),
            _ => Err(PolicyError::ConfigUnavailable {
                reason: format!("{} does not hold a JSON object", path.display()),
            }),
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStorage {
    async fn load(&self, area: StorageArea, key: &str) -> Result<Option<Value>, PolicyError> {
        let path = self.area_file(area);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PolicyError::Storage {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let mut map = Self::read_area(&path, &json)?;
        Ok(map.remove(key))
    }

    fn set(&self, area: StorageArea, key: &str, value: Value) -> Result<(), PolicyError> {
        let path = self.area_file(area);
        {
            let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
            let mut map = match fs::read_to_string(&path) {
                Ok(json) => Self::read_area(&path, &json)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
                Err(source) => {
                    return Err(PolicyError::Storage {
                        path: path.display().to_string(),
                        source,
                    })
                }
            };
            map.insert(key.to_string(), value.clone());
            let json = serde_json::to_string_pretty(&Value::Object(map))?;
            fs::write(&path, json).map_err(|source| PolicyError::Storage {
                path: path.display().to_string(),
                source,
            })?;
        }
        tracing::debug!(area = %area, key, "storage key written");
        let _ = self.changes.send(StorageChange {
            area,
            key: key.to_string(),
            new_value: value,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
