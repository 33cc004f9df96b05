//! Cross-platform key-value persistence.
//!
//! - Web: `localStorage`
//! - Desktop: one JSON file per key in the platform config directory:
//!   - Linux: `~/.config/fleetdeck/`
//!   - macOS: `~/Library/Application Support/fleetdeck/`
//!   - Windows: `%APPDATA%\fleetdeck\`
//!
//! Keys are namespaced as `fleetdeck:<key>` so the dashboard never collides
//! with other apps sharing the same origin.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};

pub const NAMESPACE: &str = "fleetdeck";

pub fn namespaced(key: &str) -> String {
    format!("{}:{}", NAMESPACE, key)
}

/// Raw string storage backend.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    /// Returns `true` if the value was written.
    fn set(&self, key: &str, value: &str) -> bool;
    fn remove(&self, key: &str);
}

/// Save a value as JSON under the namespaced key.
pub fn save_json<T: Serialize>(store: &impl KeyValueStore, key: &str, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => store.set(&namespaced(key), &json),
        Err(e) => {
            crate::log_error!("Failed to serialize '{}': {}", key, e);
            false
        }
    }
}

/// Load a JSON value from the namespaced key.
///
/// Absent keys and unreadable JSON both yield `None`.
pub fn load_json<T: DeserializeOwned>(store: &impl KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(&namespaced(key))?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            crate::log_warn!("Ignoring corrupt stored value for '{}': {}", key, e);
            None
        }
    }
}

pub fn remove(store: &impl KeyValueStore, key: &str) {
    store.remove(&namespaced(key));
}

pub fn exists(store: &impl KeyValueStore, key: &str) -> bool {
    store.get(&namespaced(key)).is_some()
}

/// In-process store, used in tests and as a fallback when no persistent
/// backend is available.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }
}

// =========================================
// Web (WASM) implementation
// =========================================

#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Default)]
pub struct LocalStore;

#[cfg(target_arch = "wasm32")]
impl LocalStore {
    pub fn new() -> Self {
        Self
    }

    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok()?
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok()?
    }

    fn set(&self, key: &str, value: &str) -> bool {
        Self::storage()
            .map(|s| s.set_item(key, value).is_ok())
            .unwrap_or(false)
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = Self::storage() {
            let _ = storage.remove_item(key);
        }
    }
}

// =========================================
// Desktop (native) implementation
// =========================================

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: Option<std::path::PathBuf>,
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl LocalStore {
    /// Store rooted at the platform config directory.
    pub fn new() -> Self {
        Self {
            dir: dirs::config_dir().map(|d| d.join(NAMESPACE)),
        }
    }

    /// Store rooted at an explicit directory.
    pub fn in_dir(dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn file_path(&self, key: &str) -> Option<std::path::PathBuf> {
        let dir = self.dir.as_ref()?;
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        Some(dir.join(format!("{}.json", safe_key)))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.file_path(key)?).ok()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        let Some(path) = self.file_path(key) else {
            return false;
        };
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return false;
            }
        }
        std::fs::write(path, value).is_ok()
    }

    fn remove(&self, key: &str) {
        if let Some(path) = self.file_path(key) {
            let _ = std::fs::remove_file(path);
        }
    }
}
