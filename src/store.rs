//! Persisted key-value settings (last selected sound).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::StoreError;

/// Durable string storage, e.g. the browser's `localStorage`.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory store, shared between clones so a host can inspect what the
/// engine wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with one entry.
    pub fn with(key: &str, value: &str) -> Self {
        let store = Self::default();
        if let Ok(mut values) = store.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        store
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Unavailable)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(feature = "native")]
pub use file::JsonFileStore;

#[cfg(feature = "native")]
mod file {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use super::KeyValueStore;
    use crate::error::StoreError;

    /// Settings kept as a flat JSON object on disk.
    #[derive(Debug, Clone)]
    pub struct JsonFileStore {
        path: PathBuf,
        values: HashMap<String, String>,
    }

    impl JsonFileStore {
        /// Open `path`, starting empty if the file does not exist yet.
        pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
            let path = path.into();
            let values = match std::fs::read_to_string(&path) {
                Ok(text) => serde_json::from_str(&text)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
                Err(e) => return Err(e.into()),
            };
            Ok(JsonFileStore { path, values })
        }

        /// `settings.json` in the platform config directory.
        pub fn default_path() -> Option<PathBuf> {
            directories::ProjectDirs::from("", "", "soundscape")
                .map(|dirs| dirs.config_dir().join("settings.json"))
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl KeyValueStore for JsonFileStore {
        fn get(&self, key: &str) -> Option<String> {
            self.values.get(key).cloned()
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            self.values.insert(key.to_string(), value.to_string());
            if let Some(dir) = self.path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(&self.path, serde_json::to_string_pretty(&self.values)?)?;
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn round_trips_through_disk() {
            let dir = std::env::temp_dir().join(format!("soundscape-store-{}", std::process::id()));
            let path = dir.join("settings.json");
            let _ = std::fs::remove_dir_all(&dir);

            let mut store = JsonFileStore::open(&path).unwrap();
            assert_eq!(store.get("bloom_calm_sound"), None);
            store.set("bloom_calm_sound", "forest").unwrap();

            let reopened = JsonFileStore::open(&path).unwrap();
            assert_eq!(reopened.get("bloom_calm_sound").as_deref(), Some("forest"));
            let _ = std::fs::remove_dir_all(&dir);
        }

        #[test]
        fn corrupt_file_is_an_error() {
            let dir = std::env::temp_dir().join(format!("soundscape-bad-{}", std::process::id()));
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join("settings.json");
            std::fs::write(&path, "{ nope").unwrap();
            assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Json(_))));
            let _ = std::fs::remove_dir_all(&dir);
        }
    }
}
