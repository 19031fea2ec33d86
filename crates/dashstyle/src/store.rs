//! Dashboard configuration storage.
//!
//! Without a configured storage path, saved dashboard configuration is logged
//! and discarded. With one, it is written to a JSON file and its `rooms` and
//! `entities` members are served back on the next read.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;

/// User-editable parts of the dashboard configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredLayout {
    pub rooms: Value,
    pub entities: Value,
}

impl Default for StoredLayout {
    fn default() -> Self {
        Self {
            rooms: Value::Object(Default::default()),
            entities: Value::Object(Default::default()),
        }
    }
}

impl StoredLayout {
    /// Pick the `rooms` and `entities` objects out of a saved configuration.
    fn from_saved(saved: &Value) -> Self {
        let member = |key: &str| {
            saved
                .get(key)
                .filter(|v| v.is_object())
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()))
        };
        Self {
            rooms: member("rooms"),
            entities: member("entities"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid dashboard configuration in '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to encode dashboard configuration: {0}")]
    Encode(#[source] serde_json::Error),
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<StoredLayout, StoreError>;

    async fn save(&self, config: &Value) -> Result<(), StoreError>;
}

/// Accepts saves without persisting them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardStore;

#[async_trait]
impl ConfigStore for DiscardStore {
    async fn load(&self) -> Result<StoredLayout, StoreError> {
        Ok(StoredLayout::default())
    }

    async fn save(&self, config: &Value) -> Result<(), StoreError> {
        info!("Saving configuration: {}", config);
        debug!("No storage path configured, configuration discarded");
        Ok(())
    }
}

/// Persists the last saved configuration as a JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ConfigStore for FileStore {
    async fn load(&self) -> Result<StoredLayout, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoredLayout::default()),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let saved: Value = serde_json::from_slice(&bytes).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(StoredLayout::from_saved(&saved))
    }

    async fn save(&self, config: &Value) -> Result<(), StoreError> {
        let contents = serde_json::to_vec_pretty(config).map_err(StoreError::Encode)?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        // Serialize writers so the temp file is never shared.
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, contents)
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(write_err)?;

        info!("Saved configuration to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_discard_store() {
        let store = DiscardStore;
        store.save(&json!({"rooms": {"kueche": {}}})).await.unwrap();
        assert_eq!(store.load().await.unwrap(), StoredLayout::default());
    }

    #[tokio::test]
    async fn test_file_store_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path().join("layout.json"));
        assert_eq!(store.load().await.unwrap(), StoredLayout::default());
    }

    #[tokio::test]
    async fn test_file_store_save_then_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("layout.json");
        let store = FileStore::new(&path);

        store
            .save(&json!({
                "rooms": {"kueche": {"hidden": true}},
                "entities": {"light.kueche_decke": {"name": "Decke"}},
                "theme": {"primary_color": "#000000"}
            }))
            .await
            .unwrap();

        assert!(path.exists());
        assert!(!temp_dir.path().join("nested").join("layout.json.tmp").exists());

        let layout = store.load().await.unwrap();
        assert_eq!(layout.rooms, json!({"kueche": {"hidden": true}}));
        assert_eq!(layout.entities, json!({"light.kueche_decke": {"name": "Decke"}}));
    }

    #[tokio::test]
    async fn test_file_store_non_object_members() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path().join("layout.json"));

        store.save(&json!({"rooms": [1, 2, 3]})).await.unwrap();
        assert_eq!(store.load().await.unwrap(), StoredLayout::default());

        store.save(&json!("just a string")).await.unwrap();
        assert_eq!(store.load().await.unwrap(), StoredLayout::default());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("layout.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
        assert!(err.to_string().contains("layout.json"));
    }
}
