// src/store.rs
//! Persistence of completed walks over a key-value storage backend

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{Result, TrackerError};
use crate::walk::{Coordinate, Walk};

/// Storage key holding the JSON array of saved walks.
pub const WALK_LIST_KEY: &str = "walk_tracker_walks_list";

/// Storage key holding the last known location as a JSON coordinate.
pub const LAST_LOCATION_KEY: &str = "walk_tracker_last_location";

/// Flat key-value persistence over JSON text. Implementations are injected
/// into [`WalkStore`] so tests can substitute an in-memory backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed storage: one `<key>.json` file per key under a data
/// directory, created on first write.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }

        tokio::fs::read_to_string(&path)
            .await
            .map(Some)
            .map_err(|e| TrackerError::Storage(format!("failed to read {}: {}", path.display(), e)))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| {
                TrackerError::Storage(format!("failed to create {}: {}", self.dir.display(), e))
            })?;

        let path = self.key_path(key);
        tokio::fs::write(&path, value)
            .await
            .map_err(|e| TrackerError::Storage(format!("failed to write {}: {}", path.display(), e)))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(());
        }

        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| TrackerError::Storage(format!("failed to remove {}: {}", path.display(), e)))
    }
}

/// In-memory storage backend, used as the test double.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }
}

/// The durable collection of saved walks plus the last known location.
///
/// Reads degrade to empty results; writes rewrite the full list and
/// propagate failures to the caller. Not atomic across concurrent callers,
/// which is acceptable for a single-user, single-process tool.
#[derive(Clone)]
pub struct WalkStore {
    backend: Arc<dyn StorageBackend>,
}

impl WalkStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Append a completed walk to the saved list.
    pub async fn append(&self, walk: &Walk) -> Result<()> {
        let mut walks = self.list().await;
        walks.push(walk.clone());
        self.write_list(&walks).await
    }

    /// All saved walks in storage order, oldest first. Read failures and
    /// malformed content are treated as "no walks yet".
    pub async fn list(&self) -> Vec<Walk> {
        match self.backend.get(WALK_LIST_KEY).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(walks) => walks,
                Err(err) => {
                    tracing::warn!("stored walk list is not valid JSON, treating as empty: {}", err);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!("failed to read walk list, treating as empty: {}", err);
                Vec::new()
            }
        }
    }

    /// Look up a single saved walk by id.
    pub async fn get(&self, id: &str) -> Option<Walk> {
        self.list().await.into_iter().find(|walk| walk.id == id)
    }

    /// Remove the walk with the given id, leaving all others untouched.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut walks = self.list().await;
        walks.retain(|walk| walk.id != id);
        self.write_list(&walks).await
    }

    /// Remove every saved walk.
    pub async fn clear(&self) -> Result<()> {
        self.backend.remove(WALK_LIST_KEY).await
    }

    pub async fn save_last_location(&self, coordinate: &Coordinate) -> Result<()> {
        let json = serde_json::to_string(coordinate)?;
        self.backend.set(LAST_LOCATION_KEY, json).await
    }

    pub async fn last_location(&self) -> Option<Coordinate> {
        match self.backend.get(LAST_LOCATION_KEY).await {
            Ok(Some(json)) => serde_json::from_str(&json).ok(),
            _ => None,
        }
    }

    async fn write_list(&self, walks: &[Walk]) -> Result<()> {
        let json = serde_json::to_string(walks)?;
        self.backend.set(WALK_LIST_KEY, json).await
    }
}
