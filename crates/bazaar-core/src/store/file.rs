// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - File-backed key-value store
//
// Each key is one JSON file in the data directory. Writes go to a
// temporary file first and are renamed into place.

use super::KeyValueStore;
use crate::types::AppError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const EXTENSION: &str = "json";

/// Key-value store persisting one file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::FileIo(format!("Failed to create data dir: {}", e)))?;
        tracing::info!("Data directory: {:?}", dir);
        Ok(Self { dir })
    }

    /// Open a store in the platform data directory
    pub async fn open_default() -> Result<Self, AppError> {
        Self::open(Self::default_dir()?).await
    }

    /// Platform data directory for the app
    pub fn default_dir() -> Result<PathBuf, AppError> {
        let dirs = directories::ProjectDirs::from("com", "bazaar", "marketplace")
            .ok_or_else(|| AppError::FileIo("Could not determine data directory".to_string()))?;
        Ok(dirs.data_dir().join("store"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(AppError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", key, EXTENSION)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::FileIo(format!("Failed to read {}: {}", key, e))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension(format!("{}.tmp", EXTENSION));

        fs::write(&tmp, value)
            .await
            .map_err(|e| AppError::FileIo(format!("Failed to write {}: {}", key, e)))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::FileIo(format!("Failed to replace {}: {}", key, e)))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::FileIo(format!("Failed to remove {}: {}", key, e))),
        }
    }

    async fn clear(&self) -> Result<(), AppError> {
        for key in self.keys().await? {
            self.remove(&key).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, AppError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| AppError::FileIo(format!("Failed to list data dir: {}", e)))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
