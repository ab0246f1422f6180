// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Key-value store adapter
//
// Every component reads and writes whole JSON documents under a fixed set
// of string keys. Backends only move strings around; typing happens in
// load_json/save_json.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::types::AppError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Persisted key space
pub mod keys {
    pub const CATEGORIES: &str = "categories";
    pub const PRODUCTS: &str = "products";
    pub const FAVORITES: &str = "favorites";
    pub const USER: &str = "user";
    pub const IMAGE_REFERENCES: &str = "image_references";
}

/// Asynchronous string key-value storage, single process, no transactions.
///
/// A `set` must be visible to any `get` issued after it completes.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value under `key`. `Ok(None)` when nothing is stored.
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Create or overwrite the value under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    /// Delete `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), AppError>;

    /// Delete every key.
    async fn clear(&self) -> Result<(), AppError>;

    /// List every stored key.
    async fn keys(&self) -> Result<Vec<String>, AppError>;
}

/// Read and deserialize the document under `key`
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, AppError> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
            AppError::Serialization(format!("Failed to parse {}: {}", key, e))
        }),
        None => Ok(None),
    }
}

/// Serialize `value` and store it under `key`
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), AppError> {
    let raw = serde_json::to_string(value)
        .map_err(|e| AppError::Serialization(format!("Failed to serialize {}: {}", key, e)))?;
    store.set(key, &raw).await
}

/// One async mutex per key, so that read-modify-write cycles on the same
/// key run one at a time. Reads do not take the lock.
#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other mutation of `key` is in flight
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
