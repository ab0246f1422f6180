// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - In-memory key-value store

use super::KeyValueStore;
use crate::types::AppError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::RwLock;

/// Process-local store. Data is lost when the store is dropped.
///
/// Read and write failures can be switched on to exercise the
/// degrade-to-default paths of the services built on top.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    failing_keys: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` and `keys` call fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set`, `remove` and `clear` call fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `set` and `remove` fail for `key` only
    pub fn set_fail_writes_to(&self, key: &str, fail: bool) {
        let mut failing = self
            .failing_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if fail {
            failing.insert(key.to_string());
        } else {
            failing.remove(key);
        }
    }

    fn check_read(&self) -> Result<(), AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Storage("Simulated read error".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Storage("Simulated write error".to_string()));
        }
        Ok(())
    }

    fn check_write_to(&self, key: &str) -> Result<(), AppError> {
        self.check_write()?;
        let failing = self
            .failing_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if failing.contains(key) {
            return Err(AppError::Storage(format!("Simulated write error on {}", key)));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.check_read()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.check_write_to(key)?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.check_write_to(key)?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), AppError> {
        self.check_write()?;
        self.entries.write().await.clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, AppError> {
        self.check_read()?;
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
