//! In-memory storage backend

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::traits::{ContainerStore, validate_name};

/// In-memory container store
///
/// Thread-safe via `RwLock`. Not persistent, data is lost on drop.
#[derive(Default)]
pub struct InMemoryStore {
    containers: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<u8>>> {
        self.containers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<u8>>> {
        self.containers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored containers
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes stored
    pub fn total_size(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}

#[async_trait]
impl ContainerStore for InMemoryStore {
    async fn put(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        self.write().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, name: &str) -> StorageResult<Vec<u8>> {
        validate_name(name)?;
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        validate_name(name)?;
        Ok(self.read().contains_key(name))
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        self.write().remove(name);
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
