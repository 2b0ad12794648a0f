//! Local filesystem storage backend

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, trace};

use crate::error::{StorageError, StorageResult};
use crate::traits::{ContainerStore, validate_name};

const CONTAINERS_DIR: &str = "containers";

/// Local filesystem storage
///
/// One file per container: `{root}/containers/{name}`. Writes go to a
/// dot-prefixed temporary file that is renamed over the target, so readers
/// never observe a partial container. Writers of the same name queue on a
/// per-name lock; different names proceed in parallel.
pub struct LocalStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    tmp_counter: AtomicU64,
}

impl LocalStore {
    /// Create storage at the given root directory
    ///
    /// Creates the directory structure if it doesn't exist.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(CONTAINERS_DIR)).await?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
            tmp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_path(&self, name: &str) -> PathBuf {
        self.root.join(CONTAINERS_DIR).join(name)
    }

    fn tmp_path(&self, name: &str) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(CONTAINERS_DIR)
            .join(format!(".{name}.{}.{n}.tmp", std::process::id()))
    }

    fn name_lock(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drop the map entry for `name` once no other task holds or awaits it.
    fn release_lock(&self, name: &str, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(name);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn write_atomic(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        let tmp = self.tmp_path(name);
        let result = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, self.container_path(name)).await
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        Ok(result?)
    }
}

#[async_trait]
impl ContainerStore for LocalStore {
    async fn put(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        let lock = self.name_lock(name);
        let result = {
            let _guard = lock.lock().await;
            self.write_atomic(name, data).await
        };
        self.release_lock(name, lock);

        result?;
        debug!(name, bytes = data.len(), "container stored");
        Ok(())
    }

    async fn get(&self, name: &str) -> StorageResult<Vec<u8>> {
        validate_name(name)?;
        match fs::read(self.container_path(name)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        validate_name(name)?;
        Ok(fs::try_exists(self.container_path(name)).await?)
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        let lock = self.name_lock(name);
        let result = {
            let _guard = lock.lock().await;
            fs::remove_file(self.container_path(name)).await
        };
        self.release_lock(name, lock);

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(self.root.join(CONTAINERS_DIR)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_name(&name).is_err() || !entry.file_type().await?.is_file() {
                trace!(name, "skipping non-container entry");
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}
