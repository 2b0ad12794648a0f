//! Storage trait definitions

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Reject names that could escape a backend's namespace.
///
/// Valid names are non-empty, contain no path separators or NUL, and do not
/// start with `.` (reserved for temporary files).
pub fn validate_name(name: &str) -> StorageResult<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Opaque container bytes keyed by name.
///
/// Writes to one name are atomic: a reader sees the old bytes or the new
/// bytes, never a mix. Concurrent writers of the same name are serialized.
#[async_trait]
pub trait ContainerStore: Send + Sync {
    /// Store (or replace) the container `name`.
    async fn put(&self, name: &str, data: &[u8]) -> StorageResult<()>;

    /// Returns `StorageError::NotFound` if the container doesn't exist.
    async fn get(&self, name: &str) -> StorageResult<Vec<u8>>;

    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Returns `Ok(())` even if the container didn't exist (idempotent).
    async fn delete(&self, name: &str) -> StorageResult<()>;

    /// All stored names, sorted.
    async fn list(&self) -> StorageResult<Vec<String>>;
}

#[async_trait]
impl<T: ContainerStore + ?Sized> ContainerStore for Box<T> {
    async fn put(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        (**self).put(name, data).await
    }

    async fn get(&self, name: &str) -> StorageResult<Vec<u8>> {
        (**self).get(name).await
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        (**self).exists(name).await
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        (**self).delete(name).await
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        (**self).list().await
    }
}
