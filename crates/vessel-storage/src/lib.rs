//! vessel-storage: Name-keyed container storage
//!
//! Async backends that move opaque container bytes. Nothing here looks
//! inside a container; encryption lives in the codec crates.
//!
//! ## Backends
//!
//! | Backend        | Use Case                    | Settings value |
//! |----------------|-----------------------------|----------------|
//! | `InMemoryStore`| Tests, short-lived caches   | `memory`       |
//! | `LocalStore`   | One file per container      | `local`        |
//!
//! ## Example
//!
//! ```rust
//! use vessel_storage::{ContainerStore, InMemoryStore};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), vessel_storage::StorageError> {
//!     let store = InMemoryStore::new();
//!     store.put("album.smsg", b"SMSG...").await?;
//!     assert_eq!(store.get("album.smsg").await?, b"SMSG...");
//!     Ok(())
//! }
//! ```

mod error;
mod local;
mod memory;
mod traits;

use tracing::debug;
use vessel_core::config::StoreSettings;

pub use error::{StorageError, StorageResult};
pub use local::LocalStore;
pub use memory::InMemoryStore;
pub use traits::{ContainerStore, validate_name};

/// Open the backend named by `settings.backend`.
pub async fn open_store(settings: &StoreSettings) -> StorageResult<Box<dyn ContainerStore>> {
    debug!(backend = %settings.backend, "opening container store");
    match settings.backend.as_str() {
        "memory" => Ok(Box::new(InMemoryStore::new())),
        "local" => {
            let path = settings.local_path.as_ref().ok_or_else(|| {
                StorageError::Backend("store.local_path is required for the local backend".into())
            })?;
            Ok(Box::new(LocalStore::new(path).await?))
        }
        other => Err(StorageError::Backend(format!("unknown store backend: {other}"))),
    }
}
