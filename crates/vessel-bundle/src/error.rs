//! Bundle error types

use thiserror::Error;
use vessel_core::{CoreError, ErrorKind};
use vessel_storage::StorageError;
use vessel_vfs::VfsError;

pub type BundleResult<T> = Result<T, BundleError>;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle has no config")]
    ConfigMissing,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BundleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BundleError::ConfigMissing => ErrorKind::Precondition,
            BundleError::Core(e) | BundleError::Vfs(VfsError::Core(e)) => e.kind(),
            BundleError::Vfs(VfsError::Tar(_)) => ErrorKind::Structure,
            BundleError::Vfs(_) | BundleError::Storage(_) | BundleError::Io(_) => ErrorKind::Internal,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            BundleError::Core(e) | BundleError::Vfs(VfsError::Core(e)) => e.user_message(),
            BundleError::Vfs(VfsError::Tar(_)) => "not a valid container",
            BundleError::ConfigMissing => "bundle has no runtime configuration",
            BundleError::Vfs(_) | BundleError::Storage(_) | BundleError::Io(_) => "storage error",
        }
    }
}
