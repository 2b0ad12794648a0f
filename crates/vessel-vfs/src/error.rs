//! VFS error types

use std::io;

use thiserror::Error;
use vessel_core::CoreError;

pub type VfsResult<T> = Result<T, VfsError>;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("file does not exist: {0}")]
    NotFound(String),

    #[error("is a directory: {0}")]
    IsDirectory(String),

    #[error("not a directory: {0}")]
    NotDirectory(String),

    #[error("tar decode failed: {0}")]
    Tar(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl VfsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, VfsError::Core(CoreError::Cancelled))
    }
}

impl From<VfsError> for io::Error {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::Io(e) => e,
            VfsError::NotFound(p) => io::Error::new(io::ErrorKind::NotFound, p),
            VfsError::IsDirectory(p) => io::Error::new(io::ErrorKind::IsADirectory, p),
            VfsError::NotDirectory(p) => io::Error::new(io::ErrorKind::NotADirectory, p),
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}
