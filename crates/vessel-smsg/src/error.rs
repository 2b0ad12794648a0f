//! SMSG error types

use thiserror::Error;
use vessel_core::{CoreError, ErrorKind};

pub type SmsgResult<T> = Result<T, SmsgError>;

#[derive(Debug, Error)]
pub enum SmsgError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("armor parse error: {0}")]
    ArmorParse(String),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The requested options cannot apply to the chosen format.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl SmsgError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SmsgError::Core(e) => e.kind(),
            SmsgError::ArmorParse(_) | SmsgError::Base64(_) => ErrorKind::Structure,
            SmsgError::InvalidOptions(_) => ErrorKind::Precondition,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            SmsgError::Core(e) => e.user_message(),
            SmsgError::ArmorParse(_) | SmsgError::Base64(_) => "not a valid container",
            SmsgError::InvalidOptions(_) => "invalid encryption options",
        }
    }

    /// Borrow the core error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            SmsgError::Core(e) => Some(e),
            _ => None,
        }
    }
}

pub(crate) fn payload(msg: impl Into<String>) -> SmsgError {
    SmsgError::Core(CoreError::InvalidPayload(msg.into()))
}
