use thiserror::Error;

/// Coarse classification of a [`CoreError`].
///
/// Callers branch on this instead of matching every variant: the remedy for a
/// credentials problem (ask again) differs from a structural one (wrong file)
/// or a window problem (refresh the license).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Authentication failed somewhere: wrong password, wrong license or tampering.
    Credentials,
    /// Bytes are not a container this codec understands.
    Structure,
    /// The caller broke a precondition (for example an empty password).
    Precondition,
    /// Credentials may be fine but no rolling period matched the current time.
    Window,
    /// The operation was cancelled before it finished.
    Cancelled,
    /// Anything else (RNG failure, encoder failure).
    Internal,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid magic: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: [u8; 4], found: Vec<u8> },

    #[error("Unsupported format version: {0}")]
    InvalidFormatVersion(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Covers wrong password, wrong license, wrong fingerprint and tampered
    /// ciphertext alike. The cause is never reported.
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Password required")]
    PasswordRequired,

    #[error("License required")]
    LicenseRequired,

    /// No wrapped key exists for the current or next rolling period.
    ///
    /// This leaks one bit relative to `DecryptionFailed` (the container is
    /// outside every window rather than the credentials being wrong). The
    /// distinction is kept because the remedies differ.
    #[error("No valid key for current time")]
    NoValidKeyForPeriod,

    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidMagic { .. }
            | CoreError::InvalidFormatVersion(_)
            | CoreError::InvalidPayload(_)
            | CoreError::UnsupportedCompression(_) => ErrorKind::Structure,
            CoreError::DecryptionFailed => ErrorKind::Credentials,
            CoreError::PasswordRequired | CoreError::LicenseRequired => ErrorKind::Precondition,
            CoreError::NoValidKeyForPeriod => ErrorKind::Window,
            CoreError::Cancelled => ErrorKind::Cancelled,
            CoreError::Encryption(_) | CoreError::Encoding(_) => ErrorKind::Internal,
        }
    }

    /// Message suitable for an end user. Deliberately vague about which
    /// check failed.
    pub fn user_message(&self) -> &'static str {
        match self {
            CoreError::DecryptionFailed => "wrong password or corrupted file",
            CoreError::InvalidFormatVersion(_) | CoreError::UnsupportedCompression(_) => {
                "unsupported version"
            }
            CoreError::InvalidMagic { .. } | CoreError::InvalidPayload(_) => {
                "not a valid container"
            }
            CoreError::PasswordRequired => "a password is required",
            CoreError::LicenseRequired => "a license is required",
            CoreError::NoValidKeyForPeriod => "license window has expired, refresh the license",
            CoreError::Cancelled => "operation cancelled",
            CoreError::Encryption(_) | CoreError::Encoding(_) => "encryption failed",
        }
    }

    pub(crate) fn payload(msg: impl Into<String>) -> Self {
        CoreError::InvalidPayload(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
