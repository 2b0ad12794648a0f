//! # vessel-core: keys, envelopes and chunked AEAD for vessel containers
//!
//! Building blocks shared by every container format:
//!
//! - **Envelope**: `MAGIC | VERSION | len-prefixed JSON header | payload` framing
//!   whose header is readable without any key
//! - **Keys**: password-derived keys and rolling stream keys that wrap a
//!   random content key (CEK) per time period
//! - **AEAD**: self-contained XChaCha20-Poly1305 records (`nonce || ct || tag`)
//! - **Stream**: independently decryptable chunks indexed by `{offset, size}`
//! - **Compression**, **cancellation** and layered **settings**
//!
//! ## Example: rolling key window
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use vessel_core::keys::{Cadence, unwrap_from_window, wrap_for_window};
//!
//! # fn main() -> Result<(), vessel_core::CoreError> {
//! let cek = vessel_core::aead::generate_key();
//! let written = Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap();
//! let wraps = wrap_for_window(&cek, "license", "device", Cadence::Daily, written)?;
//!
//! // A day later the "next period" wrap still opens
//! let read = Utc.with_ymd_and_hms(2026, 1, 13, 9, 0, 0).unwrap();
//! let unwrapped = unwrap_from_window(&wraps, "license", "device", Cadence::Daily, read)?;
//! assert_eq!(*unwrapped, *cek);
//! # Ok(())
//! # }
//! ```
//!
//! ## Non-Determinism
//!
//! Every seal uses a fresh random nonce, so encrypting the same input twice
//! yields different bytes. Test round trips, not byte equality.

pub mod aead;
pub mod b64;
pub mod cancel;
pub mod compression;
pub mod config;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod stream;

// Re-exports for convenience
pub use aead::{ALGORITHM, KEY_SIZE, SymmetricKey, generate_key};
pub use cancel::CancelToken;
pub use compression::Compression;
pub use config::Settings;
pub use envelope::{Envelope, Header};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use keys::{Cadence, WrappedKey, derive_key, derive_stream_key, unwrap_key, wrap_key};
pub use stream::{ChunkIndex, ChunkRef, DEFAULT_CHUNK_SIZE};
