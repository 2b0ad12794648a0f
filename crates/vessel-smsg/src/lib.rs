//! # vessel-smsg: secure message containers
//!
//! A message (body, sender, attachments) sealed inside an `SMSG` envelope
//! whose header stays public: anyone can read the [`Manifest`] and check its
//! license without the password.
//!
//! | Format | Body | Key |
//! |--------|------|-----|
//! | v1 | JSON, base64 attachments | password hash |
//! | v2 | binary, optional zstd | password hash |
//! | v3 | binary, optional zstd, optionally chunked | random CEK wrapped under rolling stream keys |
//!
//! ## Example
//!
//! ```rust
//! use vessel_smsg::{Attachment, EncryptOptions, Manifest, Message, decrypt, encrypt, get_manifest};
//!
//! # fn main() -> Result<(), vessel_smsg::SmsgError> {
//! let msg = Message::new("Hello, World!")
//!     .with_attachment(Attachment::new("a.bin", "application/octet-stream", vec![7u8; 100]));
//! let manifest = Manifest::new("Greeting");
//!
//! let container = encrypt(&msg, "correct-horse", Some(&manifest), &EncryptOptions::default())?;
//!
//! // The manifest is public
//! assert_eq!(get_manifest(&container)?.unwrap().title, "Greeting");
//!
//! let back = decrypt(&container, "correct-horse", None)?;
//! assert_eq!(back.body, "Hello, World!");
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming
//!
//! A chunked v3 container lets a player unwrap the content key once
//! ([`unwrap_content_key`]) and then open chunks in any order as bytes
//! arrive ([`decrypt_chunk`]).

pub mod armor;
mod codec;
mod error;
mod header;
mod manifest;
mod message;

pub use codec::{
    ContentKey, EncryptOptions, MAGIC, StreamOptions, decrypt, decrypt_at, decrypt_cancellable,
    decrypt_chunk, encrypt, encrypt_at, get_header, get_manifest, is_license_valid,
    is_license_valid_at, unwrap_content_key, unwrap_content_key_at,
};
pub use error::{SmsgError, SmsgResult};
pub use header::{FormatVersion, KeyMethod, SmsgHeader};
pub use manifest::{License, LicenseType, Manifest, Track};
pub use message::{Attachment, Message};

pub use vessel_core::{Cadence, Compression};
