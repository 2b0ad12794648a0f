//! Encrypt, decrypt and inspect SMSG containers
//!
//! All formats share one envelope (`SMSG` magic) and dispatch on the
//! header's `format` field:
//!
//! | format | plaintext        | key                                       |
//! |--------|------------------|-------------------------------------------|
//! | v1     | message JSON     | `derive_key(password)`                    |
//! | v2     | binary body      | `derive_key(password)`                    |
//! | v3     | binary body      | random CEK, wrapped per period            |
//!
//! v2 and v3 compress the body before encrypting (and before chunking).
//! For v3 the password plays the role of the license.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use vessel_core::envelope::{self, Envelope};
use vessel_core::keys::{self, Cadence};
use vessel_core::stream::{self, ChunkIndex};
use vessel_core::{
    CancelToken, Compression, CoreError, SymmetricKey, aead, config::SmsgSettings, derive_key,
};

use crate::error::{SmsgError, SmsgResult, payload};
use crate::header::{FormatVersion, SmsgHeader};
use crate::manifest::Manifest;
use crate::message::{self, Message};

/// Envelope magic for secure messages
pub const MAGIC: &[u8; 4] = b"SMSG";

/// Rolling-key parameters for v3.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamOptions {
    pub cadence: Cadence,
    /// Device fingerprint bound into every stream key ("" for none)
    pub fingerprint: String,
}

#[derive(Clone, Debug, Default)]
pub struct EncryptOptions {
    pub format: FormatVersion,
    /// Ignored for v1, which is never compressed
    pub compression: Compression,
    /// v3 only: split the body into independently sealed chunks.
    /// Setting it for v1 or v2 is rejected with `InvalidOptions`.
    pub chunk_size: Option<usize>,
    /// v3 only; defaults to daily cadence and no fingerprint
    pub stream: Option<StreamOptions>,
    pub cancel: CancelToken,
}

impl EncryptOptions {
    pub fn v1() -> Self {
        Self {
            format: FormatVersion::V1,
            ..Default::default()
        }
    }

    pub fn v2(compression: Compression) -> Self {
        Self {
            format: FormatVersion::V2,
            compression,
            ..Default::default()
        }
    }

    pub fn v3(stream: StreamOptions) -> Self {
        Self {
            format: FormatVersion::V3,
            stream: Some(stream),
            ..Default::default()
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build options from configured defaults.
    pub fn from_settings(settings: &SmsgSettings) -> SmsgResult<Self> {
        let format = FormatVersion::parse(&settings.format)?;
        Ok(Self {
            format,
            compression: settings.compression,
            chunk_size: settings.chunk_size.filter(|_| format == FormatVersion::V3),
            stream: (format == FormatVersion::V3).then(|| StreamOptions {
                cadence: settings.cadence,
                fingerprint: String::new(),
            }),
            cancel: CancelToken::new(),
        })
    }
}

/// A content key unwrapped from a v3 container, ready for chunk decryption.
pub struct ContentKey {
    pub cek: SymmetricKey,
    pub compression: Compression,
    /// Present when the payload is chunked
    pub index: Option<ChunkIndex>,
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("cek", &"<redacted>")
            .field("compression", &self.compression)
            .field("index", &self.index)
            .finish()
    }
}

/// Encrypt `message` into an SMSG container at the current time.
pub fn encrypt(
    message: &Message,
    password: &str,
    manifest: Option<&Manifest>,
    options: &EncryptOptions,
) -> SmsgResult<Vec<u8>> {
    encrypt_at(message, password, manifest, options, Utc::now())
}

/// Encrypt with an explicit clock; `now` selects the v3 key window.
#[instrument(skip_all, fields(format = %options.format, attachments = message.attachments.len()))]
pub fn encrypt_at(
    message: &Message,
    password: &str,
    manifest: Option<&Manifest>,
    options: &EncryptOptions,
    now: DateTime<Utc>,
) -> SmsgResult<Vec<u8>> {
    if password.is_empty() {
        return Err(CoreError::PasswordRequired.into());
    }
    if options.chunk_size.is_some() && options.format != FormatVersion::V3 {
        return Err(SmsgError::InvalidOptions(format!(
            "{} containers cannot be chunked",
            options.format
        )));
    }

    let mut header = SmsgHeader::new(options.format, now.timestamp());
    header.manifest = manifest.cloned();

    let sealed = match options.format {
        FormatVersion::V1 => {
            let key = derive_key(password)?;
            aead::seal(&key, &message::encode_json(message)?)?
        }
        FormatVersion::V2 => {
            header.compression = options.compression;
            let body = options.compression.compress(&message::encode_binary(message)?)?;
            let key = derive_key(password)?;
            aead::seal(&key, &body)?
        }
        FormatVersion::V3 => {
            header.compression = options.compression;
            let body = options.compression.compress(&message::encode_binary(message)?)?;
            let stream_options = options.stream.clone().unwrap_or_default();

            let cek = aead::generate_key();
            header.cadence = Some(stream_options.cadence);
            header.wrapped_keys = keys::wrap_for_window(
                &cek,
                password,
                &stream_options.fingerprint,
                stream_options.cadence,
                now,
            )?;

            match options.chunk_size {
                Some(chunk_size) => {
                    let (sealed, index) =
                        stream::encrypt_chunked(&body, &cek, chunk_size, &options.cancel)?;
                    header.chunked = Some(index);
                    sealed
                }
                None => aead::seal(&cek, &body)?,
            }
        }
    };

    options.cancel.check()?;
    let bytes = envelope::encode(MAGIC, &envelope::to_header(&header)?, &sealed)?;
    debug!(bytes = bytes.len(), compression = %header.compression, "message encrypted");
    Ok(bytes)
}

/// Decrypt a container with the current clock.
///
/// `fingerprint` only matters for v3 and must match the one used at
/// encryption time.
pub fn decrypt(bytes: &[u8], password: &str, fingerprint: Option<&str>) -> SmsgResult<Message> {
    decrypt_at(bytes, password, fingerprint, Utc::now())
}

pub fn decrypt_at(
    bytes: &[u8],
    password: &str,
    fingerprint: Option<&str>,
    now: DateTime<Utc>,
) -> SmsgResult<Message> {
    decrypt_cancellable(bytes, password, fingerprint, now, &CancelToken::new())
}

/// Decrypt, checking `cancel` between chunks.
#[instrument(skip_all, fields(len = bytes.len()))]
pub fn decrypt_cancellable(
    bytes: &[u8],
    password: &str,
    fingerprint: Option<&str>,
    now: DateTime<Utc>,
    cancel: &CancelToken,
) -> SmsgResult<Message> {
    if password.is_empty() {
        return Err(CoreError::PasswordRequired.into());
    }

    let envelope = Envelope::decode(bytes, MAGIC)?;
    let header = SmsgHeader::from_envelope(&envelope)?;
    debug!(format = %header.format, chunked = header.is_chunked(), "decrypting message");

    match header.format {
        FormatVersion::V1 => {
            let key = derive_key(password)?;
            message::decode_json(&aead::open(&key, envelope.payload)?)
        }
        FormatVersion::V2 => {
            let key = derive_key(password)?;
            let body = aead::open(&key, envelope.payload)?;
            message::decode_binary(&header.compression.decompress(&body)?)
        }
        FormatVersion::V3 => {
            let key = content_key(&header, password, fingerprint.unwrap_or(""), now)?;
            let body = match &key.index {
                Some(index) => stream::decrypt_chunks(envelope.payload, &key.cek, index, cancel)?,
                None => aead::open(&key.cek, envelope.payload)?,
            };
            message::decode_binary(&key.compression.decompress(&body)?)
        }
    }
}

fn content_key(
    header: &SmsgHeader,
    license: &str,
    fingerprint: &str,
    now: DateTime<Utc>,
) -> SmsgResult<ContentKey> {
    let cadence = header
        .cadence
        .ok_or_else(|| payload("v3 header has no cadence"))?;
    let cek = keys::unwrap_from_window(&header.wrapped_keys, license, fingerprint, cadence, now)?;
    Ok(ContentKey {
        cek,
        compression: header.compression,
        index: header.chunked.clone(),
    })
}

/// Read and validate the public header. No key needed.
pub fn get_header(bytes: &[u8]) -> SmsgResult<SmsgHeader> {
    SmsgHeader::from_envelope(&Envelope::decode(bytes, MAGIC)?)
}

/// Read the public manifest, if the container carries one. No key needed.
pub fn get_manifest(bytes: &[u8]) -> SmsgResult<Option<Manifest>> {
    Ok(get_header(bytes)?.manifest)
}

/// Whether the manifest license is unexpired now. Containers without a
/// manifest carry no restriction and are always valid.
pub fn is_license_valid(bytes: &[u8]) -> SmsgResult<bool> {
    is_license_valid_at(bytes, Utc::now())
}

pub fn is_license_valid_at(bytes: &[u8], now: DateTime<Utc>) -> SmsgResult<bool> {
    Ok(get_manifest(bytes)?.is_none_or(|m| m.is_license_valid_at(now)))
}

/// Unwrap the CEK of a v3 container for a streaming reader.
pub fn unwrap_content_key(bytes: &[u8], license: &str, fingerprint: &str) -> SmsgResult<ContentKey> {
    unwrap_content_key_at(bytes, license, fingerprint, Utc::now())
}

pub fn unwrap_content_key_at(
    bytes: &[u8],
    license: &str,
    fingerprint: &str,
    now: DateTime<Utc>,
) -> SmsgResult<ContentKey> {
    if license.is_empty() {
        return Err(CoreError::LicenseRequired.into());
    }
    let header = get_header(bytes)?;
    if header.format != FormatVersion::V3 {
        return Err(payload(format!(
            "{} containers have no content key",
            header.format
        )));
    }
    content_key(&header, license, fingerprint, now)
}

/// Decrypt chunk `i` of a chunked v3 container.
///
/// `bytes` may be a prefix of the container as long as it covers chunk `i`.
/// The result is a slice of the (compressed, if enabled) body.
pub fn decrypt_chunk(bytes: &[u8], key: &ContentKey, i: usize) -> SmsgResult<Vec<u8>> {
    let index = key
        .index
        .as_ref()
        .ok_or_else(|| payload("container is not chunked"))?;
    let envelope = Envelope::decode(bytes, MAGIC)?;
    Ok(stream::decrypt_chunk(envelope.payload, &key.cek, index, i)?)
}
