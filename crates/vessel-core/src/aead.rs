//! Self-contained XChaCha20-Poly1305 records
//!
//! Every sealed record carries its own nonce: `nonce(24) || ciphertext || tag(16)`.
//! Nothing besides the key is needed to open one.

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::{RngCore, rngs::OsRng};
use zeroize::Zeroizing;

use crate::error::{CoreError, CoreResult};

/// Symmetric key size (256-bit)
pub const KEY_SIZE: usize = 32;
/// XChaCha20 extended nonce (192-bit, safe for random generation)
pub const NONCE_SIZE: usize = 24;
/// Poly1305 tag
pub const TAG_SIZE: usize = 16;
/// Bytes a sealed record adds on top of its plaintext
pub const SEAL_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Algorithm identifier recorded in container headers
pub const ALGORITHM: &str = "xchacha20-poly1305";

/// A 256-bit key that is scrubbed from memory on drop.
pub type SymmetricKey = Zeroizing<[u8; KEY_SIZE]>;

/// Generate a fresh random key (used for content encryption keys).
pub fn generate_key() -> SymmetricKey {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng.fill_bytes(key.as_mut());
    key
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> CoreResult<Vec<u8>> {
    seal_with_aad(key, plaintext, &[])
}

/// Encrypt with associated data bound into the tag.
pub fn seal_with_aad(key: &[u8; KEY_SIZE], plaintext: &[u8], aad: &[u8]) -> CoreResult<Vec<u8>> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CoreError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a record produced by [`seal`].
///
/// Authentication failure is always `DecryptionFailed`, whatever the cause.
pub fn open(key: &[u8; KEY_SIZE], sealed: &[u8]) -> CoreResult<Vec<u8>> {
    open_with_aad(key, sealed, &[])
}

/// Decrypt a record produced by [`seal_with_aad`] with the same `aad`.
pub fn open_with_aad(key: &[u8; KEY_SIZE], sealed: &[u8], aad: &[u8]) -> CoreResult<Vec<u8>> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(CoreError::payload(format!(
            "sealed record too short: {} < {}",
            sealed.len(),
            SEAL_OVERHEAD
        )));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CoreError::DecryptionFailed)
}
