//! Chunked payload encryption for seekable, partially decryptable streams
//!
//! The plaintext is split into fixed-size chunks and each chunk is sealed
//! on its own (fresh nonce, same CEK). An index of `{offset, size}` records
//! lets a reader fetch and open any chunk without touching the others.
//!
//! Each record's tag also covers its position (`index || count`), so chunks
//! cannot be reordered or dropped by editing the public index.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::aead::{self, KEY_SIZE, SEAL_OVERHEAD};
use crate::cancel::CancelToken;
use crate::error::{CoreError, CoreResult};

/// Default chunk size: 1 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Location of one sealed chunk record inside the payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub offset: u64,
    pub size: u64,
}

/// Index for a chunked payload, stored in the public header
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkIndex {
    /// Plaintext bytes per chunk (the last chunk may be shorter)
    pub chunk_size: u64,
    /// Total plaintext size
    pub total_size: u64,
    /// Ordered chunk records
    pub chunks: Vec<ChunkRef>,
}

impl ChunkIndex {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Plaintext byte range covered by chunk `i`.
    pub fn plaintext_range(&self, i: usize) -> Option<Range<u64>> {
        if i >= self.chunks.len() {
            return None;
        }
        let start = self.chunk_size.checked_mul(i as u64)?;
        let end = start.saturating_add(self.chunk_size).min(self.total_size);
        Some(start..end)
    }

    /// Chunk holding plaintext byte `offset` (for range requests).
    pub fn chunk_for_offset(&self, offset: u64) -> Option<usize> {
        if self.chunk_size == 0 || offset >= self.total_size {
            return None;
        }
        Some((offset / self.chunk_size) as usize)
    }

    /// Check the index is internally consistent and fits in `payload_len`.
    pub fn validate(&self, payload_len: usize) -> CoreResult<()> {
        if self.chunk_size == 0 {
            return Err(CoreError::payload("chunk size is zero"));
        }
        let expected = self.total_size.div_ceil(self.chunk_size);
        if expected != self.chunks.len() as u64 {
            return Err(CoreError::payload(format!(
                "chunk count {} does not cover {} bytes",
                self.chunks.len(),
                self.total_size
            )));
        }
        let overhead = (self.chunks.len() as u64).checked_mul(SEAL_OVERHEAD as u64);
        let needed = overhead.and_then(|o| o.checked_add(self.total_size));
        if needed.is_none_or(|n| n > payload_len as u64) {
            return Err(CoreError::payload(format!(
                "index describes {} plaintext bytes, payload holds {payload_len}",
                self.total_size
            )));
        }
        for (i, chunk) in self.chunks.iter().enumerate() {
            let plain = self.plaintext_range(i).map_or(0, |r| r.end - r.start);
            if chunk.size != plain + SEAL_OVERHEAD as u64 {
                return Err(CoreError::payload(format!(
                    "chunk {i} record is {} bytes, expected {}",
                    chunk.size,
                    plain + SEAL_OVERHEAD as u64
                )));
            }
            self.record_range(i, chunk, payload_len)?;
        }
        Ok(())
    }

    fn record_range(&self, i: usize, chunk: &ChunkRef, payload_len: usize) -> CoreResult<Range<usize>> {
        let start = usize::try_from(chunk.offset)
            .map_err(|_| CoreError::payload(format!("chunk {i} offset overflow")))?;
        let size = usize::try_from(chunk.size)
            .map_err(|_| CoreError::payload(format!("chunk {i} size overflow")))?;
        let end = start
            .checked_add(size)
            .filter(|end| *end <= payload_len)
            .ok_or_else(|| CoreError::payload(format!("chunk {i} lies outside the payload")))?;
        Ok(start..end)
    }
}

fn chunk_aad(i: usize, count: usize) -> [u8; 16] {
    let mut aad = [0u8; 16];
    aad[..8].copy_from_slice(&(i as u64).to_le_bytes());
    aad[8..].copy_from_slice(&(count as u64).to_le_bytes());
    aad
}

/// Split `plaintext` into `chunk_size` pieces and seal each under `cek`.
///
/// Returns the concatenated records and their index.
#[instrument(skip_all, fields(len = plaintext.len(), chunk_size = chunk_size))]
pub fn encrypt_chunked(
    plaintext: &[u8],
    cek: &[u8; KEY_SIZE],
    chunk_size: usize,
    cancel: &CancelToken,
) -> CoreResult<(Vec<u8>, ChunkIndex)> {
    if chunk_size == 0 {
        return Err(CoreError::payload("chunk size is zero"));
    }

    let count = plaintext.len().div_ceil(chunk_size);
    let mut payload = Vec::with_capacity(plaintext.len() + count * SEAL_OVERHEAD);
    let mut chunks = Vec::with_capacity(count);

    for (i, piece) in plaintext.chunks(chunk_size).enumerate() {
        cancel.check()?;
        let record = aead::seal_with_aad(cek, piece, &chunk_aad(i, count))?;
        chunks.push(ChunkRef {
            offset: payload.len() as u64,
            size: record.len() as u64,
        });
        payload.extend_from_slice(&record);
    }

    debug!(chunks = chunks.len(), "payload chunked");
    Ok((
        payload,
        ChunkIndex {
            chunk_size: chunk_size as u64,
            total_size: plaintext.len() as u64,
            chunks,
        },
    ))
}

/// Open chunk `i` alone. Other chunks need not be present or valid.
///
/// `payload` must be laid out as the index says; a partially downloaded
/// payload works as long as it reaches the end of chunk `i`.
pub fn decrypt_chunk(
    payload: &[u8],
    cek: &[u8; KEY_SIZE],
    index: &ChunkIndex,
    i: usize,
) -> CoreResult<Vec<u8>> {
    let chunk = index
        .chunks
        .get(i)
        .ok_or_else(|| CoreError::payload(format!("chunk {i} out of range ({})", index.len())))?;
    let range = index.record_range(i, chunk, payload.len())?;
    let plain = aead::open_with_aad(cek, &payload[range], &chunk_aad(i, index.len()))?;

    let expected = index
        .plaintext_range(i)
        .map(|r| r.end - r.start)
        .unwrap_or_default();
    if plain.len() as u64 != expected {
        return Err(CoreError::payload(format!(
            "chunk {i} holds {} bytes, index expects {expected}",
            plain.len()
        )));
    }
    Ok(plain)
}

/// Open every chunk in order and reassemble the plaintext.
#[instrument(skip_all, fields(chunks = index.len()))]
pub fn decrypt_chunks(
    payload: &[u8],
    cek: &[u8; KEY_SIZE],
    index: &ChunkIndex,
    cancel: &CancelToken,
) -> CoreResult<Vec<u8>> {
    index.validate(payload.len())?;

    let mut plaintext = Vec::with_capacity(payload.len());
    for i in 0..index.len() {
        cancel.check()?;
        plaintext.extend_from_slice(&decrypt_chunk(payload, cek, index, i)?);
    }

    if plaintext.len() as u64 != index.total_size {
        return Err(CoreError::payload("reassembled size does not match index"));
    }
    Ok(plaintext)
}
