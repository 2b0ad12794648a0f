//! Container envelope: magic + versioned, length-prefixed JSON header + payload
//!
//! Layout:
//! ```text
//! MAGIC[4] | VERSION u8 | HEADER_LEN u32 LE | HEADER (JSON object) | PAYLOAD ...
//! ```
//!
//! The header is public metadata and is always readable without a key. The
//! payload runs to the end of the buffer and is handed back untouched.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// Envelope framing version
pub const ENVELOPE_VERSION: u8 = 1;

/// Upper bound on the header length prefix
pub const MAX_HEADER_LEN: usize = 16 * 1024 * 1024;

const PREFIX_LEN: usize = 4 + 1 + 4;

/// Self-describing header map
pub type Header = Map<String, Value>;

/// A decoded envelope borrowing its payload from the input buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope<'a> {
    pub magic: [u8; 4],
    pub version: u8,
    pub header: Header,
    pub payload: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Parse `bytes`, requiring `expected_magic`.
    ///
    /// The header is parsed eagerly; the payload is not inspected.
    pub fn decode(bytes: &'a [u8], expected_magic: &[u8; 4]) -> CoreResult<Self> {
        if bytes.len() < 4 || &bytes[0..4] != expected_magic {
            return Err(CoreError::InvalidMagic {
                expected: *expected_magic,
                found: bytes[..bytes.len().min(4)].to_vec(),
            });
        }
        if bytes.len() < PREFIX_LEN {
            return Err(CoreError::payload("envelope truncated before header length"));
        }

        let version = bytes[4];
        if version != ENVELOPE_VERSION {
            return Err(CoreError::InvalidFormatVersion(format!(
                "envelope version {version}"
            )));
        }

        let header_len = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
        if header_len > MAX_HEADER_LEN {
            return Err(CoreError::payload(format!(
                "header length {header_len} exceeds limit {MAX_HEADER_LEN}"
            )));
        }
        let header_end = PREFIX_LEN
            .checked_add(header_len)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| CoreError::payload("envelope truncated inside header"))?;

        let header = match serde_json::from_slice::<Value>(&bytes[PREFIX_LEN..header_end]) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(CoreError::payload("header is not a JSON object")),
            Err(e) => return Err(CoreError::payload(format!("header JSON: {e}"))),
        };

        Ok(Self {
            magic: *expected_magic,
            version,
            header,
            payload: &bytes[header_end..],
        })
    }

    /// Deserialize the header map into a typed header.
    ///
    /// Fields the type does not know are ignored.
    pub fn header_as<T: DeserializeOwned>(&self) -> CoreResult<T> {
        serde_json::from_value(Value::Object(self.header.clone()))
            .map_err(|e| CoreError::payload(format!("header fields: {e}")))
    }
}

/// Frame `header` and `payload` under `magic`.
pub fn encode(magic: &[u8; 4], header: &Header, payload: &[u8]) -> CoreResult<Vec<u8>> {
    let header_bytes =
        serde_json::to_vec(header).map_err(|e| CoreError::Encoding(e.to_string()))?;
    if header_bytes.len() > MAX_HEADER_LEN {
        return Err(CoreError::Encoding(format!(
            "header length {} exceeds limit {MAX_HEADER_LEN}",
            header_bytes.len()
        )));
    }

    let mut out = Vec::with_capacity(PREFIX_LEN + header_bytes.len() + payload.len());
    out.extend_from_slice(magic);
    out.push(ENVELOPE_VERSION);
    out.extend((header_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Convert a typed header into the envelope's map representation.
pub fn to_header<T: Serialize>(value: &T) -> CoreResult<Header> {
    match serde_json::to_value(value).map_err(|e| CoreError::Encoding(e.to_string()))? {
        Value::Object(map) => Ok(map),
        _ => Err(CoreError::Encoding("header must serialize to an object".into())),
    }
}

/// First four bytes of a buffer, if present.
pub fn peek_magic(bytes: &[u8]) -> Option<[u8; 4]> {
    bytes.get(0..4)?.try_into().ok()
}
