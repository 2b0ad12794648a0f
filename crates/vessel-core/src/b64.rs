//! Serde helpers for byte fields carried as base64 strings in JSON headers.
//!
//! Use with `#[serde(with = "vessel_core::b64")]`.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    BASE64.decode(s.as_bytes()).map_err(D::Error::custom)
}

/// Encode bytes as standard base64.
pub fn encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode standard base64.
pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(s.as_bytes())
}
