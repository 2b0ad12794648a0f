//! Public SMSG header and its validation

use std::fmt;

use serde::{Deserialize, Serialize};
use vessel_core::envelope::Envelope;
use vessel_core::{ALGORITHM, Cadence, ChunkIndex, Compression, CoreError, WrappedKey};

use crate::error::{SmsgResult, payload};
use crate::manifest::Manifest;

/// Payload layout variants sharing the SMSG envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatVersion {
    /// JSON message, base64 attachments, password key
    V1,
    /// Binary body, optional compression, password key
    #[default]
    V2,
    /// Binary body under a random CEK wrapped by rolling stream keys,
    /// optionally chunked
    V3,
}

impl FormatVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatVersion::V1 => "v1",
            FormatVersion::V2 => "v2",
            FormatVersion::V3 => "v3",
        }
    }

    /// Unknown formats are rejected, never guessed.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "v1" => Ok(FormatVersion::V1),
            "v2" => Ok(FormatVersion::V2),
            "v3" => Ok(FormatVersion::V3),
            other => Err(CoreError::InvalidFormatVersion(other.to_string())),
        }
    }

    pub fn key_method(&self) -> KeyMethod {
        match self {
            FormatVersion::V1 | FormatVersion::V2 => KeyMethod::Direct,
            FormatVersion::V3 => KeyMethod::Rolling,
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMethod {
    /// Payload key derived straight from the password
    Direct,
    /// Random CEK wrapped under per-period stream keys
    Rolling,
}

/// Header fields of an SMSG container. Always readable without a key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsgHeader {
    pub format: FormatVersion,
    pub algorithm: String,
    #[serde(default)]
    pub compression: Compression,
    pub key_method: KeyMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence: Option<Cadence>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wrapped_keys: Vec<WrappedKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunked: Option<ChunkIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
    /// Unix seconds
    #[serde(default)]
    pub created_at: i64,
}

impl SmsgHeader {
    pub(crate) fn new(format: FormatVersion, created_at: i64) -> Self {
        Self {
            format,
            algorithm: ALGORITHM.to_string(),
            compression: Compression::None,
            key_method: format.key_method(),
            cadence: None,
            wrapped_keys: Vec::new(),
            chunked: None,
            manifest: None,
            created_at,
        }
    }

    /// Parse and validate the header of a decoded envelope.
    ///
    /// The format discriminator and compression kind are checked before the
    /// rest of the header so that unknown values surface as
    /// `InvalidFormatVersion` / `UnsupportedCompression`.
    pub fn from_envelope(envelope: &Envelope<'_>) -> SmsgResult<Self> {
        match envelope.header.get("format").and_then(|v| v.as_str()) {
            Some(s) => FormatVersion::parse(s)?,
            None => return Err(payload("header has no format")),
        };
        if let Some(kind) = envelope.header.get("compression").and_then(|v| v.as_str()) {
            Compression::parse(kind)?;
        }

        let header: SmsgHeader = envelope.header_as()?;
        header.validate()?;
        Ok(header)
    }

    /// Cross-field consistency checks.
    pub fn validate(&self) -> SmsgResult<()> {
        if self.algorithm != ALGORITHM {
            return Err(CoreError::InvalidFormatVersion(format!("algorithm {}", self.algorithm)).into());
        }
        if self.key_method != self.format.key_method() {
            return Err(payload(format!(
                "key method {:?} does not match format {}",
                self.key_method, self.format
            )));
        }
        match self.format {
            FormatVersion::V1 => {
                if self.compression != Compression::None {
                    return Err(payload("v1 containers are never compressed"));
                }
                if self.chunked.is_some() {
                    return Err(payload("v1 containers are never chunked"));
                }
            }
            FormatVersion::V2 => {
                if self.chunked.is_some() {
                    return Err(payload("v2 containers are never chunked"));
                }
            }
            FormatVersion::V3 => {
                if self.cadence.is_none() {
                    return Err(payload("v3 header has no cadence"));
                }
                if self.wrapped_keys.is_empty() {
                    return Err(payload("v3 header has no wrapped keys"));
                }
            }
        }
        Ok(())
    }

    pub fn is_chunked(&self) -> bool {
        self.chunked.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SmsgError;
    use serde_json::json;
    use vessel_core::envelope::{encode, to_header};

    fn envelope_bytes(header: serde_json::Value) -> Vec<u8> {
        encode(b"SMSG", &to_header(&header).unwrap(), b"").unwrap()
    }

    fn parse(header: serde_json::Value) -> SmsgResult<SmsgHeader> {
        let bytes = envelope_bytes(header);
        SmsgHeader::from_envelope(&Envelope::decode(&bytes, b"SMSG").unwrap())
    }

    #[test]
    fn test_camel_case_fields() {
        let mut header = SmsgHeader::new(FormatVersion::V3, 7);
        header.cadence = Some(Cadence::HalfDay);
        let json = serde_json::to_value(&header).unwrap();
        assert_eq!(json["format"], "v3");
        assert_eq!(json["keyMethod"], "rolling");
        assert_eq!(json["cadence"], "half-day");
        assert_eq!(json["compression"], "none");
        assert_eq!(json["createdAt"], 7);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result = parse(json!({"format": "v9", "algorithm": ALGORITHM, "keyMethod": "direct"}));
        assert!(matches!(
            result,
            Err(SmsgError::Core(CoreError::InvalidFormatVersion(v))) if v == "v9"
        ));
    }

    #[test]
    fn test_unknown_compression_rejected() {
        let result = parse(json!({
            "format": "v2", "algorithm": ALGORITHM, "keyMethod": "direct", "compression": "lz4"
        }));
        assert!(matches!(
            result,
            Err(SmsgError::Core(CoreError::UnsupportedCompression(_)))
        ));
    }

    #[test]
    fn test_empty_compression_rejected() {
        let result = parse(json!({
            "format": "v2", "algorithm": ALGORITHM, "keyMethod": "direct", "compression": ""
        }));
        assert!(matches!(
            result,
            Err(SmsgError::Core(CoreError::UnsupportedCompression(k))) if k.is_empty()
        ));
    }

    #[test]
    fn test_missing_format_is_invalid_payload() {
        let result = parse(json!({"algorithm": ALGORITHM}));
        assert!(matches!(result, Err(SmsgError::Core(CoreError::InvalidPayload(_)))));
    }

    #[test]
    fn test_inconsistent_key_method() {
        let result = parse(json!({"format": "v1", "algorithm": ALGORITHM, "keyMethod": "rolling"}));
        assert!(matches!(result, Err(SmsgError::Core(CoreError::InvalidPayload(_)))));
    }

    #[test]
    fn test_v3_requires_wrapped_keys() {
        let result = parse(json!({
            "format": "v3", "algorithm": ALGORITHM, "keyMethod": "rolling", "cadence": "daily"
        }));
        assert!(matches!(result, Err(SmsgError::Core(CoreError::InvalidPayload(_)))));
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let result = parse(json!({"format": "v2", "algorithm": "rot13", "keyMethod": "direct"}));
        assert!(matches!(
            result,
            Err(SmsgError::Core(CoreError::InvalidFormatVersion(_)))
        ));
    }

    #[test]
    fn test_additional_fields_tolerated() {
        let header = parse(json!({
            "format": "v2", "algorithm": ALGORITHM, "keyMethod": "direct",
            "compression": "zstd", "publisherNote": "hello"
        }))
        .unwrap();
        assert_eq!(header.compression, Compression::Zstd);
    }
}
