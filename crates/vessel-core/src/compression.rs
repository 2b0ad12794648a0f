//! Payload compression applied before encryption

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

const ZSTD_LEVEL: i32 = 3;

/// Compression kinds recorded in container headers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Zstd,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Zstd => "zstd",
        }
    }

    /// Parse a header value. Unknown kinds are a hard error.
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "none" => Ok(Compression::None),
            "zstd" => Ok(Compression::Zstd),
            other => Err(CoreError::UnsupportedCompression(other.to_string())),
        }
    }

    pub fn compress(&self, data: &[u8]) -> CoreResult<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Zstd => {
                zstd::encode_all(data, ZSTD_LEVEL).map_err(|e| CoreError::Encoding(e.to_string()))
            }
        }
    }

    /// Decompress authenticated plaintext. Failure here means the sender
    /// produced garbage, so it is reported as a structural error.
    pub fn decompress(&self, data: &[u8]) -> CoreResult<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Zstd => zstd::decode_all(data)
                .map_err(|e| CoreError::payload(format!("zstd decode: {e}"))),
        }
    }
}

impl FromStr for Compression {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Compression::parse(s)
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
