//! Layered settings: `vessel.toml` overridden by `VESSEL_*` environment variables
//!
//! Nested keys use `__` in the environment, e.g. `VESSEL_SMSG__CHUNK_SIZE=65536`
//! or `VESSEL_STORE__BACKEND=local`.

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

use crate::compression::Compression;
use crate::keys::Cadence;

/// Default settings file name, looked up in the working directory
pub const SETTINGS_FILE: &str = "vessel.toml";

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub smsg: SmsgSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

/// Defaults for new secure messages
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SmsgSettings {
    /// "v1", "v2" or "v3"
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub compression: Compression,
    /// Chunk size for v3 streams; unset means a single sealed payload
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub cadence: Cadence,
}

impl Default for SmsgSettings {
    fn default() -> Self {
        Self {
            format: default_format(),
            compression: Compression::default(),
            chunk_size: None,
            cadence: Cadence::default(),
        }
    }
}

/// Where encrypted containers are cached
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreSettings {
    /// "memory" or "local"
    #[serde(default = "default_backend")]
    pub backend: String,
    pub local_path: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local_path: None,
        }
    }
}

fn default_format() -> String {
    "v2".into()
}

fn default_backend() -> String {
    "memory".into()
}

impl Settings {
    /// Settings file plus environment.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(SETTINGS_FILE))
            .merge(Env::prefixed("VESSEL_").split("__"))
    }

    pub fn load() -> figment::Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> figment::Result<Self> {
        figment.extract()
    }
}
