//! Public manifest embedded in the container header
//!
//! Anyone holding the container can read the manifest; no key is needed.
//! License expiry is advisory metadata checked against the reader's clock,
//! it is not enforced cryptographically.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    #[default]
    Perpetual,
    Rental,
    Stream,
    Preview,
}

impl LicenseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseType::Perpetual => "perpetual",
            LicenseType::Rental => "rental",
            LicenseType::Stream => "stream",
            LicenseType::Preview => "preview",
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// License terms. Timestamps are Unix seconds; `expires_at == 0` never expires.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    #[serde(default)]
    pub issued_at: i64,
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub license_type: LicenseType,
}

impl License {
    pub fn perpetual() -> Self {
        Self::issued_at(LicenseType::Perpetual, Utc::now(), None)
    }

    pub fn rental(duration: Duration) -> Self {
        Self::issued_at(LicenseType::Rental, Utc::now(), Some(duration))
    }

    pub fn preview(duration: Duration) -> Self {
        Self::issued_at(LicenseType::Preview, Utc::now(), Some(duration))
    }

    pub fn stream(duration: Duration) -> Self {
        Self::issued_at(LicenseType::Stream, Utc::now(), Some(duration))
    }

    /// License issued at `now`, expiring `duration` later (never, if `None`).
    pub fn issued_at(license_type: LicenseType, now: DateTime<Utc>, duration: Option<Duration>) -> Self {
        Self {
            issued_at: now.timestamp(),
            expires_at: duration.map_or(0, |d| (now + d).timestamp()),
            license_type,
        }
    }

    pub fn is_perpetual(&self) -> bool {
        self.expires_at == 0
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_perpetual() || now.timestamp() < self.expires_at
    }

    /// Time left before expiry; `None` for perpetual licenses, zero once expired.
    pub fn time_remaining_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.is_perpetual() {
            return None;
        }
        Some(Duration::seconds((self.expires_at - now.timestamp()).max(0)))
    }
}

/// A marker inside the content (chapter, track, cue). Offsets in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(default)]
    pub title: String,
    pub start: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub track_type: String,
}

/// Publicly readable description of a container.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artist: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub album: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release_type: String,
    #[serde(default)]
    pub license: License,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<Track>,
    /// Platform name → URL
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            license: License::perpetual(),
            ..Default::default()
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    pub fn with_license(mut self, license: License) -> Self {
        self.license = license;
        self
    }

    pub fn with_track(mut self, title: impl Into<String>, start: f64, end: Option<f64>, track_type: impl Into<String>) -> Self {
        self.tracks.push(Track {
            title: title.into(),
            start,
            end,
            track_type: track_type.into(),
        });
        self
    }

    pub fn with_link(mut self, platform: impl Into<String>, url: impl Into<String>) -> Self {
        self.links.insert(platform.into(), url.into());
        self
    }

    pub fn is_license_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.license.is_valid_at(now)
    }
}
