//! Key derivation and rolling key wrapping
//!
//! Two key models:
//!
//! - **Direct**: `derive_key(password)` is used as the payload key (v1/v2
//!   messages, encrypted bundles).
//! - **Rolling**: a random content key (CEK) encrypts the payload and is
//!   stored only wrapped under stream keys derived from
//!   `(period, license, fingerprint)`. Each container carries wraps for the
//!   current and the next period, so it stays decryptable across one bucket
//!   boundary and a little clock skew.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::aead::{self, KEY_SIZE, SymmetricKey};
use crate::error::{CoreError, CoreResult};

/// Derive the payload key for a password.
///
/// No salt is mixed in. The password doubles as a shareable license that
/// must produce the same key on every machine without a server, which
/// rules out per-container salts. The price is weaker resistance to offline
/// guessing of short passwords.
pub fn derive_key(password: &str) -> CoreResult<SymmetricKey> {
    if password.is_empty() {
        return Err(CoreError::PasswordRequired);
    }
    Ok(Zeroizing::new(*blake3::hash(password.as_bytes()).as_bytes()))
}

/// Hash `input` followed by a reversed, character-substituted copy of itself.
///
/// The appended copy means the digest cannot be produced from a guessed
/// prefix (for example a period label) without the exact full input.
pub fn rolling_hash(input: &[u8]) -> [u8; 32] {
    let transposed: Zeroizing<Vec<u8>> =
        Zeroizing::new(input.iter().rev().map(|&b| substitute(b)).collect());

    let mut hasher = blake3::Hasher::new();
    hasher.update(input);
    hasher.update(&transposed);
    *hasher.finalize().as_bytes()
}

fn substitute(b: u8) -> u8 {
    match b {
        b'o' => b'0',
        b'l' => b'1',
        b'e' => b'3',
        b'a' => b'4',
        b's' => b'z',
        b't' => b'7',
        b'0' => b'o',
        b'1' => b'l',
        b'3' => b'e',
        b'4' => b'a',
        b'z' => b's',
        b'7' => b't',
        other => other,
    }
}

/// Derive the key that wraps a CEK for one period.
pub fn derive_stream_key(period: &str, license: &str, fingerprint: &str) -> CoreResult<SymmetricKey> {
    if license.is_empty() {
        return Err(CoreError::LicenseRequired);
    }
    let input = Zeroizing::new(format!("{period}:{license}:{fingerprint}"));
    Ok(Zeroizing::new(rolling_hash(input.as_bytes())))
}

/// Encrypt a content key under a stream key. Output is a sealed record.
pub fn wrap_key(cek: &[u8; KEY_SIZE], stream_key: &[u8; KEY_SIZE]) -> CoreResult<Vec<u8>> {
    aead::seal(stream_key, cek)
}

/// Inverse of [`wrap_key`]. Wrong period, license or fingerprint all surface
/// as `DecryptionFailed`.
pub fn unwrap_key(wrapped: &[u8], stream_key: &[u8; KEY_SIZE]) -> CoreResult<SymmetricKey> {
    let plain = Zeroizing::new(aead::open(stream_key, wrapped)?);
    let mut cek = Zeroizing::new([0u8; KEY_SIZE]);
    if plain.len() != KEY_SIZE {
        return Err(CoreError::DecryptionFailed);
    }
    cek.copy_from_slice(&plain);
    Ok(cek)
}

/// Time bucket granularity at which stream keys rotate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cadence {
    #[default]
    Daily,
    HalfDay,
    QuarterDay,
    Hourly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::HalfDay => "half-day",
            Cadence::QuarterDay => "quarter-day",
            Cadence::Hourly => "hourly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Some(Cadence::Daily),
            "half-day" | "halfday" => Some(Cadence::HalfDay),
            "quarter-day" | "quarterday" => Some(Cadence::QuarterDay),
            "hourly" => Some(Cadence::Hourly),
            _ => None,
        }
    }

    /// Length of one bucket in hours. Always divides 24.
    pub fn bucket_hours(&self) -> u32 {
        match self {
            Cadence::Daily => 24,
            Cadence::HalfDay => 12,
            Cadence::QuarterDay => 6,
            Cadence::Hourly => 1,
        }
    }

    fn bucket(&self) -> Duration {
        Duration::hours(i64::from(self.bucket_hours()))
    }

    /// Start of the bucket containing `t`.
    pub fn bucket_start(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let hour = t.hour() - t.hour() % self.bucket_hours();
        t.date_naive()
            .and_hms_opt(hour, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(t)
    }

    /// Label of the bucket containing `t`.
    pub fn period_at(&self, t: DateTime<Utc>) -> String {
        let start = self.bucket_start(t);
        let date = start.format("%Y-%m-%d");
        match self {
            Cadence::Daily => date.to_string(),
            Cadence::HalfDay => {
                let half = if start.hour() < 12 { "AM" } else { "PM" };
                format!("{date}-{half}")
            }
            Cadence::QuarterDay => format!("{date}-Q{}", start.hour() / 6),
            Cadence::Hourly => format!("{date}T{:02}", start.hour()),
        }
    }

    /// Label of the bucket after the one containing `t`.
    pub fn next_period_at(&self, t: DateTime<Utc>) -> String {
        self.period_at(self.bucket_start(t) + self.bucket())
    }

    /// Start time of the bucket named by `label`, if it is a label of this cadence.
    pub fn parse_period(&self, label: &str) -> Option<DateTime<Utc>> {
        let (date, hour) = match self {
            Cadence::Daily => (label, 0),
            Cadence::HalfDay => {
                let (date, half) = label.rsplit_once('-')?;
                let hour = match half {
                    "AM" => 0,
                    "PM" => 12,
                    _ => return None,
                };
                (date, hour)
            }
            Cadence::QuarterDay => {
                let (date, quarter) = label.rsplit_once("-Q")?;
                let quarter: u32 = quarter.parse().ok()?;
                if quarter > 3 {
                    return None;
                }
                (date, quarter * 6)
            }
            Cadence::Hourly => {
                let (date, hour) = label.split_once('T')?;
                let hour: u32 = hour.parse().ok()?;
                (date, hour)
            }
        };
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        date.and_hms_opt(hour, 0, 0).map(|naive| naive.and_utc())
    }

    /// Label of the bucket following `label`.
    pub fn next_period(&self, label: &str) -> Option<String> {
        self.parse_period(label)
            .map(|start| self.period_at(start + self.bucket()))
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CEK wrapped for one period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    pub period: String,
    #[serde(with = "crate::b64")]
    pub wrapped: Vec<u8>,
}

/// Wrap `cek` once per period label.
pub fn wrap_for_periods(
    cek: &[u8; KEY_SIZE],
    license: &str,
    fingerprint: &str,
    periods: &[String],
) -> CoreResult<Vec<WrappedKey>> {
    periods
        .iter()
        .map(|period| {
            let stream_key = derive_stream_key(period, license, fingerprint)?;
            Ok(WrappedKey {
                period: period.clone(),
                wrapped: wrap_key(cek, &stream_key)?,
            })
        })
        .collect()
}

/// Wrap `cek` for the period containing `now` and the one after it.
pub fn wrap_for_window(
    cek: &[u8; KEY_SIZE],
    license: &str,
    fingerprint: &str,
    cadence: Cadence,
    now: DateTime<Utc>,
) -> CoreResult<Vec<WrappedKey>> {
    let periods = [cadence.period_at(now), cadence.next_period_at(now)];
    debug!(cadence = %cadence, current = %periods[0], next = %periods[1], "wrapping content key");
    wrap_for_periods(cek, license, fingerprint, &periods)
}

/// Try each candidate period in order against the stored wraps.
///
/// A candidate with no stored entry is skipped. If at least one entry was
/// tried and none authenticated, the credentials are wrong
/// (`DecryptionFailed`). If no candidate had an entry at all, the container
/// is outside every window (`NoValidKeyForPeriod`).
pub fn unwrap_for_periods(
    entries: &[WrappedKey],
    license: &str,
    fingerprint: &str,
    candidates: &[String],
) -> CoreResult<SymmetricKey> {
    if license.is_empty() {
        return Err(CoreError::LicenseRequired);
    }

    let mut attempted = false;
    for period in candidates {
        for entry in entries.iter().filter(|e| &e.period == period) {
            attempted = true;
            let stream_key = derive_stream_key(period, license, fingerprint)?;
            match unwrap_key(&entry.wrapped, &stream_key) {
                Ok(cek) => {
                    trace!(period = %period, "content key unwrapped");
                    return Ok(cek);
                }
                Err(CoreError::DecryptionFailed) | Err(CoreError::InvalidPayload(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    if attempted {
        Err(CoreError::DecryptionFailed)
    } else {
        Err(CoreError::NoValidKeyForPeriod)
    }
}

/// Unwrap using the period containing `now`, then the next one.
pub fn unwrap_from_window(
    entries: &[WrappedKey],
    license: &str,
    fingerprint: &str,
    cadence: Cadence,
    now: DateTime<Utc>,
) -> CoreResult<SymmetricKey> {
    let candidates = [cadence.period_at(now), cadence.next_period_at(now)];
    unwrap_for_periods(entries, license, fingerprint, &candidates)
}
