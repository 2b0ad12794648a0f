//! Bundle model and its plain (tar) and encrypted (`STIM`) encodings
//!
//! Tar layout:
//! ```text
//! config.json
//! rootfs/<path>...
//! ```
//!
//! Encrypted payload, inside a `STIM` envelope:
//! ```text
//! CONFIG_CT_LEN u32 LE | sealed(config) | sealed(tar(rootfs))
//! ```
//! Both records are sealed under the same password-derived key. The header
//! records both record sizes so the layout can be checked before anything
//! is decrypted.

use std::fs;
use std::path::Path;

use ::tar::Builder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};
use vessel_core::aead::{self, SEAL_OVERHEAD};
use vessel_core::envelope::{self, Envelope};
use vessel_core::{ALGORITHM, CancelToken, CoreError, derive_key};
use vessel_vfs::{Vfs, tar};

use crate::error::{BundleError, BundleResult};
use crate::runtime::Runtime;

/// Envelope magic for encrypted bundles
pub const MAGIC: &[u8; 4] = b"STIM";
/// Header `format` value for encrypted bundles
pub const FORMAT: &str = "stim";
pub const CONFIG_FILE: &str = "config.json";
pub const ROOTFS_DIR: &str = "rootfs";

/// Mode for files unpacked by [`Bundle::write_to_dir`]
const UNPACK_MODE: u32 = 0o644;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StimHeader {
    format: String,
    algorithm: String,
    config_size: u64,
    rootfs_size: u64,
}

/// A runnable bundle: runtime configuration plus a root filesystem.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bundle {
    /// Runtime configuration bytes (typically an OCI `config.json`).
    /// Must be set before the bundle is serialized.
    pub config: Option<Vec<u8>>,
    pub rootfs: Vfs,
}

impl Bundle {
    pub fn new(config: impl Into<Vec<u8>>, rootfs: Vfs) -> Self {
        Self {
            config: Some(config.into()),
            rootfs,
        }
    }

    /// Wrap `rootfs` with [`default_config`](Self::default_config).
    pub fn from_vfs(rootfs: Vfs) -> BundleResult<Self> {
        Ok(Self::new(Self::default_config()?, rootfs))
    }

    /// Minimal runtime spec running `sh` in a read-only `rootfs`.
    pub fn default_config() -> BundleResult<Vec<u8>> {
        let config = json!({
            "ociVersion": "1.0.2",
            "process": {
                "terminal": false,
                "user": { "uid": 0, "gid": 0 },
                "args": ["sh"],
                "env": [
                    "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin",
                    "TERM=xterm"
                ],
                "cwd": "/"
            },
            "root": { "path": ROOTFS_DIR, "readonly": true },
            "hostname": "vessel"
        });
        serde_json::to_vec_pretty(&config).map_err(|e| CoreError::Encoding(e.to_string()).into())
    }

    fn config_bytes(&self) -> BundleResult<&[u8]> {
        self.config.as_deref().ok_or(BundleError::ConfigMissing)
    }

    /// Serialize as a tar archive with `config.json` at the root.
    pub fn to_tar(&self) -> BundleResult<Vec<u8>> {
        self.to_tar_cancellable(&CancelToken::new())
    }

    pub fn to_tar_cancellable(&self, cancel: &CancelToken) -> BundleResult<Vec<u8>> {
        let config = self.config_bytes()?;
        let mut builder = Builder::new(Vec::new());
        tar::append_file(&mut builder, CONFIG_FILE, config, 0)?;
        tar::append_vfs(&mut builder, &self.rootfs, &format!("{ROOTFS_DIR}/"), cancel)?;
        Ok(builder.into_inner()?)
    }

    /// Parse a tar archive produced by [`to_tar`](Self::to_tar).
    ///
    /// Entries outside `config.json` and `rootfs/` are ignored.
    pub fn from_tar(bytes: &[u8]) -> BundleResult<Self> {
        let mut all = tar::from_tar(bytes)?;
        let config = all.remove(CONFIG_FILE).ok_or(BundleError::ConfigMissing)?;
        Ok(Self {
            config: Some(config.content),
            rootfs: all.sub_vfs(ROOTFS_DIR),
        })
    }

    /// Encrypt config and rootfs as two records under `derive_key(password)`.
    #[instrument(skip_all, fields(files = self.rootfs.len()))]
    pub fn to_encrypted(&self, password: &str) -> BundleResult<Vec<u8>> {
        let key = derive_key(password)?;
        let config = self.config_bytes()?;

        let config_ct = aead::seal(&key, config)?;
        let rootfs_ct = aead::seal(&key, &tar::to_tar(&self.rootfs)?)?;
        let config_len = u32::try_from(config_ct.len())
            .map_err(|_| CoreError::Encoding("config too large".into()))?;

        let header = StimHeader {
            format: FORMAT.to_string(),
            algorithm: ALGORITHM.to_string(),
            config_size: config_ct.len() as u64,
            rootfs_size: rootfs_ct.len() as u64,
        };

        let mut payload = Vec::with_capacity(4 + config_ct.len() + rootfs_ct.len());
        payload.extend(config_len.to_le_bytes());
        payload.extend_from_slice(&config_ct);
        payload.extend_from_slice(&rootfs_ct);

        let bytes = envelope::encode(MAGIC, &envelope::to_header(&header)?, &payload)?;
        debug!(bytes = bytes.len(), "bundle encrypted");
        Ok(bytes)
    }

    /// Inverse of [`to_encrypted`](Self::to_encrypted). Nothing is returned
    /// unless both records authenticate.
    #[instrument(skip_all, fields(len = bytes.len()))]
    pub fn from_encrypted(bytes: &[u8], password: &str) -> BundleResult<Self> {
        let key = derive_key(password)?;
        let envelope = Envelope::decode(bytes, MAGIC)?;
        let (config_ct, rootfs_ct) = split_payload(&envelope)?;

        let config = aead::open(&key, config_ct)?;
        let rootfs = tar::from_tar(&aead::open(&key, rootfs_ct)?)?;
        Ok(Self {
            config: Some(config),
            rootfs,
        })
    }

    /// Unpack onto disk as `<dir>/config.json` and `<dir>/rootfs/...`.
    pub fn write_to_dir(&self, dir: &Path) -> BundleResult<()> {
        let config = self.config_bytes()?;
        let rootfs_dir = dir.join(ROOTFS_DIR);
        fs::create_dir_all(&rootfs_dir)?;
        fs::write(dir.join(CONFIG_FILE), config)?;

        for file in &self.rootfs {
            self.rootfs
                .copy_file(&file.name, &rootfs_dir.join(&file.name), UNPACK_MODE)?;
        }
        debug!(dir = %dir.display(), files = self.rootfs.len(), "bundle unpacked");
        Ok(())
    }

    /// Unpack into `workdir` and hand it to `runtime`, returning its exit code.
    ///
    /// This blocks for as long as the runtime does; any timeout belongs to
    /// the runtime or the caller.
    pub fn run<R: Runtime + ?Sized>(&self, runtime: &R, workdir: &Path, container_id: &str) -> BundleResult<i32> {
        self.write_to_dir(workdir)?;
        info!(container_id, dir = %workdir.display(), "starting bundle");
        Ok(runtime.run(workdir, container_id)?)
    }
}

/// Check the header and payload layout agree, then split the two records.
fn split_payload<'a>(envelope: &Envelope<'a>) -> BundleResult<(&'a [u8], &'a [u8])> {
    match envelope.header.get("format").and_then(|v| v.as_str()) {
        Some(FORMAT) => {}
        Some(other) => return Err(CoreError::InvalidFormatVersion(other.to_string()).into()),
        None => return Err(invalid("header has no format")),
    }
    let header: StimHeader = envelope.header_as()?;
    if header.algorithm != ALGORITHM {
        return Err(CoreError::InvalidFormatVersion(format!("algorithm {}", header.algorithm)).into());
    }

    let payload = envelope.payload;
    let prefix: [u8; 4] = payload
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| invalid("payload truncated before config length"))?;
    let config_len = u64::from(u32::from_le_bytes(prefix));

    if config_len != header.config_size {
        return Err(invalid(format!(
            "config length {config_len} does not match header {}",
            header.config_size
        )));
    }
    if header.config_size < SEAL_OVERHEAD as u64 || header.rootfs_size < SEAL_OVERHEAD as u64 {
        return Err(invalid("record smaller than seal overhead"));
    }
    let expected = 4u64
        .checked_add(header.config_size)
        .and_then(|n| n.checked_add(header.rootfs_size));
    if expected != Some(payload.len() as u64) {
        return Err(invalid(format!(
            "payload is {} bytes, header describes {:?}",
            payload.len(),
            expected
        )));
    }

    let config_end = 4 + header.config_size as usize;
    Ok((&payload[4..config_end], &payload[config_end..]))
}

fn invalid(msg: impl Into<String>) -> BundleError {
    CoreError::InvalidPayload(msg.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bundle {
        let mut rootfs = Vfs::new();
        rootfs.add_at("bin/app", vec![0x7f, b'E', b'L', b'F'], 100);
        rootfs.add_at("etc/app.conf", "debug = false", 200);
        Bundle::from_vfs(rootfs).unwrap()
    }

    fn payload_start(bytes: &[u8]) -> usize {
        9 + u32::from_le_bytes(bytes[5..9].try_into().unwrap()) as usize
    }

    #[test]
    fn test_default_config_points_at_rootfs() {
        let config: serde_json::Value = serde_json::from_slice(&Bundle::default_config().unwrap()).unwrap();
        assert_eq!(config["root"]["path"], "rootfs");
        assert_eq!(config["process"]["args"][0], "sh");
        assert!(config["ociVersion"].is_string());
    }

    #[test]
    fn test_tar_layout() {
        let bytes = sample().to_tar().unwrap();
        let all = tar::from_tar(&bytes).unwrap();
        assert_eq!(
            all.paths().collect::<Vec<_>>(),
            ["config.json", "rootfs/bin/app", "rootfs/etc/app.conf"]
        );
    }

    #[test]
    fn test_tar_roundtrip() {
        let bundle = sample();
        assert_eq!(Bundle::from_tar(&bundle.to_tar().unwrap()).unwrap(), bundle);
    }

    #[test]
    fn test_missing_config() {
        let bundle = Bundle {
            config: None,
            rootfs: Vfs::new(),
        };
        assert!(matches!(bundle.to_tar(), Err(BundleError::ConfigMissing)));
        assert!(matches!(bundle.to_encrypted("pw"), Err(BundleError::ConfigMissing)));

        let rootfs_only = tar::to_tar(&Vfs::new()).unwrap();
        assert!(matches!(Bundle::from_tar(&rootfs_only), Err(BundleError::ConfigMissing)));
    }

    #[test]
    fn test_empty_rootfs_roundtrips() {
        let bundle = Bundle::from_vfs(Vfs::new()).unwrap();
        let back = Bundle::from_encrypted(&bundle.to_encrypted("pw").unwrap(), "pw").unwrap();
        assert_eq!(back, bundle);
        assert!(back.rootfs.is_empty());
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let bundle = sample();
        let bytes = bundle.to_encrypted("hunter2").unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(Bundle::from_encrypted(&bytes, "hunter2").unwrap(), bundle);
    }

    #[test]
    fn test_header_describes_record_sizes() {
        let bundle = sample();
        let bytes = bundle.to_encrypted("pw").unwrap();
        let env = Envelope::decode(&bytes, MAGIC).unwrap();
        let header: StimHeader = env.header_as().unwrap();
        assert_eq!(header.format, "stim");
        assert_eq!(
            header.config_size,
            (bundle.config.as_ref().unwrap().len() + SEAL_OVERHEAD) as u64
        );
        assert_eq!(4 + header.config_size + header.rootfs_size, env.payload.len() as u64);
    }

    #[test]
    fn test_wrong_and_empty_password() {
        let bytes = sample().to_encrypted("right").unwrap();
        assert!(matches!(
            Bundle::from_encrypted(&bytes, "wrong"),
            Err(BundleError::Core(CoreError::DecryptionFailed))
        ));
        assert!(matches!(
            Bundle::from_encrypted(&bytes, ""),
            Err(BundleError::Core(CoreError::PasswordRequired))
        ));
        assert!(matches!(
            sample().to_encrypted(""),
            Err(BundleError::Core(CoreError::PasswordRequired))
        ));
    }

    #[test]
    fn test_payload_flip_detected() {
        let bytes = sample().to_encrypted("pw").unwrap();
        for pos in (payload_start(&bytes) + 4..bytes.len()).step_by(7) {
            let mut tampered = bytes.clone();
            tampered[pos] ^= 0x04;
            assert!(matches!(
                Bundle::from_encrypted(&tampered, "pw"),
                Err(BundleError::Core(CoreError::DecryptionFailed))
            ));
        }
    }

    #[test]
    fn test_size_mismatch_rejected_before_decrypt() {
        let bytes = sample().to_encrypted("pw").unwrap();
        let start = payload_start(&bytes);

        // Length prefix disagrees with header
        let mut wrong_prefix = bytes.clone();
        wrong_prefix[start] ^= 0x01;
        assert!(matches!(
            Bundle::from_encrypted(&wrong_prefix, "pw"),
            Err(BundleError::Core(CoreError::InvalidPayload(_)))
        ));

        // Truncated rootfs record
        assert!(matches!(
            Bundle::from_encrypted(&bytes[..bytes.len() - 1], "pw"),
            Err(BundleError::Core(CoreError::InvalidPayload(_)))
        ));
    }

    #[test]
    fn test_wrong_format_value() {
        let header = envelope::to_header(&serde_json::json!({"format": "stim2"})).unwrap();
        let bytes = envelope::encode(MAGIC, &header, &[]).unwrap();
        let err = Bundle::from_encrypted(&bytes, "pw").unwrap_err();
        assert!(matches!(err, BundleError::Core(CoreError::InvalidFormatVersion(_))));
    }

    #[test]
    fn test_write_to_dir() {
        let tmp = tempfile::tempdir().unwrap();
        sample().write_to_dir(tmp.path()).unwrap();

        assert!(tmp.path().join("config.json").is_file());
        assert_eq!(
            fs::read(tmp.path().join("rootfs/etc/app.conf")).unwrap(),
            b"debug = false"
        );
    }
}
