//! Bundle round trips, unpacking and runtime hand-off

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;
use vessel_bundle::{Bundle, BundleError, Runtime};
use vessel_core::{CoreError, ErrorKind};
use vessel_vfs::{Vfs, tar};

fn sample_rootfs() -> Vfs {
    let mut rootfs = Vfs::new();
    rootfs.add_at("bin/sh", vec![0x7f, b'E', b'L', b'F', 2, 1, 1], 1_700_000_000);
    rootfs.add_at("etc/hostname", "vessel\n", 1_700_000_000);
    rootfs.add_at("srv/www/index.html", "<h1>hi</h1>", 1_700_000_100);
    rootfs
}

/// Records every invocation and reports a fixed exit code.
struct RecordingRuntime {
    exit_code: i32,
    calls: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingRuntime {
    fn new(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl Runtime for RecordingRuntime {
    fn run(&self, bundle_dir: &Path, container_id: &str) -> io::Result<i32> {
        // The bundle must already be on disk when the runtime starts
        assert!(bundle_dir.join("config.json").is_file());
        self.calls
            .lock()
            .unwrap()
            .push((bundle_dir.to_path_buf(), container_id.to_string()));
        Ok(self.exit_code)
    }
}

struct FailingRuntime;

impl Runtime for FailingRuntime {
    fn run(&self, _: &Path, _: &str) -> io::Result<i32> {
        Err(io::Error::new(io::ErrorKind::NotFound, "runc not installed"))
    }
}

#[test]
fn test_encrypted_roundtrip_preserves_everything() {
    let bundle = Bundle::new(br#"{"ociVersion":"1.0.2","custom":true}"#.to_vec(), sample_rootfs());
    let sealed = bundle.to_encrypted("bundle-pass").unwrap();
    let back = Bundle::from_encrypted(&sealed, "bundle-pass").unwrap();

    assert_eq!(back.config, bundle.config);
    assert_eq!(back.rootfs.read("srv/www/index.html").unwrap(), b"<h1>hi</h1>");
    assert_eq!(back.rootfs.stat("bin/sh").unwrap().modified_at, 1_700_000_000);
    assert_eq!(back, bundle);
}

#[test]
fn test_wrong_password_is_uniform() {
    let sealed = Bundle::from_vfs(sample_rootfs()).unwrap().to_encrypted("a").unwrap();
    let err = Bundle::from_encrypted(&sealed, "b").unwrap_err();
    assert!(matches!(err, BundleError::Core(CoreError::DecryptionFailed)));
    assert_eq!(err.kind(), ErrorKind::Credentials);
}

#[test]
fn test_plain_tar_is_readable_by_tar_codec() {
    let bundle = Bundle::from_vfs(sample_rootfs()).unwrap();
    let archive = tar::from_tar(&bundle.to_tar().unwrap()).unwrap();

    assert_eq!(archive.read("config.json").unwrap(), bundle.config.as_deref().unwrap());
    assert_eq!(archive.sub_vfs("rootfs"), bundle.rootfs);
    assert_eq!(Bundle::from_tar(&bundle.to_tar().unwrap()).unwrap(), bundle);
}

#[test]
fn test_encrypted_bundle_is_not_a_message() {
    let sealed = Bundle::from_vfs(Vfs::new()).unwrap().to_encrypted("pw").unwrap();
    let mut as_message = sealed.clone();
    as_message[..4].copy_from_slice(b"SMSG");

    let err = Bundle::from_encrypted(&as_message, "pw").unwrap_err();
    assert!(matches!(err, BundleError::Core(CoreError::InvalidMagic { .. })));
    assert_eq!(err.kind(), ErrorKind::Structure);
}

#[test]
fn test_garbage_rejected() {
    for bytes in [&b""[..], b"STIM", b"not a bundle at all"] {
        let err = Bundle::from_encrypted(bytes, "pw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structure, "{bytes:?}");
    }
}

#[test]
fn test_run_unpacks_then_delegates() {
    let work = TempDir::new().unwrap();
    let runtime = RecordingRuntime::new(3);
    let bundle = Bundle::from_vfs(sample_rootfs()).unwrap();

    let code = bundle.run(&runtime, work.path(), "web-1").unwrap();
    assert_eq!(code, 3);

    let calls = runtime.calls.lock().unwrap();
    assert_eq!(calls.as_slice(), [(work.path().to_path_buf(), "web-1".to_string())]);
    assert_eq!(fs::read(work.path().join("rootfs/etc/hostname")).unwrap(), b"vessel\n");
    assert_eq!(
        fs::read(work.path().join("config.json")).unwrap(),
        bundle.config.unwrap()
    );
}

#[test]
fn test_run_through_boxed_runtime() {
    let work = TempDir::new().unwrap();
    let runtime: Box<dyn Runtime> = Box::new(RecordingRuntime::new(0));
    let code = Bundle::from_vfs(Vfs::new())
        .unwrap()
        .run(&runtime, work.path(), "empty")
        .unwrap();
    assert_eq!(code, 0);
    assert!(work.path().join("rootfs").is_dir());
}

#[test]
fn test_runtime_failure_surfaces_as_io() {
    let work = TempDir::new().unwrap();
    let err = Bundle::from_vfs(Vfs::new())
        .unwrap()
        .run(&FailingRuntime, work.path(), "c")
        .unwrap_err();
    assert!(matches!(err, BundleError::Io(e) if e.kind() == io::ErrorKind::NotFound));
}

#[test]
fn test_run_without_config_never_reaches_runtime() {
    let work = TempDir::new().unwrap();
    let runtime = RecordingRuntime::new(0);
    let bundle = Bundle {
        config: None,
        rootfs: sample_rootfs(),
    };

    assert!(matches!(
        bundle.run(&runtime, work.path(), "c"),
        Err(BundleError::ConfigMissing)
    ));
    assert!(runtime.calls.lock().unwrap().is_empty());
}
