//! VFS ⇄ tar serialization
//!
//! Output is deterministic apart from mtimes: entries are emitted in sorted
//! path order as GNU regular-file headers with mode `0600`. On decode only
//! regular files are kept; directory, link and device entries are ignored.

use std::io::{Read, Write};

use ::tar::{Archive, Builder, EntryType, Header};
use tracing::{debug, instrument};
use vessel_core::CancelToken;

use crate::error::{VfsError, VfsResult};
use crate::vfs::Vfs;

/// Permission bits recorded for every file entry
pub const FILE_MODE: u32 = 0o600;

/// Append a single regular file to `builder`.
pub fn append_file<W: Write>(
    builder: &mut Builder<W>,
    path: &str,
    content: &[u8],
    modified_at: u64,
) -> VfsResult<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(content.len() as u64);
    header.set_mode(FILE_MODE);
    header.set_mtime(modified_at);
    builder.append_data(&mut header, path, content)?;
    Ok(())
}

/// Append every file of `vfs` under `prefix` (e.g. `"rootfs/"`, or `""`).
pub fn append_vfs<W: Write>(
    builder: &mut Builder<W>,
    vfs: &Vfs,
    prefix: &str,
    cancel: &CancelToken,
) -> VfsResult<()> {
    for file in vfs {
        cancel.check()?;
        append_file(
            builder,
            &format!("{prefix}{}", file.name),
            &file.content,
            file.modified_at,
        )?;
    }
    Ok(())
}

/// Serialize `vfs` into a complete tar archive.
pub fn to_tar(vfs: &Vfs) -> VfsResult<Vec<u8>> {
    to_tar_cancellable(vfs, &CancelToken::new())
}

#[instrument(skip_all, fields(files = vfs.len()))]
pub fn to_tar_cancellable(vfs: &Vfs, cancel: &CancelToken) -> VfsResult<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());
    append_vfs(&mut builder, vfs, "", cancel)?;
    let bytes = builder.into_inner()?;
    debug!(bytes = bytes.len(), "tar written");
    Ok(bytes)
}

/// Parse a tar archive into a VFS.
pub fn from_tar(bytes: &[u8]) -> VfsResult<Vfs> {
    read_tar(bytes)
}

/// Parse a tar stream into a VFS. Any structural problem in the archive
/// is reported as [`VfsError::Tar`].
pub fn read_tar<R: Read>(reader: R) -> VfsResult<Vfs> {
    let mut archive = Archive::new(reader);
    let mut vfs = Vfs::new();

    let entries = archive.entries().map_err(tar_error)?;
    for entry in entries {
        let mut entry = entry.map_err(tar_error)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path().map_err(tar_error)?.to_string_lossy().into_owned();
        let modified_at = entry.header().mtime().unwrap_or(0);
        // Declared size is untrusted, so no pre-sizing
        let declared = entry.size();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).map_err(tar_error)?;
        if content.len() as u64 != declared {
            return Err(VfsError::Tar(format!(
                "entry {path} is truncated: {} of {declared} bytes",
                content.len()
            )));
        }
        vfs.add_at(&path, content, modified_at);
    }

    debug!(files = vfs.len(), "tar read");
    Ok(vfs)
}

fn tar_error(e: std::io::Error) -> VfsError {
    VfsError::Tar(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_preserves_content_and_mtime() {
        let mut vfs = Vfs::new();
        vfs.add_at("a.txt", "alpha", 1_700_000_000);
        vfs.add_at("dir/b.bin", vec![0u8, 255, 1], 1_700_000_100);

        let back = from_tar(&to_tar(&vfs).unwrap()).unwrap();
        assert_eq!(back, vfs);
    }

    #[test]
    fn test_empty_vfs() {
        let bytes = to_tar(&Vfs::new()).unwrap();
        assert!(from_tar(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_long_paths_survive() {
        let long = format!("{}/file.txt", "segment".repeat(30));
        let mut vfs = Vfs::new();
        vfs.add(&long, "deep");
        let back = from_tar(&to_tar(&vfs).unwrap()).unwrap();
        assert_eq!(back.read(&long).unwrap(), b"deep");
    }

    #[test]
    fn test_directory_entries_ignored() {
        let mut builder = Builder::new(Vec::new());
        let mut dir = Header::new_gnu();
        dir.set_entry_type(EntryType::Directory);
        dir.set_size(0);
        dir.set_mode(0o755);
        builder.append_data(&mut dir, "somedir/", std::io::empty()).unwrap();
        append_file(&mut builder, "somedir/f.txt", b"f", 0).unwrap();
        let bytes = builder.into_inner().unwrap();

        let vfs = from_tar(&bytes).unwrap();
        assert_eq!(vfs.paths().collect::<Vec<_>>(), ["somedir/f.txt"]);
        assert!(vfs.exists_as("somedir", true));
    }

    #[test]
    fn test_entries_are_sorted_with_fixed_mode() {
        let mut vfs = Vfs::new();
        vfs.add("zeta", "z");
        vfs.add("alpha", "a");
        let bytes = to_tar(&vfs).unwrap();

        let mut archive = Archive::new(bytes.as_slice());
        let mut names = Vec::new();
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            assert_eq!(entry.header().mode().unwrap(), FILE_MODE);
            names.push(entry.path().unwrap().to_string_lossy().into_owned());
        }
        assert_eq!(names, ["alpha", "zeta"]);
    }

    #[test]
    fn test_malformed_input_rejected() {
        assert!(matches!(from_tar(b"definitely not a tar"), Err(VfsError::Tar(_))));
        assert!(matches!(from_tar(&[0xAB; 1024]), Err(VfsError::Tar(_))));
    }

    #[test]
    fn test_truncated_archive_rejected() {
        let mut vfs = Vfs::new();
        vfs.add("big.bin", vec![7u8; 4096]);
        let bytes = to_tar(&vfs).unwrap();
        assert!(matches!(from_tar(&bytes[..300]), Err(VfsError::Tar(_))));
    }

    #[test]
    fn test_cancelled_encode() {
        let mut vfs = Vfs::new();
        vfs.add("a", "a");
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(to_tar_cancellable(&vfs, &cancel).unwrap_err().is_cancelled());
    }

    #[test]
    fn test_oversized_entry_header_rejected() {
        let mut header = Header::new_gnu();
        header.set_path("big.bin").unwrap();
        header.set_entry_type(EntryType::Regular);
        header.set_size(1 << 62);
        header.set_cksum();

        let mut bytes = header.as_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 1024]);
        assert!(matches!(from_tar(&bytes), Err(VfsError::Tar(_))));
    }
}
