//! Flat path→content map with directories inferred from path prefixes

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};
use vessel_core::CancelToken;

use crate::error::{VfsError, VfsResult};

/// A stored file. `name` is the normalized path (no leading slash).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualFile {
    pub name: String,
    pub content: Vec<u8>,
    /// Modification time, seconds since the Unix epoch
    pub modified_at: u64,
}

/// Result of [`Vfs::stat`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// Normalized path, empty for the root
    pub path: String,
    /// Last path segment
    pub name: String,
    pub is_dir: bool,
    /// File size, or the sum of file sizes below a directory
    pub size: u64,
    /// File mtime, or the newest mtime below a directory
    pub modified_at: u64,
}

/// One immediate child listed by [`Vfs::read_dir`]
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Handle returned by [`Vfs::open`]
#[derive(Debug)]
pub enum Handle<'a> {
    File {
        name: &'a str,
        reader: Cursor<&'a [u8]>,
    },
    /// Reading from a directory handle always fails with `IsADirectory`.
    Dir { name: String },
}

impl Handle<'_> {
    pub fn name(&self) -> &str {
        match self {
            Handle::File { name, .. } => *name,
            Handle::Dir { name } => name.as_str(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir { .. })
    }
}

impl Read for Handle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Handle::File { reader, .. } => reader.read(buf),
            Handle::Dir { name } => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {name}"),
            )),
        }
    }
}

/// Normalize a path to the stored key form.
///
/// Leading slashes, empty segments and `.` are dropped; `..` pops a segment
/// and cannot climb above the root. The root normalizes to `""`.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// In-memory virtual filesystem.
///
/// Directories are never stored: a path is a directory when some stored
/// path lies below it, and the root always exists. Cloning yields an
/// independent copy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Vfs {
    files: BTreeMap<String, VirtualFile>,
}

impl Vfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` at `path`, overwriting any previous file.
    ///
    /// Paths ending in `/` name directories and are ignored, as is the root.
    pub fn add(&mut self, path: &str, content: impl Into<Vec<u8>>) {
        self.add_at(path, content, now_secs());
    }

    /// [`add`](Self::add) with an explicit modification time.
    pub fn add_at(&mut self, path: &str, content: impl Into<Vec<u8>>, modified_at: u64) {
        if path.ends_with('/') {
            trace!(path, "ignoring directory entry");
            return;
        }
        let name = normalize(path);
        if name.is_empty() {
            trace!(path, "ignoring root entry");
            return;
        }
        self.files.insert(
            name.clone(),
            VirtualFile {
                name,
                content: content.into(),
                modified_at,
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<&VirtualFile> {
        self.files.get(&normalize(path))
    }

    /// Remove a stored file, returning it.
    pub fn remove(&mut self, path: &str) -> Option<VirtualFile> {
        self.files.remove(&normalize(path))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Stored file paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, VirtualFile> {
        self.files.values()
    }

    pub fn total_size(&self) -> u64 {
        self.files.values().map(|f| f.content.len() as u64).sum()
    }

    /// Stored files strictly below the directory `dir` ("" for root).
    fn below<'a>(&'a self, dir: &str) -> impl Iterator<Item = &'a VirtualFile> + use<'a> {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        self.files
            .range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(&prefix))
            .map(|(_, f)| f)
    }

    fn is_implicit_dir(&self, dir: &str) -> bool {
        dir.is_empty() || self.below(dir).next().is_some()
    }

    /// Open a file for reading.
    ///
    /// A stored file wins over an implicit directory of the same name.
    pub fn open(&self, path: &str) -> VfsResult<Handle<'_>> {
        let key = normalize(path);
        if let Some(file) = self.files.get(&key) {
            return Ok(Handle::File {
                name: &file.name,
                reader: Cursor::new(file.content.as_slice()),
            });
        }
        if self.is_implicit_dir(&key) {
            return Ok(Handle::Dir { name: key });
        }
        Err(VfsError::NotFound(path.to_string()))
    }

    /// Read a whole file.
    pub fn read(&self, path: &str) -> VfsResult<&[u8]> {
        let key = normalize(path);
        match self.files.get(&key) {
            Some(file) => Ok(&file.content),
            None if self.is_implicit_dir(&key) => Err(VfsError::IsDirectory(path.to_string())),
            None => Err(VfsError::NotFound(path.to_string())),
        }
    }

    pub fn stat(&self, path: &str) -> VfsResult<Metadata> {
        let key = normalize(path);
        if let Some(file) = self.files.get(&key) {
            return Ok(Metadata {
                name: base_name(&key).to_string(),
                path: key,
                is_dir: false,
                size: file.content.len() as u64,
                modified_at: file.modified_at,
            });
        }
        if !self.is_implicit_dir(&key) {
            return Err(VfsError::NotFound(path.to_string()));
        }

        let (size, modified_at) = self.below(&key).fold((0u64, 0u64), |(size, mtime), f| {
            (size + f.content.len() as u64, mtime.max(f.modified_at))
        });
        Ok(Metadata {
            name: base_name(&key).to_string(),
            path: key,
            is_dir: true,
            size,
            modified_at,
        })
    }

    pub fn exists(&self, path: &str) -> bool {
        let key = normalize(path);
        self.files.contains_key(&key) || self.is_implicit_dir(&key)
    }

    /// Existence check that also requires the path to be a directory
    /// (`want_dir = true`) or a file (`want_dir = false`).
    pub fn exists_as(&self, path: &str, want_dir: bool) -> bool {
        match self.stat(path) {
            Ok(meta) => meta.is_dir == want_dir,
            Err(_) => false,
        }
    }

    /// Immediate children of `path`, deduplicated and sorted by name.
    pub fn read_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let key = normalize(path);
        if self.files.contains_key(&key) {
            return Err(VfsError::NotDirectory(path.to_string()));
        }

        let skip = if key.is_empty() { 0 } else { key.len() + 1 };
        let mut children: BTreeMap<&str, bool> = BTreeMap::new();
        for file in self.below(&key) {
            let rest = &file.name[skip..];
            match rest.split_once('/') {
                Some((segment, _)) => {
                    children.entry(segment).or_insert(true);
                }
                None => {
                    children.insert(rest, false);
                }
            }
        }

        if children.is_empty() && !key.is_empty() {
            return Err(VfsError::NotFound(path.to_string()));
        }
        Ok(children
            .into_iter()
            .map(|(name, is_dir)| DirEntry {
                name: name.to_string(),
                is_dir,
            })
            .collect())
    }

    /// Copy of the tree below `dir`, with `dir/` stripped from every path.
    pub fn sub_vfs(&self, dir: &str) -> Vfs {
        let key = normalize(dir);
        let skip = if key.is_empty() { 0 } else { key.len() + 1 };
        let mut out = Vfs::new();
        for file in self.below(&key) {
            out.add_at(&file.name[skip..], file.content.clone(), file.modified_at);
        }
        out
    }

    /// Stream a stored file into `writer`, returning the bytes written.
    pub fn copy_to<W: Write>(&self, path: &str, writer: &mut W) -> VfsResult<u64> {
        let mut handle = self.open(path)?;
        Ok(io::copy(&mut handle, writer)?)
    }

    /// Write a stored file to `destination` on disk with `permissions`
    /// mode bits (ignored on non-Unix targets). Parent directories are created.
    pub fn copy_file(&self, path: &str, destination: &Path, permissions: u32) -> VfsResult<u64> {
        let content = self.read(path)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(destination)?;
        out.write_all(content)?;
        out.flush()?;
        set_permissions(destination, permissions)?;
        Ok(content.len() as u64)
    }

    /// Build a VFS from the regular files under a local directory.
    ///
    /// Symlinks and other non-regular entries are skipped.
    pub fn from_dir(root: &Path) -> VfsResult<Vfs> {
        Self::from_dir_cancellable(root, &CancelToken::new())
    }

    pub fn from_dir_cancellable(root: &Path, cancel: &CancelToken) -> VfsResult<Vfs> {
        let mut vfs = Vfs::new();
        let mut pending = vec![(root.to_path_buf(), String::new())];
        while let Some((dir, prefix)) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                cancel.check()?;
                let entry = entry?;
                let file_type = entry.file_type()?;
                let name = entry.file_name().to_string_lossy().into_owned();
                let rel = if prefix.is_empty() {
                    name
                } else {
                    format!("{prefix}/{name}")
                };
                if file_type.is_dir() {
                    pending.push((entry.path(), rel));
                } else if file_type.is_file() {
                    let mtime = entry
                        .metadata()?
                        .modified()
                        .ok()
                        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                        .map(|d| d.as_secs())
                        .unwrap_or(0);
                    vfs.add_at(&rel, fs::read(entry.path())?, mtime);
                } else {
                    trace!(path = %rel, "skipping non-regular entry");
                }
            }
        }
        debug!(files = vfs.len(), root = %root.display(), "loaded directory");
        Ok(vfs)
    }
}

impl<'a> IntoIterator for &'a Vfs {
    type Item = &'a VirtualFile;
    type IntoIter = btree_map::Values<'a, String, VirtualFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vfs {
        let mut vfs = Vfs::new();
        vfs.add_at("a.txt", "alpha", 10);
        vfs.add_at("dir/b.txt", "bravo", 20);
        vfs.add_at("dir/sub/c.txt", "charlie", 30);
        vfs
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/b"), "a/b");
        assert_eq!(normalize("a//b/./c"), "a/b/c");
        assert_eq!(normalize("a/../b"), "b");
        assert_eq!(normalize("../../etc/passwd"), "etc/passwd");
        assert_eq!(normalize("/"), "");
    }

    #[test]
    fn test_add_overwrites() {
        let mut vfs = Vfs::new();
        vfs.add("/x.txt", "one");
        vfs.add("x.txt", "two");
        assert_eq!(vfs.len(), 1);
        assert_eq!(vfs.read("x.txt").unwrap(), b"two");
    }

    #[test]
    fn test_add_ignores_directory_paths() {
        let mut vfs = Vfs::new();
        vfs.add("dir/", "ignored");
        vfs.add("/", "ignored");
        assert!(vfs.is_empty());
    }

    #[test]
    fn test_open_file_and_dir() {
        let vfs = sample();
        let mut contents = String::new();
        vfs.open("/dir/b.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "bravo");

        let mut dir = vfs.open("dir/sub").unwrap();
        assert!(dir.is_dir());
        let err = dir.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);

        assert!(vfs.open("missing").unwrap_err().is_not_found());
        // "di" is a string prefix of "dir/..." but not a path prefix
        assert!(vfs.open("di").unwrap_err().is_not_found());
    }

    #[test]
    fn test_stat() {
        let vfs = sample();
        let file = vfs.stat("dir/b.txt").unwrap();
        assert!(!file.is_dir);
        assert_eq!(file.name, "b.txt");
        assert_eq!(file.size, 5);

        let dir = vfs.stat("dir").unwrap();
        assert!(dir.is_dir);
        assert_eq!(dir.size, 12);
        assert_eq!(dir.modified_at, 30);

        let root = vfs.stat("/").unwrap();
        assert!(root.is_dir);
        assert_eq!(root.path, "");
    }

    #[test]
    fn test_exists_as() {
        let vfs = sample();
        assert!(vfs.exists("dir"));
        assert!(vfs.exists_as("dir", true));
        assert!(!vfs.exists_as("dir", false));
        assert!(vfs.exists_as("a.txt", false));
        assert!(!vfs.exists_as("a.txt", true));
        assert!(!vfs.exists("nope"));
        assert!(Vfs::new().exists("/"));
    }

    #[test]
    fn test_read_dir_sorted_and_deduped() {
        let vfs = sample();
        let names: Vec<_> = vfs.read_dir("dir").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["b.txt", "sub"]);

        let root = vfs.read_dir("").unwrap();
        assert_eq!(
            root,
            vec![
                DirEntry { name: "a.txt".into(), is_dir: false },
                DirEntry { name: "dir".into(), is_dir: true },
            ]
        );
    }

    #[test]
    fn test_read_dir_errors() {
        let vfs = sample();
        assert!(matches!(vfs.read_dir("a.txt"), Err(VfsError::NotDirectory(_))));
        assert!(matches!(vfs.read_dir("nowhere"), Err(VfsError::NotFound(_))));
        assert!(Vfs::new().read_dir("/").unwrap().is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let vfs = sample();
        let mut copy = vfs.clone();
        copy.add("a.txt", "changed");
        assert_eq!(vfs.read("a.txt").unwrap(), b"alpha");
    }

    #[test]
    fn test_sub_vfs() {
        let sub = sample().sub_vfs("dir");
        assert_eq!(sub.paths().collect::<Vec<_>>(), ["b.txt", "sub/c.txt"]);
    }

    #[test]
    fn test_copy_to_writer() {
        let vfs = sample();
        let mut out = Vec::new();
        assert_eq!(vfs.copy_to("dir/sub/c.txt", &mut out).unwrap(), 7);
        assert_eq!(out, b"charlie");
        assert!(vfs.copy_to("dir", &mut out).is_err());
    }

    #[test]
    fn test_copy_file_to_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("nested/out.txt");
        let vfs = sample();
        vfs.copy_file("a.txt", &dest, 0o640).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"alpha");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o640);
        }
    }

    #[test]
    fn test_from_dir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("x/y")).unwrap();
        fs::write(tmp.path().join("top.txt"), b"top").unwrap();
        fs::write(tmp.path().join("x/y/deep.bin"), [1u8, 2, 3]).unwrap();

        let vfs = Vfs::from_dir(tmp.path()).unwrap();
        assert_eq!(vfs.paths().collect::<Vec<_>>(), ["top.txt", "x/y/deep.bin"]);
        assert_eq!(vfs.read("x/y/deep.bin").unwrap(), &[1, 2, 3]);
    }
}
