//! # vessel-vfs: in-memory filesystem and tar codec
//!
//! [`Vfs`] is the intermediate representation every container is built from
//! and unpacked into: a flat map from normalized path to bytes. Directories
//! are implicit, inferred from path prefixes, so there are no directory
//! records to keep consistent.
//!
//! ```rust
//! use vessel_vfs::{Vfs, tar};
//!
//! # fn main() -> Result<(), vessel_vfs::VfsError> {
//! let mut vfs = Vfs::new();
//! vfs.add("a.txt", "A");
//! vfs.add("dir/b.txt", "B");
//! vfs.add("dir/sub/c.txt", "C");
//!
//! let restored = tar::from_tar(&tar::to_tar(&vfs)?)?;
//! let names: Vec<_> = restored.read_dir("dir")?.into_iter().map(|e| e.name).collect();
//! assert_eq!(names, ["b.txt", "sub"]);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod tar;
mod vfs;
mod walk;

pub use error::{VfsError, VfsResult};
pub use vfs::{DirEntry, Handle, Metadata, VirtualFile, Vfs, normalize};
pub use walk::{WalkAction, WalkEntry, WalkFilter, WalkOptions};
