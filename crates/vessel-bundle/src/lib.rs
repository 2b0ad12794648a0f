//! # vessel-bundle: runnable filesystem bundles
//!
//! A [`Bundle`] pairs runtime configuration bytes with a root filesystem
//! held in a [`Vfs`](vessel_vfs::Vfs). It serializes either as a plain tar
//! archive or as an encrypted `STIM` container whose config and rootfs are
//! sealed as separate records.
//!
//! ```rust
//! use vessel_bundle::Bundle;
//! use vessel_vfs::Vfs;
//!
//! # fn main() -> Result<(), vessel_bundle::BundleError> {
//! let mut rootfs = Vfs::new();
//! rootfs.add("usr/bin/hello", "#!/bin/sh\necho hello\n");
//!
//! let bundle = Bundle::from_vfs(rootfs)?;
//! let sealed = bundle.to_encrypted("correct horse")?;
//! assert_eq!(Bundle::from_encrypted(&sealed, "correct horse")?, bundle);
//! # Ok(())
//! # }
//! ```
//!
//! Running a bundle goes through an injected [`Runtime`]; this crate only
//! produces the unpacked directory and hands it over.

mod bundle;
mod cache;
mod error;
mod runtime;

pub use bundle::{Bundle, CONFIG_FILE, FORMAT, MAGIC, ROOTFS_DIR};
pub use cache::BundleCache;
pub use error::{BundleError, BundleResult};
pub use runtime::{CommandRuntime, Runtime};
