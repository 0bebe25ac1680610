//! Directory snapshot archiving for levelcache
//!
//! A cached task output is a whole directory subtree, `<cache_dir>/<hash>`.
//! This crate turns that subtree into a single uncompressed tar byte
//! sequence and restores such a byte sequence back into a directory.
//!
//! Compression is deliberately absent: it belongs to the storage driver,
//! not the archive.
//!
//! # Layouts
//!
//! Two entry layouts are supported, see [`ArchiveLayout`]:
//! - [`ArchiveLayout::Relative`] roots every entry at `<hash>/`, so the
//!   snapshot can be restored under any destination directory.
//! - [`ArchiveLayout::Absolute`] records the subtree's absolute path (minus
//!   the filesystem root) and strips the depth of the working directory on
//!   extraction, which places the files relative to the consumer's working
//!   directory.

#![expect(
    clippy::missing_errors_doc,
    reason = "All fallible functions return the crate Error; variants are documented there"
)]

mod error;
mod pack;
mod unpack;

pub use error::{Error, Result};
pub use pack::{absolute_entry_root, pack_directory};
pub use unpack::{depth_below_root, unpack, working_directory_depth};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How entry paths are recorded inside an archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveLayout {
    /// Entries are rooted at `<hash>/`, relative to the cache directory
    #[default]
    Relative,
    /// Entries carry the absolute subtree path without the filesystem root
    Absolute,
}

impl std::fmt::Display for ArchiveLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relative => f.write_str("relative"),
            Self::Absolute => f.write_str("absolute"),
        }
    }
}

impl std::str::FromStr for ArchiveLayout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relative" => Ok(Self::Relative),
            "absolute" => Ok(Self::Absolute),
            other => Err(Error::malformed(format!("unknown archive layout '{other}'"))),
        }
    }
}

/// Archives and restores cache subtrees using a fixed [`ArchiveLayout`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Archiver {
    layout: ArchiveLayout,
}

impl Archiver {
    /// Create an archiver for the given layout
    #[must_use]
    pub const fn new(layout: ArchiveLayout) -> Self {
        Self { layout }
    }

    /// The layout this archiver reads and writes
    #[must_use]
    pub const fn layout(&self) -> ArchiveLayout {
        self.layout
    }

    /// Serialize `<cache_directory>/<hash>` into an uncompressed tar
    pub fn archive(&self, cache_directory: &Path, hash: &str) -> Result<Vec<u8>> {
        let source = cache_directory.join(hash);
        let entry_root = match self.layout {
            ArchiveLayout::Relative => PathBuf::from(hash),
            ArchiveLayout::Absolute => absolute_entry_root(&source)?,
        };
        pack_directory(&source, &entry_root)
    }

    /// Restore an archive produced by [`Archiver::archive`]
    ///
    /// Returns the number of entries written.
    pub fn unarchive(&self, archive: &[u8], cache_directory: &Path) -> Result<usize> {
        match self.layout {
            ArchiveLayout::Relative => unpack(archive, cache_directory, 0),
            ArchiveLayout::Absolute => {
                let cwd = std::env::current_dir()
                    .map_err(|e| Error::io_no_path(e, "current_dir"))?;
                unpack(archive, &cwd, depth_below_root(&cwd))
            }
        }
    }
}

/// Archive `<cache_directory>/<hash>` using the canonical relative layout
pub fn archive_from_directory(cache_directory: &Path, hash: &str) -> Result<Vec<u8>> {
    Archiver::default().archive(cache_directory, hash)
}

/// Extract a canonical archive into `cache_directory`
pub fn unarchive_into_directory(archive: &[u8], cache_directory: &Path) -> Result<usize> {
    Archiver::default().unarchive(archive, cache_directory)
}
