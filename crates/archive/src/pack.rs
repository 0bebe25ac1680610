//! Building archives from a directory subtree

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Pack the directory `source` into an uncompressed tar
///
/// Every entry is recorded under `entry_root`, so a file `source/a/b.txt`
/// becomes `entry_root/a/b.txt`. Symlinks are stored as links.
pub fn pack_directory(source: &Path, entry_root: &Path) -> Result<Vec<u8>> {
    let metadata = match std::fs::metadata(source) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::missing_source(source));
        }
        Err(e) => return Err(Error::io(e, source, "stat")),
    };
    if !metadata.is_dir() {
        return Err(Error::missing_source(source));
    }

    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    builder
        .append_dir_all(entry_root, source)
        .map_err(|e| Error::io(e, source, "archive"))?;
    let bytes = builder
        .into_inner()
        .map_err(|e| Error::io(e, source, "finish archive"))?;

    tracing::trace!(
        source = %source.display(),
        root = %entry_root.display(),
        bytes = bytes.len(),
        "Archived directory"
    );
    Ok(bytes)
}

/// Entry root used by the absolute layout
///
/// The absolute form of `path` with the filesystem root (and any Windows
/// prefix) removed, e.g. `/home/me/proj/.cache/h1` becomes
/// `home/me/proj/.cache/h1`.
pub fn absolute_entry_root(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| Error::io(e, path, "absolutize"))?;
    let mut root = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                root.pop();
            }
            Component::Normal(part) => root.push(part),
        }
    }
    if root.as_os_str().is_empty() {
        return Err(Error::missing_source(path));
    }
    Ok(root)
}
