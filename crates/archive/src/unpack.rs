//! Restoring archives into a directory

use crate::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Extract `archive` into `destination`, dropping `strip_components` leading
/// path segments from every entry
///
/// Entries consumed entirely by stripping are skipped. Only regular files,
/// directories and symlinks are restored. Returns the number of entries
/// written; an archive that yields none is an error, as is any entry whose
/// stripped path would escape `destination`.
///
/// Extraction is not atomic: a failure midway can leave earlier entries on
/// disk, but is always reported as an error.
pub fn unpack(archive: &[u8], destination: &Path, strip_components: usize) -> Result<usize> {
    if archive.is_empty() {
        return Err(Error::Empty);
    }

    fs::create_dir_all(destination)
        .map_err(|e| Error::io(e, destination, "create_dir_all"))?;

    let mut tar = tar::Archive::new(archive);
    tar.set_overwrite(true);
    tar.set_preserve_mtime(true);

    let entries = tar
        .entries()
        .map_err(|e| Error::malformed(format!("cannot read entries: {e}")))?;

    let mut written = 0usize;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::malformed(format!("unreadable entry: {e}")))?;

        let entry_type = entry.header().entry_type();
        if !(entry_type.is_file() || entry_type.is_dir() || entry_type.is_symlink()) {
            tracing::debug!(?entry_type, "Skipping unsupported archive entry");
            continue;
        }

        let raw_path = entry
            .path()
            .map_err(|e| Error::malformed(format!("invalid entry path: {e}")))?
            .into_owned();
        let Some(relative) = strip_path(&raw_path, strip_components)? else {
            continue;
        };

        reject_symlinked_ancestors(destination, &relative)?;
        let target = destination.join(&relative);
        if entry_type.is_dir()
            && fs::symlink_metadata(&target).is_ok_and(|meta| meta.file_type().is_symlink())
        {
            return Err(Error::unsafe_path(&relative));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }
        entry
            .unpack(&target)
            .map_err(|e| Error::io(e, &target, "unpack"))?;
        written += 1;
    }

    if written == 0 {
        return Err(Error::Empty);
    }

    tracing::trace!(
        destination = %destination.display(),
        strip_components,
        entries = written,
        "Extracted archive"
    );
    Ok(written)
}

/// Drop `count` leading normal segments from `path`
///
/// `Ok(None)` means nothing is left after stripping. Absolute paths and
/// parent references are refused.
fn strip_path(path: &Path, count: usize) -> Result<Option<PathBuf>> {
    let mut remaining = count;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => {
                if remaining > 0 {
                    remaining -= 1;
                } else {
                    out.push(part);
                }
            }
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                return Err(Error::unsafe_path(path));
            }
        }
    }
    Ok(if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    })
}

/// Refuse `relative` if any directory between `destination` and it is a symlink
///
/// Symlink entries are restored as-is, so a later entry routed through one
/// would land wherever the link points.
fn reject_symlinked_ancestors(destination: &Path, relative: &Path) -> Result<()> {
    let Some(parent) = relative.parent() else {
        return Ok(());
    };
    let mut current = destination.to_path_buf();
    for component in parent.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(Error::unsafe_path(relative));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
            Err(e) => return Err(Error::io(e, &current, "stat")),
        }
    }
    Ok(())
}

/// Number of normal segments between `path` and the filesystem root
#[must_use]
pub fn depth_below_root(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

/// Depth of the process working directory below the filesystem root
///
/// This is the strip count that turns an absolute-layout entry produced
/// from inside the working directory into a working-directory-relative path.
pub fn working_directory_depth() -> Result<usize> {
    let cwd = std::env::current_dir().map_err(|e| Error::io_no_path(e, "current_dir"))?;
    Ok(depth_below_root(&cwd))
}
