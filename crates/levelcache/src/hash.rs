//! Cache key validation

use crate::{Error, Result};

/// Check that `hash` is usable as a cache key
///
/// The hash names a subdirectory of the cache directory and the commit
/// marker next to it, so it must be a single plain path segment.
pub fn validate_hash(hash: &str) -> Result<()> {
    let reason = if hash.is_empty() {
        "must not be empty"
    } else if hash == "." || hash == ".." {
        "must not be a relative directory reference"
    } else if hash.contains(['/', '\\']) {
        "must not contain path separators"
    } else if hash.contains('\0') {
        "must not contain NUL"
    } else {
        return Ok(());
    };
    Err(Error::invalid_hash(hash, reason))
}

/// File name of the commit marker for `hash`
#[must_use]
pub fn commit_marker_name(hash: &str) -> String {
    format!("{hash}.commit")
}
