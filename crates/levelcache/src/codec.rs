//! Wire encoding of archives
//!
//! Every driver receives the same value: the standard, padded base64 text of
//! the tar bytes. Binary-safe backends pay a 4/3 size overhead, but one cache
//! namespace can be read back through any driver.

use crate::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Encode archive bytes as the stored value
#[must_use]
pub fn encode(archive: &[u8]) -> Vec<u8> {
    STANDARD.encode(archive).into_bytes()
}

/// Decode a stored value back into archive bytes
///
/// Surrounding ASCII whitespace (e.g. a trailing newline added by a text
/// backend) is ignored.
pub fn decode(value: &[u8]) -> Result<Vec<u8>> {
    STANDARD
        .decode(value.trim_ascii())
        .map_err(|e| Error::encoding(e.to_string()))
}
