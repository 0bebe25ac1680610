//! Error types for the archive crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for archive operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error while reading the source tree or writing extracted files
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(levelcache::archive::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "unpack", "create_dir_all")
        operation: String,
    },

    /// The directory to archive does not exist or is not a directory
    #[error("Nothing to archive at {}", path.display())]
    #[diagnostic(
        code(levelcache::archive::missing_source),
        help("The task may not have produced any outputs for this hash")
    )]
    MissingSource {
        /// The expected subtree root
        path: Box<Path>,
    },

    /// The archive bytes could not be parsed
    #[error("Malformed archive: {message}")]
    #[diagnostic(code(levelcache::archive::malformed))]
    Malformed {
        /// Description of the parse failure
        message: String,
    },

    /// The archive contained nothing to extract
    #[error("Archive is empty")]
    #[diagnostic(
        code(levelcache::archive::empty),
        help("A stored value must contain at least one entry")
    )]
    Empty,

    /// An entry would have been written outside the destination
    #[error("Refusing to extract entry outside destination: {}", path.display())]
    #[diagnostic(code(levelcache::archive::unsafe_path))]
    UnsafePath {
        /// The offending entry path after stripping
        path: Box<Path>,
    },
}

impl Error {
    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Create a malformed-archive error
    #[must_use]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed {
            message: msg.into(),
        }
    }

    /// Create a missing-source error
    #[must_use]
    pub fn missing_source(path: impl AsRef<Path>) -> Self {
        Self::MissingSource {
            path: path.as_ref().into(),
        }
    }

    /// Create an unsafe-path error
    #[must_use]
    pub fn unsafe_path(path: impl AsRef<Path>) -> Self {
        Self::UnsafePath {
            path: path.as_ref().into(),
        }
    }
}

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, Error>;
