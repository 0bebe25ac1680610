//! Error types for the cache client
//!
//! None of these cross the public `store`/`retrieve` boundary; they exist so
//! internal steps can use `?` and so failures are logged with context.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use levelcache_drivers::DriverError;
use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for cache operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Configuration could not be resolved
    #[error("Cache configuration error: {message}")]
    #[diagnostic(
        code(levelcache::config),
        help("The cache is disabled until the configuration is fixed")
    )]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// The configured driver could not be loaded or opened
    #[error("Failed to load storage driver '{driver}'")]
    #[diagnostic(
        code(levelcache::driver_load),
        help("The cache is skipped for this call; tasks run uncached")
    )]
    DriverLoad {
        /// Driver name from configuration
        driver: String,
        /// The underlying driver error
        #[source]
        source: DriverError,
    },

    /// A key-value operation failed
    #[error("Store {operation} failed")]
    #[diagnostic(code(levelcache::store_io))]
    StoreIo {
        /// Operation that failed (e.g., "get", "put", "close")
        operation: String,
        /// The underlying driver error
        #[source]
        source: DriverError,
    },

    /// Archiving or extracting the cache directory failed
    #[error("Archive error")]
    #[diagnostic(code(levelcache::archive))]
    Archive {
        /// The underlying archive error
        #[from]
        source: levelcache_archive::Error,
    },

    /// The stored value is not valid wire encoding
    #[error("Failed to decode stored value: {message}")]
    #[diagnostic(
        code(levelcache::encoding),
        help("The entry may have been written by an incompatible client")
    )]
    Encoding {
        /// Error message from the decoder
        message: String,
    },

    /// Cache miss
    #[error("Cache key not found: {key}")]
    #[diagnostic(code(levelcache::not_found))]
    NotFound {
        /// The cache key that was not found
        key: String,
    },

    /// The hash cannot be used as a cache key
    #[error("Invalid hash {hash:?}: {reason}")]
    #[diagnostic(code(levelcache::invalid_hash))]
    InvalidHash {
        /// The rejected hash
        hash: String,
        /// Why it was rejected
        reason: String,
    },

    /// I/O error outside the archive and driver layers
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(code(levelcache::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed
        operation: String,
    },

    /// A blocking worker task did not complete
    #[error("Background {operation} task failed: {message}")]
    #[diagnostic(code(levelcache::task))]
    Task {
        /// What the task was doing
        operation: String,
        /// Panic or cancellation message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create a driver load error
    #[must_use]
    pub fn driver_load(driver: impl Into<String>, source: DriverError) -> Self {
        Self::DriverLoad {
            driver: driver.into(),
            source,
        }
    }

    /// Create a store I/O error
    #[must_use]
    pub fn store_io(operation: impl Into<String>, source: DriverError) -> Self {
        Self::StoreIo {
            operation: operation.into(),
            source,
        }
    }

    /// Create an encoding error
    #[must_use]
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding {
            message: msg.into(),
        }
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an invalid hash error
    #[must_use]
    pub fn invalid_hash(hash: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHash {
            hash: hash.into(),
            reason: reason.into(),
        }
    }

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

    /// Create a task failure error
    #[must_use]
    pub fn task(operation: impl Into<String>, err: &tokio::task::JoinError) -> Self {
        Self::Task {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Whether this error is an ordinary cache miss
    #[must_use]
    pub const fn is_miss(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_a_miss() {
        assert!(Error::not_found("h1").is_miss());
        assert!(!Error::encoding("bad").is_miss());
    }

    #[test]
    fn io_error_mentions_path() {
        let err = Error::io(
            std::io::Error::other("boom"),
            "/tmp/cache/h1.commit",
            "write",
        );
        assert_eq!(err.to_string(), "I/O write failed: /tmp/cache/h1.commit");
    }

    #[test]
    fn driver_load_keeps_source() {
        let err = Error::driver_load("fs", DriverError::closed("fs"));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("closed"));
    }
}
