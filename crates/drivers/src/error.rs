//! Error types for storage drivers

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for driver resolution and key-value operations
#[derive(Error, Debug, Diagnostic)]
pub enum DriverError {
    /// No driver is registered under the requested name
    #[error("Unknown storage driver: {name}")]
    #[diagnostic(
        code(levelcache::driver::unknown),
        help("Registered drivers: {available}")
    )]
    UnknownDriver {
        /// The requested driver name
        name: String,
        /// Comma-separated list of registered names
        available: String,
    },

    /// The driver failed to produce a store
    #[error("Failed to open '{driver}' store for namespace '{namespace}': {message}")]
    #[diagnostic(code(levelcache::driver::open))]
    Open {
        /// Driver name
        driver: String,
        /// Namespace that was being opened
        namespace: String,
        /// What went wrong
        message: String,
    },

    /// I/O error inside a driver
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(code(levelcache::driver::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed
        operation: String,
    },

    /// The key cannot be represented by this driver
    #[error("Invalid key '{key}': {reason}")]
    #[diagnostic(code(levelcache::driver::invalid_key))]
    InvalidKey {
        /// The rejected key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// Backend-specific failure
    #[error("{driver} backend error: {message}")]
    #[diagnostic(code(levelcache::driver::backend))]
    Backend {
        /// Driver name
        driver: String,
        /// Error message from the backend
        message: String,
    },

    /// Operation on a store that was already closed
    #[error("Store '{driver}' is closed")]
    #[diagnostic(
        code(levelcache::driver::closed),
        help("Handles are scoped to a single call; open a new one")
    )]
    Closed {
        /// Driver name
        driver: String,
    },
}

impl DriverError {
    /// Create an open error
    #[must_use]
    pub fn open(
        driver: impl Into<String>,
        namespace: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Open {
            driver: driver.into(),
            namespace: namespace.into(),
            message: message.into(),
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

    /// Create an invalid key error
    #[must_use]
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a backend error
    #[must_use]
    pub fn backend(driver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            driver: driver.into(),
            message: message.into(),
        }
    }

    /// Create a closed-store error
    #[must_use]
    pub fn closed(driver: impl Into<String>) -> Self {
        Self::Closed {
            driver: driver.into(),
        }
    }
}

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;
