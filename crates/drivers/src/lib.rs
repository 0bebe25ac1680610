//! Pluggable key-value storage drivers for levelcache
//!
//! A cache call opens a store through a named [`Driver`], uses it through
//! the uniform [`KeyValueStore`] interface and closes it before returning.
//! Optional backend features are exposed as capability traits; today that
//! is only [`Expire`].
//!
//! # Example
//!
//! ```ignore
//! use levelcache_drivers::{DriverOptions, DriverRegistry};
//!
//! let registry = DriverRegistry::builtin();
//! let handle = registry.open("memory", "my-namespace", &DriverOptions::new()).await?;
//! handle.put("hash", b"value".to_vec()).await?;
//! handle.close().await?;
//! ```

#![expect(
    clippy::missing_errors_doc,
    reason = "All fallible operations return DriverError; variants are documented there"
)]

mod error;
mod fs;
mod handle;
mod memory;
mod options;
mod registry;
mod store;

pub use error::{DriverError, Result};
pub use fs::{FsDriver, FsStore};
pub use handle::DriverHandle;
pub use memory::{MemoryDriver, MemoryStore};
pub use options::DriverOptions;
pub use registry::{DriverRegistration, DriverRegistry};
pub use store::{Driver, Expire, KeyValueStore, SharedStore};
