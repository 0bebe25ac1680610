//! Content-addressed remote cache client for task runners
//!
//! A task runner computes a hash for each task and asks the cache to
//! [`store`](LevelCache::store) the task's output directory under that hash
//! after running it, or to [`retrieve`](LevelCache::retrieve) it instead of
//! running the task.
//!
//! - The directory `<cache_dir>/<hash>` is archived as an uncompressed tar
//!   (see `levelcache-archive`).
//! - The archive is base64-encoded and put into a key-value store chosen by
//!   name from a [`DriverRegistry`] (see `levelcache-drivers`).
//! - If `time_to_live` is set and the driver can expire keys, the entry is
//!   given an expiry.
//! - A successful retrieve leaves `<cache_dir>/<hash>.commit` behind as proof
//!   that extraction completed.
//!
//! Both operations return `bool` and never fail: a broken or missing cache
//! simply means the task runs again.
//!
//! # Configuration
//!
//! Options come from [`CacheOptions`], overridden by `LEVEL_TASK_RUNNER_*`
//! environment variables, and are frozen into a [`Configuration`] when the
//! client is built.
//!
//! ```ignore
//! use levelcache::{CacheOptions, LevelCache};
//!
//! let cache = LevelCache::new(CacheOptions::default().with_driver("fs").with_name("ci"));
//! if !cache.retrieve(&hash, &cache_dir).await {
//!     run_task().await?;
//!     cache.store(&hash, &cache_dir).await;
//! }
//! ```

#![expect(
    clippy::missing_errors_doc,
    reason = "Public operations return bool; the few fallible helpers share the crate Error"
)]

mod client;
mod codec;
pub mod config;
mod error;
mod hash;

pub use client::{LevelCache, LevelCacheBuilder, RemoteCache};
pub use codec::{decode, encode};
pub use config::{CacheOptions, Configuration, DEFAULT_NAMESPACE, ENV_PREFIX, EnvSnapshot};
pub use error::{Error, Result};
pub use hash::{commit_marker_name, validate_hash};

pub use levelcache_archive::ArchiveLayout;
pub use levelcache_drivers::{
    Driver, DriverError, DriverOptions, DriverRegistry, Expire, FsDriver, KeyValueStore,
    MemoryDriver, SharedStore,
};
