//! The cache client
//!
//! Each `store`/`retrieve` call walks the same path:
//! open a driver handle, archive/encode/transfer, close the handle.
//! Every failure along the way is contained and reported as `false`; a
//! cache must never fail the build it is accelerating.

use crate::codec;
use crate::config::{CacheOptions, Configuration, EnvSnapshot};
use crate::hash::{commit_marker_name, validate_hash};
use crate::{Error, Result};
use async_trait::async_trait;
use levelcache_archive::Archiver;
use levelcache_drivers::{DriverHandle, DriverRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The interface a task runner uses to consult a remote cache
#[async_trait]
pub trait RemoteCache: Send + Sync {
    /// Restore the outputs for `hash` into `cache_directory`
    async fn retrieve(&self, hash: &str, cache_directory: &Path) -> bool;

    /// Save `<cache_directory>/<hash>` under `hash`
    async fn store(&self, hash: &str, cache_directory: &Path) -> bool;
}

struct Inner {
    config: Configuration,
    registry: DriverRegistry,
}

/// Remote cache client backed by a pluggable key-value driver
///
/// Cloning is cheap; clones share the frozen configuration. Calls for
/// different hashes are independent and may run concurrently.
#[derive(Clone)]
pub struct LevelCache {
    inner: Arc<Inner>,
}

/// Builder for [`LevelCache`]
#[derive(Debug, Default)]
pub struct LevelCacheBuilder {
    options: CacheOptions,
    env: Option<EnvSnapshot>,
    registry: Option<DriverRegistry>,
}

impl LevelCacheBuilder {
    /// Explicit options
    #[must_use]
    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Environment to read overrides from instead of the process environment
    #[must_use]
    pub fn env(mut self, env: EnvSnapshot) -> Self {
        self.env = Some(env);
        self
    }

    /// Driver registry to resolve the driver name against
    #[must_use]
    pub fn registry(mut self, registry: DriverRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Resolve the configuration and build the client
    ///
    /// A configuration that cannot be resolved is logged and produces a
    /// disabled client.
    #[must_use]
    pub fn build(self) -> LevelCache {
        let env = self.env.unwrap_or_else(EnvSnapshot::capture);
        let registry = self.registry.unwrap_or_else(DriverRegistry::builtin);
        let config = match Configuration::resolve(&self.options, &env, &registry) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Remote cache disabled");
                Configuration {
                    debug: self.options.debug,
                    ..Configuration::disabled()
                }
            }
        };

        if let Some(driver) = config.driver.as_deref()
            && !registry.has(driver)
        {
            warn!(
                driver,
                available = %registry.names().join(", "),
                "Configured storage driver is not registered; remote cache calls will miss"
            );
        }

        LevelCache {
            inner: Arc::new(Inner { config, registry }),
        }
    }
}

impl LevelCache {
    /// Build a client from explicit options and the process environment
    #[must_use]
    pub fn new(options: CacheOptions) -> Self {
        Self::builder().options(options).build()
    }

    /// Start building a client
    #[must_use]
    pub fn builder() -> LevelCacheBuilder {
        LevelCacheBuilder::default()
    }

    /// The configuration resolved at construction
    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.inner.config
    }

    /// Whether a driver is configured
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.config.is_enabled()
    }

    /// Save `<cache_directory>/<hash>` under `hash`
    ///
    /// Returns `false` when the cache is disabled or anything fails.
    pub async fn store(&self, hash: &str, cache_directory: &Path) -> bool {
        match self.try_store(hash, cache_directory).await {
            Ok(stored) => stored,
            Err(e) => {
                self.report("store", hash, &e);
                false
            }
        }
    }

    /// Restore the snapshot for `hash` into `cache_directory`
    ///
    /// On success `<cache_directory>/<hash>.commit` exists and contains
    /// `true`. Returns `false` on a miss, when the cache is disabled, or when
    /// anything fails; a marker from an earlier restore is removed first, so
    /// none exists in those cases.
    pub async fn retrieve(&self, hash: &str, cache_directory: &Path) -> bool {
        match self.try_retrieve(hash, cache_directory).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                self.report("retrieve", hash, &e);
                false
            }
        }
    }

    async fn try_store(&self, hash: &str, cache_directory: &Path) -> Result<bool> {
        validate_hash(hash)?;
        let Some(handle) = self.open().await else {
            return Ok(false);
        };
        let outcome = self.store_with(&handle, hash, cache_directory).await;
        self.release(handle, "store").await;
        outcome.map(|()| true)
    }

    async fn try_retrieve(&self, hash: &str, cache_directory: &Path) -> Result<bool> {
        validate_hash(hash)?;
        clear_commit_marker(hash, cache_directory).await?;
        let Some(handle) = self.open().await else {
            return Ok(false);
        };
        let outcome = self.retrieve_with(&handle, hash, cache_directory).await;
        self.release(handle, "retrieve").await;
        outcome.map(|()| true)
    }

    async fn store_with(&self, handle: &DriverHandle, hash: &str, cache_directory: &Path) -> Result<()> {
        let config = &self.inner.config;

        let archive = self.archive(hash, cache_directory).await?;
        self.step(format_args!(
            "Archived {} ({} bytes)",
            cache_directory.join(hash).display(),
            archive.len()
        ));

        let value = codec::encode(&archive);
        handle
            .put(hash, value)
            .await
            .map_err(|e| Error::store_io("put", e))?;
        self.step(format_args!("Stored item with hash {hash}"));

        if let Some(ttl) = config.ttl() {
            // Expiry is a hint; the value is already stored.
            match handle.expire(hash, ttl).await {
                Ok(true) => self.step(format_args!("Set expiry of {}s on {hash}", ttl.as_secs())),
                Ok(false) => self.step(format_args!(
                    "Driver '{}' cannot expire keys; time_to_live ignored",
                    handle.driver()
                )),
                Err(e) => {
                    if config.debug {
                        warn!(hash, error = %e, "Failed to set expiry on cache item");
                    }
                }
            }
        }
        Ok(())
    }

    async fn retrieve_with(
        &self,
        handle: &DriverHandle,
        hash: &str,
        cache_directory: &Path,
    ) -> Result<()> {
        self.step(format_args!("Retrieving cache for {hash}"));
        let value = handle
            .get(hash)
            .await
            .map_err(|e| Error::store_io("get", e))?
            .ok_or_else(|| Error::not_found(hash))?;

        let archive = codec::decode(&value)?;
        let entries = self.unarchive(archive, cache_directory).await?;

        let marker = cache_directory.join(commit_marker_name(hash));
        tokio::fs::write(&marker, "true")
            .await
            .map_err(|e| Error::io(e, &marker, "write"))?;

        self.step(format_args!(
            "Retrieved cache for {hash} ({entries} entries into {})",
            cache_directory.display()
        ));
        Ok(())
    }

    /// Open a handle for this call; `None` when the cache is disabled
    ///
    /// A driver that cannot be loaded is reported here and treated as
    /// disabled for this call.
    async fn open(&self) -> Option<DriverHandle> {
        let config = &self.inner.config;
        let driver = config.driver.as_deref()?;
        match self
            .inner
            .registry
            .open(driver, &config.name, &config.driver_options)
            .await
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                self.report("open", &config.name, &Error::driver_load(driver, e));
                None
            }
        }
    }

    async fn release(&self, handle: DriverHandle, operation: &str) {
        let driver = handle.driver().to_string();
        if let Err(e) = handle.close().await
            && self.inner.config.debug
        {
            warn!(driver = %driver, operation, error = %e, "Error while closing store");
        }
    }

    async fn archive(&self, hash: &str, cache_directory: &Path) -> Result<Vec<u8>> {
        let archiver = Archiver::new(self.inner.config.layout);
        let dir: PathBuf = cache_directory.to_path_buf();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || archiver.archive(&dir, &hash))
            .await
            .map_err(|e| Error::task("archive", &e))?
            .map_err(Error::from)
    }

    async fn unarchive(&self, archive: Vec<u8>, cache_directory: &Path) -> Result<usize> {
        let archiver = Archiver::new(self.inner.config.layout);
        let dir: PathBuf = cache_directory.to_path_buf();
        tokio::task::spawn_blocking(move || archiver.unarchive(&archive, &dir))
            .await
            .map_err(|e| Error::task("unarchive", &e))?
            .map_err(Error::from)
    }

    fn step(&self, message: std::fmt::Arguments<'_>) {
        if self.inner.config.debug {
            debug!("{message}");
        }
    }

    fn report(&self, operation: &str, key: &str, error: &Error) {
        if let Error::InvalidHash { .. } = error {
            // Caller bug rather than a cache fault: always surfaced.
            warn!(operation, error = %error, "Rejected remote cache call");
            return;
        }
        if !self.inner.config.debug {
            return;
        }
        if error.is_miss() {
            debug!(operation, key, "Cache miss");
        } else {
            warn!(
                operation,
                key,
                error = %error_chain(error),
                "Remote cache operation failed"
            );
        }
    }
}

/// Remove a marker left by an earlier restore so it cannot vouch for this one
async fn clear_commit_marker(hash: &str, cache_directory: &Path) -> Result<()> {
    let marker = cache_directory.join(commit_marker_name(hash));
    match tokio::fs::remove_file(&marker).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(e, &marker, "remove")),
    }
}

/// `error: cause: cause...` on one line
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl std::fmt::Debug for LevelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelCache")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

#[async_trait]
impl RemoteCache for LevelCache {
    async fn retrieve(&self, hash: &str, cache_directory: &Path) -> bool {
        Self::retrieve(self, hash, cache_directory).await
    }

    async fn store(&self, hash: &str, cache_directory: &Path) -> bool {
        Self::store(self, hash, cache_directory).await
    }
}
