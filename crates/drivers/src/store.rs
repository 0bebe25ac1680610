//! Key-value store and driver traits

use crate::{DriverOptions, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Uniform key-value interface over a storage backend
///
/// A store is opened for a single cache call and closed at its end.
/// Implementations must tolerate several stores being open concurrently
/// against the same namespace.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value for `key`; `Ok(None)` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Release the underlying connection or session
    async fn close(&self) -> Result<()>;

    /// Expiry capability, if this backend supports it
    fn as_expiring(&self) -> Option<&dyn Expire> {
        None
    }
}

/// Optional capability: automatic key expiration
#[async_trait]
pub trait Expire: Send + Sync {
    /// Expire `key` after `ttl`
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
}

/// Produces stores bound to a namespace
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a store for `namespace`
    async fn open(&self, namespace: &str, options: &DriverOptions)
    -> Result<Box<dyn KeyValueStore>>;
}

#[async_trait]
impl<F> Driver for F
where
    F: Fn(&str, &DriverOptions) -> Result<Box<dyn KeyValueStore>> + Send + Sync,
{
    async fn open(
        &self,
        namespace: &str,
        options: &DriverOptions,
    ) -> Result<Box<dyn KeyValueStore>> {
        self(namespace, options)
    }
}

/// A driver backed by one ready store instance
///
/// Every open hands out a handle onto the same instance. Closing such a
/// handle detaches it; the instance itself stays open for later calls.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<dyn KeyValueStore>,
}

impl SharedStore {
    /// Wrap a ready store
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { inner: store }
    }
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for SharedStore {
    async fn open(
        &self,
        _namespace: &str,
        _options: &DriverOptions,
    ) -> Result<Box<dyn KeyValueStore>> {
        Ok(Box::new(SharedHandle {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct SharedHandle {
    inner: Arc<dyn KeyValueStore>,
}

#[async_trait]
impl KeyValueStore for SharedHandle {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.inner.put(key, value).await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn as_expiring(&self) -> Option<&dyn Expire> {
        self.inner.as_expiring()
    }
}
