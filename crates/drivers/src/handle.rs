//! Scoped driver handles

use crate::{DriverError, KeyValueStore, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// A store opened for exactly one cache call
///
/// Consume it with [`DriverHandle::close`]. A handle dropped without being
/// closed (early return, panic) schedules the close on the current tokio
/// runtime so the backend session is still released.
pub struct DriverHandle {
    driver: String,
    store: Option<Box<dyn KeyValueStore>>,
}

impl DriverHandle {
    /// Wrap a freshly opened store
    #[must_use]
    pub fn new(driver: impl Into<String>, store: Box<dyn KeyValueStore>) -> Self {
        Self {
            driver: driver.into(),
            store: Some(store),
        }
    }

    /// Name of the driver that produced this handle
    #[must_use]
    pub fn driver(&self) -> &str {
        &self.driver
    }

    fn store(&self) -> Result<&dyn KeyValueStore> {
        self.store
            .as_deref()
            .ok_or_else(|| DriverError::closed(&self.driver))
    }

    /// Fetch a value; `Ok(None)` on a miss
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.store()?.get(key).await
    }

    /// Store a value
    pub async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.store()?.put(key, value).await
    }

    /// Whether the underlying store can expire keys
    #[must_use]
    pub fn supports_expire(&self) -> bool {
        self.store
            .as_deref()
            .is_some_and(|s| s.as_expiring().is_some())
    }

    /// Expire `key` after `ttl` if the store supports it
    ///
    /// Returns `Ok(false)` without touching the store when the capability is
    /// absent.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        match self.store()?.as_expiring() {
            Some(expiring) => {
                expiring.expire(key, ttl).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close the underlying store
    pub async fn close(mut self) -> Result<()> {
        match self.store.take() {
            Some(store) => store.close().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("driver", &self.driver)
            .field("open", &self.store.is_some())
            .finish()
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        let Some(store) = self.store.take() else {
            return;
        };
        let driver = std::mem::take(&mut self.driver);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(driver = %driver, "Closing store for dropped handle");
                runtime.spawn(async move {
                    if let Err(e) = store.close().await {
                        warn!(driver = %driver, error = %e, "Failed to close dropped store");
                    }
                });
            }
            Err(_) => {
                warn!(driver = %driver, "Store handle dropped outside a runtime; not closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Expire;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        closes: AtomicUsize,
        expires: AtomicUsize,
    }

    struct Plain(Arc<Counters>);

    #[async_trait]
    impl KeyValueStore for Plain {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn put(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Expiring(Arc<Counters>);

    #[async_trait]
    impl KeyValueStore for Expiring {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn put(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn as_expiring(&self) -> Option<&dyn Expire> {
            Some(self)
        }
    }

    #[async_trait]
    impl Expire for Expiring {
        async fn expire(&self, _key: &str, _ttl: Duration) -> Result<()> {
            self.0.expires.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn expire_skipped_without_capability() {
        let counters = Arc::new(Counters::default());
        let handle = DriverHandle::new("plain", Box::new(Plain(Arc::clone(&counters))));

        assert!(!handle.supports_expire());
        assert!(!handle.expire("k", Duration::from_secs(5)).await.unwrap());
        handle.close().await.unwrap();

        assert_eq!(counters.expires.load(Ordering::SeqCst), 0);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expire_forwarded_with_capability() {
        let counters = Arc::new(Counters::default());
        let handle = DriverHandle::new("exp", Box::new(Expiring(Arc::clone(&counters))));

        assert!(handle.supports_expire());
        assert!(handle.expire("k", Duration::from_secs(5)).await.unwrap());
        handle.close().await.unwrap();

        assert_eq!(counters.expires.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_handle_is_closed_in_background() {
        let counters = Arc::new(Counters::default());
        {
            let _handle = DriverHandle::new("plain", Box::new(Plain(Arc::clone(&counters))));
        }
        for _ in 0..100 {
            if counters.closes.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_shows_driver() {
        let handle = DriverHandle::new(
            "plain",
            Box::new(Plain(Arc::new(Counters::default()))),
        );
        let debug = format!("{handle:?}");
        assert!(debug.contains("plain"));
        drop(handle);
    }
}
