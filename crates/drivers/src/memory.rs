//! In-memory driver

use crate::{Driver, DriverError, DriverOptions, Expire, KeyValueStore, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const DRIVER: &str = "memory";

static SHARED: LazyLock<MemoryDriver> = LazyLock::new(MemoryDriver::new);

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

#[derive(Debug, Default)]
struct Namespace {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Namespace {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Driver keeping values in process memory
///
/// Stores opened for the same namespace from the same driver share data, so
/// a value put through one per-call store is visible to the next. Supports
/// [`Expire`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    namespaces: Arc<Mutex<HashMap<String, Arc<Namespace>>>>,
}

impl MemoryDriver {
    /// Create a driver with its own, empty set of namespaces
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide driver used by the built-in registry
    #[must_use]
    pub fn shared() -> Self {
        SHARED.clone()
    }

    fn namespace(&self, name: &str) -> Arc<Namespace> {
        let mut namespaces = self
            .namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(namespaces.entry(name.to_string()).or_default())
    }

    /// Number of live keys in `namespace`
    #[must_use]
    pub fn len(&self, namespace: &str) -> usize {
        let now = Instant::now();
        self.namespace(namespace)
            .lock()
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn open(
        &self,
        namespace: &str,
        _options: &DriverOptions,
    ) -> Result<Box<dyn KeyValueStore>> {
        Ok(Box::new(MemoryStore {
            namespace: self.namespace(namespace),
            closed: AtomicBool::new(false),
        }))
    }
}

/// One open view onto a memory namespace
#[derive(Debug)]
pub struct MemoryStore {
    namespace: Arc<Namespace>,
    closed: AtomicBool,
}

impl MemoryStore {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::closed(DRIVER));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        let mut entries = self.namespace.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.ensure_open()?;
        // A fresh write clears any pending expiry, like SET does.
        self.namespace.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn as_expiring(&self) -> Option<&dyn Expire> {
        Some(self)
    }
}

#[async_trait]
impl Expire for MemoryStore {
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.ensure_open()?;
        if let Some(entry) = self.namespace.lock().get_mut(key) {
            // A deadline past what `Instant` can represent never arrives.
            entry.expires_at = Instant::now().checked_add(ttl);
        }
        Ok(())
    }
}
