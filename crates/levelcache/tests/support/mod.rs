//! Test doubles shared by the integration suites

#![allow(dead_code)]

use async_trait::async_trait;
use levelcache::{
    CacheOptions, Driver, DriverError, DriverOptions, DriverRegistry, EnvSnapshot, Expire,
    KeyValueStore, LevelCache, MemoryDriver,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counts of calls made against a [`RecordingDriver`]
#[derive(Debug, Default)]
pub struct Calls {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub expires: AtomicUsize,
    pub last_ttl: Mutex<Option<Duration>>,
}

impl Calls {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
    pub fn expires(&self) -> usize {
        self.expires.load(Ordering::SeqCst)
    }
}

/// Which operations should fail
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub open: bool,
    pub get: bool,
    pub put: bool,
    pub expire: bool,
    pub close: bool,
}

/// In-memory driver that records every call and can inject failures
#[derive(Clone, Default)]
pub struct RecordingDriver {
    pub calls: Arc<Calls>,
    pub data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub expiring: bool,
    pub faults: Faults,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expiring() -> Self {
        Self {
            expiring: true,
            ..Self::default()
        }
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    pub fn raw_put(&self, key: &str, value: &[u8]) {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
    }

    pub fn raw_get(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn open(
        &self,
        namespace: &str,
        _options: &DriverOptions,
    ) -> Result<Box<dyn KeyValueStore>, DriverError> {
        if self.faults.open {
            return Err(DriverError::open("recording", namespace, "injected"));
        }
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingStore {
            driver: self.clone(),
        }))
    }
}

struct RecordingStore {
    driver: RecordingDriver,
}

#[async_trait]
impl KeyValueStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DriverError> {
        self.driver.calls.gets.fetch_add(1, Ordering::SeqCst);
        if self.driver.faults.get {
            return Err(DriverError::backend("recording", "get injected"));
        }
        Ok(self.driver.raw_get(key))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), DriverError> {
        self.driver.calls.puts.fetch_add(1, Ordering::SeqCst);
        if self.driver.faults.put {
            return Err(DriverError::backend("recording", "put injected"));
        }
        self.driver.raw_put(key, &value);
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.driver.calls.closes.fetch_add(1, Ordering::SeqCst);
        if self.driver.faults.close {
            return Err(DriverError::backend("recording", "close injected"));
        }
        Ok(())
    }

    fn as_expiring(&self) -> Option<&dyn Expire> {
        if self.driver.expiring {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl Expire for RecordingStore {
    async fn expire(&self, _key: &str, ttl: Duration) -> Result<(), DriverError> {
        self.driver.calls.expires.fetch_add(1, Ordering::SeqCst);
        *self.driver.calls.last_ttl.lock().unwrap() = Some(ttl);
        if self.driver.faults.expire {
            return Err(DriverError::backend("recording", "expire injected"));
        }
        Ok(())
    }
}

/// A client using `driver` registered as "recording", with no environment
pub fn cache_with(driver: &RecordingDriver, options: CacheOptions) -> LevelCache {
    let mut registry = DriverRegistry::new();
    registry.register("recording", Arc::new(driver.clone()));
    LevelCache::builder()
        .options(options.with_driver("recording").with_debug(true))
        .env(EnvSnapshot::empty())
        .registry(registry)
        .build()
}

/// A client on an isolated in-memory driver
pub fn memory_cache() -> LevelCache {
    let mut registry = DriverRegistry::new();
    registry.register("memory", Arc::new(MemoryDriver::new()));
    LevelCache::builder()
        .options(CacheOptions::default().with_driver("memory").with_debug(true))
        .env(EnvSnapshot::empty())
        .registry(registry)
        .build()
}

/// Write `files` under `<cache_dir>/<hash>/`
pub fn write_task_output(cache_dir: &Path, hash: &str, files: &[(&str, &str)]) {
    let root = cache_dir.join(hash);
    for (rel, contents) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
}

/// Sorted relative paths of every entry under `dir`
pub fn listing(dir: &Path) -> Vec<String> {
    let mut out = Vec::new();
    collect(dir, dir, &mut out);
    out.sort();
    out
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries {
        let path = entry.unwrap().path();
        out.push(
            path.strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned(),
        );
        if path.is_dir() {
            collect(root, &path, out);
        }
    }
}
