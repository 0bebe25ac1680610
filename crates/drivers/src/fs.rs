//! Local filesystem driver

use crate::{Driver, DriverError, DriverOptions, KeyValueStore, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

const DRIVER: &str = "fs";

/// Driver storing one file per key under `<location>/<namespace>/`
///
/// Options:
/// - `location`: base directory (default `<tmp>/levelcache`)
/// - `create_if_missing`: create the namespace directory when absent
///
/// Values are written to a temporary file in the same directory and renamed
/// into place, so readers never observe a partially written value.
#[derive(Debug, Clone, Default)]
pub struct FsDriver {
    default_location: Option<PathBuf>,
}

impl FsDriver {
    /// Option naming the base directory
    pub const LOCATION: &'static str = "location";
    /// Option allowing the namespace directory to be created
    pub const CREATE_IF_MISSING: &'static str = "create_if_missing";

    /// Create a driver using `<tmp>/levelcache` unless `location` is given
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver with a different fallback base directory
    #[must_use]
    pub fn with_default_location(location: impl Into<PathBuf>) -> Self {
        Self {
            default_location: Some(location.into()),
        }
    }

    fn base_dir(&self, options: &DriverOptions) -> PathBuf {
        options
            .get(Self::LOCATION)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| self.default_location.clone())
            .unwrap_or_else(|| std::env::temp_dir().join("levelcache"))
    }
}

#[async_trait]
impl Driver for FsDriver {
    async fn open(
        &self,
        namespace: &str,
        options: &DriverOptions,
    ) -> Result<Box<dyn KeyValueStore>> {
        validate_segment(namespace)
            .map_err(|reason| DriverError::open(DRIVER, namespace, reason))?;

        let dir = self.base_dir(options).join(namespace);
        let exists = tokio::fs::try_exists(&dir)
            .await
            .map_err(|e| DriverError::io(e, &dir, "stat"))?;
        if !exists {
            if options.flag(Self::CREATE_IF_MISSING).unwrap_or(false) {
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| DriverError::io(e, &dir, "create_dir_all"))?;
            } else {
                return Err(DriverError::open(
                    DRIVER,
                    namespace,
                    format!("{} does not exist", dir.display()),
                ));
            }
        }

        Ok(Box::new(FsStore {
            dir,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Keys and namespaces become single path segments
fn validate_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("must not be empty");
    }
    if segment.starts_with('.') {
        return Err("must not start with '.'");
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("only ASCII letters, digits, '-', '_' and '.' are allowed");
    }
    Ok(())
}

/// One open view onto a namespace directory
#[derive(Debug)]
pub struct FsStore {
    dir: PathBuf,
    closed: AtomicBool,
}

impl FsStore {
    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::closed(DRIVER));
        }
        validate_segment(key).map_err(|reason| DriverError::invalid_key(key, reason))?;
        Ok(self.dir.join(key))
    }
}

fn write_atomically(dir: &Path, target: &Path, value: &[u8]) -> Result<()> {
    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| DriverError::io(e, dir, "create"))?;
    tmp.write_all(value)
        .map_err(|e| DriverError::io(e, tmp.path(), "write"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| DriverError::io(e, tmp.path(), "sync"))?;
    tmp.persist(target)
        .map_err(|e| DriverError::io(e.error, target, "rename"))?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for FsStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DriverError::io(e, &path, "read")),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.key_path(key)?;
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &value))
            .await
            .map_err(|e| DriverError::backend(DRIVER, format!("write task failed: {e}")))?
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
