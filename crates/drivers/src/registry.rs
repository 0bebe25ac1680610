//! Driver registry
//!
//! Maps driver names to drivers so a backend can be chosen by a string in
//! configuration while every driver stays a statically typed [`Driver`].

use crate::{
    Driver, DriverError, DriverHandle, DriverOptions, FsDriver, KeyValueStore, MemoryDriver,
    Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A registered driver and the options it always requires
#[derive(Clone)]
pub struct DriverRegistration {
    driver: Arc<dyn Driver>,
    forced_options: DriverOptions,
}

impl DriverRegistration {
    /// Options that are force-set whenever this driver is configured
    #[must_use]
    pub fn forced_options(&self) -> &DriverOptions {
        &self.forced_options
    }

    /// The driver itself
    #[must_use]
    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }
}

/// Registry of storage drivers keyed by name
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, DriverRegistration>,
}

impl DriverRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Registry with the built-in drivers
    ///
    /// - `memory` (alias `memdown`): process-wide in-memory store with expiry
    /// - `fs` (alias `leveldown`): one file per key on local disk; always
    ///   opened with `create_if_missing=true`
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let memory: Arc<dyn Driver> = Arc::new(MemoryDriver::shared());
        registry.register("memory", Arc::clone(&memory));
        registry.register("memdown", memory);

        let fs: Arc<dyn Driver> = Arc::new(FsDriver::new());
        let forced = [(FsDriver::CREATE_IF_MISSING, "true")];
        registry.register_with_forced("fs", Arc::clone(&fs), forced);
        registry.register_with_forced("leveldown", fs, forced);
        registry
    }

    /// Register a driver, replacing any driver with the same name
    pub fn register(&mut self, name: impl Into<String>, driver: Arc<dyn Driver>) {
        self.register_with_forced(name, driver, std::iter::empty::<(String, String)>());
    }

    /// Register a driver together with options it must always receive
    pub fn register_with_forced<I, K, V>(
        &mut self,
        name: impl Into<String>,
        driver: Arc<dyn Driver>,
        forced_options: I,
    ) where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.drivers.insert(
            name.into(),
            DriverRegistration {
                driver,
                forced_options: forced_options.into_iter().collect(),
            },
        );
    }

    /// Register a factory function as a driver
    pub fn register_fn<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&str, &DriverOptions) -> Result<Box<dyn KeyValueStore>> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(factory));
    }

    /// Look up a registration by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DriverRegistration> {
        self.drivers.get(name)
    }

    /// Check if a driver is registered under `name`
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Forced options for `name`, if it is registered
    #[must_use]
    pub fn forced_options(&self, name: &str) -> Option<&DriverOptions> {
        self.drivers.get(name).map(DriverRegistration::forced_options)
    }

    /// All registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Open a store from the driver registered as `name`
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::UnknownDriver`] if `name` is not registered, or
    /// whatever the driver reports when it fails to open.
    pub async fn open(
        &self,
        name: &str,
        namespace: &str,
        options: &DriverOptions,
    ) -> Result<DriverHandle> {
        let registration = self
            .drivers
            .get(name)
            .ok_or_else(|| DriverError::UnknownDriver {
                name: name.to_string(),
                available: self.names().join(", "),
            })?;

        let store = registration.driver.open(namespace, options).await?;
        debug!(driver = name, namespace, "Opened store");
        Ok(DriverHandle::new(name, store))
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}
