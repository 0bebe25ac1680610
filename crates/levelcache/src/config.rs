//! Layered cache configuration
//!
//! Configuration is assembled once, when a cache client is built, from:
//! 1. explicit options supplied by the caller,
//! 2. `LEVEL_TASK_RUNNER_*` environment variables (these win),
//! 3. options the selected driver always requires.
//!
//! The environment is read from an [`EnvSnapshot`] so the process
//! environment is consulted exactly once and tests can supply their own.

use crate::{Error, Result};
use levelcache_archive::ArchiveLayout;
use levelcache_drivers::{DriverOptions, DriverRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU64;
use std::time::Duration;
use tracing::warn;

/// Prefix of environment variables that override cache options
pub const ENV_PREFIX: &str = "LEVEL_TASK_RUNNER_";

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "cache-task-runner";

const KEY_DRIVER: &str = "driver";
const KEY_NAME: &str = "name";
const KEY_TIME_TO_LIVE: &str = "time_to_live";

/// Options supplied by the caller, typically from task runner JSON
///
/// Keys other than the typed ones are passed to the driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Storage driver name; absent disables the cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    /// Namespace handed to the driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Expiry hint in seconds for drivers that support it
    #[serde(
        default,
        alias = "timeToLive",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_to_live: Option<u64>,

    /// Log internal steps
    #[serde(default)]
    pub debug: bool,

    /// Archive entry layout
    #[serde(default)]
    pub layout: ArchiveLayout,

    /// Driver-specific options
    #[serde(flatten)]
    pub driver_options: BTreeMap<String, serde_json::Value>,
}

impl CacheOptions {
    /// Set the driver name
    #[must_use]
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Set the namespace
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the time-to-live in seconds
    #[must_use]
    pub fn with_time_to_live(mut self, seconds: u64) -> Self {
        self.time_to_live = Some(seconds);
        self
    }

    /// Enable or disable debug logging
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the archive layout
    #[must_use]
    pub fn with_layout(mut self, layout: ArchiveLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Add a driver-specific option
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.driver_options.insert(key.into(), value.into());
        self
    }

    /// Parse options from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::configuration(format!("invalid cache options: {e}")))
    }
}

/// A frozen view of environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    #[must_use]
    pub fn capture() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// An empty environment
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a variable
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Variables whose name starts with `prefix` (ASCII case-insensitive),
    /// as `(suffix, value)` pairs
    fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.vars.iter().filter_map(move |(key, value)| {
            let head = key.get(..prefix.len())?;
            if head.eq_ignore_ascii_case(prefix) {
                Some((&key[prefix.len()..], value.as_str()))
            } else {
                None
            }
        })
    }
}

impl<K, V> FromIterator<(K, V)> for EnvSnapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Resolved, immutable cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Storage driver name; `None` disables the cache
    pub driver: Option<String>,
    /// Namespace handed to the driver
    pub name: String,
    /// Expiry hint for drivers that support it
    pub time_to_live: Option<NonZeroU64>,
    /// Log internal steps
    pub debug: bool,
    /// Archive entry layout
    pub layout: ArchiveLayout,
    /// Options passed to the driver on open
    pub driver_options: DriverOptions,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Configuration {
    /// A configuration with no driver
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            driver: None,
            name: DEFAULT_NAMESPACE.to_string(),
            time_to_live: None,
            debug: false,
            layout: ArchiveLayout::default(),
            driver_options: DriverOptions::new(),
        }
    }

    /// Whether a driver is configured
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.driver.is_some()
    }

    /// Time-to-live as a duration
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.time_to_live.map(|s| Duration::from_secs(s.get()))
    }

    /// Merge explicit options, environment overrides and driver requirements
    ///
    /// Recognized environment suffixes (`DRIVER`, `NAME`, `TIME_TO_LIVE`,
    /// matched case-insensitively) replace the corresponding explicit option.
    /// Any other `LEVEL_TASK_RUNNER_<SUFFIX>` variable becomes the driver
    /// option `<SUFFIX>`, verbatim. Empty variables are ignored. Options the
    /// driver registration forces are applied last.
    pub fn resolve(
        options: &CacheOptions,
        env: &EnvSnapshot,
        registry: &DriverRegistry,
    ) -> Result<Self> {
        let mut driver = non_blank(options.driver.as_deref());
        let mut name = non_blank(options.name.as_deref());
        let mut time_to_live = options.time_to_live.and_then(|secs| {
            let ttl = NonZeroU64::new(secs);
            if ttl.is_none() {
                warn!("Ignoring time_to_live of 0 seconds");
            }
            ttl
        });

        let mut driver_options = DriverOptions::new();
        for (key, value) in &options.driver_options {
            if let Some(value) = option_value(key, value)? {
                driver_options.insert(key.clone(), value);
            }
        }

        for (suffix, value) in env.with_prefix(ENV_PREFIX) {
            if suffix.is_empty() || value.is_empty() {
                continue;
            }
            match suffix.to_ascii_lowercase().as_str() {
                KEY_DRIVER => driver = non_blank(Some(value)),
                KEY_NAME => name = non_blank(Some(value)),
                KEY_TIME_TO_LIVE => match parse_ttl(value) {
                    Some(ttl) => time_to_live = Some(ttl),
                    None => warn!(
                        value,
                        "Ignoring {ENV_PREFIX}TIME_TO_LIVE: expected a positive number of seconds"
                    ),
                },
                _ => driver_options.insert(suffix, value),
            }
        }

        if let Some(forced) = driver.as_deref().and_then(|d| registry.forced_options(d)) {
            driver_options.extend(forced);
        }

        Ok(Self {
            driver,
            name: name.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            time_to_live,
            debug: options.debug,
            layout: options.layout,
            driver_options,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_ttl(value: &str) -> Option<NonZeroU64> {
    value.trim().parse::<NonZeroU64>().ok()
}

/// Driver options are strings; scalars are stringified and null is dropped
fn option_value(key: &str, value: &serde_json::Value) -> Result<Option<String>> {
    use serde_json::Value;
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Array(_) | Value::Object(_) => Err(Error::configuration(format!(
            "driver option '{key}' must be a string, number or boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levelcache_drivers::FsDriver;

    fn resolve(options: &CacheOptions, env: &[(&str, &str)]) -> Configuration {
        let env: EnvSnapshot = env.iter().copied().collect();
        Configuration::resolve(options, &env, &DriverRegistry::builtin()).unwrap()
    }

    #[test]
    fn defaults_without_anything() {
        let config = resolve(&CacheOptions::default(), &[]);
        assert_eq!(config, Configuration::disabled());
        assert!(!config.is_enabled());
        assert_eq!(config.name, "cache-task-runner");
    }

    #[test]
    fn explicit_options_are_used() {
        let options = CacheOptions::default()
            .with_driver("memory")
            .with_name("builds")
            .with_time_to_live(60)
            .with_debug(true);
        let config = resolve(&options, &[]);

        assert_eq!(config.driver.as_deref(), Some("memory"));
        assert_eq!(config.name, "builds");
        assert_eq!(config.ttl(), Some(Duration::from_secs(60)));
        assert!(config.debug);
    }

    #[test]
    fn environment_overrides_explicit_options() {
        let options = CacheOptions::default()
            .with_driver("memory")
            .with_name("checked-in")
            .with_time_to_live(60);
        let config = resolve(
            &options,
            &[
                ("LEVEL_TASK_RUNNER_DRIVER", "fs"),
                ("LEVEL_TASK_RUNNER_NAME", "from-env"),
                ("LEVEL_TASK_RUNNER_TIME_TO_LIVE", "3600"),
            ],
        );

        assert_eq!(config.driver.as_deref(), Some("fs"));
        assert_eq!(config.name, "from-env");
        assert_eq!(config.ttl(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn bare_prefix_is_not_a_driver_option() {
        let config = resolve(
            &CacheOptions::default().with_driver("memory"),
            &[("LEVEL_TASK_RUNNER_", "stray")],
        );
        assert!(config.driver_options.is_empty());
        assert_eq!(config.driver_options.get(""), None);
    }

    #[test]
    fn prefix_and_suffix_match_case_insensitively() {
        let config = resolve(
            &CacheOptions::default(),
            &[("level_task_runner_Driver", "memory")],
        );
        assert_eq!(config.driver.as_deref(), Some("memory"));
    }

    #[test]
    fn unknown_suffixes_pass_through_verbatim() {
        let config = resolve(
            &CacheOptions::default().with_driver("memory"),
            &[
                ("LEVEL_TASK_RUNNER_Host", "redis.internal"),
                ("LEVEL_TASK_RUNNER_PORT", "6379"),
                ("UNRELATED", "x"),
            ],
        );
        assert_eq!(config.driver_options.get("Host"), Some("redis.internal"));
        assert_eq!(config.driver_options.get("PORT"), Some("6379"));
        assert_eq!(config.driver_options.len(), 2);
    }

    #[test]
    fn debug_is_not_environment_controlled() {
        let config = resolve(
            &CacheOptions::default(),
            &[("LEVEL_TASK_RUNNER_DEBUG", "true")],
        );
        assert!(!config.debug);
        assert_eq!(config.driver_options.get("DEBUG"), Some("true"));
    }

    #[test]
    fn empty_environment_values_are_ignored() {
        let config = resolve(
            &CacheOptions::default().with_driver("memory"),
            &[("LEVEL_TASK_RUNNER_DRIVER", "")],
        );
        assert_eq!(config.driver.as_deref(), Some("memory"));
    }

    #[test]
    fn invalid_ttl_is_ignored() {
        let config = resolve(
            &CacheOptions::default().with_time_to_live(10),
            &[("LEVEL_TASK_RUNNER_TIME_TO_LIVE", "soon")],
        );
        assert_eq!(config.ttl(), Some(Duration::from_secs(10)));

        let config = resolve(&CacheOptions::default().with_time_to_live(0), &[]);
        assert_eq!(config.ttl(), None);
    }

    #[test]
    fn forced_driver_options_win() {
        let options = CacheOptions::default()
            .with_driver("fs")
            .with_option(FsDriver::CREATE_IF_MISSING, false);
        let config = resolve(&options, &[]);
        assert_eq!(
            config.driver_options.get(FsDriver::CREATE_IF_MISSING),
            Some("true")
        );
    }

    #[test]
    fn forced_options_follow_environment_driver() {
        let config = resolve(
            &CacheOptions::default().with_driver("memory"),
            &[("LEVEL_TASK_RUNNER_DRIVER", "leveldown")],
        );
        assert_eq!(
            config.driver_options.get(FsDriver::CREATE_IF_MISSING),
            Some("true")
        );
    }

    #[test]
    fn blank_driver_disables() {
        let config = resolve(&CacheOptions::default().with_driver("   "), &[]);
        assert!(!config.is_enabled());
    }

    #[test]
    fn options_from_json_collect_driver_options() {
        let options = CacheOptions::from_json(
            r#"{"driver":"fs","timeToLive":30,"debug":true,"location":"/var/cache","retries":3,"compress":false,"unused":null}"#,
        )
        .unwrap();
        let config = resolve(&options, &[]);

        assert_eq!(config.ttl(), Some(Duration::from_secs(30)));
        assert!(config.debug);
        assert_eq!(config.driver_options.get("location"), Some("/var/cache"));
        assert_eq!(config.driver_options.get("retries"), Some("3"));
        assert_eq!(config.driver_options.get("compress"), Some("false"));
        assert_eq!(config.driver_options.get("unused"), None);
    }

    #[test]
    fn nested_driver_options_are_rejected() {
        let options = CacheOptions::default().with_option("nested", serde_json::json!({"a": 1}));
        let err = Configuration::resolve(
            &options,
            &EnvSnapshot::empty(),
            &DriverRegistry::builtin(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn layout_from_json() {
        let options = CacheOptions::from_json(r#"{"layout":"absolute"}"#).unwrap();
        assert_eq!(options.layout, ArchiveLayout::Absolute);
    }

    #[test]
    fn capture_reads_process_environment() {
        temp_env::with_var("LEVEL_TASK_RUNNER_NAME", Some("captured"), || {
            let env = EnvSnapshot::capture();
            assert_eq!(env.get("LEVEL_TASK_RUNNER_NAME"), Some("captured"));
        });
    }
}
