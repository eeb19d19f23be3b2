//! Benchmark configuration
//!
//! Defaults reproduce the fixed fixture setup of the comparison; a TOML file
//! can override any of them.
//!
//! ```toml
//! [harness]
//! workers = 1000
//! bench_time = "1s"
//!
//! [devcycle]
//! key_var = "DC_KEY"
//! flag_key = "basic-boolean"
//!
//! [devcycle.options]
//! request_timeout = "2s"
//!
//! [launchdarkly]
//! start_wait = "10s"
//! ```

use crate::error::SetupError;
use crate::providers::env::{DEVCYCLE_KEY_VAR, LAUNCHDARKLY_KEY_VAR};
use crate::providers::{DevCycleOptions, LdConfig};
use duration_str::deserialize_duration;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Flag evaluated against provider A
pub const DEVCYCLE_FLAG_KEY: &str = "basic-boolean";

/// Flag evaluated against provider B
pub const LAUNCHDARKLY_FLAG_KEY: &str = "cb-test-flag-2";

/// Logical workers in each parallel case
pub const DEFAULT_WORKERS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    pub harness: HarnessConfig,
    pub devcycle: DevCycleFixtureConfig,
    pub launchdarkly: LaunchDarklyFixtureConfig,
}

impl BenchConfig {
    /// Load a configuration file, falling back to defaults for absent keys
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SetupError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SetupError> {
        let config: BenchConfig =
            toml::from_str(content).map_err(|e| SetupError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.harness.workers == 0 {
            return Err(SetupError::Config("harness.workers must be at least 1".into()));
        }
        if self.harness.iterations == Some(0) {
            return Err(SetupError::Config("harness.iterations must be at least 1".into()));
        }
        if self.devcycle.flag_key.is_empty() || self.launchdarkly.flag_key.is_empty() {
            return Err(SetupError::Config("flag keys must not be empty".into()));
        }
        Ok(())
    }
}

/// Driver settings shared by every case
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub workers: usize,
    /// Minimum measured time per case when `iterations` is unset
    #[serde(deserialize_with = "deserialize_duration")]
    pub bench_time: Duration,
    /// Fixed iteration count; disables automatic N selection
    pub iterations: Option<u64>,
    /// Fallback default passed to every evaluation
    pub default_value: bool,
    /// Value every evaluation must return
    pub expected: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            bench_time: Duration::from_secs(1),
            iterations: None,
            default_value: false,
            expected: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DevCycleFixtureConfig {
    pub key_var: String,
    pub flag_key: String,
    pub options: DevCycleOptions,
}

impl Default for DevCycleFixtureConfig {
    fn default() -> Self {
        Self {
            key_var: DEVCYCLE_KEY_VAR.to_string(),
            flag_key: DEVCYCLE_FLAG_KEY.to_string(),
            options: DevCycleOptions {
                enable_edge_db: false,
                enable_cloud_bucketing: false,
                request_timeout: Duration::from_secs(2),
                disable_automatic_event_logging: false,
                disable_custom_event_logging: true,
                event_flush_interval: Duration::from_secs(30),
                config_polling_interval: Duration::from_secs(10),
                flush_event_queue_size: 0,
                max_event_queue_size: 0,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaunchDarklyFixtureConfig {
    pub key_var: String,
    pub flag_key: String,
    /// How long client construction waits for the first flag data
    #[serde(deserialize_with = "deserialize_duration")]
    pub start_wait: Duration,
    pub config: LdConfig,
}

impl Default for LaunchDarklyFixtureConfig {
    fn default() -> Self {
        Self {
            key_var: LAUNCHDARKLY_KEY_VAR.to_string(),
            flag_key: LAUNCHDARKLY_FLAG_KEY.to_string(),
            start_wait: Duration::from_secs(10),
            config: LdConfig {
                offline: false,
                ..Default::default()
            },
        }
    }
}
