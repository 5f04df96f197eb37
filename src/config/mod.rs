//! Configuration management for the purger.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH` or `--config`)
//! - Environment variable overrides (`PURGER__` prefix)
//! - Section-wise validation
mod queue;
mod retry;
mod server;
mod upstream;
pub use queue::*;
pub use retry::*;
pub use server::*;
pub use upstream::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

pub(crate) const ENV_PREFIX: &str = "PURGER";

/// Main configuration container for the purger.
///
/// Combines all section configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct PurgerConfig {
    /// Intake buffer sizing and backpressure mode
    #[serde(default)]
    pub queue: QueueConfig,
    /// Consumer concurrency
    #[serde(default)]
    pub workers: WorkersConfig,
    /// Per-batch retry policy
    #[serde(default)]
    pub retry: BackoffPolicy,
    /// Equivalent CDN purge endpoints
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Graceful shutdown bounds
    #[serde(default)]
    pub drain: DrainConfig,
    /// HTTP intake listener
    #[serde(default)]
    pub server: ServerConfig,
    /// Prometheus exporter
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Debug for PurgerConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PurgerConfig")
            .field("queue", &self.queue)
            .field("workers", &self.workers)
            .field("upstream", &self.upstream.targets)
            .finish()
    }
}

impl PurgerConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `PURGER__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so that `with_override_config()` can still be
    /// applied. Callers MUST call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/purger.toml");
    /// std::env::set_var("PURGER__WORKERS__COUNT", "8");
    /// let cfg = PurgerConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path).required(true))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.queue.validate()?;
        self.workers.validate()?;
        self.retry.validate()?;
        self.upstream.validate()?;
        self.drain.validate()?;
        self.server.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("upstream.targets")
}
