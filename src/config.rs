//! Configuration for the resolver, executor and inclusion polling
//!
//! Loaded from an optional TOML file layered with `LEDGER_TX__*` environment
//! variables (double underscore separates sections, e.g.
//! `LEDGER_TX__RESOLVER__MAX_BATCH_SIZE=20`). A `.env` file is honoured.

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LEDGER_TX";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub inclusion: InclusionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Budget applied when a transaction does not set one
    #[serde(default = "default_gas_budget")]
    pub default_gas_budget: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Ids or names per lookup request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Upper bound on coins selected for gas payment
    #[serde(default = "default_max_gas_objects")]
    pub max_gas_objects: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclusionConfig {
    #[serde(default = "default_inclusion_timeout_ms")]
    pub timeout_ms: u64,

    /// Base interval between polls; grows exponentially after errors
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Fraction of the backoff added or removed at random
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_gas_budget() -> u64 { 50_000_000 }
fn default_max_batch_size() -> usize { 50 }
fn default_max_gas_objects() -> usize { 256 }
fn default_inclusion_timeout_ms() -> u64 { 60_000 }
fn default_poll_interval_ms() -> u64 { 2_000 }
fn default_max_backoff_ms() -> u64 { 10_000 }
fn default_jitter_factor() -> f64 { 0.1 }
fn default_log_level() -> String { "info".to_string() }

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_gas_budget: default_gas_budget(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            max_gas_objects: default_max_gas_objects(),
        }
    }
}

impl Default for InclusionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_inclusion_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl InclusionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load from `path` (if given) and the environment, then validate
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file only, ignoring the environment
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.executor.default_gas_budget > 0, "executor.default_gas_budget must be positive");
        ensure!(self.resolver.max_batch_size > 0, "resolver.max_batch_size must be positive");
        ensure!(self.resolver.max_gas_objects > 0, "resolver.max_gas_objects must be positive");
        ensure!(self.inclusion.poll_interval_ms > 0, "inclusion.poll_interval_ms must be positive");
        ensure!(
            self.inclusion.max_backoff_ms >= self.inclusion.poll_interval_ms,
            "inclusion.max_backoff_ms must be at least inclusion.poll_interval_ms"
        );
        ensure!(
            (0.0..=1.0).contains(&self.inclusion.jitter_factor),
            "inclusion.jitter_factor must be within [0, 1]"
        );
        Ok(())
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
