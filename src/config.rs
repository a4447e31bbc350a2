//! # Dispatcher Configuration
//!
//! Layered configuration for the lifecycle dispatcher:
//!
//! 1. Compiled defaults ([`DispatcherConfig::default`])
//! 2. An optional file (TOML, YAML or JSON, detected by extension)
//! 3. Environment variables prefixed with `LIFECYCLE`, nested with `__`
//!
//! ```bash
//! export LIFECYCLE__POOL__MAX_CONCURRENCY=16
//! export LIFECYCLE__POOL__OVERFLOW_POLICY=reject
//! export LIFECYCLE__SYNC_FAILURE_POLICY=propagate
//! ```

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::system;
use crate::error::ConfigurationError;

/// What happens when a synchronous handler fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFailurePolicy {
    /// Log and continue with the remaining handlers
    #[default]
    Contain,
    /// Stop dispatching and return the failure to the caller
    Propagate,
}

/// What `submit` does when the async queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for queue space
    #[default]
    Block,
    /// Drop the task and log
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsyncPoolConfig {
    pub pool_id: String,
    pub max_concurrency: usize,
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for AsyncPoolConfig {
    fn default() -> Self {
        Self {
            pool_id: system::DEFAULT_ASYNC_POOL_ID.to_string(),
            max_concurrency: system::DEFAULT_ASYNC_POOL_SIZE,
            queue_capacity: system::DEFAULT_ASYNC_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Largest serialized payload copied for async handlers; 0 disables the limit
    pub max_snapshot_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub pool: AsyncPoolConfig,
    pub snapshot: SnapshotConfig,
    pub sync_failure_policy: SyncFailurePolicy,
}

impl DispatcherConfig {
    /// Load defaults, then `path` if given, then `LIFECYCLE__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::load_with_env_prefix(path, system::CONFIG_ENV_PREFIX)
    }

    /// Same as [`load`](Self::load) with an explicit environment prefix
    pub fn load_with_env_prefix(
        path: Option<&Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading dispatcher configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: DispatcherConfig = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator(system::CONFIG_ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.pool.pool_id.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "pool.pool_id",
                "must not be blank",
            ));
        }
        let upper = max_pool_bound();
        for (field, value) in [
            ("pool.max_concurrency", self.pool.max_concurrency),
            ("pool.queue_capacity", self.pool.queue_capacity),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    "must be greater than zero",
                ));
            }
            if value > upper {
                return Err(ConfigurationError::invalid_value(
                    field,
                    format!("must not exceed {upper}"),
                ));
            }
        }
        Ok(())
    }
}

/// Largest pool size a tokio semaphore and the termination drain can represent
fn max_pool_bound() -> usize {
    system::MAX_ASYNC_POOL_BOUND.min(tokio::sync::Semaphore::MAX_PERMITS)
}
