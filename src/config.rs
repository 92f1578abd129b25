use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

use crate::collector::DrainPolicy;
use crate::sign::SignInConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Settings for one [`WindowedBatchCollector`](crate::WindowedBatchCollector) instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Flush interval for the background scheduler, in milliseconds.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// Size threshold that triggers an early drain, and the upper bound on
    /// items removed per drain.
    #[serde(default = "default_max_qty")]
    pub max_qty: usize,

    /// Maximum number of buffered items. Submissions beyond this fail fast.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Which thread performs the early drain when `max_qty` is reached.
    #[serde(default)]
    pub drain_policy: DrainPolicy,
}

fn default_period_ms() -> u64 {
    1000
}

fn default_max_qty() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    1000
}

impl CollectorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::ValidationError("period_ms must be > 0".into()));
        }

        if self.max_qty == 0 {
            return Err(ConfigError::ValidationError("max_qty must be > 0".into()));
        }

        if self.queue_capacity < self.max_qty {
            return Err(ConfigError::ValidationError(format!(
                "queue_capacity ({}) must be >= max_qty ({})",
                self.queue_capacity, self.max_qty
            )));
        }

        Ok(())
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            max_qty: default_max_qty(),
            queue_capacity: default_queue_capacity(),
            drain_policy: DrainPolicy::default(),
        }
    }
}

/// Settings for one [`InstrumentedWorkerPool`](crate::InstrumentedWorkerPool) instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the bounded work queue. Submissions beyond this are rejected.
    #[serde(default = "default_work_queue_capacity")]
    pub queue_capacity: usize,

    /// Wait-time alarm threshold in milliseconds. Values <= 0 disable the check.
    #[serde(default = "default_timeout_ms")]
    pub wait_timeout_ms: i64,

    /// Run-time alarm threshold in milliseconds. Values <= 0 disable the check.
    #[serde(default = "default_timeout_ms")]
    pub run_timeout_ms: i64,
}

fn default_workers() -> usize {
    5
}

fn default_work_queue_capacity() -> usize {
    1000
}

fn default_timeout_ms() -> i64 {
    -1
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ValidationError("workers must be > 0".into()));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "queue_capacity must be > 0".into(),
            ));
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_work_queue_capacity(),
            wait_timeout_ms: default_timeout_ms(),
            run_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Top-level configuration covering both components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindrowConfig {
    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    pub logging_level: Option<String>,

    /// Sign-in reward cycle settings, carried opaquely for game-side services.
    #[serde(default)]
    pub sign_in: Option<SignInConfig>,
}

impl WindrowConfig {
    /// Load config from YAML file
    pub fn from_yaml(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: WindrowConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("YAML parsing error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from TOML file
    pub fn from_toml(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: WindrowConfig = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parsing error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration
    pub fn defaults() -> Self {
        Self {
            collector: CollectorConfig::default(),
            pool: PoolConfig::default(),
            logging_level: Some("info".to_string()),
            sign_in: None,
        }
    }

    /// Get normalized logging level (lowercase)
    pub fn get_logging_level(&self) -> String {
        self.logging_level
            .clone()
            .unwrap_or_else(|| "info".to_string())
            .to_lowercase()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.collector.validate()?;
        self.pool.validate()?;

        if let Some(level) = &self.logging_level {
            let level = level.to_lowercase();
            let allowed = ["trace", "debug", "info", "warn", "error"];
            if !allowed.contains(&level.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "invalid logging_level '{}'. Must be one of: {:?}",
                    level, allowed
                )));
            }
        }

        Ok(())
    }
}

impl Default for WindrowConfig {
    fn default() -> Self {
        Self::defaults()
    }
}
