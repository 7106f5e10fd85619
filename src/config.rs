//! Configuration Module
//!
//! Handles loading toolkit configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, ToolkitError};
use crate::shard::ShardWeights;
use crate::tasks::{
    BatchWorkerConfig, OverflowPolicy, DEFAULT_MAX_CONCURRENT_FLUSHES, DEFAULT_QUEUE_CAPACITY,
};

/// Toolkit configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Batch worker flush interval in milliseconds
    pub batch_interval_ms: u64,
    /// Batch worker intake queue capacity
    pub batch_capacity: usize,
    /// Batch worker behavior when the queue is full
    pub batch_overflow: OverflowPolicy,
    /// Maximum number of batch callbacks running at once
    pub max_concurrent_flushes: usize,
    /// Typed cache sweep interval in milliseconds
    pub cache_cleanup_interval_ms: u64,
    /// Weighted shard list
    pub shards: ShardWeights,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Missing or unparsable values fall back to the defaults.
    ///
    /// # Environment Variables
    /// - `PERFKIT_BATCH_INTERVAL_MS` - Batch flush interval (default: 1000)
    /// - `PERFKIT_BATCH_CAPACITY` - Intake queue capacity (default: 100000)
    /// - `PERFKIT_BATCH_OVERFLOW` - `block` or `drop_newest` (default: block)
    /// - `PERFKIT_MAX_CONCURRENT_FLUSHES` - Concurrent callbacks (default: 4)
    /// - `PERFKIT_CACHE_CLEANUP_INTERVAL_MS` - Cache sweep interval (default: 1000)
    /// - `PERFKIT_SHARDS` - Shard list such as `s2:1,s3:4` (default: s0:1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_interval_ms: env_or("PERFKIT_BATCH_INTERVAL_MS", defaults.batch_interval_ms),
            batch_capacity: env_or("PERFKIT_BATCH_CAPACITY", defaults.batch_capacity),
            batch_overflow: env_or("PERFKIT_BATCH_OVERFLOW", defaults.batch_overflow),
            max_concurrent_flushes: env_or(
                "PERFKIT_MAX_CONCURRENT_FLUSHES",
                defaults.max_concurrent_flushes,
            ),
            cache_cleanup_interval_ms: env_or(
                "PERFKIT_CACHE_CLEANUP_INTERVAL_MS",
                defaults.cache_cleanup_interval_ms,
            ),
            shards: env_or("PERFKIT_SHARDS", defaults.shards),
        }
    }

    /// Checks values that would otherwise fail later at construction time.
    pub fn validate(&self) -> Result<()> {
        BatchWorkerConfig::from(self).validate()?;
        if self.cache_cleanup_interval_ms == 0 {
            return Err(ToolkitError::InvalidConfig(
                "cache cleanup interval must be non-zero".to_string(),
            ));
        }
        if self.shards.total() == 0 {
            return Err(ToolkitError::InvalidShardConfig(format!(
                "shard list '{}' has zero total weight",
                self.shards
            )));
        }
        Ok(())
    }

    pub fn cache_cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cache_cleanup_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_interval_ms: 1000,
            batch_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_overflow: OverflowPolicy::Block,
            max_concurrent_flushes: DEFAULT_MAX_CONCURRENT_FLUSHES,
            cache_cleanup_interval_ms: 1000,
            shards: ShardWeights::new(vec![("s0".to_string(), 1)]),
        }
    }
}

impl From<&Config> for BatchWorkerConfig {
    fn from(config: &Config) -> Self {
        BatchWorkerConfig::new(Duration::from_millis(config.batch_interval_ms))
            .with_capacity(config.batch_capacity)
            .with_overflow(config.batch_overflow)
            .with_max_concurrent_flushes(config.max_concurrent_flushes)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.batch_interval_ms, 1000);
        assert_eq!(config.batch_capacity, 100_000);
        assert_eq!(config.batch_overflow, OverflowPolicy::Block);
        assert_eq!(config.max_concurrent_flushes, 4);
        assert_eq!(config.cache_cleanup_interval(), Duration::from_secs(1));
        assert_eq!(config.shards.to_string(), "s0:1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env() {
        // Single test touches the environment to avoid racing other tests.
        for name in [
            "PERFKIT_BATCH_INTERVAL_MS",
            "PERFKIT_BATCH_CAPACITY",
            "PERFKIT_BATCH_OVERFLOW",
            "PERFKIT_MAX_CONCURRENT_FLUSHES",
            "PERFKIT_CACHE_CLEANUP_INTERVAL_MS",
            "PERFKIT_SHARDS",
        ] {
            env::remove_var(name);
        }
        assert_eq!(Config::from_env(), Config::default());

        env::set_var("PERFKIT_BATCH_INTERVAL_MS", "250");
        env::set_var("PERFKIT_BATCH_OVERFLOW", "drop_newest");
        env::set_var("PERFKIT_SHARDS", "s2:1,s3:4");
        env::set_var("PERFKIT_BATCH_CAPACITY", "not-a-number");

        let config = Config::from_env();
        assert_eq!(config.batch_interval_ms, 250);
        assert_eq!(config.batch_overflow, OverflowPolicy::DropNewest);
        assert_eq!(config.shards.total(), 5);
        assert_eq!(config.batch_capacity, 100_000);

        env::remove_var("PERFKIT_BATCH_INTERVAL_MS");
        env::remove_var("PERFKIT_BATCH_OVERFLOW");
        env::remove_var("PERFKIT_SHARDS");
        env::remove_var("PERFKIT_BATCH_CAPACITY");
    }

    #[test]
    fn test_validate_rejects_zero_weights() {
        let config = Config {
            shards: "a:0,b:0".parse().unwrap(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ToolkitError::InvalidShardConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = Config {
            batch_capacity: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ToolkitError::InvalidConfig(_))));
    }

    #[test]
    fn test_batch_worker_config_from_config() {
        let config = Config {
            batch_interval_ms: 50,
            max_concurrent_flushes: 2,
            ..Config::default()
        };
        let batch = BatchWorkerConfig::from(&config);
        assert_eq!(batch.interval, Duration::from_millis(50));
        assert_eq!(batch.max_concurrent_flushes, 2);
        assert_eq!(batch.capacity, 100_000);
    }
}
