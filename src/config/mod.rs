//! # Warm-up Engine Configuration
//!
//! Typed configuration for the proxy pool, retry policy, dispatcher and
//! challenge solving. Values are layered by [`ConfigManager`]: compiled
//! defaults, then `config/warmup.toml`, then `config/warmup.<env>.toml`,
//! then `WARMUP_*` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warmup_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let threshold = manager.config().proxy.max_failures;
//! let retry_delay = manager.config().retry.retry_delay();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::system;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring config/warmup.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WarmupConfig {
    /// Proxy pool membership and health settings
    pub proxy: ProxyPoolConfig,

    /// Retry budget and delay
    pub retry: RetryConfig,

    /// Dispatcher concurrency and time limits
    pub execution: ExecutionConfig,

    /// CAPTCHA polling bounds
    pub challenge: ChallengeConfig,

    /// Fleet monitoring thresholds
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProxyPoolConfig {
    /// Failures before demotion from active to backup
    pub max_failures: u32,
    pub response_time_threshold_ms: u64,
    pub health_check_interval_seconds: u64,
    pub probe_timeout_ms: u64,
    /// CSV file with `ip,port,username,password,type` rows loaded at bootstrap
    pub import_file: Option<PathBuf>,
    /// Seed for weighted selection; unset means entropy-seeded
    pub selection_seed: Option<u64>,
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        Self {
            max_failures: system::DEFAULT_MAX_PROXY_FAILURES,
            response_time_threshold_ms: system::DEFAULT_RESPONSE_TIME_THRESHOLD_MS,
            health_check_interval_seconds: system::DEFAULT_HEALTH_CHECK_INTERVAL_SECONDS,
            probe_timeout_ms: system::DEFAULT_PROBE_TIMEOUT_MS,
            import_file: None,
            selection_seed: None,
        }
    }
}

impl ProxyPoolConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub retry_delay_seconds: u64,
    /// Applied to submitted tasks that do not carry their own budget
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_delay_seconds: system::DEFAULT_RETRY_DELAY_SECONDS,
            max_retries: system::DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_concurrent_tasks: usize,
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    pub task_hard_limit_seconds: u64,
    pub task_soft_limit_seconds: u64,
    pub max_challenges_per_attempt: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: system::DEFAULT_MAX_CONCURRENT_TASKS,
            poll_interval_ms: system::DEFAULT_POLL_INTERVAL_MS,
            batch_size: system::DEFAULT_BATCH_SIZE,
            task_hard_limit_seconds: system::DEFAULT_TASK_HARD_LIMIT_SECONDS,
            task_soft_limit_seconds: system::DEFAULT_TASK_SOFT_LIMIT_SECONDS,
            max_challenges_per_attempt: system::DEFAULT_MAX_CHALLENGES_PER_ATTEMPT,
        }
    }
}

impl ExecutionConfig {
    pub fn hard_limit(&self) -> Duration {
        Duration::from_secs(self.task_hard_limit_seconds)
    }

    pub fn soft_limit(&self) -> Duration {
        Duration::from_secs(self.task_soft_limit_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ChallengeConfig {
    pub poll_interval_seconds: u64,
    pub timeout_seconds: u64,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: system::DEFAULT_CHALLENGE_POLL_INTERVAL_SECONDS,
            timeout_seconds: system::DEFAULT_CHALLENGE_TIMEOUT_SECONDS,
        }
    }
}

impl ChallengeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Failed/total ratio above which the fleet snapshot raises an alert
    pub alert_failure_rate: f64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            alert_failure_rate: system::DEFAULT_ALERT_FAILURE_RATE,
        }
    }
}

impl WarmupConfig {
    /// Reject values the engine cannot operate with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.proxy.max_failures == 0 {
            return Err(ConfigurationError::invalid_value(
                "proxy.max_failures",
                self.proxy.max_failures,
                "must be at least 1",
            ));
        }

        if self.proxy.response_time_threshold_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "proxy.response_time_threshold_ms",
                self.proxy.response_time_threshold_ms,
                "must be greater than zero",
            ));
        }

        if self.proxy.health_check_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "proxy.health_check_interval_seconds",
                self.proxy.health_check_interval_seconds,
                "must be greater than zero",
            ));
        }

        if self.execution.max_concurrent_tasks == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.max_concurrent_tasks",
                self.execution.max_concurrent_tasks,
                "must be at least 1",
            ));
        }

        if self.execution.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.batch_size",
                self.execution.batch_size,
                "must be at least 1",
            ));
        }

        if self.execution.task_hard_limit_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.task_hard_limit_seconds",
                self.execution.task_hard_limit_seconds,
                "must be greater than zero",
            ));
        }

        if self.execution.task_soft_limit_seconds >= self.execution.task_hard_limit_seconds {
            return Err(ConfigurationError::invalid_value(
                "execution.task_soft_limit_seconds",
                self.execution.task_soft_limit_seconds,
                format!(
                    "soft limit must be below the hard limit ({}s)",
                    self.execution.task_hard_limit_seconds
                ),
            ));
        }

        if self.challenge.poll_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "challenge.poll_interval_seconds",
                self.challenge.poll_interval_seconds,
                "must be greater than zero",
            ));
        }

        if !(0.0..=1.0).contains(&self.monitoring.alert_failure_rate) {
            return Err(ConfigurationError::invalid_value(
                "monitoring.alert_failure_rate",
                self.monitoring.alert_failure_rate,
                "must be between 0.0 and 1.0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = WarmupConfig::default();
        assert_eq!(config.proxy.max_failures, 3);
        assert_eq!(config.proxy.response_time_threshold_ms, 500);
        assert_eq!(config.proxy.health_check_interval_seconds, 300);
        assert_eq!(config.retry.retry_delay_seconds, 300);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.execution.task_hard_limit_seconds, 300);
        assert_eq!(config.execution.task_soft_limit_seconds, 240);
        assert_eq!(config.challenge.poll_interval_seconds, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_soft_limit_must_be_below_hard_limit() {
        let mut config = WarmupConfig::default();
        config.execution.task_soft_limit_seconds = 300;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("task_soft_limit_seconds"));
    }

    #[test]
    fn test_zero_failure_threshold_rejected() {
        let mut config = WarmupConfig::default();
        config.proxy.max_failures = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_alert_rate_bounds() {
        let mut config = WarmupConfig::default();
        config.monitoring.alert_failure_rate = 1.5;
        assert!(config.validate().is_err());
    }
}
