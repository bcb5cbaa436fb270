//! # Retry Policy
//!
//! Pure decision between another attempt after a fixed delay and terminal
//! failure. The dispatcher applies the decision; nothing here mutates state.

use super::types::FailureKind;
use crate::config::RetryConfig;
use crate::models::Task;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    Fail { reason: String },
}

impl RetryDecision {
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }
}

/// Fixed backoff, no exponential growth and no jitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.retry_delay())
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn decide(&self, task: &Task, kind: FailureKind) -> RetryDecision {
        if !kind.is_transient() {
            return RetryDecision::Fail {
                reason: format!("permanent failure: {kind}"),
            };
        }

        if task.retry_count >= task.max_retries {
            return RetryDecision::Fail {
                reason: format!(
                    "retries exhausted ({}/{}) after {kind} failure",
                    task.retry_count, task.max_retries
                ),
            };
        }

        RetryDecision::Retry { delay: self.delay }
    }
}
