use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Events that can trigger task state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskEvent {
    /// Begin an attempt on the given proxy (from pending or retrying)
    Start { proxy_id: String },
    /// Attempt succeeded with the executor's result payload
    Complete(Value),
    /// Terminal failure with a human-readable message
    Fail(String),
    /// Schedule another attempt after `delay`
    Retry { delay: Duration, error: String },
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Complete(_) => "complete",
            Self::Fail(_) => "fail",
            Self::Retry { .. } => "retry",
        }
    }

    /// Extract error message if this event carries one
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            Self::Retry { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Fail(_))
    }

    pub fn start(proxy_id: impl Into<String>) -> Self {
        Self::Start {
            proxy_id: proxy_id.into(),
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }

    pub fn retry_after(delay: Duration, error: impl Into<String>) -> Self {
        Self::Retry {
            delay,
            error: error.into(),
        }
    }
}
