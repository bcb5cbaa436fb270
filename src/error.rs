use thiserror::Error;

/// Top-level error for the warm-up engine.
///
/// Component errors (`ConfigurationError`, `ProxyPoolError`, `StateMachineError`)
/// convert into this type so callers at the edges only deal with one enum.
#[derive(Debug, Error)]
pub enum WarmupError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No proxy available in active or backup pool")]
    NoProxyAvailable,

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Task {task_id} is already being dispatched")]
    DuplicateDispatch { task_id: String },

    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("Account not found: {account_id}")]
    AccountNotFound { account_id: String },

    #[error("Credentials not found for account {account_id}")]
    CredentialsNotFound { account_id: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Challenge error: {0}")]
    Challenge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WarmupError {
    /// Invariant violations are caller bugs and must never be retried.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition(_) | Self::DuplicateDispatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, WarmupError>;
