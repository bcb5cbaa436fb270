use crate::error::WarmupError;
use thiserror::Error;

/// Errors raised by task state transitions.
///
/// Every variant is an invariant violation: the caller attempted a transition
/// the lifecycle does not allow. None of them are retryable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Retry budget exhausted for task {task_id}: {retry_count}/{max_retries}")]
    RetryBudgetExhausted {
        task_id: String,
        retry_count: u32,
        max_retries: u32,
    },
}

impl From<StateMachineError> for WarmupError {
    fn from(err: StateMachineError) -> Self {
        WarmupError::InvalidTransition(err.to_string())
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
