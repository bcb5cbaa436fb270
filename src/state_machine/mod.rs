// State machine module for the task lifecycle
//
// pending -> running -> {completed | failed | retrying}, retrying -> running.
// completed and failed are terminal.

pub mod errors;
pub mod events;
pub mod states;
pub mod task_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::TaskEvent;
pub use states::TaskState;
pub use task_state_machine::TaskStateMachine;
