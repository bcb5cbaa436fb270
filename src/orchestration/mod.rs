//! # Orchestration Engine
//!
//! Task dispatch over a rotating proxy pool.
//!
//! ## Core Components
//!
//! - **Dispatcher**: pulls eligible tasks, acquires proxies, invokes the
//!   action executor and drives task state transitions
//! - **RetryPolicy**: fixed-delay retry versus terminal failure
//! - **WarmupSystem**: bootstrap and teardown of the background loops
//! - **Types**: collaborator contracts (`ActionExecutor`, `ChallengeSolver`,
//!   `CredentialStore`) and their typed outcomes

pub mod bootstrap;
pub mod dispatcher;
pub mod retry_policy;
pub mod types;

pub use bootstrap::{BootstrapOptions, SystemStatus, WarmupSystem, WarmupSystemHandle};
pub use dispatcher::{CycleReport, DispatchOutcome, Dispatcher, DispatcherCollaborators};
pub use retry_policy::{RetryDecision, RetryPolicy};
pub use types::{
    ActionExecutor, ChallengeSolver, CredentialStore, ExecutionOutcome, ExecutionRequest,
    FailureKind,
};
