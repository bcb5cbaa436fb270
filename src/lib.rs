#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Warm-up Core
//!
//! Task lifecycle and proxy-rotation engine for webmail warm-up automation.
//!
//! ## Overview
//!
//! Warm-up work (moving mail out of spam, starring, marking important,
//! clicking links, replying) is queued as tasks against webmail accounts.
//! This crate owns what happens between submission and outcome: picking an
//! egress proxy by weighted random selection, running the attempt through an
//! external browser executor, solving CAPTCHA challenges inside the attempt,
//! retrying transient failures with a fixed delay, and keeping per-account
//! and fleet-wide statistics.
//!
//! ## Module Organization
//!
//! - [`proxy`] - Active/backup proxy pool, health probing, proxy import
//! - [`state_machine`] - Task lifecycle transitions
//! - [`orchestration`] - Dispatcher, retry policy, collaborator contracts, bootstrap
//! - [`store`] - Persistence boundary and in-memory store
//! - [`providers`] - Per-provider capability routing for the action executor
//! - [`challenge`] - Bounded CAPTCHA polling
//! - [`insights`] - Task, proxy and account statistics
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warmup_core::config::ConfigManager;
//! use warmup_core::orchestration::{
//!     ActionExecutor, BootstrapOptions, ChallengeSolver, DispatcherCollaborators, WarmupSystem,
//! };
//! use warmup_core::credentials::StaticCredentialStore;
//! use warmup_core::models::{NewTask, TaskKind};
//! use warmup_core::store::InMemoryTaskStore;
//!
//! # async fn example(
//! #     executor: Arc<dyn ActionExecutor>,
//! #     solver: Arc<dyn ChallengeSolver>,
//! # ) -> warmup_core::Result<()> {
//! let config_manager = ConfigManager::load()?;
//! let collaborators = DispatcherCollaborators {
//!     store: Arc::new(InMemoryTaskStore::new()),
//!     executor,
//!     solver,
//!     credentials: Arc::new(StaticCredentialStore::new()),
//! };
//!
//! let mut system =
//!     WarmupSystem::bootstrap(config_manager, collaborators, BootstrapOptions::default()).await?;
//! system.submit(NewTask::new(TaskKind::Login, "account-1")).await?;
//! system.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod challenge;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod insights;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod providers;
pub mod proxy;
pub mod state_machine;
pub mod store;

pub use config::{ConfigManager, WarmupConfig};
pub use constants::system;
pub use error::{Result, WarmupError};
pub use insights::{FleetSnapshot, StatsAggregator, TaskStats};
pub use models::{Account, NewTask, Proxy, Task, TaskKind, TaskPriority};
pub use orchestration::{Dispatcher, RetryPolicy, WarmupSystem, WarmupSystemHandle};
pub use proxy::{ProxyPool, ProxyStats};
pub use state_machine::{TaskEvent, TaskState, TaskStateMachine};
