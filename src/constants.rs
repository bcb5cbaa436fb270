//! # System Constants
//!
//! Default operating limits for the warm-up engine and the event names emitted
//! in structured logs. Every numeric default here can be overridden through
//! [`crate::config::WarmupConfig`].

/// Lifecycle event names used as the `event` field in structured logs
pub mod events {
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_RETRY_SCHEDULED: &str = "task.retry_scheduled";
    pub const TASK_DEFERRED: &str = "task.deferred";

    pub const PROXY_ACQUIRED: &str = "proxy.acquired";
    pub const PROXY_DEMOTED: &str = "proxy.demoted";
    pub const PROXY_PROMOTED: &str = "proxy.promoted";
    pub const PROXY_HEALTH_SWEEP: &str = "proxy.health_sweep";

    pub const CHALLENGE_REQUIRED: &str = "challenge.required";
    pub const CHALLENGE_SOLVED: &str = "challenge.solved";
}

/// Engine-wide defaults
pub mod system {
    /// Failures before a proxy is moved from active to backup
    pub const DEFAULT_MAX_PROXY_FAILURES: u32 = 3;

    /// Latency above which a proxy is considered unhealthy
    pub const DEFAULT_RESPONSE_TIME_THRESHOLD_MS: u64 = 500;

    pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECONDS: u64 = 300;

    pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

    /// Fixed (non-exponential) delay between task attempts
    pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 300;

    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    pub const DEFAULT_TASK_HARD_LIMIT_SECONDS: u64 = 300;

    pub const DEFAULT_TASK_SOFT_LIMIT_SECONDS: u64 = 240;

    pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 10;

    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

    pub const DEFAULT_BATCH_SIZE: usize = 50;

    pub const DEFAULT_CHALLENGE_POLL_INTERVAL_SECONDS: u64 = 5;

    pub const DEFAULT_CHALLENGE_TIMEOUT_SECONDS: u64 = 120;

    pub const DEFAULT_MAX_CHALLENGES_PER_ATTEMPT: u32 = 3;

    /// Fleet failure rate that raises an alert (10%)
    pub const DEFAULT_ALERT_FAILURE_RATE: f64 = 0.1;

    pub const WARMUP_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
}
