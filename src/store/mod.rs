//! # Task Store
//!
//! Persistence boundary for tasks, accounts and the proxy cache. The schema is
//! owned by whatever CRUD layer sits on top; the engine only needs these reads
//! and writes.

pub mod memory;

pub use memory::InMemoryTaskStore;

use crate::error::Result;
use crate::models::{Account, AccountStatus, Proxy, Task, TaskKind};
use crate::orchestration::types::FailureKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Account-level effect of a finished task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOutcome {
    /// Task completed; bump the matching counter and `last_activity`
    Succeeded(TaskKind),
    /// Task reached terminal failure
    Failed(FailureKind),
}

impl AccountOutcome {
    /// Apply counter and status effects to an account record
    pub fn apply_to(&self, account: &mut Account, now: DateTime<Utc>) {
        match *self {
            AccountOutcome::Succeeded(kind) => {
                account.counters.record_success(kind);
                account.last_activity = Some(now);
            }
            AccountOutcome::Failed(kind) => {
                account.counters.record_failure();
                match kind {
                    FailureKind::AccountLocked => account.status = AccountStatus::Locked,
                    FailureKind::AuthenticationRejected => {
                        account.status = AccountStatus::Suspended
                    }
                    _ => {}
                }
            }
        }
        account.updated_at = now;
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: Task) -> Result<()>;

    async fn get_task(&self, task_id: &str) -> Result<Task>;

    /// Overwrite an existing task; `TaskNotFound` if it was never inserted
    async fn update_task(&self, task: &Task) -> Result<()>;

    /// Pending tasks plus retrying tasks whose delay has elapsed, in dispatch
    /// order (priority descending, then oldest first), at most `limit`
    async fn eligible_tasks(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Task>>;

    async fn list_tasks(&self) -> Result<Vec<Task>>;

    async fn insert_account(&self, account: Account) -> Result<()>;

    async fn get_account(&self, account_id: &str) -> Result<Account>;

    async fn record_account_outcome(&self, account_id: &str, outcome: AccountOutcome)
        -> Result<()>;

    async fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Cache of pool state for reporting; never read back as truth
    async fn save_proxy_snapshot(&self, proxies: Vec<Proxy>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;

    #[test]
    fn test_success_updates_counters_and_activity() {
        let mut account = Account::new("a1", "a@example.com", Provider::Gmail);
        let now = Utc::now();
        AccountOutcome::Succeeded(TaskKind::ReplyEmail).apply_to(&mut account, now);

        assert_eq!(account.counters.replies_sent, 1);
        assert_eq!(account.counters.emails_processed, 1);
        assert_eq!(account.last_activity, Some(now));
    }

    #[test]
    fn test_failures_set_status() {
        let mut locked = Account::new("a1", "a@example.com", Provider::Outlook);
        AccountOutcome::Failed(FailureKind::AccountLocked).apply_to(&mut locked, Utc::now());
        assert_eq!(locked.status, AccountStatus::Locked);
        assert_eq!(locked.counters.failure_count, 1);

        let mut rejected = Account::new("a2", "b@example.com", Provider::Yahoo);
        AccountOutcome::Failed(FailureKind::AuthenticationRejected)
            .apply_to(&mut rejected, Utc::now());
        assert_eq!(rejected.status, AccountStatus::Suspended);

        let mut flaky = Account::new("a3", "c@example.com", Provider::Gmail);
        AccountOutcome::Failed(FailureKind::Network).apply_to(&mut flaky, Utc::now());
        assert_eq!(flaky.status, AccountStatus::Pending);
        assert_eq!(flaky.counters.failure_count, 1);
        assert!(flaky.last_activity.is_none());
    }
}
