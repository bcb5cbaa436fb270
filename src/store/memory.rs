use super::{AccountOutcome, TaskStore};
use crate::error::{Result, WarmupError};
use crate::models::{Account, Proxy, Task};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

/// Process-local store backed by concurrent maps.
///
/// Account outcome updates take the entry's shard lock, so counter increments
/// from concurrent dispatches never lose writes.
///
/// ```rust
/// use warmup_core::models::{NewTask, TaskKind, TaskPriority};
/// use warmup_core::store::{InMemoryTaskStore, TaskStore};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryTaskStore::new();
/// let low = NewTask::new(TaskKind::StarEmail, "acct")
///     .with_priority(TaskPriority::Low)
///     .into_task(3);
/// let critical = NewTask::new(TaskKind::Login, "acct")
///     .with_priority(TaskPriority::Critical)
///     .into_task(3);
/// store.insert_task(low).await.unwrap();
/// store.insert_task(critical.clone()).await.unwrap();
///
/// let next = store.eligible_tasks(chrono::Utc::now(), 1).await.unwrap();
/// assert_eq!(next[0].id, critical.id);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<String, Task>,
    accounts: DashMap<String, Account>,
    proxy_snapshot: RwLock<Vec<Proxy>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proxy_snapshot(&self) -> Vec<Proxy> {
        self.proxy_snapshot.read().clone()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert_task(&self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.id) {
            return Err(WarmupError::Store(format!("task {} already exists", task.id)));
        }
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.tasks
            .get(task_id)
            .map(|t| t.value().clone())
            .ok_or_else(|| WarmupError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        let mut entry = self
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| WarmupError::TaskNotFound {
                task_id: task.id.clone(),
            })?;
        *entry = task.clone();
        Ok(())
    }

    async fn eligible_tasks(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Task>> {
        let mut eligible: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.is_eligible(now))
            .map(|t| t.value().clone())
            .collect();
        eligible.sort_by(Task::dispatch_order);
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.tasks.iter().map(|t| t.value().clone()).collect())
    }

    async fn insert_account(&self, account: Account) -> Result<()> {
        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn get_account(&self, account_id: &str) -> Result<Account> {
        self.accounts
            .get(account_id)
            .map(|a| a.value().clone())
            .ok_or_else(|| WarmupError::AccountNotFound {
                account_id: account_id.to_string(),
            })
    }

    async fn record_account_outcome(
        &self,
        account_id: &str,
        outcome: AccountOutcome,
    ) -> Result<()> {
        let mut account =
            self.accounts
                .get_mut(account_id)
                .ok_or_else(|| WarmupError::AccountNotFound {
                    account_id: account_id.to_string(),
                })?;
        outcome.apply_to(&mut account, Utc::now());
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.iter().map(|a| a.value().clone()).collect())
    }

    async fn save_proxy_snapshot(&self, proxies: Vec<Proxy>) -> Result<()> {
        *self.proxy_snapshot.write() = proxies;
        Ok(())
    }
}
