//! # Fleet Insights
//!
//! Read-side aggregation over task, account and proxy state. Everything here
//! is a pure function of the snapshot it is given; consistency is whatever the
//! store's read isolation provides.

use crate::error::Result;
use crate::models::{Account, AccountStatus, Task};
use crate::proxy::{ProxyPool, ProxyStats};
use crate::state_machine::TaskState;
use crate::store::TaskStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub retrying: usize,
    pub completed: usize,
    pub failed: usize,
    /// Mean `completed_at - started_at` in seconds over completed tasks
    pub average_execution_time: f64,
    /// completed / total
    pub success_rate: f64,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut stats = TaskStats {
            total: tasks.len(),
            ..TaskStats::default()
        };

        let mut duration_sum = 0.0;
        let mut timed = 0usize;

        for task in tasks {
            match task.status {
                TaskState::Pending => stats.pending += 1,
                TaskState::Running => stats.running += 1,
                TaskState::Retrying => stats.retrying += 1,
                TaskState::Completed => {
                    stats.completed += 1;
                    if let Some(duration) = task.execution_duration() {
                        duration_sum += duration.num_milliseconds() as f64 / 1000.0;
                        timed += 1;
                    }
                }
                TaskState::Failed => stats.failed += 1,
            }
        }

        if stats.total > 0 {
            stats.success_rate = stats.completed as f64 / stats.total as f64;
        }
        if timed > 0 {
            stats.average_execution_time = duration_sum / timed as f64;
        }
        stats
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub tasks: TaskStats,
    pub proxies: ProxyStats,
    pub accounts_by_status: HashMap<AccountStatus, usize>,
    pub generated_at: DateTime<Utc>,
}

impl FleetSnapshot {
    /// True when the share of failed tasks exceeds `threshold`
    pub fn failure_alert(&self, threshold: f64) -> bool {
        self.tasks.failure_rate() > threshold
    }
}

pub struct StatsAggregator {
    store: Arc<dyn TaskStore>,
    pool: Arc<ProxyPool>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn TaskStore>, pool: Arc<ProxyPool>) -> Self {
        Self { store, pool }
    }

    pub async fn task_stats(&self) -> Result<TaskStats> {
        Ok(TaskStats::from_tasks(&self.store.list_tasks().await?))
    }

    pub fn proxy_stats(&self) -> ProxyStats {
        self.pool.stats()
    }

    pub async fn snapshot(&self) -> Result<FleetSnapshot> {
        let tasks = self.store.list_tasks().await?;
        let accounts = self.store.list_accounts().await?;
        Ok(FleetSnapshot {
            tasks: TaskStats::from_tasks(&tasks),
            proxies: self.pool.stats(),
            accounts_by_status: accounts_by_status(&accounts),
            generated_at: Utc::now(),
        })
    }
}

fn accounts_by_status(accounts: &[Account]) -> HashMap<AccountStatus, usize> {
    let mut counts = HashMap::new();
    for account in accounts {
        *counts.entry(account.status).or_insert(0) += 1;
    }
    counts
}
