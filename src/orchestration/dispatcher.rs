//! # Dispatcher
//!
//! Pulls eligible tasks, routes each attempt through a proxy and the action
//! executor, and drives the task lifecycle from the typed outcome.
//!
//! ## Attempt flow
//!
//! 1. Claim the task id (at most one in-flight attempt per task)
//! 2. Acquire a proxy; an empty pool defers the task untouched
//! 3. Fetch credentials and enter `running`
//! 4. Run the executor under the soft/hard time limits, resolving CAPTCHA
//!    challenges inside the same attempt
//! 5. Report the proxy outcome, apply the retry decision, persist, and update
//!    the owning account's counters

use super::retry_policy::{RetryDecision, RetryPolicy};
use super::types::{
    ActionExecutor, ChallengeSolver, CredentialStore, ExecutionOutcome, ExecutionRequest,
    FailureKind,
};
use crate::config::ExecutionConfig;
use crate::constants::events;
use crate::error::{Result, WarmupError};
use crate::logging::{log_error, log_task_operation};
use crate::models::{Proxy, Task};
use crate::proxy::{ProxyPool, ProxyPoolError};
use crate::state_machine::{TaskEvent, TaskState, TaskStateMachine};
use crate::store::{AccountOutcome, TaskStore};
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Result of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    Completed,
    Retrying {
        retry_count: u32,
        next_attempt_at: Option<DateTime<Utc>>,
    },
    Failed {
        error: String,
    },
    /// No proxy available; the task was left as it was
    Deferred,
    /// Retry delay has not elapsed yet
    NotDue,
}

/// Tally of one dispatch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub scanned: usize,
    pub completed: usize,
    pub retrying: usize,
    pub failed: usize,
    pub deferred: usize,
    pub not_due: usize,
    pub errors: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Completed => self.completed += 1,
            DispatchOutcome::Retrying { .. } => self.retrying += 1,
            DispatchOutcome::Failed { .. } => self.failed += 1,
            DispatchOutcome::Deferred => self.deferred += 1,
            DispatchOutcome::NotDue => self.not_due += 1,
        }
    }

    pub fn dispatched(&self) -> usize {
        self.completed + self.retrying + self.failed
    }

    /// Tally a finished attempt. Returns the task id when the attempt made no
    /// progress (deferred or errored) so the caller can avoid re-picking it
    /// straight away.
    fn settle(
        &mut self,
        joined: std::result::Result<(String, Result<DispatchOutcome>), JoinError>,
    ) -> Option<String> {
        match joined {
            Ok((task_id, Ok(outcome))) => {
                self.record(&outcome);
                matches!(outcome, DispatchOutcome::Deferred | DispatchOutcome::NotDue)
                    .then_some(task_id)
            }
            Ok((task_id, Err(e))) => {
                self.errors += 1;
                log_error("dispatcher", "dispatch", &e.to_string(), Some(&task_id));
                Some(task_id)
            }
            Err(e) => {
                self.errors += 1;
                error!(error = %e, "Dispatch attempt panicked");
                None
            }
        }
    }
}

/// External capabilities the dispatcher drives
#[derive(Clone)]
pub struct DispatcherCollaborators {
    pub store: Arc<dyn TaskStore>,
    pub executor: Arc<dyn ActionExecutor>,
    pub solver: Arc<dyn ChallengeSolver>,
    pub credentials: Arc<dyn CredentialStore>,
}

/// Removes the task id from the in-flight set when the attempt ends,
/// including on panic or cancellation
#[derive(Debug)]
struct InFlightGuard {
    in_flight: Arc<DashSet<String>>,
    task_id: String,
}

impl InFlightGuard {
    fn claim(in_flight: &Arc<DashSet<String>>, task_id: &str) -> Result<Self> {
        if !in_flight.insert(task_id.to_string()) {
            return Err(WarmupError::DuplicateDispatch {
                task_id: task_id.to_string(),
            });
        }
        Ok(Self {
            in_flight: in_flight.clone(),
            task_id: task_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.task_id);
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<ProxyPool>,
    collaborators: DispatcherCollaborators,
    retry_policy: RetryPolicy,
    config: ExecutionConfig,
    /// Worker slots
    semaphore: Arc<Semaphore>,
    in_flight: Arc<DashSet<String>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("retry_policy", &self.retry_policy)
            .field("in_flight", &self.in_flight.len())
            .field("available_slots", &self.semaphore.available_permits())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        pool: Arc<ProxyPool>,
        collaborators: DispatcherCollaborators,
        retry_policy: RetryPolicy,
        config: ExecutionConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_tasks));
        Self {
            pool,
            collaborators,
            retry_policy,
            config,
            semaphore,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.collaborators.store
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, task_id: &str) -> bool {
        self.in_flight.contains(task_id)
    }

    /// Run one attempt for a task.
    ///
    /// Errors are invariant violations (`DuplicateDispatch`,
    /// `InvalidTransition`) or store failures; execution problems come back
    /// as a [`DispatchOutcome`].
    pub async fn dispatch(&self, task_id: &str) -> Result<DispatchOutcome> {
        let guard = InFlightGuard::claim(&self.in_flight, task_id)?;
        self.attempt(guard).await
    }

    /// The attempt itself; the claim is released when `guard` drops
    #[instrument(skip_all, fields(task_id = %guard.task_id))]
    async fn attempt(&self, guard: InFlightGuard) -> Result<DispatchOutcome> {
        let task_id = guard.task_id.as_str();
        let store = &self.collaborators.store;

        let task = store.get_task(task_id).await?;
        let now = Utc::now();
        if task.status == TaskState::Retrying && !task.is_eligible(now) {
            debug!(next_attempt_at = ?task.next_attempt_at, "Retry delay not elapsed");
            return Ok(DispatchOutcome::NotDue);
        }
        if !task.status.is_dispatchable() {
            return Err(WarmupError::InvalidTransition(format!(
                "task {task_id} is {} and cannot be dispatched",
                task.status
            )));
        }

        let proxy = match self.pool.acquire() {
            Ok(proxy) => proxy,
            Err(ProxyPoolError::NoProxyAvailable) => {
                log_task_operation(
                    events::TASK_DEFERRED,
                    task_id,
                    Some(&task.account_id),
                    &task.status.to_string(),
                    Some("no proxy available"),
                );
                return Ok(DispatchOutcome::Deferred);
            }
            Err(e) => return Err(e.into()),
        };

        let credentials = match self.collaborators.credentials.get(&task.account_id).await {
            Ok(credentials) => credentials,
            Err(WarmupError::CredentialsNotFound { account_id }) => {
                let message = format!("credentials not found for account {account_id}");
                return self.fail_without_attempt(task, &proxy, message).await;
            }
            Err(e) => return Err(e),
        };

        let mut machine = TaskStateMachine::new(task);
        machine.transition(TaskEvent::start(proxy.id.clone()))?;
        store.update_task(machine.task()).await?;
        log_task_operation(
            events::TASK_STARTED,
            task_id,
            Some(&machine.task().account_id),
            "running",
            Some(&format!(
                "proxy={} attempt={}",
                proxy.id,
                machine.task().retry_count + 1
            )),
        );

        let request = ExecutionRequest {
            task: machine.task().clone(),
            proxy: proxy.clone(),
            credentials,
            challenge_token: None,
        };
        let outcome = self.execute_with_limits(request).await;

        self.apply_outcome(machine, &proxy, outcome).await
    }

    /// Start and immediately fail a task that cannot be attempted at all
    async fn fail_without_attempt(
        &self,
        task: Task,
        proxy: &Proxy,
        message: String,
    ) -> Result<DispatchOutcome> {
        let mut machine = TaskStateMachine::new(task);
        machine.transition(TaskEvent::start(proxy.id.clone()))?;
        machine.transition(TaskEvent::fail_with_error(message.clone()))?;
        self.finish_failed(machine, FailureKind::InvalidFlow, message).await
    }

    /// Executor call bounded by the soft (warning) and hard (abort) limits
    async fn execute_with_limits(&self, request: ExecutionRequest) -> ExecutionOutcome {
        let task_id = request.task.id.clone();
        let hard_limit = self.config.hard_limit();
        let soft_limit = self.config.soft_limit().min(hard_limit);

        let attempt = self.execute_with_challenges(request);
        tokio::pin!(attempt);

        if let Ok(outcome) = timeout(soft_limit, &mut attempt).await {
            return outcome;
        }

        warn!(
            task_id = %task_id,
            soft_limit_seconds = soft_limit.as_secs(),
            "⏳ TASK_SOFT_LIMIT: Attempt still running"
        );

        match timeout(hard_limit - soft_limit, &mut attempt).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(
                    task_id = %task_id,
                    hard_limit_seconds = hard_limit.as_secs(),
                    "⏰ TASK_HARD_LIMIT: Attempt aborted"
                );
                ExecutionOutcome::failure(
                    FailureKind::Timeout,
                    format!("attempt exceeded hard time limit of {}s", hard_limit.as_secs()),
                )
            }
        }
    }

    /// Run the executor, solving challenges in-place without consuming a retry
    async fn execute_with_challenges(&self, mut request: ExecutionRequest) -> ExecutionOutcome {
        let max_challenges = self.config.max_challenges_per_attempt;
        let mut solved = 0u32;

        loop {
            match self.collaborators.executor.run(&request).await {
                ExecutionOutcome::ChallengeRequired { site_key, page_url } => {
                    if solved >= max_challenges {
                        return ExecutionOutcome::failure(
                            FailureKind::Challenge,
                            format!("more than {max_challenges} challenges in one attempt"),
                        );
                    }

                    info!(
                        task_id = %request.task.id,
                        page_url = %page_url,
                        "{}",
                        events::CHALLENGE_REQUIRED
                    );
                    match self.collaborators.solver.solve(&site_key, &page_url).await {
                        Ok(token) => {
                            solved += 1;
                            request.challenge_token = Some(token);
                        }
                        Err(e) => {
                            return ExecutionOutcome::failure(FailureKind::Challenge, e.to_string())
                        }
                    }
                }
                outcome => return outcome,
            }
        }
    }

    async fn apply_outcome(
        &self,
        mut machine: TaskStateMachine,
        proxy: &Proxy,
        outcome: ExecutionOutcome,
    ) -> Result<DispatchOutcome> {
        let (kind, message) = match outcome {
            ExecutionOutcome::Success(result) => {
                self.report_proxy(proxy, true);
                machine.transition(TaskEvent::Complete(result))?;
                let task = machine.into_task();
                self.collaborators.store.update_task(&task).await?;
                self.record_account(&task.account_id, AccountOutcome::Succeeded(task.kind))
                    .await;
                log_task_operation(
                    events::TASK_COMPLETED,
                    &task.id,
                    Some(&task.account_id),
                    "completed",
                    task.execution_duration()
                        .map(|d| format!("duration_ms={}", d.num_milliseconds()))
                        .as_deref(),
                );
                return Ok(DispatchOutcome::Completed);
            }
            ExecutionOutcome::Failure { kind, message } => (kind, message),
            ExecutionOutcome::ChallengeRequired { .. } => (
                FailureKind::Challenge,
                "challenge left unresolved".to_string(),
            ),
        };

        if kind.is_proxy_attributable() {
            self.report_proxy(proxy, false);
        }

        match self.retry_policy.decide(machine.task(), kind) {
            RetryDecision::Retry { delay } => {
                machine.transition(TaskEvent::retry_after(delay, message.clone()))?;
                let task = machine.into_task();
                self.collaborators.store.update_task(&task).await?;
                log_task_operation(
                    events::TASK_RETRY_SCHEDULED,
                    &task.id,
                    Some(&task.account_id),
                    "retrying",
                    Some(&format!(
                        "kind={kind} retry_count={}/{} delay_s={} error={message}",
                        task.retry_count,
                        task.max_retries,
                        delay.as_secs()
                    )),
                );
                Ok(DispatchOutcome::Retrying {
                    retry_count: task.retry_count,
                    next_attempt_at: task.next_attempt_at,
                })
            }
            RetryDecision::Fail { reason } => {
                let error_message = format!("{message} ({reason})");
                machine.transition(TaskEvent::fail_with_error(error_message.clone()))?;
                self.finish_failed(machine, kind, error_message).await
            }
        }
    }

    async fn finish_failed(
        &self,
        machine: TaskStateMachine,
        kind: FailureKind,
        error_message: String,
    ) -> Result<DispatchOutcome> {
        let task = machine.into_task();
        self.collaborators.store.update_task(&task).await?;
        self.record_account(&task.account_id, AccountOutcome::Failed(kind))
            .await;
        log_task_operation(
            events::TASK_FAILED,
            &task.id,
            Some(&task.account_id),
            "failed",
            Some(&format!("kind={kind} error={error_message}")),
        );
        Ok(DispatchOutcome::Failed {
            error: error_message,
        })
    }

    fn report_proxy(&self, proxy: &Proxy, success: bool) {
        if let Err(e) = self.pool.report_outcome(&proxy.id, success) {
            log_error("dispatcher", "report_proxy_outcome", &e.to_string(), Some(&proxy.id));
        }
    }

    /// Account bookkeeping never changes the task's fate
    async fn record_account(&self, account_id: &str, outcome: AccountOutcome) {
        if let Err(e) = self
            .collaborators
            .store
            .record_account_outcome(account_id, outcome)
            .await
        {
            warn!(account_id = %account_id, error = %e, "Failed to record account outcome");
        }
    }

    /// Claim the most urgent eligible task that is neither in flight nor in
    /// `skip`. The store is read fresh on every call so a task submitted a
    /// moment ago competes on priority with everything already waiting.
    async fn claim_next(&self, skip: &HashSet<String>) -> Result<Option<InFlightGuard>> {
        let limit = self.in_flight.len() + skip.len() + 1;
        let candidates = self
            .collaborators
            .store
            .eligible_tasks(Utc::now(), limit)
            .await?;

        for task in candidates {
            if skip.contains(&task.id) {
                continue;
            }
            if let Ok(guard) = InFlightGuard::claim(&self.in_flight, &task.id) {
                return Ok(Some(guard));
            }
        }
        Ok(None)
    }

    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| WarmupError::Internal(format!("worker slots closed: {e}")))
    }

    fn spawn_attempt(
        &self,
        attempts: &mut JoinSet<(String, Result<DispatchOutcome>)>,
        permit: OwnedSemaphorePermit,
        guard: InFlightGuard,
    ) {
        let dispatcher = self.clone();
        attempts.spawn(async move {
            let _permit = permit;
            let task_id = guard.task_id.clone();
            let result = dispatcher.attempt(guard).await;
            (task_id, result)
        });
    }

    async fn save_pool_snapshot(&self) {
        if let Err(e) = self
            .collaborators
            .store
            .save_proxy_snapshot(self.pool.snapshot())
            .await
        {
            warn!(error = %e, "Failed to save proxy snapshot");
        }
    }

    fn log_cycle(report: &CycleReport) {
        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                completed = report.completed,
                retrying = report.retrying,
                failed = report.failed,
                deferred = report.deferred,
                errors = report.errors,
                "🚀 DISPATCH_CYCLE: Completed"
            );
        }
    }

    /// Dispatch up to `batch_size` tasks, each at most once, then wait for
    /// them to finish.
    ///
    /// A task is chosen only once a worker slot is free, so every slot goes
    /// to whatever is most urgent in the store at that moment.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let mut picked = HashSet::new();
        let mut attempts = JoinSet::new();

        // Errors stop the fill but never abandon attempts already spawned
        while picked.len() < self.config.batch_size {
            let next = match self.acquire_slot().await {
                Ok(permit) => self.claim_next(&picked).await.map(|g| g.map(|g| (permit, g))),
                Err(e) => Err(e),
            };
            let (permit, guard) = match next {
                Ok(Some(claimed)) => claimed,
                Ok(None) => break,
                Err(e) => {
                    report.errors += 1;
                    log_error("dispatcher", "fill_slots", &e.to_string(), None);
                    break;
                }
            };
            picked.insert(guard.task_id.clone());
            report.scanned += 1;
            self.spawn_attempt(&mut attempts, permit, guard);
        }

        while let Some(joined) = attempts.join_next().await {
            report.settle(joined);
        }

        self.save_pool_snapshot().await;
        Self::log_cycle(&report);
        Ok(report)
    }

    /// Keep every worker slot busy until the shutdown flag flips.
    ///
    /// Each freed slot triggers a fresh store read, so priority is honoured
    /// across everything eligible at that moment rather than within a batch.
    /// Tasks that were deferred or errored are left alone until the loop next
    /// goes idle. Attempts in progress at shutdown are allowed to finish so
    /// no task is abandoned in `running`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let poll_interval = self.config.poll_interval();
        info!(
            max_concurrent_tasks = self.config.max_concurrent_tasks,
            poll_interval_ms = poll_interval.as_millis() as u64,
            "🚀 DISPATCHER: Started"
        );

        let mut attempts = JoinSet::new();
        let mut report = CycleReport::default();
        let mut skip = HashSet::new();

        while !*shutdown.borrow() {
            while let Some(joined) = attempts.try_join_next() {
                if let Some(task_id) = report.settle(joined) {
                    skip.insert(task_id);
                }
            }

            let permit = tokio::select! {
                permit = self.acquire_slot() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        log_error("dispatcher", "acquire_slot", &e.to_string(), None);
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            match self.claim_next(&skip).await {
                Ok(Some(guard)) => {
                    report.scanned += 1;
                    self.spawn_attempt(&mut attempts, permit, guard);
                    continue;
                }
                Ok(None) => {
                    Self::log_cycle(&report);
                    report = CycleReport::default();
                    skip.clear();
                    self.save_pool_snapshot().await;
                }
                Err(e) => log_error("dispatcher", "claim_next", &e.to_string(), None),
            }
            drop(permit);

            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        while let Some(joined) = attempts.join_next().await {
            report.settle(joined);
        }
        self.save_pool_snapshot().await;
        Self::log_cycle(&report);
        info!("🛑 DISPATCHER: Stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
