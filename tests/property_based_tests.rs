//! Property-based tests for pool membership, retry decisions and task
//! lifecycle rules

#[path = "common/strategies.rs"]
mod strategies;

use chrono::{Duration as ChronoDuration, Utc};
use proptest::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;
use strategies::{
    failure_kind_strategy, pool_op_strategy, priority_strategy, proxy_set_strategy,
    task_kind_strategy, PoolOp,
};
use warmup_core::config::ProxyPoolConfig;
use warmup_core::models::{NewTask, PoolMembership, Proxy, ProxyType, Task};
use warmup_core::orchestration::{RetryDecision, RetryPolicy};
use warmup_core::proxy::ProxyPool;
use warmup_core::store::{InMemoryTaskStore, TaskStore};
use warmup_core::{TaskEvent, TaskState, TaskStateMachine};

proptest! {
    /// Every proxy sits in exactly one partition whatever happens to it
    #[test]
    fn test_pool_partition_is_preserved(
        proxies in proxy_set_strategy(8),
        ops in prop::collection::vec(pool_op_strategy(), 0..60),
        seed in any::<u64>(),
    ) {
        let pool = ProxyPool::with_seed(ProxyPoolConfig::default(), seed);
        let ids: Vec<String> = proxies.iter().map(|p| p.id.clone()).collect();
        pool.load(proxies).unwrap();

        for op in ops {
            match op {
                PoolOp::Acquire => {
                    // Non-empty pools always hand something out
                    let proxy = pool.acquire().unwrap();
                    prop_assert_eq!(pool.membership_of(&proxy.id), Some(PoolMembership::Active));
                }
                PoolOp::Report { index, success } => {
                    let id = &ids[index % ids.len()];
                    let membership = pool.report_outcome(id, success).unwrap();
                    prop_assert_eq!(pool.membership_of(id), Some(membership));
                }
            }

            let active: HashSet<String> = pool.active_ids().into_iter().collect();
            let backup: HashSet<String> = pool.backup_ids().into_iter().collect();
            prop_assert!(active.is_disjoint(&backup));
            prop_assert_eq!(active.len() + backup.len(), ids.len());

            let stats = pool.stats();
            prop_assert_eq!(stats.total_count, ids.len());
            prop_assert_eq!(stats.active_count, active.len());
        }
    }

    /// Successes never push the failure counter below zero
    #[test]
    fn test_failure_count_tracks_net_failures(outcomes in prop::collection::vec(any::<bool>(), 0..40)) {
        let config = ProxyPoolConfig { max_failures: u32::MAX, ..ProxyPoolConfig::default() };
        let pool = ProxyPool::with_seed(config, 7);
        pool.load(vec![Proxy::new("10.9.0.1", 8080, "u", "p", ProxyType::Http)]).unwrap();

        let mut expected: u32 = 0;
        for success in outcomes {
            pool.report_outcome("10.9.0.1:8080", success).unwrap();
            expected = if success { expected.saturating_sub(1) } else { expected + 1 };
            prop_assert_eq!(pool.get("10.9.0.1:8080").unwrap().failure_count, expected);
        }
    }

    /// Retry iff the failure is transient and budget remains
    #[test]
    fn test_retry_decision_table(
        kind in failure_kind_strategy(),
        retry_count in 0u32..6,
        max_retries in 0u32..6,
    ) {
        let mut task = NewTask::new(default_kind(), "acct").into_task(max_retries);
        task.retry_count = retry_count;

        let decision = RetryPolicy::new(Duration::from_secs(300)).decide(&task, kind);
        let expected = kind.is_transient() && retry_count < max_retries;
        prop_assert_eq!(decision.is_retry(), expected);
        if let RetryDecision::Retry { delay } = decision {
            prop_assert_eq!(delay, Duration::from_secs(300));
        }
    }

    /// `started_at` is written by the first attempt only and attempts never
    /// exceed the retry budget
    #[test]
    fn test_lifecycle_respects_budget_and_start_time(
        kind in task_kind_strategy(),
        priority in priority_strategy(),
        max_retries in 0u32..5,
        failures in prop::collection::vec(any::<bool>(), 1..10),
    ) {
        let task = NewTask::new(kind, "acct")
            .with_priority(priority)
            .into_task(max_retries);
        let mut machine = TaskStateMachine::new(task);
        let mut now = Utc::now();
        let mut first_start = None;

        for fails in failures {
            if machine.is_terminal() {
                break;
            }
            now += ChronoDuration::seconds(1);
            machine.transition_at(TaskEvent::start("proxy-1"), now).unwrap();
            let started = machine.task().started_at;
            prop_assert!(started.is_some());
            if first_start.is_none() {
                first_start = started;
            }
            prop_assert_eq!(started, first_start);

            now += ChronoDuration::seconds(1);
            let event = if !fails {
                TaskEvent::Complete(serde_json::json!({}))
            } else if machine.task().retry_count < max_retries {
                TaskEvent::retry_after(Duration::ZERO, "transient")
            } else {
                TaskEvent::fail_with_error("exhausted")
            };
            machine.transition_at(event, now).unwrap();
            prop_assert!(machine.task().retry_count <= max_retries);
        }
    }

    /// Nothing moves a task out of a terminal state
    #[test]
    fn test_terminal_states_reject_every_event(complete in any::<bool>()) {
        let task = NewTask::new(default_kind(), "acct").into_task(3);
        let mut machine = TaskStateMachine::new(task);
        machine.transition(TaskEvent::start("proxy-1")).unwrap();
        let terminal = if complete {
            machine.transition(TaskEvent::Complete(serde_json::json!({}))).unwrap()
        } else {
            machine.transition(TaskEvent::fail_with_error("boom")).unwrap()
        };
        prop_assert!(terminal.is_terminal());

        let events = vec![
            TaskEvent::start("proxy-2"),
            TaskEvent::Complete(serde_json::json!({})),
            TaskEvent::fail_with_error("again"),
            TaskEvent::retry_after(Duration::ZERO, "again"),
        ];
        for event in events {
            prop_assert!(machine.transition(event).is_err());
            prop_assert_eq!(machine.current_state(), terminal);
        }
    }

    /// The store hands out the most urgent eligible tasks first and never a
    /// retry whose delay is still running
    #[test]
    fn test_eligible_tasks_follow_dispatch_order(
        tasks in prop::collection::vec((priority_strategy(), 0i64..600, any::<bool>()), 1..20),
        limit in 1usize..25,
    ) {
        let store = InMemoryTaskStore::new();
        let now = Utc::now();
        let mut waiting = HashSet::new();

        for (priority, age_seconds, backing_off) in tasks {
            let mut task = NewTask::new(default_kind(), "acct")
                .with_priority(priority)
                .into_task(3);
            task.created_at = now - ChronoDuration::seconds(age_seconds);
            if backing_off {
                task.status = TaskState::Retrying;
                task.next_attempt_at = Some(now + ChronoDuration::seconds(60));
                waiting.insert(task.id.clone());
            }
            tokio_test::block_on(store.insert_task(task)).unwrap();
        }

        let eligible = tokio_test::block_on(store.eligible_tasks(now, limit)).unwrap();
        prop_assert!(eligible.len() <= limit);
        prop_assert!(eligible.iter().all(|t| !waiting.contains(&t.id)));
        for pair in eligible.windows(2) {
            prop_assert_ne!(Task::dispatch_order(&pair[0], &pair[1]), Ordering::Greater);
        }
    }

    /// Retries are refused once the budget is spent
    #[test]
    fn test_retry_guard_blocks_over_budget(max_retries in 0u32..4) {
        let task = NewTask::new(default_kind(), "acct").into_task(max_retries);
        let mut machine = TaskStateMachine::new(task);

        for _ in 0..max_retries {
            machine.transition(TaskEvent::start("proxy-1")).unwrap();
            machine.transition(TaskEvent::retry_after(Duration::ZERO, "flaky")).unwrap();
        }
        machine.transition(TaskEvent::start("proxy-1")).unwrap();
        prop_assert!(machine.transition(TaskEvent::retry_after(Duration::ZERO, "flaky")).is_err());
        prop_assert_eq!(machine.current_state(), TaskState::Running);
        prop_assert_eq!(machine.task().retry_count, max_retries);
    }
}

fn default_kind() -> warmup_core::TaskKind {
    warmup_core::TaskKind::Login
}
