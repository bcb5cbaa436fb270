use proptest::prelude::*;
use warmup_core::models::{Proxy, ProxyType, TaskKind, TaskPriority};
use warmup_core::orchestration::FailureKind;

pub fn failure_kind_strategy() -> impl Strategy<Value = FailureKind> {
    prop_oneof![
        Just(FailureKind::Network),
        Just(FailureKind::Proxy),
        Just(FailureKind::Timeout),
        Just(FailureKind::Challenge),
        Just(FailureKind::AuthenticationRejected),
        Just(FailureKind::AccountLocked),
        Just(FailureKind::InvalidFlow),
    ]
}

pub fn task_kind_strategy() -> impl Strategy<Value = TaskKind> {
    prop_oneof![
        Just(TaskKind::MoveFromSpam),
        Just(TaskKind::MarkImportant),
        Just(TaskKind::StarEmail),
        Just(TaskKind::ClickLink),
        Just(TaskKind::ReplyEmail),
        Just(TaskKind::Login),
        Just(TaskKind::Logout),
    ]
}

pub fn priority_strategy() -> impl Strategy<Value = TaskPriority> {
    prop_oneof![
        Just(TaskPriority::Low),
        Just(TaskPriority::Medium),
        Just(TaskPriority::High),
        Just(TaskPriority::Critical),
    ]
}

/// Between 1 and `max` proxies with distinct hosts and random latency
pub fn proxy_set_strategy(max: usize) -> impl Strategy<Value = Vec<Proxy>> {
    prop::collection::vec(0.0f64..1_000.0, 1..=max).prop_map(|latencies| {
        latencies
            .into_iter()
            .enumerate()
            .map(|(i, latency)| {
                Proxy::new(format!("10.0.{}.{}", i / 250, i % 250 + 1), 8080, "u", "p", ProxyType::Http)
                    .with_response_time(latency)
            })
            .collect()
    })
}

/// A pool operation for sequence tests
#[derive(Debug, Clone)]
pub enum PoolOp {
    Acquire,
    Report { index: usize, success: bool },
}

pub fn pool_op_strategy() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        Just(PoolOp::Acquire),
        (0usize..16, any::<bool>()).prop_map(|(index, success)| PoolOp::Report { index, success }),
    ]
}
