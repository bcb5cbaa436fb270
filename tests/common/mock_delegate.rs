use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use warmup_core::error::{Result, WarmupError};
use warmup_core::orchestration::{
    ActionExecutor, ChallengeSolver, ExecutionOutcome, ExecutionRequest, FailureKind,
};

/// What the executor saw for one call
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub task_id: String,
    pub proxy_id: String,
    pub challenge_token: Option<String>,
}

/// Executor that replays a script of outcomes, one per call.
/// Falls back to success once the script runs out.
#[derive(Default)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<ExecutionOutcome>>,
    runs: Mutex<Vec<RecordedRun>>,
    delay: Option<Duration>,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<ExecutionOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    pub fn with_delay(script: Vec<ExecutionOutcome>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn always_succeeding() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn run(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        self.runs.lock().push(RecordedRun {
            task_id: request.task.id.clone(),
            proxy_id: request.proxy.id.clone(),
            challenge_token: request.challenge_token.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| ExecutionOutcome::Success(serde_json::json!({"executed": true})))
    }
}

pub fn transient(message: &str) -> ExecutionOutcome {
    ExecutionOutcome::failure(FailureKind::Network, message)
}

pub fn challenge() -> ExecutionOutcome {
    ExecutionOutcome::ChallengeRequired {
        site_key: "site-key".to_string(),
        page_url: "https://mail.example.com/login".to_string(),
    }
}

/// Solver returning a fixed token, or failing when built with `failing`
pub struct MockSolver {
    token: Option<String>,
    calls: Mutex<usize>,
}

impl MockSolver {
    pub fn with_token(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: Some(token.to_string()),
            calls: Mutex::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            token: None,
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl ChallengeSolver for MockSolver {
    async fn solve(&self, _site_key: &str, _page_url: &str) -> Result<String> {
        *self.calls.lock() += 1;
        self.token
            .clone()
            .ok_or_else(|| WarmupError::Challenge("solver rejected challenge".to_string()))
    }
}
