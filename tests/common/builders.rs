use super::mock_delegate::{MockSolver, ScriptedExecutor};
use std::sync::Arc;
use std::time::Duration;
use warmup_core::config::{ExecutionConfig, ProxyPoolConfig};
use warmup_core::credentials::{Credentials, StaticCredentialStore};
use warmup_core::models::{Account, NewTask, Provider, Proxy, ProxyType, Task};
use warmup_core::orchestration::{
    ActionExecutor, ChallengeSolver, Dispatcher, DispatcherCollaborators, RetryPolicy,
};
use warmup_core::proxy::ProxyPool;
use warmup_core::store::{InMemoryTaskStore, TaskStore};

pub const ACCOUNT_ID: &str = "acct-1";

pub fn proxy(host: &str) -> Proxy {
    Proxy::new(host, 8080, "proxy-user", "proxy-pass", ProxyType::Http)
}

/// Dispatcher wired to in-memory collaborators with zero retry delay
pub struct TestHarness {
    pub dispatcher: Dispatcher,
    pub store: Arc<InMemoryTaskStore>,
    pub pool: Arc<ProxyPool>,
}

pub struct TestHarnessBuilder {
    proxies: Vec<Proxy>,
    executor: Arc<dyn ActionExecutor>,
    solver: Arc<dyn ChallengeSolver>,
    retry_delay: Duration,
    execution: ExecutionConfig,
    with_credentials: bool,
}

impl Default for TestHarnessBuilder {
    fn default() -> Self {
        Self {
            proxies: vec![proxy("10.0.0.1")],
            executor: ScriptedExecutor::always_succeeding(),
            solver: MockSolver::with_token("token"),
            retry_delay: Duration::ZERO,
            execution: ExecutionConfig::default(),
            with_credentials: true,
        }
    }
}

impl TestHarnessBuilder {
    pub fn proxies(mut self, proxies: Vec<Proxy>) -> Self {
        self.proxies = proxies;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn solver(mut self, solver: Arc<dyn ChallengeSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn without_credentials(mut self) -> Self {
        self.with_credentials = false;
        self
    }

    pub async fn build(self) -> TestHarness {
        let pool = Arc::new(ProxyPool::with_seed(ProxyPoolConfig::default(), 42));
        pool.load(self.proxies).expect("test proxies are valid");

        let store = Arc::new(InMemoryTaskStore::new());
        store
            .insert_account(Account::new(ACCOUNT_ID, "warm@example.com", Provider::Gmail))
            .await
            .expect("account insert");

        let credentials = Arc::new(StaticCredentialStore::new());
        if self.with_credentials {
            credentials.insert(
                ACCOUNT_ID,
                Credentials::new("warm@example.com", "app-password", Provider::Gmail),
            );
        }

        let dispatcher = Dispatcher::new(
            pool.clone(),
            DispatcherCollaborators {
                store: store.clone(),
                executor: self.executor,
                solver: self.solver,
                credentials,
            },
            RetryPolicy::new(self.retry_delay),
            self.execution,
        );

        TestHarness {
            dispatcher,
            store,
            pool,
        }
    }
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::default()
    }

    pub async fn submit(&self, new_task: NewTask) -> Task {
        let task = new_task.into_task(3);
        self.store
            .insert_task(task.clone())
            .await
            .expect("task insert");
        task
    }

    pub async fn task(&self, task_id: &str) -> Task {
        self.store.get_task(task_id).await.expect("task exists")
    }

    pub async fn account(&self) -> Account {
        self.store.get_account(ACCOUNT_ID).await.expect("account exists")
    }
}
