//! # Warm-up System Bootstrap
//!
//! Builds the process-scoped pieces (proxy pool, dispatcher, health monitor)
//! from configuration and hands back a handle that owns their lifecycle.
//! Nothing is initialized lazily; everything the loops need is created here
//! and torn down in [`WarmupSystemHandle::shutdown`].

use super::dispatcher::{Dispatcher, DispatcherCollaborators};
use super::retry_policy::RetryPolicy;
use crate::config::ConfigManager;
use crate::constants::system;
use crate::error::{Result, WarmupError};
use crate::insights::StatsAggregator;
use crate::logging::init_structured_logging;
use crate::models::{NewTask, Task};
use crate::proxy::{
    CsvProxyFile, HealthProbe, ProxyHealthMonitor, ProxyPool, ProxySource, ProxyStats,
    TcpHealthProbe,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Optional pieces supplied by the embedding application
#[derive(Clone)]
pub struct BootstrapOptions {
    /// Loaded after `proxy.import_file`, e.g. a paid provider's API
    pub proxy_source: Option<Arc<dyn ProxySource>>,
    /// Defaults to [`TcpHealthProbe`] with `proxy.probe_timeout_ms`
    pub health_probe: Option<Arc<dyn HealthProbe>>,
    /// Whether to start the dispatcher and health loops immediately
    pub auto_start: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            proxy_source: None,
            health_probe: None,
            auto_start: true,
        }
    }
}

/// System status information
#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub running: bool,
    pub environment: String,
    pub proxies: ProxyStats,
    pub in_flight_tasks: usize,
}

/// Lifecycle handle for a bootstrapped system
pub struct WarmupSystemHandle {
    pub pool: Arc<ProxyPool>,
    pub dispatcher: Dispatcher,
    pub config_manager: Arc<ConfigManager>,
    health_probe: Arc<dyn HealthProbe>,
    /// Some while running
    shutdown_sender: Option<watch::Sender<bool>>,
    workers: Vec<JoinHandle<()>>,
}

impl WarmupSystemHandle {
    pub fn is_running(&self) -> bool {
        self.shutdown_sender.is_some()
    }

    /// Spawn the dispatcher and health monitor loops
    pub fn start(&mut self) {
        if self.is_running() {
            warn!("Warm-up system already running");
            return;
        }

        let (sender, receiver) = watch::channel(false);
        let monitor = ProxyHealthMonitor::new(
            self.pool.clone(),
            self.health_probe.clone(),
            self.config_manager.config().proxy.health_check_interval(),
        );
        self.workers.push(monitor.spawn(receiver.clone()));
        self.workers.push(self.dispatcher.clone().spawn(receiver));
        self.shutdown_sender = Some(sender);

        info!("🚀 BOOTSTRAP: Dispatcher and proxy health monitor started");
    }

    /// Signal both loops and wait for them to exit
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(sender) = self.shutdown_sender.take() else {
            warn!("Warm-up system already stopped");
            return Ok(());
        };

        info!("🛑 Warm-up system shutdown requested");
        sender
            .send(true)
            .map_err(|_| WarmupError::Internal("Failed to send shutdown signal".to_string()))?;

        for worker in self.workers.drain(..) {
            if let Err(e) = worker.await {
                error!(error = %e, "Background loop ended abnormally");
            }
        }

        info!("✅ Warm-up system stopped");
        Ok(())
    }

    /// Create a pending task with the configured default retry budget
    pub async fn submit(&self, new_task: NewTask) -> Result<Task> {
        let task = new_task.into_task(self.config_manager.config().retry.max_retries);
        self.dispatcher.store().insert_task(task.clone()).await?;
        Ok(task)
    }

    /// Read-side statistics over this system's store and pool
    pub fn stats(&self) -> StatsAggregator {
        StatsAggregator::new(self.dispatcher.store().clone(), self.pool.clone())
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            running: self.is_running(),
            environment: self.config_manager.environment().to_string(),
            proxies: self.pool.stats(),
            in_flight_tasks: self.dispatcher.in_flight_count(),
        }
    }
}

/// Bootstrap entry point
pub struct WarmupSystem;

impl WarmupSystem {
    /// Build the pool, load proxies, wire the dispatcher and (optionally)
    /// start the background loops. Proxy load errors are fatal.
    pub async fn bootstrap(
        config_manager: Arc<ConfigManager>,
        collaborators: DispatcherCollaborators,
        options: BootstrapOptions,
    ) -> Result<WarmupSystemHandle> {
        init_structured_logging();
        info!(
            environment = %config_manager.environment(),
            version = system::WARMUP_CORE_VERSION,
            "🚀 BOOTSTRAP: Starting warm-up system"
        );
        let config = config_manager.config();

        let pool = Arc::new(ProxyPool::new(config.proxy.clone()));
        if let Some(path) = &config.proxy.import_file {
            let loaded = pool.load_from(&CsvProxyFile::new(path)).await?;
            info!(path = %path.display(), loaded, "✅ BOOTSTRAP: Imported proxies");
        }
        if let Some(source) = &options.proxy_source {
            let loaded = pool.load_from(source.as_ref()).await?;
            info!(source = %source.name(), loaded, "✅ BOOTSTRAP: Loaded proxies from source");
        }
        if pool.stats().total_count == 0 {
            warn!("Proxy pool is empty; tasks will be deferred until proxies are loaded");
        }

        let dispatcher = Dispatcher::new(
            pool.clone(),
            collaborators,
            RetryPolicy::from_config(&config.retry),
            config.execution.clone(),
        );

        let health_probe = options
            .health_probe
            .clone()
            .unwrap_or_else(|| Arc::new(TcpHealthProbe::new(config.proxy.probe_timeout())));

        let mut handle = WarmupSystemHandle {
            pool,
            dispatcher,
            config_manager: config_manager.clone(),
            health_probe,
            shutdown_sender: None,
            workers: Vec::new(),
        };

        if options.auto_start {
            handle.start();
        } else {
            info!("📋 BOOTSTRAP: Loops not auto-started - manual control mode");
        }

        info!("🎉 BOOTSTRAP: Warm-up system bootstrap completed");
        Ok(handle)
    }
}
