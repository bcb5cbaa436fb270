//! Proxy reachability probing and the periodic sweep loop.

use super::pool::ProxyPool;
use crate::models::Proxy;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    pub reachable: bool,
    pub latency_ms: f64,
}

impl ProbeResult {
    pub fn reachable(latency_ms: f64) -> Self {
        Self {
            reachable: true,
            latency_ms,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            latency_ms: f64::INFINITY,
        }
    }
}

/// Measures a single proxy. Implementations must not fail: an error is an
/// unreachable result.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, proxy: &Proxy) -> ProbeResult;
}

/// TCP connect latency to the proxy endpoint, bounded by a timeout
#[derive(Debug, Clone)]
pub struct TcpHealthProbe {
    timeout: Duration,
}

impl TcpHealthProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl HealthProbe for TcpHealthProbe {
    async fn probe(&self, proxy: &Proxy) -> ProbeResult {
        let started = Instant::now();
        match timeout(self.timeout, TcpStream::connect(proxy.endpoint())).await {
            Ok(Ok(_stream)) => ProbeResult::reachable(started.elapsed().as_secs_f64() * 1000.0),
            Ok(Err(e)) => {
                debug!(proxy_id = %proxy.id, error = %e, "Proxy connect failed");
                ProbeResult::unreachable()
            }
            Err(_) => {
                debug!(proxy_id = %proxy.id, timeout_ms = self.timeout.as_millis() as u64, "Proxy connect timed out");
                ProbeResult::unreachable()
            }
        }
    }
}

/// Runs [`ProxyPool::health_sweep`] on a fixed interval until shutdown
pub struct ProxyHealthMonitor {
    pool: Arc<ProxyPool>,
    probe: Arc<dyn HealthProbe>,
    interval: Duration,
}

impl ProxyHealthMonitor {
    pub fn new(pool: Arc<ProxyPool>, probe: Arc<dyn HealthProbe>, interval: Duration) -> Self {
        Self {
            pool,
            probe,
            interval,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; sweeps start one interval after boot
        ticker.tick().await;

        info!(interval_seconds = self.interval.as_secs(), "🩺 PROXY_HEALTH_MONITOR: Started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.pool.health_sweep(self.probe.as_ref()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("🩺 PROXY_HEALTH_MONITOR: Stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyPoolConfig;
    use crate::models::ProxyType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    struct CountingProbe(AtomicUsize);

    #[async_trait]
    impl HealthProbe for CountingProbe {
        async fn probe(&self, _proxy: &Proxy) -> ProbeResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            ProbeResult::reachable(10.0)
        }
    }

    #[tokio::test]
    async fn test_tcp_probe_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let proxy = Proxy::new("127.0.0.1", port, "u", "p", ProxyType::Http);

        let result = TcpHealthProbe::new(Duration::from_secs(2)).probe(&proxy).await;
        assert!(result.reachable);
        assert!(result.latency_ms.is_finite());
    }

    #[tokio::test]
    async fn test_tcp_probe_unreachable_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let proxy = Proxy::new("127.0.0.1", port, "u", "p", ProxyType::Http);

        let result = TcpHealthProbe::new(Duration::from_millis(500)).probe(&proxy).await;
        assert!(!result.reachable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_sweeps_until_shutdown() {
        let pool = Arc::new(ProxyPool::with_seed(ProxyPoolConfig::default(), 1));
        pool.load(vec![Proxy::new("10.0.0.1", 8080, "u", "p", ProxyType::Http)])
            .unwrap();
        let probe = Arc::new(CountingProbe(AtomicUsize::new(0)));

        let (tx, rx) = watch::channel(false);
        let handle = ProxyHealthMonitor::new(pool, probe.clone(), Duration::from_secs(300)).spawn(rx);

        tokio::time::sleep(Duration::from_secs(601)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(probe.0.load(Ordering::SeqCst), 2);
    }
}
