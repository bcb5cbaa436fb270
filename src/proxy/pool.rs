//! # Proxy Pool
//!
//! Active/backup partition of egress proxies with weighted random selection
//! and failure-driven demotion.
//!
//! All membership and counter mutations happen under one lock, so a proxy is
//! observed in exactly one partition and a failure report plus the demotion it
//! triggers land as a single step. Health probes run outside the lock; their
//! results are applied afterwards against whatever membership the proxy has by
//! then.

use super::error::{ProxyPoolError, ProxyPoolResult};
use super::health::{HealthProbe, ProbeResult};
use super::source::ProxySource;
use crate::config::ProxyPoolConfig;
use crate::constants::events;
use crate::logging::log_proxy_operation;
use crate::models::{PoolMembership, Proxy};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Point-in-time pool statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyStats {
    pub active_count: usize,
    pub backup_count: usize,
    pub total_count: usize,
    /// Mean `response_time_ms` over the active partition, 0 when empty
    pub avg_response_time_active: f64,
    pub unhealthy_count: usize,
}

/// Result of one health sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub demoted: Vec<String>,
    pub promoted: Vec<String>,
}

struct PoolInner {
    active: Vec<Proxy>,
    /// Oldest demotion first
    backup: VecDeque<Proxy>,
    rng: fastrand::Rng,
}

impl PoolInner {
    fn contains(&self, proxy_id: &str) -> bool {
        self.active.iter().any(|p| p.id == proxy_id)
            || self.backup.iter().any(|p| p.id == proxy_id)
    }

    fn demote(&mut self, index: usize) -> &Proxy {
        let mut proxy = self.active.remove(index);
        proxy.membership = PoolMembership::Backup;
        self.backup.push_back(proxy);
        let last = self.backup.len() - 1;
        &self.backup[last]
    }

    fn promote(&mut self, index: usize) -> Option<&Proxy> {
        let mut proxy = self.backup.remove(index)?;
        proxy.membership = PoolMembership::Active;
        self.active.push(proxy);
        self.active.last()
    }

    /// Index into `active` chosen with probability proportional to weight
    fn weighted_index(&mut self) -> Option<usize> {
        if self.active.is_empty() {
            return None;
        }

        let weights: Vec<f64> = self.active.iter().map(Proxy::selection_weight).collect();
        let total: f64 = weights.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Some(self.rng.usize(..self.active.len()));
        }

        let mut roll = self.rng.f64() * total;
        for (index, weight) in weights.iter().enumerate() {
            if roll < *weight {
                return Some(index);
            }
            roll -= weight;
        }
        // Float residue lands on the last entry
        Some(self.active.len() - 1)
    }
}

pub struct ProxyPool {
    config: ProxyPoolConfig,
    inner: Mutex<PoolInner>,
}

impl std::fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ProxyPool {
    pub fn new(config: ProxyPoolConfig) -> Self {
        let rng = match config.selection_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            config,
            inner: Mutex::new(PoolInner {
                active: Vec::new(),
                backup: VecDeque::new(),
                rng,
            }),
        }
    }

    /// Deterministic selection for tests and benchmarks
    pub fn with_seed(mut config: ProxyPoolConfig, seed: u64) -> Self {
        config.selection_seed = Some(seed);
        Self::new(config)
    }

    pub fn config(&self) -> &ProxyPoolConfig {
        &self.config
    }

    /// Add proxies to the active pool.
    ///
    /// Every record is validated before any is inserted: a missing
    /// host/port/credentials or an id already present rejects the whole batch.
    pub fn load(&self, proxies: Vec<Proxy>) -> ProxyPoolResult<usize> {
        let mut inner = self.inner.lock();
        let mut seen = HashSet::new();

        for (index, proxy) in proxies.iter().enumerate() {
            if let Some(reason) = proxy.validation_error() {
                return Err(ProxyPoolError::MalformedRecord { index, reason });
            }
            if !seen.insert(proxy.id.as_str()) || inner.contains(&proxy.id) {
                return Err(ProxyPoolError::MalformedRecord {
                    index,
                    reason: format!("duplicate proxy id {}", proxy.id),
                });
            }
        }

        let count = proxies.len();
        for mut proxy in proxies {
            proxy.membership = PoolMembership::Active;
            inner.active.push(proxy);
        }

        info!(
            loaded = count,
            active = inner.active.len(),
            backup = inner.backup.len(),
            "✅ PROXY_POOL: Loaded proxies"
        );
        Ok(count)
    }

    /// Fetch from a source and load the result as one batch
    pub async fn load_from(&self, source: &dyn ProxySource) -> ProxyPoolResult<usize> {
        let proxies = source.fetch().await?;
        debug!(source = %source.name(), fetched = proxies.len(), "Fetched proxies from source");
        self.load(proxies)
    }

    /// Pick an active proxy by weighted random selection.
    ///
    /// An empty active pool first promotes the oldest backup entry. Fails fast
    /// with `NoProxyAvailable` when both partitions are empty.
    pub fn acquire(&self) -> ProxyPoolResult<Proxy> {
        let mut inner = self.inner.lock();

        if inner.active.is_empty() {
            if let Some(promoted) = inner.promote(0) {
                log_proxy_operation(
                    events::PROXY_PROMOTED,
                    &promoted.id,
                    promoted.failure_count,
                    "active",
                    Some("active pool empty"),
                );
            }
        }

        let index = inner
            .weighted_index()
            .ok_or(ProxyPoolError::NoProxyAvailable)?;
        let proxy = &mut inner.active[index];
        proxy.last_used = Some(Utc::now());

        debug!(
            proxy_id = %proxy.id,
            failure_count = proxy.failure_count,
            response_time_ms = proxy.response_time_ms,
            "{}",
            events::PROXY_ACQUIRED
        );
        Ok(proxy.clone())
    }

    /// Feed an attempt outcome back into the proxy's failure counter.
    ///
    /// Returns the membership after the update.
    pub fn report_outcome(&self, proxy_id: &str, success: bool) -> ProxyPoolResult<PoolMembership> {
        let mut inner = self.inner.lock();
        let max_failures = self.config.max_failures;

        if let Some(index) = inner.active.iter().position(|p| p.id == proxy_id) {
            let proxy = &mut inner.active[index];
            if success {
                proxy.failure_count = proxy.failure_count.saturating_sub(1);
                return Ok(PoolMembership::Active);
            }

            proxy.failure_count += 1;
            if proxy.failure_count < max_failures {
                return Ok(PoolMembership::Active);
            }

            let demoted = inner.demote(index);
            log_proxy_operation(
                events::PROXY_DEMOTED,
                &demoted.id,
                demoted.failure_count,
                "backup",
                Some("failure threshold reached"),
            );
            return Ok(PoolMembership::Backup);
        }

        let proxy = inner
            .backup
            .iter_mut()
            .find(|p| p.id == proxy_id)
            .ok_or_else(|| ProxyPoolError::UnknownProxy {
                proxy_id: proxy_id.to_string(),
            })?;
        if success {
            proxy.failure_count = proxy.failure_count.saturating_sub(1);
        } else {
            proxy.failure_count += 1;
        }
        Ok(PoolMembership::Backup)
    }

    /// Re-measure every proxy and migrate between partitions on the result.
    ///
    /// Reachable with latency at or under the threshold is healthy and records
    /// the new latency; anything else is unhealthy and keeps the last good one.
    pub async fn health_sweep(&self, probe: &dyn HealthProbe) -> SweepReport {
        let snapshot = self.snapshot();
        let results: Vec<ProbeResult> =
            futures::future::join_all(snapshot.iter().map(|proxy| probe.probe(proxy))).await;

        let threshold = self.config.response_time_threshold_ms as f64;
        let mut report = SweepReport {
            probed: snapshot.len(),
            ..SweepReport::default()
        };

        let mut inner = self.inner.lock();
        for (proxy, result) in snapshot.iter().zip(results) {
            let healthy = result.reachable && result.latency_ms <= threshold;
            if healthy {
                report.healthy += 1;
            } else {
                report.unhealthy += 1;
            }

            if let Some(index) = inner.active.iter().position(|p| p.id == proxy.id) {
                let current = &mut inner.active[index];
                current.healthy = healthy;
                if healthy {
                    current.response_time_ms = result.latency_ms;
                } else {
                    let demoted = inner.demote(index);
                    log_proxy_operation(
                        events::PROXY_DEMOTED,
                        &demoted.id,
                        demoted.failure_count,
                        "backup",
                        Some("health check failed"),
                    );
                    report.demoted.push(proxy.id.clone());
                }
            } else if let Some(index) = inner.backup.iter().position(|p| p.id == proxy.id) {
                let current = &mut inner.backup[index];
                current.healthy = healthy;
                if healthy {
                    current.response_time_ms = result.latency_ms;
                    if let Some(promoted) = inner.promote(index) {
                        log_proxy_operation(
                            events::PROXY_PROMOTED,
                            &promoted.id,
                            promoted.failure_count,
                            "active",
                            Some("health check recovered"),
                        );
                    }
                    report.promoted.push(proxy.id.clone());
                }
            } else {
                warn!(proxy_id = %proxy.id, "Proxy disappeared during health sweep");
            }
        }

        info!(
            probed = report.probed,
            healthy = report.healthy,
            unhealthy = report.unhealthy,
            demoted = report.demoted.len(),
            promoted = report.promoted.len(),
            "{}",
            events::PROXY_HEALTH_SWEEP
        );
        report
    }

    pub fn stats(&self) -> ProxyStats {
        let inner = self.inner.lock();
        let active_count = inner.active.len();
        let backup_count = inner.backup.len();
        let avg_response_time_active = if active_count == 0 {
            0.0
        } else {
            inner.active.iter().map(|p| p.response_time_ms).sum::<f64>() / active_count as f64
        };
        let unhealthy_count = inner
            .active
            .iter()
            .chain(inner.backup.iter())
            .filter(|p| !p.healthy)
            .count();

        ProxyStats {
            active_count,
            backup_count,
            total_count: active_count + backup_count,
            avg_response_time_active,
            unhealthy_count,
        }
    }

    /// Copy of every proxy, active first then backup in demotion order
    pub fn snapshot(&self) -> Vec<Proxy> {
        let inner = self.inner.lock();
        inner
            .active
            .iter()
            .chain(inner.backup.iter())
            .cloned()
            .collect()
    }

    pub fn get(&self, proxy_id: &str) -> Option<Proxy> {
        let inner = self.inner.lock();
        inner
            .active
            .iter()
            .chain(inner.backup.iter())
            .find(|p| p.id == proxy_id)
            .cloned()
    }

    pub fn membership_of(&self, proxy_id: &str) -> Option<PoolMembership> {
        self.get(proxy_id).map(|p| p.membership)
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.inner.lock().active.iter().map(|p| p.id.clone()).collect()
    }

    pub fn backup_ids(&self) -> Vec<String> {
        self.inner.lock().backup.iter().map(|p| p.id.clone()).collect()
    }
}
