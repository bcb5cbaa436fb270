//! # Proxy Management
//!
//! Egress proxy pool with weighted selection, failure-driven demotion and
//! periodic health sweeps, plus the sources it loads from.

pub mod error;
pub mod health;
pub mod pool;
pub mod source;

pub use error::{ProxyPoolError, ProxyPoolResult};
pub use health::{HealthProbe, ProbeResult, ProxyHealthMonitor, TcpHealthProbe};
pub use pool::{ProxyPool, ProxyStats, SweepReport};
pub use source::{parse_proxy_csv, CsvProxyFile, ProxySource, StaticProxySource};
