//! Load strategies for the proxy pool.
//!
//! A source only produces records; validation and membership stay with
//! [`super::ProxyPool::load`].

use super::error::{ProxyPoolError, ProxyPoolResult};
use crate::models::{Proxy, ProxyType};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Human-readable origin for logs and errors
    fn name(&self) -> String;

    async fn fetch(&self) -> ProxyPoolResult<Vec<Proxy>>;
}

/// Proxy list exported as CSV: a header naming at least the
/// `ip,port,username,password,type` columns, then one row per proxy.
#[derive(Debug, Clone)]
pub struct CsvProxyFile {
    path: PathBuf,
}

impl CsvProxyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProxySource for CsvProxyFile {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> ProxyPoolResult<Vec<Proxy>> {
        let content =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|e| ProxyPoolError::Import {
                    path: self.name(),
                    reason: e.to_string(),
                })?;
        parse_proxy_csv(&content, &self.name())
    }
}

/// Columns every proxy file must carry, in any order
pub const REQUIRED_COLUMNS: [&str; 5] = ["ip", "port", "username", "password", "type"];

#[derive(Debug, Deserialize)]
struct ProxyRow {
    ip: String,
    port: String,
    username: String,
    password: String,
    #[serde(rename = "type")]
    proxy_type: String,
}

/// Parse CSV content, matching columns by header name. Quoted fields are
/// honoured and extra columns ignored. Any bad row fails the whole import.
pub fn parse_proxy_csv(content: &str, source_name: &str) -> ProxyPoolResult<Vec<Proxy>> {
    let import_error = |reason: String| ProxyPoolError::Import {
        path: source_name.to_string(),
        reason,
    };
    let line_error = |line: u64, reason: String| import_error(format!("line {line}: {reason}"));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| import_error(format!("unreadable header: {e}")))?
        .clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h.eq_ignore_ascii_case(column)))
        .collect();
    if !missing.is_empty() {
        return Err(import_error(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }
    let headers = csv::StringRecord::from(
        headers
            .iter()
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>(),
    );

    let mut proxies = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| {
            let line = e.position().map_or(0, |p| p.line());
            line_error(line, e.to_string())
        })?;
        let line = record.position().map_or(0, |p| p.line());

        let row: ProxyRow = record
            .deserialize(Some(&headers))
            .map_err(|e| line_error(line, e.to_string()))?;
        let port = row
            .port
            .parse::<u16>()
            .map_err(|e| line_error(line, format!("invalid port '{}': {e}", row.port)))?;
        let proxy_type = row
            .proxy_type
            .parse::<ProxyType>()
            .map_err(|e| line_error(line, e))?;

        proxies.push(Proxy::new(row.ip, port, row.username, row.password, proxy_type));
    }

    Ok(proxies)
}

/// Fixed list handed over by an embedding application, e.g. the result of a
/// paid provider's API call.
#[derive(Debug, Clone, Default)]
pub struct StaticProxySource {
    name: String,
    proxies: Vec<Proxy>,
}

impl StaticProxySource {
    pub fn new(name: impl Into<String>, proxies: Vec<Proxy>) -> Self {
        Self {
            name: name.into(),
            proxies,
        }
    }
}

#[async_trait]
impl ProxySource for StaticProxySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn fetch(&self) -> ProxyPoolResult<Vec<Proxy>> {
        Ok(self.proxies.clone())
    }
}
