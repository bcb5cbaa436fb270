//! # Orchestration Types
//!
//! Collaborator contracts the dispatcher depends on and the typed outcomes
//! they return. The browser automation, CAPTCHA service and credential vault
//! live behind these traits; the engine never inspects error strings to
//! decide what happens next.

use crate::credentials::Credentials;
use crate::error::Result;
use crate::models::{Proxy, Task};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Why an attempt failed, as classified by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection reset, DNS, TLS and similar transport problems
    Network,
    /// The proxy refused or broke the connection
    Proxy,
    /// The attempt exceeded its time limit
    Timeout,
    /// A CAPTCHA could not be solved in time
    Challenge,
    /// The provider rejected the credentials
    AuthenticationRejected,
    /// The provider locked the account
    AccountLocked,
    /// Selectors or page flow did not match, or the task is not executable
    InvalidFlow,
}

impl FailureKind {
    /// Transient kinds are retried while budget remains
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::Proxy | Self::Timeout | Self::Challenge
        )
    }

    /// Whether the failure says something about the proxy's health
    pub fn is_proxy_attributable(&self) -> bool {
        self.is_transient()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Proxy => "proxy",
            Self::Timeout => "timeout",
            Self::Challenge => "challenge",
            Self::AuthenticationRejected => "authentication_rejected",
            Self::AccountLocked => "account_locked",
            Self::InvalidFlow => "invalid_flow",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an executor needs for one attempt
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub task: Task,
    pub proxy: Proxy,
    pub credentials: Credentials,
    /// Token from a solved challenge, set when resuming the same attempt
    pub challenge_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success(Value),
    ChallengeRequired { site_key: String, page_url: String },
    Failure { kind: FailureKind, message: String },
}

impl ExecutionOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Performs the browser-driven interaction for one task.
///
/// Implementations report problems through [`ExecutionOutcome::Failure`]
/// rather than panicking or erroring, so the retry policy can classify them.
#[async_trait::async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn run(&self, request: &ExecutionRequest) -> ExecutionOutcome;
}

/// Resolves a CAPTCHA-style challenge to a token
#[async_trait::async_trait]
pub trait ChallengeSolver: Send + Sync {
    async fn solve(&self, site_key: &str, page_url: &str) -> Result<String>;
}

/// Returns plaintext credentials for an account, or `CredentialsNotFound`
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, account_id: &str) -> Result<Credentials>;
}
