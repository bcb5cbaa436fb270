//! # Challenge Solving
//!
//! Bounded submit-then-poll against a third-party CAPTCHA service.

use crate::config::ChallengeConfig;
use crate::constants::events;
use crate::error::{Result, WarmupError};
use crate::orchestration::types::ChallengeSolver;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    Ready(String),
    Pending,
    Rejected(String),
}

/// Wire-level client for a solving service
#[async_trait]
pub trait CaptchaService: Send + Sync {
    /// Submit a challenge; returns the service's ticket id
    async fn submit(&self, site_key: &str, page_url: &str) -> Result<String>;

    async fn poll(&self, ticket: &str) -> Result<PollResult>;
}

pub struct PollingChallengeSolver<S> {
    service: S,
    poll_interval: Duration,
    timeout: Duration,
}

impl<S: CaptchaService> PollingChallengeSolver<S> {
    pub fn new(service: S, config: &ChallengeConfig) -> Self {
        Self::with_timing(service, config.poll_interval(), config.timeout())
    }

    pub fn with_timing(service: S, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            service,
            poll_interval,
            timeout,
        }
    }
}

#[async_trait]
impl<S: CaptchaService> ChallengeSolver for PollingChallengeSolver<S> {
    async fn solve(&self, site_key: &str, page_url: &str) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        let ticket = self.service.submit(site_key, page_url).await?;
        debug!(ticket = %ticket, page_url = %page_url, "Submitted challenge");

        loop {
            let now = Instant::now();
            if now >= deadline {
                warn!(ticket = %ticket, timeout_seconds = self.timeout.as_secs(), "Challenge polling timed out");
                return Err(WarmupError::Challenge(format!(
                    "challenge {ticket} not solved within {}s",
                    self.timeout.as_secs()
                )));
            }
            sleep(self.poll_interval.min(deadline - now)).await;

            match self.service.poll(&ticket).await? {
                PollResult::Ready(token) => {
                    info!(ticket = %ticket, "{}", events::CHALLENGE_SOLVED);
                    return Ok(token);
                }
                PollResult::Pending => continue,
                PollResult::Rejected(reason) => {
                    return Err(WarmupError::Challenge(format!(
                        "challenge {ticket} rejected: {reason}"
                    )));
                }
            }
        }
    }
}
