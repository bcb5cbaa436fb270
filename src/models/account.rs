//! # Account Model
//!
//! The webmail identity a task operates on, with cumulative counters that the
//! dispatcher increments as a side effect of task outcomes.

use super::task::TaskKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Gmail,
    Outlook,
    Yahoo,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gmail => write!(f, "gmail"),
            Self::Outlook => write!(f, "outlook"),
            Self::Yahoo => write!(f, "yahoo"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gmail" => Ok(Self::Gmail),
            "outlook" => Ok(Self::Outlook),
            "yahoo" => Ok(Self::Yahoo),
            _ => Err(format!("Invalid provider: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
    Locked,
    #[default]
    Pending,
}

/// Monotonic per-account activity counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCounters {
    pub emails_processed: u64,
    pub spam_moved: u64,
    pub marked_important: u64,
    pub starred: u64,
    pub links_clicked: u64,
    pub replies_sent: u64,
    pub failure_count: u64,
}

impl AccountCounters {
    /// Increment the counter matching a successful task kind
    pub fn record_success(&mut self, kind: TaskKind) {
        match kind {
            TaskKind::MoveFromSpam => self.spam_moved += 1,
            TaskKind::MarkImportant => self.marked_important += 1,
            TaskKind::StarEmail => self.starred += 1,
            TaskKind::ClickLink => self.links_clicked += 1,
            TaskKind::ReplyEmail => self.replies_sent += 1,
            TaskKind::Login | TaskKind::Logout => {}
        }

        if kind.processes_email() {
            self.emails_processed += 1;
        }
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub provider: Provider,
    pub status: AccountStatus,
    pub last_activity: Option<DateTime<Utc>>,
    pub proxy_id: Option<String>,
    #[serde(default)]
    pub counters: AccountCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: impl Into<String>, email: impl Into<String>, provider: Provider) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            provider,
            status: AccountStatus::default(),
            last_activity: None,
            proxy_id: None,
            counters: AccountCounters::default(),
            created_at: now,
            updated_at: now,
        }
    }
}
