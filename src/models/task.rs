//! # Task Model
//!
//! A unit of warm-up work against one webmail account. Tasks are created in
//! `pending` by an external submitter and advanced only through
//! [`crate::state_machine::TaskStateMachine`].

use crate::state_machine::TaskState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Closed set of warm-up interactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    MoveFromSpam,
    MarkImportant,
    StarEmail,
    ClickLink,
    ReplyEmail,
    Login,
    Logout,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MoveFromSpam => "move_from_spam",
            Self::MarkImportant => "mark_important",
            Self::StarEmail => "star_email",
            Self::ClickLink => "click_link",
            Self::ReplyEmail => "reply_email",
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }

    /// Whether a success counts towards `emails_processed`
    pub fn processes_email(&self) -> bool {
        !matches!(self, Self::Login | Self::Logout)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move_from_spam" => Ok(Self::MoveFromSpam),
            "mark_important" => Ok(Self::MarkImportant),
            "star_email" => Ok(Self::StarEmail),
            "click_link" => Ok(Self::ClickLink),
            "reply_email" => Ok(Self::ReplyEmail),
            "login" => Ok(Self::Login),
            "logout" => Ok(Self::Logout),
            _ => Err(format!("Invalid task kind: {s}")),
        }
    }
}

/// Dispatch priority; derives `Ord` so `Critical` sorts highest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
    Critical = 4,
}

/// Durable task record shared with the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    pub account_id: String,
    pub priority: TaskPriority,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    pub status: TaskState,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result: Option<Value>,
    pub proxy_id: Option<String>,
    /// Earliest time a `retrying` task may re-enter `running`
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Whether the dispatcher may pick this task up at `now`
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            TaskState::Pending => true,
            TaskState::Retrying => self.next_attempt_at.map_or(true, |at| at <= now),
            _ => false,
        }
    }

    /// Dispatch ordering: higher priority first, then oldest first
    pub fn dispatch_order(a: &Task, b: &Task) -> std::cmp::Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }

    pub fn execution_duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(completed - started),
            _ => None,
        }
    }

    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    pub fn parameter_u64(&self, key: &str) -> Option<u64> {
        self.parameters.get(key).and_then(Value::as_u64)
    }
}

/// Submission request from the CRUD layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub kind: TaskKind,
    pub account_id: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    /// Falls back to `retry.max_retries` from configuration
    pub max_retries: Option<u32>,
}

impl NewTask {
    pub fn new(kind: TaskKind, account_id: impl Into<String>) -> Self {
        Self {
            kind,
            account_id: account_id.into(),
            priority: TaskPriority::default(),
            parameters: HashMap::new(),
            max_retries: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Build the pending record with a fresh identity
    pub fn into_task(self, default_max_retries: u32) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4().to_string(),
            kind: self.kind,
            account_id: self.account_id,
            priority: self.priority,
            parameters: self.parameters,
            status: TaskState::Pending,
            retry_count: 0,
            max_retries: self.max_retries.unwrap_or(default_max_retries),
            created_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
            result: None,
            proxy_id: None,
            next_attempt_at: None,
            updated_at: now,
        }
    }
}
