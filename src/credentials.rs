//! Account credentials as handed to the action executor.
//!
//! Encryption at rest belongs to whoever implements [`CredentialStore`]; the
//! engine only ever sees plaintext for the duration of one attempt.

use crate::error::{Result, WarmupError};
use crate::models::Provider;
use crate::orchestration::types::CredentialStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub provider: Provider,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>, provider: Provider) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            provider,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[MASKED]")
            .field("provider", &self.provider)
            .finish()
    }
}

/// In-memory store for embedding applications and tests
#[derive(Debug, Default)]
pub struct StaticCredentialStore {
    entries: DashMap<String, Credentials>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account_id: impl Into<String>, credentials: Credentials) {
        self.entries.insert(account_id.into(), credentials);
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn get(&self, account_id: &str) -> Result<Credentials> {
        self.entries
            .get(account_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| WarmupError::CredentialsNotFound {
                account_id: account_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("a@example.com", "hunter2", Provider::Gmail);
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("a@example.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_static_store_lookup() {
        let store = StaticCredentialStore::new();
        store.insert(
            "acct-1",
            Credentials::new("a@example.com", "pw", Provider::Yahoo),
        );

        assert_eq!(store.get("acct-1").await.unwrap().provider, Provider::Yahoo);
        assert!(matches!(
            store.get("acct-2").await,
            Err(WarmupError::CredentialsNotFound { .. })
        ));
    }
}
