use crate::error::WarmupError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProxyPoolError {
    /// A record failed validation; the whole load is rejected
    #[error("Malformed proxy record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("No proxy available in active or backup pool")]
    NoProxyAvailable,

    #[error("Unknown proxy: {proxy_id}")]
    UnknownProxy { proxy_id: String },

    #[error("Failed to import proxies from {path}: {reason}")]
    Import { path: String, reason: String },
}

impl From<ProxyPoolError> for WarmupError {
    fn from(err: ProxyPoolError) -> Self {
        match err {
            ProxyPoolError::NoProxyAvailable => WarmupError::NoProxyAvailable,
            ProxyPoolError::UnknownProxy { .. } => WarmupError::Internal(err.to_string()),
            ProxyPoolError::MalformedRecord { .. } | ProxyPoolError::Import { .. } => {
                WarmupError::Configuration(err.to_string())
            }
        }
    }
}

pub type ProxyPoolResult<T> = Result<T, ProxyPoolError>;
