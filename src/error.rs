//! Error types for the chat cascade
//!
//! Two layers: `OrchestrationError` is what a caller of the engine can see,
//! `ProviderError` is what an adapter reports and never leaves the cascade.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Call-level Errors
    // =============================

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure reported by a single provider adapter call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("authentication rejected (HTTP {status})")]
    Auth { status: u16 },

    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    #[error("request rejected (HTTP {status})")]
    Rejected { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    /// The secret vanished between the availability refresh and the call
    #[error("credential {0} is not set")]
    MissingCredential(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Coarse failure class driving disable decisions and the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Auth,
    RateLimit,
    Server,
    Network,
    Timeout,
    Unclassified,
}

impl ProviderError {
    /// Classify an HTTP status returned by a provider endpoint.
    pub fn from_status(status: u16, retry_after: Option<Duration>) -> Self {
        match status {
            401 | 403 => ProviderError::Auth { status },
            429 => ProviderError::RateLimited { retry_after },
            500..=599 => ProviderError::Server { status },
            _ => ProviderError::Rejected { status },
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::Auth { .. } => ErrorClass::Auth,
            ProviderError::RateLimited { .. } => ErrorClass::RateLimit,
            ProviderError::Server { .. } => ErrorClass::Server,
            ProviderError::Network(_) => ErrorClass::Network,
            ProviderError::Timeout => ErrorClass::Timeout,
            ProviderError::Rejected { .. }
            | ProviderError::MissingCredential(_)
            | ProviderError::InvalidResponse(_) => ErrorClass::Unclassified,
        }
    }

    /// Whether the provider's own retry budget may be spent on this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Server { .. } | ProviderError::Network(_) | ProviderError::Timeout
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if let Some(status) = e.status() {
            ProviderError::from_status(status.as_u16(), None)
        } else if e.is_decode() {
            ProviderError::InvalidResponse(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ProviderError::from_status(401, None).class(), ErrorClass::Auth);
        assert_eq!(ProviderError::from_status(403, None).class(), ErrorClass::Auth);
        assert_eq!(ProviderError::from_status(429, None).class(), ErrorClass::RateLimit);
        assert_eq!(ProviderError::from_status(503, None).class(), ErrorClass::Server);
        assert_eq!(ProviderError::from_status(400, None).class(), ErrorClass::Unclassified);
    }

    #[test]
    fn test_retryable() {
        assert!(ProviderError::Server { status: 502 }.is_retryable());
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(!ProviderError::Auth { status: 401 }.is_retryable());
        assert!(!ProviderError::RateLimited { retry_after: None }.is_retryable());
        assert!(!ProviderError::MissingCredential("GROQ_API_KEY".into()).is_retryable());
    }

    #[test]
    fn test_missing_credential_is_not_an_auth_failure() {
        let err = ProviderError::MissingCredential("OPENAI_API_KEY".into());
        assert_eq!(err.class(), ErrorClass::Unclassified);
        assert_eq!(err.to_string(), "credential OPENAI_API_KEY is not set");
    }
}
