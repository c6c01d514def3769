//! Per-call attempt bookkeeping and the degraded responses built from it

use crate::error::{ErrorClass, ProviderError};
use crate::models::{NormalizedResponse, ResponseMetadata};
use crate::normalizer::with_disclaimer;
use chrono::Utc;
use std::time::Instant;
use uuid::Uuid;

pub const NO_CONNECTION_LABEL: &str = "No connection";
pub const UNAVAILABLE_LABEL: &str = "Assistant unavailable";
pub const RATE_LIMITED_LABEL: &str = "Rate limited";
pub const TIMED_OUT_LABEL: &str = "Timed out";

const RATE_LIMIT_MESSAGE: &str =
    "We're receiving too many requests right now. Please wait a minute and try again.";
const RATE_LIMIT_SUGGESTIONS: &[&str] = &[
    "Wait about a minute before sending your message again",
    "Keep your question short and specific",
    "Review your budget while you wait",
];

const NO_CONNECTION_MESSAGE: &str =
    "I can't reach any AI assistant right now. Please check your connection or the provider configuration and try again.";
const NETWORK_MESSAGE: &str =
    "I couldn't reach the AI service. Please check your internet connection and try again.";
const AUTH_MESSAGE: &str =
    "The AI service rejected its credentials, so I can't answer right now. Please let the app administrator know.";
const BUSY_MESSAGE: &str = "The AI service is busy at the moment. Please try again shortly.";
const GENERIC_MESSAGE: &str =
    "Something went wrong while preparing your answer. Please try again in a moment.";
const DEADLINE_MESSAGE: &str =
    "This is taking longer than expected. Please try again in a moment.";

const RETRY_SUGGESTIONS: &[&str] = &["Try sending your message again in a moment"];

/// What happened during one `send`, in order.
#[derive(Debug, Default, Clone)]
pub struct AttemptRecord {
    /// One entry per adapter invocation; repeats only come from a provider's own retries
    pub attempted: Vec<String>,
    pub last_error: Option<ProviderError>,
    pub rate_limited: bool,
}

impl AttemptRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, provider: &str) {
        self.attempted.push(provider.to_string());
    }

    pub fn fail(&mut self, error: &ProviderError) {
        if error.class() == ErrorClass::RateLimit {
            self.rate_limited = true;
        }
        self.last_error = Some(error.clone());
    }

    /// True once any provider other than `except` has been invoked.
    pub fn has_real_attempt(&self, except: &str) -> bool {
        self.attempted.iter().any(|k| k != except)
    }

    pub fn last_class(&self) -> Option<ErrorClass> {
        self.last_error.as_ref().map(ProviderError::class)
    }

    fn metadata(&self, request_id: Uuid, started: Instant) -> ResponseMetadata {
        ResponseMetadata {
            request_id,
            provider: None,
            model: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
            attempted_providers: self.attempted.clone(),
            last_error: self.last_error.as_ref().map(|e| e.to_string()),
            error_class: self.last_class(),
        }
    }

    /// Response for a cascade where no candidate succeeded.
    pub fn exhausted_response(&self, request_id: Uuid, started: Instant) -> NormalizedResponse {
        if self.rate_limited {
            let mut metadata = self.metadata(request_id, started);
            metadata.last_error = None;
            metadata.error_class = Some(ErrorClass::RateLimit);

            return failure(
                RATE_LIMIT_MESSAGE,
                RATE_LIMIT_SUGGESTIONS,
                RATE_LIMITED_LABEL,
                metadata,
            );
        }

        let (message, label) = match self.last_class() {
            None => (NO_CONNECTION_MESSAGE, NO_CONNECTION_LABEL),
            Some(ErrorClass::Network) | Some(ErrorClass::Timeout) => (NETWORK_MESSAGE, NO_CONNECTION_LABEL),
            Some(ErrorClass::Auth) => (AUTH_MESSAGE, UNAVAILABLE_LABEL),
            Some(ErrorClass::RateLimit) => (BUSY_MESSAGE, UNAVAILABLE_LABEL),
            Some(ErrorClass::Server) | Some(ErrorClass::Unclassified) => (GENERIC_MESSAGE, UNAVAILABLE_LABEL),
        };

        failure(message, RETRY_SUGGESTIONS, label, self.metadata(request_id, started))
    }

    /// Response for a cascade cut short by the caller's overall deadline.
    pub fn deadline_response(&self, request_id: Uuid, started: Instant) -> NormalizedResponse {
        let mut metadata = self.metadata(request_id, started);
        metadata.error_class = Some(ErrorClass::Timeout);

        failure(DEADLINE_MESSAGE, RETRY_SUGGESTIONS, TIMED_OUT_LABEL, metadata)
    }
}

fn failure(
    message: &str,
    suggestions: &[&str],
    label: &str,
    metadata: ResponseMetadata,
) -> NormalizedResponse {
    NormalizedResponse {
        message: with_disclaimer(message),
        suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        action_hint: None,
        provider_label: label.to_string(),
        confidence: 0.0,
        metadata,
    }
}
