//! Provider adapters
//!
//! Every backend is invoked through the same signature; request and
//! response payloads are each adapter's private concern. Adapters are
//! looked up by provider key first, then by adapter kind.

use crate::config::{is_usable_secret, CredentialSource};
use crate::error::ProviderError;
use crate::models::ChatMessage;
use crate::providers::{AdapterKind, Provider};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod synthetic;

pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiCompatibleAdapter;
pub use synthetic::SyntheticAdapter;

/// Most recent history entries forwarded to a provider
pub const MAX_HISTORY_MESSAGES: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Everything an adapter needs for one call.
#[derive(Debug, Clone)]
pub struct AdapterRequest {
    pub message: String,
    pub history: Vec<ChatMessage>,
    pub system_prompt: String,
    pub temperature: f32,
}

impl AdapterRequest {
    pub fn recent_history(&self) -> &[ChatMessage] {
        let skip = self.history.len().saturating_sub(MAX_HISTORY_MESSAGES);
        &self.history[skip..]
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// One call against the provider; returns the raw reply text.
    async fn complete(&self, provider: &Provider, request: &AdapterRequest) -> Result<String, ProviderError>;

    /// Total attempts allowed per cascade visit.
    fn retry_budget(&self) -> u32 {
        1
    }

    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }
}

#[derive(Clone, Default)]
pub struct AdapterSet {
    by_key: HashMap<String, Arc<dyn ProviderAdapter>>,
    by_kind: HashMap<AdapterKind, Arc<dyn ProviderAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard HTTP adapters sharing one connection pool.
    pub fn http_defaults(credentials: Arc<dyn CredentialSource>) -> crate::Result<Self> {
        let client = build_client()?;

        Ok(Self::new()
            .with_kind(
                AdapterKind::Gemini,
                Arc::new(GeminiAdapter::new(client.clone(), credentials.clone())),
            )
            .with_kind(
                AdapterKind::OpenAiCompatible,
                Arc::new(OpenAiCompatibleAdapter::new(client.clone(), credentials)),
            )
            .with_kind(AdapterKind::Ollama, Arc::new(OllamaAdapter::new(client)))
            .with_kind(AdapterKind::Synthetic, Arc::new(SyntheticAdapter)))
    }

    pub fn with_kind(mut self, kind: AdapterKind, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.by_kind.insert(kind, adapter);
        self
    }

    /// Override the adapter for one provider key.
    pub fn with_provider(mut self, key: &str, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.by_key.insert(key.to_string(), adapter);
        self
    }

    pub fn resolve(&self, provider: &Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.by_key
            .get(&provider.key)
            .or_else(|| self.by_kind.get(&provider.kind))
            .cloned()
    }
}

/// Long-lived client for connection pooling.
pub fn build_client() -> crate::Result<Client> {
    let client = Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}

/// Secret for a provider. A secret that vanished since the last refresh is
/// not the provider's fault, so it never maps to an auth failure.
pub(crate) fn api_key(
    credentials: &dyn CredentialSource,
    provider: &Provider,
) -> Result<String, ProviderError> {
    let name = provider.credential_env.as_deref().unwrap_or_default();
    credentials
        .lookup(name)
        .filter(|v| is_usable_secret(v))
        .map(|v| v.trim().to_string())
        .ok_or_else(|| ProviderError::MissingCredential(name.to_string()))
}

/// Pass a 2xx response through; classify anything else.
pub(crate) async fn check_status(
    provider: &Provider,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();

    warn!(
        provider = %provider.key,
        status = status.as_u16(),
        "Provider returned error status"
    );
    debug!(provider = %provider.key, body = %truncate(&body, 300), "Provider error body");

    Err(ProviderError::from_status(status.as_u16(), retry_after))
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::provider_at;
    use super::*;
    use crate::config::StaticCredentials;
    use crate::providers::DisableReason;

    #[test]
    fn test_recent_history_is_bounded() {
        let history: Vec<_> = (0..25).map(|i| ChatMessage::user(format!("m{}", i))).collect();
        let request = AdapterRequest {
            message: "now".into(),
            history,
            system_prompt: String::new(),
            temperature: 0.5,
        };
        let recent = request.recent_history();
        assert_eq!(recent.len(), MAX_HISTORY_MESSAGES);
        assert_eq!(recent[0].content, "m15");
    }

    #[test]
    fn test_resolve_prefers_key_override() {
        let set = AdapterSet::new()
            .with_kind(AdapterKind::Synthetic, Arc::new(SyntheticAdapter))
            .with_provider("special", Arc::new(OllamaAdapter::new(Client::new())));

        let special = provider_at("special", AdapterKind::Synthetic, "", None);
        assert_eq!(set.resolve(&special).unwrap().retry_budget(), 2);

        let plain = provider_at("plain", AdapterKind::Synthetic, "", None);
        assert_eq!(set.resolve(&plain).unwrap().retry_budget(), 1);

        let missing = provider_at("x", AdapterKind::Gemini, "", None);
        assert!(set.resolve(&missing).is_none());
    }

    #[test]
    fn test_api_key_missing_does_not_disable() {
        let creds = StaticCredentials::new();
        let provider = provider_at("openai", AdapterKind::OpenAiCompatible, "", Some("OPENAI_API_KEY"));
        let err = api_key(&creds, &provider).unwrap_err();
        assert_eq!(err, ProviderError::MissingCredential("OPENAI_API_KEY".into()));
        assert!(DisableReason::from_class(err.class()).is_none());

        creds.set("OPENAI_API_KEY", "your_openai_api_key_here");
        assert!(api_key(&creds, &provider).is_err());

        creds.set("OPENAI_API_KEY", " sk-1 ");
        assert_eq!(api_key(&creds, &provider).unwrap(), "sk-1");
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }
}
