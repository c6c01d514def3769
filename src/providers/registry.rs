//! Provider registry
//!
//! Data-driven table of backends in fallback priority order. The registry
//! owns the `available` flag; credential presence is re-derived on every
//! refresh while a provider held by an availability window stays off.
//!
//! Holds live behind a synchronous lock so that placing or lifting one can
//! never be interrupted halfway by a cancelled caller.

use crate::config::CredentialSource;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::debug;

/// Which adapter implementation serves a provider.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Gemini,
    OpenAiCompatible,
    Ollama,
    Synthetic,
}

/// Static description of a backend, as configured at process start.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub key: String,
    pub display_name: String,
    pub model: String,
    pub base_url: String,
    pub kind: AdapterKind,
    /// Secret that must be present for the provider to be usable
    pub credential_env: Option<String>,
    pub model_env: Option<String>,
    pub base_url_env: Option<String>,
}

impl ProviderDescriptor {
    pub fn new(key: &str, display_name: &str, model: &str, base_url: &str, kind: AdapterKind) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            model: model.to_string(),
            base_url: base_url.to_string(),
            kind,
            credential_env: None,
            model_env: None,
            base_url_env: None,
        }
    }

    pub fn credential(mut self, env: &str) -> Self {
        self.credential_env = Some(env.to_string());
        self
    }

    pub fn model_override(mut self, env: &str) -> Self {
        self.model_env = Some(env.to_string());
        self
    }

    pub fn base_url_override(mut self, env: &str) -> Self {
        self.base_url_env = Some(env.to_string());
        self
    }
}

/// Default fallback table. Order is the cascade's default priority.
pub fn default_descriptors() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor::new(
            "gemini",
            "Google Gemini",
            "gemini-2.0-flash",
            "https://generativelanguage.googleapis.com/v1beta",
            AdapterKind::Gemini,
        )
        .credential("GEMINI_API_KEY")
        .model_override("GEMINI_MODEL"),
        ProviderDescriptor::new(
            "groq",
            "Groq",
            "llama-3.3-70b-versatile",
            "https://api.groq.com/openai/v1",
            AdapterKind::OpenAiCompatible,
        )
        .credential("GROQ_API_KEY")
        .model_override("GROQ_MODEL"),
        ProviderDescriptor::new(
            "openai",
            "OpenAI",
            "gpt-4o-mini",
            "https://api.openai.com/v1",
            AdapterKind::OpenAiCompatible,
        )
        .credential("OPENAI_API_KEY")
        .model_override("OPENAI_MODEL"),
        ProviderDescriptor::new(
            "openrouter",
            "OpenRouter",
            "openai/gpt-4o-mini",
            "https://openrouter.ai/api/v1",
            AdapterKind::OpenAiCompatible,
        )
        .credential("OPENROUTER_API_KEY")
        .model_override("OPENROUTER_MODEL"),
        ProviderDescriptor::new(
            "ollama",
            "Ollama (local)",
            "llama3.1",
            "http://localhost:11434",
            AdapterKind::Ollama,
        )
        .credential("OLLAMA_BASE_URL")
        .model_override("OLLAMA_MODEL")
        .base_url_override("OLLAMA_BASE_URL"),
        ProviderDescriptor::new(
            "synthetic",
            "Synthetic assistant (dev)",
            "synthetic-finance-v1",
            "",
            AdapterKind::Synthetic,
        ),
    ]
}

/// Snapshot of one backend as seen by callers.
#[derive(Debug, Clone, Serialize)]
pub struct Provider {
    pub key: String,
    pub display_name: String,
    pub model: String,
    pub base_url: String,
    pub kind: AdapterKind,
    pub credential_env: Option<String>,
    pub credential_present: bool,
    pub available: bool,
}

impl Provider {
    pub fn is_synthetic(&self) -> bool {
        self.kind == AdapterKind::Synthetic
    }
}

struct Entry {
    descriptor: ProviderDescriptor,
    provider: Provider,
}

impl Entry {
    fn derive(&mut self, credentials: &dyn CredentialSource) {
        let d = &self.descriptor;

        let credential_present = match &d.credential_env {
            Some(name) => credentials.is_present(name),
            None => true,
        };

        self.provider.model = d
            .model_env
            .as_deref()
            .and_then(|name| credentials.lookup(name))
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| d.model.clone());

        self.provider.base_url = d
            .base_url_env
            .as_deref()
            .and_then(|name| credentials.lookup(name))
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| d.base_url.clone());

        self.provider.credential_present = credential_present;
        self.provider.available = credential_present;
    }
}

pub struct ProviderRegistry {
    entries: RwLock<Vec<Entry>>,
    /// Keys forced off by an availability window
    held: Mutex<HashSet<String>>,
    credentials: Arc<dyn CredentialSource>,
}

impl ProviderRegistry {
    pub fn new(descriptors: Vec<ProviderDescriptor>, credentials: Arc<dyn CredentialSource>) -> Self {
        let mut entries = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if entries.iter().any(|e: &Entry| e.descriptor.key == descriptor.key) {
                continue;
            }

            let provider = Provider {
                key: descriptor.key.clone(),
                display_name: descriptor.display_name.clone(),
                model: descriptor.model.clone(),
                base_url: descriptor.base_url.clone(),
                kind: descriptor.kind,
                credential_env: descriptor.credential_env.clone(),
                credential_present: false,
                available: false,
            };

            let mut entry = Entry { descriptor, provider };
            entry.derive(credentials.as_ref());
            entries.push(entry);
        }

        Self {
            entries: RwLock::new(entries),
            held: Mutex::new(HashSet::new()),
            credentials,
        }
    }

    pub fn with_defaults(credentials: Arc<dyn CredentialSource>) -> Self {
        Self::new(default_descriptors(), credentials)
    }

    pub fn credentials(&self) -> Arc<dyn CredentialSource> {
        self.credentials.clone()
    }

    /// All providers in priority order.
    pub async fn list_providers(&self) -> Vec<Provider> {
        let entries = self.entries.read().await;
        entries.iter().map(|e| self.snapshot(e)).collect()
    }

    pub async fn get(&self, key: &str) -> Option<Provider> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.provider.key == key)
            .map(|e| self.snapshot(e))
    }

    /// Provider keys in priority order.
    pub async fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        entries.iter().map(|e| e.provider.key.clone()).collect()
    }

    /// Re-derive credential-based availability. Held providers stay unavailable.
    pub async fn refresh_availability(&self) {
        let mut entries = self.entries.write().await;
        for entry in entries.iter_mut() {
            entry.derive(self.credentials.as_ref());
        }

        debug!(
            available = entries.iter().filter(|e| self.snapshot(e).available).count(),
            total = entries.len(),
            "Provider availability refreshed"
        );
    }

    /// Short SHA-256 fingerprint of the loaded secret, never the secret itself.
    pub async fn credential_fingerprint(&self, key: &str) -> Option<String> {
        let name = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .find(|e| e.provider.key == key)?
                .descriptor
                .credential_env
                .clone()?
        };

        let secret = self.credentials.lookup(&name)?;
        let hash = Sha256::digest(secret.trim().as_bytes());
        Some(hex::encode(&hash[..6]))
    }

    pub(crate) fn hold(&self, key: &str) {
        if let Ok(mut held) = self.held.lock() {
            held.insert(key.to_string());
        }
    }

    pub(crate) fn release(&self, key: &str) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(key);
        }
    }

    pub(crate) fn release_all(&self) {
        if let Ok(mut held) = self.held.lock() {
            held.clear();
        }
    }

    fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(key))
            .unwrap_or(false)
    }

    fn snapshot(&self, entry: &Entry) -> Provider {
        let mut provider = entry.provider.clone();
        provider.available = provider.credential_present && !self.is_held(&provider.key);
        provider
    }
}
