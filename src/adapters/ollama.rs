//! Local Ollama adapter
//!
//! The one provider type allowed a second attempt: a local daemon that is
//! still loading a model often fails the first request.

use super::openai::{role_name, WireMessage};
use super::{check_status, AdapterRequest, ProviderAdapter};
use crate::error::ProviderError;
use crate::providers::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

const OLLAMA_TIMEOUT: Duration = Duration::from_secs(45);
const OLLAMA_ATTEMPTS: u32 = 2;

pub struct OllamaAdapter {
    client: Client,
}

impl OllamaAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    async fn complete(&self, provider: &Provider, request: &AdapterRequest) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", provider.base_url.trim_end_matches('/'));

        let mut messages = vec![WireMessage {
            role: "system",
            content: &request.system_prompt,
        }];
        messages.extend(request.recent_history().iter().map(|m| WireMessage {
            role: role_name(m.role),
            content: &m.content,
        }));
        messages.push(WireMessage {
            role: "user",
            content: &request.message,
        });

        let body = OllamaRequest {
            model: &provider.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        info!(provider = %provider.key, model = %provider.model, "Calling local Ollama");

        let response = self.client.post(&url).json(&body).send().await?;
        let response = check_status(provider, response).await?;

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Ollama parse error: {}", e)))?;

        Some(parsed.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("Empty response from Ollama".to_string()))
    }

    fn retry_budget(&self) -> u32 {
        OLLAMA_ATTEMPTS
    }

    fn timeout(&self) -> Duration {
        OLLAMA_TIMEOUT
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}
