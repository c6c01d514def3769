//! Chat-completions adapter for OpenAI-compatible endpoints (OpenAI, Groq, OpenRouter)

use super::{api_key, check_status, AdapterRequest, ProviderAdapter, MAX_OUTPUT_TOKENS};
use crate::config::CredentialSource;
use crate::error::ProviderError;
use crate::models::MessageRole;
use crate::providers::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub struct OpenAiCompatibleAdapter {
    client: Client,
    credentials: Arc<dyn CredentialSource>,
}

impl OpenAiCompatibleAdapter {
    pub fn new(client: Client, credentials: Arc<dyn CredentialSource>) -> Self {
        Self { client, credentials }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    async fn complete(&self, provider: &Provider, request: &AdapterRequest) -> Result<String, ProviderError> {
        let key = api_key(self.credentials.as_ref(), provider)?;
        let url = format!("{}/chat/completions", provider.base_url.trim_end_matches('/'));

        let body = build_request(&provider.model, request);

        info!(provider = %provider.key, model = %provider.model, "Calling chat completions API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let response = check_status(provider, response).await?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("{} parse error: {}", provider.key, e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse(format!("Empty response from {}", provider.key)))
    }
}

pub(crate) fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
    }
}

fn build_request<'a>(model: &'a str, request: &'a AdapterRequest) -> ChatCompletionRequest<'a> {
    let mut messages = Vec::with_capacity(request.recent_history().len() + 2);

    messages.push(WireMessage {
        role: "system",
        content: &request.system_prompt,
    });
    messages.extend(request.recent_history().iter().map(|m| WireMessage {
        role: role_name(m.role),
        content: &m.content,
    }));
    messages.push(WireMessage {
        role: "user",
        content: &request.message,
    });

    ChatCompletionRequest {
        model,
        messages,
        temperature: request.temperature,
        max_tokens: MAX_OUTPUT_TOKENS,
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
