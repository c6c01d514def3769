//! Gemini adapter
//!
//! Calls the Generative Language `generateContent` endpoint.
//! Uses a long-lived reqwest::Client for connection pooling.

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

pub struct GeminiAdapter {
    client: Client,
    credentials: Arc<dyn CredentialSource>,
}

impl GeminiAdapter {
    pub fn new(client: Client, credentials: Arc<dyn CredentialSource>) -> Self {
        Self { client, credentials }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    async fn complete(&self, provider: &Provider, request: &AdapterRequest) -> Result<String, ProviderError> {
        let key = api_key(self.credentials.as_ref(), provider)?;
        let url = format!(
            "{}/models/{}:generateContent",
            provider.base_url.trim_end_matches('/'),
            provider.model
        );

        let body = build_request(request);

        info!(provider = %provider.key, model = %provider.model, "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .query(&[("key", key.as_str())])
            .json(&body)
            .send()
            .await?;

        let response = check_status(provider, response).await?;

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Gemini parse error: {}", e)))?;

        let answer = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("Empty response from Gemini".to_string()))?;

        Ok(answer)
    }
}

fn build_request(request: &AdapterRequest) -> GeminiRequest {
    let mut contents: Vec<Content> = request
        .recent_history()
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .map(|m| Content {
            role: Some(if m.role == MessageRole::User { "user" } else { "model" }.to_string()),
            parts: vec![Part {
                text: m.content.clone(),
            }],
        })
        .collect();

    contents.push(Content {
        role: Some("user".to_string()),
        parts: vec![Part {
            text: request.message.clone(),
        }],
    });

    GeminiRequest {
        contents,
        generation_config: GenerationConfig {
            temperature: request.temperature,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        },
        system_instruction: SystemInstruction {
            parts: vec![Part {
                text: request.system_prompt.clone(),
            }],
        },
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}
