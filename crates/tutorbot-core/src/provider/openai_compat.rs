use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::ProviderError;
use crate::types::{CompletionResponse, FinishReason, Message, TokenUsage};

use super::LlmProvider;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completions provider.
/// Works with any endpoint that accepts the `/chat/completions` shape,
/// including multimodal `image_url` content parts.
pub struct OpenAiCompatProvider {
    api_key: String,
    api_base: String,
    default_model: String,
    http: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        api_key: String,
        api_base: Option<String>,
        default_model: String,
        http: reqwest::Client,
    ) -> Self {
        let base = api_base.unwrap_or_else(|| OPENAI_API_BASE.to_string());
        Self {
            api_key,
            api_base: base.trim_end_matches('/').to_string(),
            default_model,
            http,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.api_base);

        let body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        debug!("OpenAI-compat request to {} with model {}", url, model);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let data: serde_json::Value = response.json().await?;
        parse_openai_response(&data)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// Parse an OpenAI-format response into our CompletionResponse.
pub fn parse_openai_response(data: &serde_json::Value) -> Result<CompletionResponse, ProviderError> {
    let choice = data
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

    let message = choice
        .get("message")
        .ok_or_else(|| ProviderError::Parse("No message in choice".to_string()))?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let finish_reason = match choice.get("finish_reason").and_then(|v| v.as_str()) {
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    };

    let usage = data
        .get("usage")
        .map(|u| {
            let field = |name: &str| u.get(name).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            TokenUsage {
                prompt_tokens: field("prompt_tokens"),
                completion_tokens: field("completion_tokens"),
                total_tokens: field("total_tokens"),
            }
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        content,
        finish_reason,
        usage,
    })
}
