pub mod openai_compat;

use async_trait::async_trait;

use crate::config::AiConfig;
use crate::error::ProviderError;
use crate::types::{CompletionResponse, Message};

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;
}

/// Create the provider described by the AI config.
pub fn create_provider(config: &AiConfig, http: reqwest::Client) -> Box<dyn LlmProvider> {
    Box::new(openai_compat::OpenAiCompatProvider::new(
        config.api_key.clone(),
        config.api_base.clone(),
        config.model.clone(),
        http,
    ))
}
