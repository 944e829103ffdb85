pub mod context;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::AiConfig;
use crate::error::ProviderError;
use crate::provider::LlmProvider;
use crate::store::UserRecord;
use crate::types::{FinishReason, Message};

/// Fixed question sent along with an image the student uploads.
pub const IMAGE_PROMPT: &str = "この画像について解説してください。";

/// Generative fallback used when no FAQ entry matches.
pub struct Tutor {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl Tutor {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &AiConfig) -> Self {
        let model = if config.model.is_empty() {
            provider.default_model().to_string()
        } else {
            config.model.clone()
        };
        Self {
            provider,
            model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Answer a free-text question in the student's context.
    pub async fn answer(&self, user: &UserRecord, text: &str) -> Result<String, ProviderError> {
        self.complete(vec![
            Message::system(context::build_system_prompt(user)),
            Message::user(text),
        ])
        .await
    }

    /// Explain an image the student sent.
    pub async fn explain_image(&self, user: &UserRecord, image_url: &str) -> Result<String, ProviderError> {
        self.complete(vec![
            Message::system(context::build_system_prompt(user)),
            Message::user_with_image(IMAGE_PROMPT, image_url),
        ])
        .await
    }

    async fn complete(&self, messages: Vec<Message>) -> Result<String, ProviderError> {
        let completion = self
            .provider
            .chat(&messages, &self.model, self.max_tokens, self.temperature)
            .await?;

        debug!(
            "Completion: {} prompt / {} completion tokens",
            completion.usage.prompt_tokens, completion.usage.completion_tokens
        );
        if completion.finish_reason == FinishReason::Length {
            warn!("Completion truncated at {} tokens", self.max_tokens);
        }

        completion
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ProviderError::Empty)
    }
}
