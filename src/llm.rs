//! Language-model client abstraction.
//!
//! All generation goes through the [`ChatModel`] trait so the pipeline can be
//! tested without network access. The OpenAI implementation configures a
//! request timeout and retries transient failures with backoff.

use crate::error::{ReplikkError, Result};
use crate::retry::{with_backoff, BackoffPolicy};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default timeout for OpenAI API requests (2 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Create an OpenAI client with configured timeout.
pub fn create_client() -> Client<OpenAIConfig> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    Client::with_config(OpenAIConfig::default()).with_http_client(http_client)
}

/// Trait for chat-completion providers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a single system+user exchange and return the assistant text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// OpenAI-backed chat model.
pub struct OpenAiChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    policy: BackoffPolicy,
}

impl OpenAiChatModel {
    /// Create a chat model with the given model name.
    ///
    /// Grounded generation wants determinism, so the default temperature is
    /// low rather than the chat-friendly 0.7.
    pub fn new(model: &str) -> Self {
        Self::with_config(model, 0.1, BackoffPolicy::default())
    }

    pub fn with_config(model: &str, temperature: f32, policy: BackoffPolicy) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            temperature,
            policy,
        }
    }

    fn build_messages(system: &str, user: &str) -> Result<Vec<ChatCompletionRequestMessage>> {
        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| ReplikkError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user.to_string())
                .build()
                .map_err(|e| ReplikkError::Generation(e.to_string()))?
                .into(),
        ])
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    #[instrument(skip(self, system, user))]
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let messages = Self::build_messages(system, user)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| ReplikkError::Generation(e.to_string()))?;

        let response = with_backoff(&self.policy, "chat completion", || {
            let request = request.clone();
            async move { self.client.chat().create(request).await }
        })
        .await
        .map_err(|e| ReplikkError::OpenAI(format!("Chat completion error: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| ReplikkError::Generation("Empty response from LLM".to_string()))?
            .clone();

        debug!("Chat completion returned {} chars", content.len());
        Ok(content)
    }
}
