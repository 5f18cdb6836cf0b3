//! Chat-completion client for an OpenAI-compatible provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::domain::{ConversationMessage, ConversationState};
use crate::error::ServiceError;

/// External model completion service: given the ordered message sequence,
/// returns the generated reply turn.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(
        &self,
        request: &ConversationState,
    ) -> Result<ConversationMessage, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ConversationMessage,
}

#[derive(Clone)]
pub struct OpenAiChatClient {
    client: Client,
    config: LlmConfig,
}

impl OpenAiChatClient {
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ModelClient for OpenAiChatClient {
    async fn generate(
        &self,
        request: &ConversationState,
    ) -> Result<ConversationMessage, ServiceError> {
        debug!(
            "Requesting completion with {} messages",
            request.messages.len()
        );

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("chat completion request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Upstream(format!(
                "chat completion error: {status} - {body}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("invalid completion payload: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ServiceError::Upstream("no choices returned".to_string()))
    }
}
