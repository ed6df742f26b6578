//! Provider adapters for chat completions.
//!
//! Supports OpenAI and Anthropic APIs, selected via explicit
//! configuration or environment variables. Transient failures (rate
//! limits, gateway errors, network issues) are retried with exponential
//! backoff inside the adapter before they surface to callers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LlmError, LlmResult};
use crate::types::{CallOptions, LlmResponse, LlmUsage, Message, MessageRole};

/// Maximum attempts per call, including the first.
const MAX_RETRIES: u32 = 3;

/// The model-call boundary.
///
/// The pipeline only depends on this trait; tests script it with a
/// canned implementation and production binds [`HttpLlmClient`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a conversation and return the assistant's reply.
    async fn call(&self, messages: &[Message], options: &CallOptions) -> LlmResult<LlmResponse>;
}

/// LLM provider type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

/// HTTP adapter implementing [`LlmClient`] against provider APIs.
pub struct HttpLlmClient {
    provider: LlmProvider,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl HttpLlmClient {
    /// Create a new adapter with explicit configuration
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>) -> Self {
        let default_model = match provider {
            LlmProvider::OpenAI => "gpt-5-mini".to_string(),
            LlmProvider::Anthropic => "claude-sonnet-4.5".to_string(),
        };

        Self {
            provider,
            api_key,
            model: model.unwrap_or(default_model),
            client: reqwest::Client::new(),
        }
    }

    /// Create an adapter from environment variables
    ///
    /// Checks in order:
    /// 1. OPENAI_API_KEY
    /// 2. ANTHROPIC_API_KEY
    ///
    /// ATELIER_LLM_MODEL overrides the provider default model.
    pub fn from_env() -> LlmResult<Self> {
        let custom_model = std::env::var("ATELIER_LLM_MODEL").ok();

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::OpenAI, api_key, custom_model));
            }
        }

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::Anthropic, api_key, custom_model));
            }
        }

        Err(LlmError::NotConfigured)
    }

    /// Get the current provider
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Get the current model
    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_for(&self, options: &CallOptions) -> String {
        options.model.clone().unwrap_or_else(|| self.model.clone())
    }

    async fn call_once(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> LlmResult<LlmResponse> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_openai(messages, options).await,
            LlmProvider::Anthropic => self.complete_anthropic(messages, options).await,
        }
    }

    // OpenAI chat completion
    async fn complete_openai(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> LlmResult<LlmResponse> {
        let url = "https://api.openai.com/v1/chat/completions";
        let model = self.model_for(options);

        let openai_messages: Vec<OpenAIMessage> = messages
            .iter()
            .map(|m| OpenAIMessage {
                role: match m.role {
                    MessageRole::System => "system".to_string(),
                    MessageRole::User => "user".to_string(),
                    MessageRole::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        let request = OpenAIRequest {
            model: model.clone(),
            messages: openai_messages,
            max_completion_tokens: Some(options.max_tokens),
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), body));
        }

        let result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let content = result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or(LlmError::EmptyResponse)?;

        let usage = result
            .usage
            .map(|u| LlmUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage,
            model,
        })
    }

    // Anthropic chat completion
    async fn complete_anthropic(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> LlmResult<LlmResponse> {
        let url = "https://api.anthropic.com/v1/messages";
        let model = self.model_for(options);

        // Anthropic requires the system message to be separate
        let system_message = messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.clone());

        let anthropic_messages: Vec<AnthropicMessage> = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| AnthropicMessage {
                role: match m.role {
                    MessageRole::User | MessageRole::System => "user".to_string(),
                    MessageRole::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        let request = AnthropicRequest {
            model: model.clone(),
            max_tokens: options.max_tokens,
            system: system_message,
            messages: anthropic_messages,
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), body));
        }

        let result: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let content = result
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or(LlmError::EmptyResponse)?;

        let usage = result
            .usage
            .map(|u| LlmUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage,
            model,
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn call(&self, messages: &[Message], options: &CallOptions) -> LlmResult<LlmResponse> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_secs(1 << (attempt - 1));
                debug!("Retrying LLM call after {:?} (attempt {})", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match self.call_once(messages, options).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    warn!(
                        "Transient LLM failure (attempt {}/{}): {}",
                        attempt + 1,
                        MAX_RETRIES,
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(LlmError::EmptyResponse))
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}
