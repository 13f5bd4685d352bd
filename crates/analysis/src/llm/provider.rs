use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionResponseFormat,
        ChatCompletionResponseFormatType, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::error::{AnalysisError, ServiceResponseError, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LLMError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Model declined: {0}")]
    Declined(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl From<LLMError> for AnalysisError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::ApiError(message) => TransportError::Api(message).into(),
            LLMError::Status { status, message } => {
                TransportError::Status { status, message }.into()
            }
            LLMError::InvalidResponse(message) => TransportError::MalformedEnvelope(message).into(),
            LLMError::RateLimitExceeded => TransportError::RateLimited.into(),
            LLMError::NetworkError(message) => TransportError::Network(message).into(),
            LLMError::Timeout(after) => TransportError::Timeout(after).into(),
            LLMError::Declined(reason) => ServiceResponseError::Declined(reason).into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LLMRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub expect_json: bool,
    pub dump_prompt: bool,
}

#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A text-generation backend that answers one prompt with one reply.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn analyze(&self, request: LLMRequest) -> Result<LLMResponse, LLMError>;

    fn model_name(&self) -> &str;

    /// Context window of the model, in tokens.
    fn max_tokens(&self) -> usize;

    fn estimate_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }
}

pub(crate) fn dump_prompt(model: &str, request: &LLMRequest) {
    eprintln!("\n{} COMPLETE PROMPT DUMP {}", "=".repeat(25), "=".repeat(25));
    eprintln!("Model: {}", model);
    eprintln!("Temperature: {}", request.temperature);
    eprintln!("Max Tokens: {}", request.max_tokens);
    eprintln!("\n{} SYSTEM PROMPT {}", "=".repeat(20), "=".repeat(20));
    eprintln!("{}", request.system_prompt);
    eprintln!("\n{} USER PROMPT {}", "=".repeat(22), "=".repeat(22));
    eprintln!("{}", request.user_prompt);
    eprintln!("{}", "=".repeat(70));
    eprintln!();
}

pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIProvider {
    pub fn with_config(api_key: String, model: String, base_url: Option<String>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = base_url {
            config = config.with_api_base(base_url);
        }

        // One request per call: the SDK would otherwise retry rate-limited
        // and server-error replies on its own.
        let single_attempt = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        let client = Client::with_config(config).with_backoff(single_attempt);

        Self { client, model }
    }

    fn is_reasoning_model(&self) -> bool {
        self.model.starts_with("o1") || self.model.starts_with("o3")
    }

    fn classify_error(err: OpenAIError) -> LLMError {
        match err {
            OpenAIError::Reqwest(e) => LLMError::NetworkError(e.to_string()),
            OpenAIError::ApiError(api) => {
                if api.message.to_lowercase().contains("rate limit") {
                    LLMError::RateLimitExceeded
                } else {
                    LLMError::ApiError(api.message)
                }
            }
            OpenAIError::JSONDeserialize(e) => LLMError::InvalidResponse(e.to_string()),
            other => LLMError::ApiError(other.to_string()),
        }
    }

    fn build_messages(
        &self,
        request: &LLMRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, LLMError> {
        let to_api_error = |e: OpenAIError| LLMError::ApiError(e.to_string());

        if self.is_reasoning_model() {
            let combined_prompt = format!(
                "Instructions:\n{}\n\nTask:\n{}",
                request.system_prompt, request.user_prompt
            );

            let user_message = ChatCompletionRequestUserMessageArgs::default()
                .content(combined_prompt)
                .build()
                .map_err(to_api_error)?;

            return Ok(vec![user_message.into()]);
        }

        let system_message = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_prompt.clone())
            .build()
            .map_err(to_api_error)?;

        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user_prompt.clone())
            .build()
            .map_err(to_api_error)?;

        Ok(vec![system_message.into(), user_message.into()])
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn analyze(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        let is_reasoning_model = self.is_reasoning_model();

        debug!("Sending request to OpenAI model: {}", self.model);
        debug!(
            "Temperature: {}, Max tokens: {}, Reasoning model: {}",
            request.temperature, request.max_tokens, is_reasoning_model
        );

        if request.dump_prompt {
            dump_prompt(&self.model, &request);
        }

        let messages = self.build_messages(&request)?;

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder.model(&self.model).messages(messages);

        if is_reasoning_model {
            debug!("Using reasoning model configuration (no temperature, no JSON format)");
        } else {
            let max_tokens = u16::try_from(request.max_tokens).unwrap_or(u16::MAX);
            request_builder
                .temperature(request.temperature)
                .max_tokens(max_tokens);

            if request.expect_json {
                request_builder.response_format(ChatCompletionResponseFormat {
                    r#type: ChatCompletionResponseFormatType::JsonObject,
                });
            }
        }

        let api_request = request_builder
            .build()
            .map_err(|e| LLMError::ApiError(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| {
                warn!("OpenAI API error: {}", e);
                Self::classify_error(e)
            })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LLMError::Declined("no content in response".to_string()))?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        debug!("Received response with {} tokens", usage.total_tokens);

        Ok(LLMResponse {
            content,
            model: response.model,
            usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> usize {
        if self.is_reasoning_model() {
            return 200000;
        }

        match self.model.as_str() {
            "gpt-4o" | "gpt-4o-mini" | "gpt-4-turbo" => 128000,
            "gpt-4" => 8192,
            "gpt-3.5-turbo" => 16385,
            _ => 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(model: &str) -> OpenAIProvider {
        OpenAIProvider::with_config("test_key".to_string(), model.to_string(), None)
    }

    #[test]
    fn test_token_estimation() {
        let provider = provider("gpt-4o");

        let text = "This is a test string for token estimation.";
        let estimated = provider.estimate_tokens(text);

        assert!(estimated > 0);
        assert!(estimated < text.len());
    }

    #[test]
    fn test_context_windows() {
        assert_eq!(provider("gpt-4o").max_tokens(), 128000);
        assert_eq!(provider("o1-mini").max_tokens(), 200000);
        assert_eq!(provider("some-local-model").max_tokens(), 4096);
    }

    #[test]
    fn test_llm_error_classification() {
        let timeout: AnalysisError = LLMError::Timeout(Duration::from_secs(3)).into();
        assert!(matches!(
            timeout,
            AnalysisError::Transport(TransportError::Timeout(_))
        ));

        let status: AnalysisError = LLMError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }
        .into();
        assert!(matches!(status, AnalysisError::Transport(_)));

        let declined: AnalysisError = LLMError::Declined("safety".to_string()).into();
        assert!(matches!(
            declined,
            AnalysisError::ServiceResponse(ServiceResponseError::Declined(_))
        ));
    }
}
