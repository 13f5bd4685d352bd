//! Google Generative Language (`generateContent`) backend.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::provider::{dump_prompt, LLMError, LLMProvider, LLMRequest, LLMResponse, TokenUsage};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Finish reasons that mean the model refused rather than ran out of room.
const DECLINE_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

/// Gemini backend.
///
/// NOTE: Do NOT derive `Debug` on this struct, `api_key` would be exposed.
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    pub fn with_config(api_key: String, model: String, base_url: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn extract_content(
        response: GeminiResponse,
    ) -> Result<(String, TokenUsage, Option<String>), LLMError> {
        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(LLMError::Declined(format!("prompt blocked ({})", reason)));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Declined("no candidates in response".to_string()))?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if DECLINE_FINISH_REASONS.contains(&reason) {
                return Err(LLMError::Declined(format!("generation stopped ({})", reason)));
            }
        }

        let content = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LLMError::Declined("empty candidate".to_string()));
        }

        let usage = response
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok((content, usage, response.model_version))
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn analyze(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        debug!("Sending request to Gemini model: {}", self.model);

        if request.dump_prompt {
            dump_prompt(&self.model, &request);
        }

        let body = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: &request.system_prompt,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: &request.user_prompt,
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: request.expect_json.then_some("application/json"),
            },
        };

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Gemini request failed");
                LLMError::NetworkError(e.to_string())
            })?;

        let status = resp.status().as_u16();

        if status == 429 {
            warn!("Gemini rate limited");
            return Err(LLMError::RateLimitExceeded);
        }

        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorResponse>(&body_text)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(body_text);
            warn!(status, "Gemini returned an error status");
            return Err(LLMError::Status { status, message });
        }

        let api_response: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| LLMError::InvalidResponse(e.to_string()))?;

        let (content, usage, model_version) = Self::extract_content(api_response)?;

        debug!("Received response with {} tokens", usage.total_tokens);

        Ok(LLMResponse {
            content,
            model: model_version.unwrap_or_else(|| self.model.clone()),
            usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> usize {
        if self.model.starts_with("gemini-1.5-pro") {
            2_000_000
        } else if self.model.starts_with("gemini-") {
            1_000_000
        } else {
            32768
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> GeminiResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_extract_joins_parts() {
        let response = parse(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 10,
                "candidatesTokenCount": 5,
                "totalTokenCount": 15
            }
        }));

        let (content, usage, _) = GeminiProvider::extract_content(response).unwrap();
        assert_eq!(content, "{\"a\":1}");
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_blocked_prompt_is_declined() {
        let response = parse(serde_json::json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }));

        let err = GeminiProvider::extract_content(response).unwrap_err();
        assert!(matches!(err, LLMError::Declined(_)));
    }

    #[test]
    fn test_safety_stop_is_declined() {
        let response = parse(serde_json::json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }));

        let err = GeminiProvider::extract_content(response).unwrap_err();
        assert!(matches!(err, LLMError::Declined(_)));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let provider = GeminiProvider::with_config(
            "key".to_string(),
            "gemini-1.5-flash".to_string(),
            Some("http://localhost:8080/".to_string()),
        )
        .unwrap();

        assert_eq!(
            provider.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
