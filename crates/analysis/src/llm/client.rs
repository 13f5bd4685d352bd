//! Runs one analysis call end to end.
//!
//! `AnalysisClient` takes caller input through the flow states: the request is
//! built and checked, the prompt rendered, the provider called exactly once,
//! and the reply validated before anything is handed back. It holds no mutable
//! state, so one client can serve any number of concurrent calls.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::GlobalSettings;
use super::prompts::{PromptBuilder, RenderedPrompt};
use super::provider::{LLMError, LLMProvider, LLMRequest, LLMResponse};
use super::schemas::ResponseVariant;
use super::validator::ResponseValidator;
use crate::core::{
    error::{AnalysisError, TransportError},
    flow::{FlowState, FlowTrace},
    request::{AnalysisRequest, RequestBuilder},
    response::{
        AnalysisMetadata, AnalysisOutcome, ContractTypeTestResponse, VulnerabilityScanResponse,
    },
    tier::Tier,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Option<Duration>,
    pub max_tier: Option<Tier>,
    pub dump_prompt: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings::from(&GlobalSettings::default())
    }
}

impl From<&GlobalSettings> for ClientSettings {
    fn from(global: &GlobalSettings) -> Self {
        Self {
            temperature: global.temperature,
            max_tokens: global.max_tokens,
            timeout: global.timeout(),
            max_tier: global.max_tier,
            dump_prompt: global.dump_prompt,
        }
    }
}

pub struct AnalysisClient {
    provider: Arc<dyn LLMProvider>,
    prompts: PromptBuilder,
    settings: ClientSettings,
}

impl AnalysisClient {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: ClientSettings) -> Self {
        Self {
            provider,
            prompts: PromptBuilder::new(),
            settings,
        }
    }

    pub fn with_provider(provider: Arc<dyn LLMProvider>) -> Self {
        Self::new(provider, ClientSettings::default())
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Builds a scan request, applying the configured tier ceiling.
    pub fn build_scan_request(
        &self,
        source_text: impl Into<String>,
        tier_marker: Option<String>,
    ) -> Result<AnalysisRequest, AnalysisError> {
        RequestBuilder::new(source_text)
            .with_optional_tier_marker(tier_marker)
            .with_tier_ceiling(self.settings.max_tier)
            .build()
            .map_err(AnalysisError::from)
    }

    pub fn render<V: ResponseVariant>(&self, request: &AnalysisRequest) -> RenderedPrompt {
        self.prompts.render(V::KIND, request)
    }

    pub async fn scan_vulnerabilities(
        &self,
        source_text: impl Into<String>,
        tier_marker: Option<String>,
    ) -> Result<AnalysisOutcome<VulnerabilityScanResponse>, AnalysisError> {
        self.scan_vulnerabilities_with_cancel(source_text, tier_marker, &CancellationToken::new())
            .await
    }

    pub async fn scan_vulnerabilities_with_cancel(
        &self,
        source_text: impl Into<String>,
        tier_marker: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome<VulnerabilityScanResponse>, AnalysisError> {
        let request = self
            .build_scan_request(source_text, tier_marker)
            .map_err(Self::rejected)?;
        self.run(request, cancel).await
    }

    pub async fn suggest_tests(
        &self,
        source_text: impl Into<String>,
    ) -> Result<AnalysisOutcome<ContractTypeTestResponse>, AnalysisError> {
        self.suggest_tests_with_cancel(source_text, &CancellationToken::new())
            .await
    }

    pub async fn suggest_tests_with_cancel(
        &self,
        source_text: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome<ContractTypeTestResponse>, AnalysisError> {
        let request = RequestBuilder::new(source_text)
            .build()
            .map_err(|e| Self::rejected(e.into()))?;
        self.run(request, cancel).await
    }

    fn rejected(err: AnalysisError) -> AnalysisError {
        warn!(kind = err.kind(), "Request rejected before dispatch: {}", err);
        err
    }

    /// Renders, dispatches and validates one already-built request.
    pub async fn run<V: ResponseVariant>(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome<V>, AnalysisError> {
        let mut flow = FlowTrace::new();

        let rendered = self.render::<V>(&request);
        flow.advance(FlowState::Rendered);
        debug!(
            template = %rendered.template_name,
            "Rendered prompt ({} chars)",
            rendered.user_prompt.len()
        );

        let llm_request = LLMRequest {
            system_prompt: rendered.system_prompt,
            user_prompt: rendered.user_prompt,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            expect_json: true,
            dump_prompt: self.settings.dump_prompt,
        };
        self.check_context_window(&llm_request);

        flow.advance(FlowState::Dispatched);
        let kind = V::KIND;
        info!(
            kind = %kind,
            tier = %request.tier(),
            model = self.provider.model_name(),
            "Dispatching analysis request"
        );

        let start = Instant::now();
        let response = match self.dispatch(llm_request, cancel).await {
            Ok(response) => response,
            Err(err) => {
                flow.advance(FlowState::Failed);
                warn!(kind = err.kind(), "Analysis call failed: {}", err);
                return Err(err);
            }
        };
        let elapsed = start.elapsed();

        info!("Analysis completed in {:?}", elapsed);
        info!(
            "Token usage - Prompt: {}, Completion: {}, Total: {}",
            response.usage.prompt_tokens,
            response.usage.completion_tokens,
            response.usage.total_tokens
        );

        let reply = match ResponseValidator::validate::<V>(&response.content, &request) {
            Ok(reply) => reply,
            Err(err) => {
                flow.advance(FlowState::Failed);
                warn!("Reply rejected: {}", err);
                return Err(err.into());
            }
        };
        flow.advance(FlowState::Validated);
        flow.advance(FlowState::Done);

        Ok(AnalysisOutcome {
            response: reply,
            metadata: AnalysisMetadata {
                model: response.model,
                template: rendered.template_name,
                tier: request.tier(),
                usage: response.usage,
                elapsed_ms: elapsed.as_millis() as u64,
                completed_at: Utc::now(),
                flow: flow.into_states(),
            },
        })
    }

    async fn dispatch(
        &self,
        request: LLMRequest,
        cancel: &CancellationToken,
    ) -> Result<LLMResponse, AnalysisError> {
        let call = self.provider.analyze(request);
        let deadline = self.settings.timeout;

        let bounded = async move {
            match deadline {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(LLMError::Timeout(limit)),
                },
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Analysis call cancelled");
                Err(TransportError::Cancelled.into())
            }
            result = bounded => result.map_err(AnalysisError::from),
        }
    }

    fn check_context_window(&self, request: &LLMRequest) {
        let estimated = self.provider.estimate_tokens(&request.system_prompt)
            + self.provider.estimate_tokens(&request.user_prompt)
            + request.max_tokens as usize;
        let window = self.provider.max_tokens();

        if estimated > window {
            warn!(
                "Estimated {} tokens exceeds the {} token context window of {}",
                estimated,
                window,
                self.provider.model_name()
            );
        }
    }
}
