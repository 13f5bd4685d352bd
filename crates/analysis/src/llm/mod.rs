//! External analysis service integration
//!
//! Everything between a validated request and a validated reply lives here. The
//! prompt builder turns a request into fixed, tier-specific instructions; a
//! provider sends them to a text-generation backend (OpenAI-compatible, Gemini,
//! or the offline mock); the validator holds the reply against the declared
//! schema. `AnalysisClient` ties these together and enforces the timeout and
//! cancellation rules of a single call.

pub mod client;
pub mod config;
pub mod factory;
pub mod gemini;
pub mod mock_provider;
pub mod prompts;
pub mod provider;
pub mod schemas;
pub mod validator;

pub use client::{AnalysisClient, ClientSettings};
pub use config::{GlobalSettings, LLMConfig, ProviderConfig, ProviderKind, EXAMPLE_CONFIG};
pub use factory::ProviderFactory;
pub use gemini::GeminiProvider;
pub use mock_provider::{MockBehavior, MockLLMProvider};
pub use prompts::{PromptBuilder, PromptTemplate, RenderedPrompt};
pub use provider::{LLMError, LLMProvider, LLMRequest, LLMResponse, OpenAIProvider, TokenUsage};
pub use schemas::{ResponseSchema, ResponseVariant};
pub use validator::ResponseValidator;
