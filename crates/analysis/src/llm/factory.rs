use crate::llm::{
    client::{AnalysisClient, ClientSettings},
    config::{LLMConfig, ProviderConfig},
    gemini::GeminiProvider,
    mock_provider::{MockBehavior, MockLLMProvider},
    provider::{LLMProvider, OpenAIProvider},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn LLMProvider>> {
        let provider: Arc<dyn LLMProvider> = match config {
            ProviderConfig::OpenAI {
                model,
                api_key,
                base_url,
            } => {
                let api_key = Self::resolve_key(api_key, "OPENAI_API_KEY")?;
                Arc::new(OpenAIProvider::with_config(
                    api_key,
                    model.clone(),
                    base_url.clone(),
                ))
            }
            ProviderConfig::Gemini {
                model,
                api_key,
                base_url,
            } => {
                let api_key = Self::resolve_key(api_key, "GEMINI_API_KEY")?;
                Arc::new(
                    GeminiProvider::with_config(api_key, model.clone(), base_url.clone())
                        .context("failed to build Gemini HTTP client")?,
                )
            }
            ProviderConfig::Mock { reply } => {
                let behavior = match reply {
                    Some(reply) => MockBehavior::Reply(reply.clone()),
                    None => MockBehavior::Generated,
                };
                Arc::new(MockLLMProvider::with_behavior(behavior))
            }
        };

        debug!(
            "Created {} provider for model {}",
            config.kind(),
            provider.model_name()
        );
        Ok(provider)
    }

    pub fn create_client(config: &LLMConfig) -> Result<AnalysisClient> {
        let provider = Self::create(&config.provider)?;
        Ok(AnalysisClient::new(
            provider,
            ClientSettings::from(&config.global),
        ))
    }

    fn resolve_key(configured: &Option<String>, env_var: &str) -> Result<String> {
        match configured {
            Some(key) if !key.trim().is_empty() => Ok(key.clone()),
            _ => std::env::var(env_var)
                .with_context(|| format!("no API key configured and {} not set", env_var)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_provider() {
        let provider = ProviderFactory::create(&ProviderConfig::Mock { reply: None }).unwrap();
        assert_eq!(provider.model_name(), "mock-model");
    }

    #[test]
    fn test_configured_key_wins() {
        let provider = ProviderFactory::create(&ProviderConfig::Gemini {
            model: "gemini-1.5-pro".to_string(),
            api_key: Some("configured".to_string()),
            base_url: None,
        })
        .unwrap();
        assert_eq!(provider.model_name(), "gemini-1.5-pro");
        assert_eq!(provider.max_tokens(), 2_000_000);
    }

    #[test]
    fn test_blank_key_falls_back_to_env_var() {
        let unset = "BLOCKARMOR_FACTORY_TEST_UNSET_KEY";
        assert!(ProviderFactory::resolve_key(&None, unset).is_err());
        assert!(ProviderFactory::resolve_key(&Some("  ".to_string()), unset).is_err());
        assert_eq!(
            ProviderFactory::resolve_key(&Some("sk-set".to_string()), unset).unwrap(),
            "sk-set"
        );
    }

    #[test]
    fn test_create_client_from_config() {
        let mut config = LLMConfig::default();
        config.provider = ProviderConfig::Mock {
            reply: Some("{}".to_string()),
        };
        config.global.timeout_seconds = Some(5);

        let client = ProviderFactory::create_client(&config).unwrap();
        assert_eq!(client.model_name(), "mock-model");
        assert_eq!(
            client.settings().timeout,
            Some(std::time::Duration::from_secs(5))
        );
    }
}
