use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::core::tier::Tier;

const REDACTED: &str = "***";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMConfig {
    pub provider: ProviderConfig,

    #[serde(default)]
    pub global: GlobalSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    #[serde(rename = "openai")]
    OpenAI {
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        api_key: Option<String>, // Falls back to OPENAI_API_KEY
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>, // For OpenAI-compatible endpoints
    },
    #[serde(rename = "gemini")]
    Gemini {
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        api_key: Option<String>, // Falls back to GEMINI_API_KEY
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    #[serde(rename = "mock")]
    Mock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAI,
    Gemini,
    Mock,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mock => "mock",
        };
        f.write_str(name)
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            other => bail!("unknown provider '{}' (expected openai, gemini or mock)", other),
        }
    }
}

impl ProviderConfig {
    pub fn default_for(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenAI => ProviderConfig::OpenAI {
                model: "gpt-4o".to_string(),
                api_key: None,
                base_url: None,
            },
            ProviderKind::Gemini => ProviderConfig::Gemini {
                model: "gemini-1.5-flash".to_string(),
                api_key: None,
                base_url: None,
            },
            ProviderKind::Mock => ProviderConfig::Mock { reply: None },
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::OpenAI { .. } => ProviderKind::OpenAI,
            ProviderConfig::Gemini { .. } => ProviderKind::Gemini,
            ProviderConfig::Mock { .. } => ProviderKind::Mock,
        }
    }

    /// The mock has no model to set; the call is ignored for it.
    pub fn set_model(&mut self, new_model: impl Into<String>) {
        match self {
            ProviderConfig::OpenAI { model, .. } | ProviderConfig::Gemini { model, .. } => {
                *model = new_model.into();
            }
            ProviderConfig::Mock { .. } => {}
        }
    }

    pub fn set_api_key(&mut self, key: impl Into<String>) {
        match self {
            ProviderConfig::OpenAI { api_key, .. } | ProviderConfig::Gemini { api_key, .. } => {
                *api_key = Some(key.into());
            }
            ProviderConfig::Mock { .. } => {}
        }
    }

    pub fn set_base_url(&mut self, url: impl Into<String>) {
        match self {
            ProviderConfig::OpenAI { base_url, .. } | ProviderConfig::Gemini { base_url, .. } => {
                *base_url = Some(url.into());
            }
            ProviderConfig::Mock { .. } => {}
        }
    }

    /// Switches backend, keeping the model name only when the kind is unchanged.
    pub fn switch_to(&mut self, kind: ProviderKind) {
        if self.kind() != kind {
            *self = Self::default_for(kind);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// No deadline is applied when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Highest tier callers of this deployment are entitled to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tier: Option<Tier>,

    #[serde(default)]
    pub dump_prompt: bool,
}

fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4000
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: None,
            max_tier: None,
            dump_prompt: false,
        }
    }
}

impl GlobalSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default_for(ProviderKind::OpenAI),
            global: GlobalSettings::default(),
        }
    }
}

impl LLMConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML config {}", path.display()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON config {}", path.display()))
    }

    /// Loads JSON for `.json` files and YAML for anything else.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_yaml_file(path),
        }
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Applies `BLOCKARMOR_*` overrides read through `lookup`.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(provider) = lookup("BLOCKARMOR_PROVIDER") {
            self.provider.switch_to(provider.parse()?);
        }

        if let Some(model) = lookup("BLOCKARMOR_MODEL") {
            self.provider.set_model(model);
        }

        if let Some(base_url) = lookup("BLOCKARMOR_API_BASE") {
            self.provider.set_base_url(base_url);
        }

        if let Some(temp) = lookup("BLOCKARMOR_TEMPERATURE") {
            self.global.temperature = temp
                .trim()
                .parse()
                .with_context(|| format!("invalid BLOCKARMOR_TEMPERATURE '{}'", temp))?;
        }

        if let Some(tokens) = lookup("BLOCKARMOR_MAX_TOKENS") {
            self.global.max_tokens = tokens
                .trim()
                .parse()
                .with_context(|| format!("invalid BLOCKARMOR_MAX_TOKENS '{}'", tokens))?;
        }

        if let Some(secs) = lookup("BLOCKARMOR_TIMEOUT_SECS") {
            self.global.timeout_seconds = Some(
                secs.trim()
                    .parse()
                    .with_context(|| format!("invalid BLOCKARMOR_TIMEOUT_SECS '{}'", secs))?,
            );
        }

        if let Some(tier) = lookup("BLOCKARMOR_MAX_TIER") {
            self.global.max_tier = Some(
                tier.parse()
                    .with_context(|| format!("invalid BLOCKARMOR_MAX_TIER '{}'", tier))?,
            );
        }

        Ok(())
    }

    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Copy safe to print: API keys are masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        match &mut config.provider {
            ProviderConfig::OpenAI { api_key, .. } | ProviderConfig::Gemini { api_key, .. } => {
                if api_key.is_some() {
                    *api_key = Some(REDACTED.to_string());
                }
            }
            ProviderConfig::Mock { .. } => {}
        }
        config
    }
}

pub const EXAMPLE_CONFIG: &str = r#"# BlockArmor analysis configuration

provider:
  type: openai
  model: gpt-4o
  # api_key: sk-...  # Optional, defaults to OPENAI_API_KEY env var
  # base_url: http://localhost:8000/v1  # Any OpenAI-compatible endpoint

# provider:
#   type: gemini
#   model: gemini-1.5-flash
#   # api_key: ...  # Optional, defaults to GEMINI_API_KEY env var

global:
  temperature: 0.2
  max_tokens: 4000
  # timeout_seconds: 60  # No deadline unless set
  # max_tier: pro        # Highest tier this deployment may run
  dump_prompt: false
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = LLMConfig::default();
        assert!(matches!(config.provider, ProviderConfig::OpenAI { .. }));
        assert_eq!(config.global.temperature, 0.2);
        assert_eq!(config.global.max_tokens, 4000);
        assert_eq!(config.global.timeout(), None);
        assert_eq!(config.global.max_tier, None);
    }

    #[test]
    fn test_example_config_parses() {
        let config: LLMConfig = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.provider.kind(), ProviderKind::OpenAI);
        assert!(!config.global.dump_prompt);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = LLMConfig::default();
        config.global.max_tier = Some(Tier::Pro);
        config.global.timeout_seconds = Some(30);

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: LLMConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LLMConfig::default();
        config
            .apply_env_with(lookup(&[
                ("BLOCKARMOR_PROVIDER", "gemini"),
                ("BLOCKARMOR_MODEL", "gemini-1.5-pro"),
                ("BLOCKARMOR_TIMEOUT_SECS", "45"),
                ("BLOCKARMOR_MAX_TIER", "Pro"),
            ]))
            .unwrap();

        assert_eq!(
            config.provider,
            ProviderConfig::Gemini {
                model: "gemini-1.5-pro".to_string(),
                api_key: None,
                base_url: None,
            }
        );
        assert_eq!(config.global.timeout(), Some(Duration::from_secs(45)));
        assert_eq!(config.global.max_tier, Some(Tier::Pro));
    }

    #[test]
    fn test_invalid_env_value_is_an_error() {
        let mut config = LLMConfig::default();
        assert!(config
            .apply_env_with(lookup(&[("BLOCKARMOR_MAX_TIER", "platinum")]))
            .is_err());
        assert!(config
            .apply_env_with(lookup(&[("BLOCKARMOR_PROVIDER", "anthropic")]))
            .is_err());
    }

    #[test]
    fn test_redacted_masks_keys() {
        let mut config = LLMConfig::default();
        config.provider.set_api_key("sk-secret");

        let shown = serde_yaml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains(REDACTED));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LLMConfig::default();
        config.provider = ProviderConfig::Mock { reply: None };

        let json_path = dir.path().join("blockarmor.json");
        config.save_json(&json_path).unwrap();
        assert_eq!(LLMConfig::from_file(&json_path).unwrap(), config);

        let yaml_path = dir.path().join("blockarmor.yaml");
        config.save_yaml(&yaml_path).unwrap();
        assert_eq!(LLMConfig::from_file(&yaml_path).unwrap(), config);
    }
}
