//! Flags, configuration resolution and output handling shared by the analysis commands.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use blockarmor_analysis::{
    llm::{ProviderFactory, ProviderKind},
    AnalysisClient, AnalysisError, LLMConfig,
};

/// Flags that feed configuration resolution.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration file (JSON for .json, YAML otherwise)
    #[arg(long, value_name = "FILE", env = "BLOCKARMOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend to use: openai, gemini or mock
    #[arg(long)]
    pub provider: Option<ProviderKind>,

    #[arg(long)]
    pub model: Option<String>,

    /// Overrides the key in the config file and the provider's key variable
    #[arg(long)]
    pub api_key: Option<String>,

    /// Deadline for the external call, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalysisArgs {
    #[command(flatten)]
    pub settings: ConfigArgs,

    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the complete prompt to stderr before sending it
    #[arg(long)]
    pub dump_prompt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// File config, then `BLOCKARMOR_*` variables, then command-line flags.
pub fn resolve_config(args: &ConfigArgs) -> Result<LLMConfig> {
    let mut config = match &args.config {
        Some(path) => LLMConfig::from_file(path)?,
        None => LLMConfig::default(),
    };

    config.apply_env()?;

    if let Some(kind) = args.provider {
        config.provider.switch_to(kind);
    }
    if let Some(model) = &args.model {
        config.provider.set_model(model.clone());
    }
    if let Some(api_key) = &args.api_key {
        config.provider.set_api_key(api_key.clone());
    }
    if let Some(secs) = args.timeout {
        config.global.timeout_seconds = Some(secs);
    }
    debug!("Using {} provider", config.provider.kind());
    Ok(config)
}

pub fn build_client(args: &AnalysisArgs) -> Result<AnalysisClient> {
    let mut config = resolve_config(&args.settings)?;
    if args.dump_prompt {
        config.global.dump_prompt = true;
    }
    ProviderFactory::create_client(&config)
}

/// Reads contract source from a file, or from stdin when `input` is `-`.
pub fn read_source(input: &str) -> Result<String> {
    if input == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("Failed to read source from stdin")?;
        return Ok(source);
    }

    std::fs::read_to_string(input).with_context(|| format!("Failed to read file: {}", input))
}

pub fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}

/// Token that fires on Ctrl-C. Must be called inside the runtime.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling analysis");
            trigger.cancel();
        }
    });

    token
}

pub fn analysis_failure(err: AnalysisError) -> anyhow::Error {
    anyhow!("{}: {}", err.kind(), err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct AnalysisHarness {
        #[command(flatten)]
        args: AnalysisArgs,
    }

    #[derive(Parser)]
    struct ConfigHarness {
        #[command(flatten)]
        args: ConfigArgs,
    }

    #[test]
    fn test_flags_override_defaults() {
        let harness = AnalysisHarness::parse_from([
            "blockarmor",
            "--provider",
            "mock",
            "--timeout",
            "7",
            "--dump-prompt",
        ]);

        let config = resolve_config(&harness.args.settings).unwrap();
        assert_eq!(config.provider.kind(), ProviderKind::Mock);
        assert_eq!(config.global.timeout_seconds, Some(7));

        let client = build_client(&harness.args).unwrap();
        assert!(client.settings().dump_prompt);
    }

    #[test]
    fn test_config_flags_exclude_output_options() {
        for flag in ["--format", "--output", "--dump-prompt"] {
            let mut argv = vec!["blockarmor", flag];
            if flag != "--dump-prompt" {
                argv.push("json");
            }
            assert!(ConfigHarness::try_parse_from(argv).is_err(), "{} accepted", flag);
        }

        let harness = ConfigHarness::parse_from(["blockarmor", "--model", "gpt-4o-mini"]);
        assert_eq!(harness.args.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
