use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::*;
use std::path::PathBuf;

use blockarmor_analysis::llm::EXAMPLE_CONFIG;

use super::common::{resolve_config, ConfigArgs};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write an example configuration file
    Init {
        #[arg(short, long, default_value = "blockarmor.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the resolved configuration with API keys masked
    Show {
        #[command(flatten)]
        settings: ConfigArgs,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Init { output, force } => {
                if output.exists() && !force {
                    bail!(
                        "{} already exists (use --force to overwrite)",
                        output.display()
                    );
                }
                std::fs::write(&output, EXAMPLE_CONFIG)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                eprintln!(
                    "{} Wrote example configuration to {}",
                    "✓".green(),
                    output.display()
                );
                Ok(())
            }
            ConfigCommand::Show { settings } => {
                let config = resolve_config(&settings)?;
                print!("{}", serde_yaml::to_string(&config.redacted())?);
                Ok(())
            }
        }
    }
}
