//! Contract type identification and testing suggestions.

use anyhow::Result;
use clap::Args;
use colored::*;
use std::fmt::Write;

use blockarmor_analysis::{AnalysisOutcome, ContractTypeTestResponse};

use super::common::{
    analysis_failure, build_client, cancel_on_ctrl_c, read_source, write_output, AnalysisArgs,
    OutputFormat,
};

#[derive(Args, Debug)]
pub struct TestPlanArgs {
    /// Contract source file, or `-` for stdin
    #[arg(value_name = "INPUT")]
    pub input: String,

    #[command(flatten)]
    pub common: AnalysisArgs,
}

pub async fn execute(args: TestPlanArgs) -> Result<()> {
    let source = read_source(&args.input)?;
    let client = build_client(&args.common)?;
    let cancel = cancel_on_ctrl_c();

    let outcome = client
        .suggest_tests_with_cancel(source, &cancel)
        .await
        .map_err(analysis_failure)?;

    if args.common.output.is_some() {
        colored::control::set_override(false);
    }

    let report = match args.common.format {
        OutputFormat::Text => generate_text_output(&outcome)?,
        OutputFormat::Json => serde_json::to_string_pretty(&outcome)?,
        OutputFormat::Markdown => generate_markdown_output(&outcome)?,
    };

    write_output(args.common.output.as_deref(), &report)
}

fn language(response: &ContractTypeTestResponse) -> &str {
    response.identified_language.as_deref().unwrap_or("Unknown")
}

fn generate_text_output(outcome: &AnalysisOutcome<ContractTypeTestResponse>) -> Result<String> {
    let response = &outcome.response;
    let mut output = String::new();

    writeln!(&mut output, "\n{}", "════════════════════════════════════════".bright_blue())?;
    writeln!(&mut output, "{}", "     CONTRACT TEST PLAN".bright_blue().bold())?;
    writeln!(&mut output, "{}", "════════════════════════════════════════".bright_blue())?;

    writeln!(
        &mut output,
        "\nLanguage: {}",
        language(response).bright_white().bold()
    )?;
    writeln!(&mut output, "\n{}", "Overview".cyan().bold())?;
    writeln!(&mut output, "  {}", response.contract_overview)?;

    writeln!(
        &mut output,
        "\n{} {} ({})",
        "▶".bright_white(),
        "Suggested testing areas".cyan().bold(),
        response.suggested_testing_areas.len()
    )?;
    writeln!(&mut output, "{}", "─".repeat(40).bright_black())?;
    for area in &response.suggested_testing_areas {
        writeln!(&mut output, "  {} {}", "•".bright_white(), area)?;
    }

    if let Some(notes) = &response.general_notes {
        writeln!(&mut output, "\n{}", "Notes".cyan().bold())?;
        writeln!(&mut output, "  {}", notes.bright_black())?;
    }

    Ok(output)
}

fn generate_markdown_output(
    outcome: &AnalysisOutcome<ContractTypeTestResponse>,
) -> Result<String> {
    let response = &outcome.response;
    let mut output = String::new();

    writeln!(&mut output, "# Contract Test Plan\n")?;
    writeln!(&mut output, "**Language:** {}\n", language(response))?;
    writeln!(&mut output, "## Overview\n")?;
    writeln!(&mut output, "{}", response.contract_overview)?;

    writeln!(&mut output, "\n## Suggested Testing Areas\n")?;
    for area in &response.suggested_testing_areas {
        writeln!(&mut output, "- {}", area)?;
    }

    if let Some(notes) = &response.general_notes {
        writeln!(&mut output, "\n## Notes\n")?;
        writeln!(&mut output, "{}", notes)?;
    }

    writeln!(
        &mut output,
        "\n_Generated by {} at {}_",
        outcome.metadata.model,
        outcome.metadata.completed_at.to_rfc3339()
    )?;

    Ok(output)
}
