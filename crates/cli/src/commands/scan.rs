//! Tiered vulnerability scan of a single contract source.

use anyhow::Result;
use clap::Args;
use colored::*;
use std::fmt::Write;

use blockarmor_analysis::{AnalysisOutcome, VulnerabilityScanResponse};

use super::common::{
    analysis_failure, build_client, cancel_on_ctrl_c, read_source, write_output, AnalysisArgs,
    OutputFormat,
};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Contract source file, or `-` for stdin
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Analysis depth: free, pro or enterprise
    #[arg(short, long)]
    pub tier: Option<String>,

    #[command(flatten)]
    pub common: AnalysisArgs,
}

pub async fn execute(args: ScanArgs) -> Result<()> {
    let source = read_source(&args.input)?;
    let client = build_client(&args.common)?;
    let cancel = cancel_on_ctrl_c();

    let outcome = client
        .scan_vulnerabilities_with_cancel(source, args.tier.clone(), &cancel)
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

fn score_label(score: u8) -> ColoredString {
    let text = format!("{}/100", score);
    match score {
        80..=100 => text.green().bold(),
        50..=79 => text.yellow().bold(),
        _ => text.red().bold(),
    }
}

fn generate_text_output(outcome: &AnalysisOutcome<VulnerabilityScanResponse>) -> Result<String> {
    let response = &outcome.response;
    let mut output = String::new();

    writeln!(&mut output, "\n{}", "════════════════════════════════════════".bright_blue())?;
    writeln!(&mut output, "{}", "     VULNERABILITY SCAN REPORT".bright_blue().bold())?;
    writeln!(&mut output, "{}", "════════════════════════════════════════".bright_blue())?;

    writeln!(
        &mut output,
        "\nTier: {}   Model: {}   Security score: {}",
        response.tier_applied.as_str().to_uppercase().bright_white().bold(),
        outcome.metadata.model,
        score_label(response.security_score)
    )?;

    if response.is_clean() {
        writeln!(&mut output, "\n{}", "No vulnerabilities found.".green())?;
    } else {
        writeln!(
            &mut output,
            "\n{} {} ({})",
            "▶".bright_white(),
            "Vulnerabilities".red().bold(),
            response.vulnerabilities.len()
        )?;
        writeln!(&mut output, "{}", "─".repeat(40).bright_black())?;
        for vulnerability in &response.vulnerabilities {
            writeln!(&mut output, "  {} {}", "•".bright_white(), vulnerability)?;
        }
    }

    if !response.suggested_fixes.is_empty() {
        writeln!(
            &mut output,
            "\n{} {} ({})",
            "▶".bright_white(),
            "Suggested fixes".cyan().bold(),
            response.suggested_fixes.len()
        )?;
        writeln!(&mut output, "{}", "─".repeat(40).bright_black())?;
        for fix in &response.suggested_fixes {
            writeln!(&mut output, "  {} {}", "•".bright_white(), fix)?;
        }
    }

    writeln!(
        &mut output,
        "\n{}",
        format!(
            "{} tokens in {:.2}s",
            outcome.metadata.usage.total_tokens,
            outcome.metadata.elapsed_ms as f64 / 1000.0
        )
        .bright_black()
    )?;

    Ok(output)
}

fn generate_markdown_output(
    outcome: &AnalysisOutcome<VulnerabilityScanResponse>,
) -> Result<String> {
    let response = &outcome.response;
    let mut output = String::new();

    writeln!(&mut output, "# Vulnerability Scan Report\n")?;
    writeln!(&mut output, "| | |")?;
    writeln!(&mut output, "|---|---|")?;
    writeln!(&mut output, "| Tier | {} |", response.tier_applied)?;
    writeln!(&mut output, "| Security score | {}/100 |", response.security_score)?;
    writeln!(&mut output, "| Model | {} |", outcome.metadata.model)?;
    writeln!(
        &mut output,
        "| Completed | {} |",
        outcome.metadata.completed_at.to_rfc3339()
    )?;

    writeln!(&mut output, "\n## Vulnerabilities\n")?;
    if response.is_clean() {
        writeln!(&mut output, "_None found._")?;
    }
    for vulnerability in &response.vulnerabilities {
        writeln!(&mut output, "- {}", vulnerability)?;
    }

    writeln!(&mut output, "\n## Suggested Fixes\n")?;
    if response.suggested_fixes.is_empty() {
        writeln!(&mut output, "_None._")?;
    }
    for fix in &response.suggested_fixes {
        writeln!(&mut output, "- {}", fix)?;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockarmor_analysis::{
        core::{AnalysisMetadata, FlowState},
        llm::TokenUsage,
        Tier,
    };

    fn metadata() -> AnalysisMetadata {
        AnalysisMetadata {
            model: "mock-model".to_string(),
            template: "vulnerability_scan_pro".to_string(),
            tier: Tier::Pro,
            usage: TokenUsage::default(),
            elapsed_ms: 1200,
            completed_at: Default::default(),
            flow: vec![FlowState::Built, FlowState::Done],
        }
    }

    fn outcome(vulnerabilities: Vec<&str>) -> AnalysisOutcome<VulnerabilityScanResponse> {
        AnalysisOutcome {
            response: VulnerabilityScanResponse {
                security_score: 45,
                vulnerabilities: vulnerabilities.iter().map(|v| v.to_string()).collect(),
                suggested_fixes: vec!["Use checks-effects-interactions".to_string()],
                tier_applied: Tier::Pro,
            },
            metadata: metadata(),
        }
    }

    #[test]
    fn test_markdown_lists_findings() {
        let report = generate_markdown_output(&outcome(vec!["Reentrancy in withdraw()"])).unwrap();

        assert!(report.contains("| Tier | pro |"));
        assert!(report.contains("| Security score | 45/100 |"));
        assert!(report.contains("- Reentrancy in withdraw()"));
        assert!(report.contains("- Use checks-effects-interactions"));
    }

    #[test]
    fn test_text_output_for_clean_scan() {
        colored::control::set_override(false);
        let report = generate_text_output(&outcome(vec![])).unwrap();

        assert!(report.contains("VULNERABILITY SCAN REPORT"));
        assert!(report.contains("No vulnerabilities found."));
        assert!(report.contains("45/100"));
    }
}
