//! Process command - run the extraction pipeline on a single document.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use intake_core::extract::rules::format_amount;
use intake_core::{ExtractionResult, IntakeError, Pipeline, RawPage, RoutingDecision};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Page images in page order (PNG or JPEG)
    #[arg(required = true)]
    pages: Vec<PathBuf>,

    /// Document type hint (insurance_claim or medical_bill)
    #[arg(short, long)]
    type_hint: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show the document confidence summary
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = super::load_config(config_path)?;
    let pipeline = Pipeline::from_config(config);

    // Read page bytes; an unreadable file aborts before the pipeline runs.
    let mut pages = Vec::with_capacity(args.pages.len());
    for (index, path) in args.pages.iter().enumerate() {
        if !path.exists() {
            anyhow::bail!("Input file not found: {}", path.display());
        }
        let bytes = fs::read(path)?;
        pages.push(RawPage::new(index as u32, bytes));
    }

    let document_id = args
        .pages
        .first()
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string();

    info!(document_id, pages = pages.len(), "processing document");

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message("Running extraction pipeline...");

    let result = pipeline
        .process(&document_id, &pages, args.type_hint.as_deref())
        .await;

    pb.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(IntakeError::TypeResolution(e)) => {
            anyhow::bail!(
                "{}\nPass --type-hint insurance_claim or --type-hint medical_bill to override.",
                e
            );
        }
        Err(e) => return Err(e.into()),
    };

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
        OutputFormat::Text => format_text(&result),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        println!();
        println!(
            "{} Document confidence: {:.1}%",
            style("ℹ").blue(),
            result.document_confidence * 100.0
        );
        println!("{} Decision: {}", style("ℹ").blue(), decision_label(result.decision));
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn decision_label(decision: RoutingDecision) -> &'static str {
    match decision {
        RoutingDecision::AutoApproved => "auto_approved",
        RoutingDecision::PendingReview => "pending_review",
    }
}

pub fn format_text(result: &ExtractionResult) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Document: {} ({})\n",
        result.document_id, result.document_type
    ));
    output.push_str(&format!(
        "Decision: {} (confidence {:.4})\n",
        decision_label(result.decision),
        result.document_confidence
    ));
    output.push('\n');

    output.push_str("Fields:\n");
    for field in &result.fields {
        let candidate = &field.field.candidate;
        let value = candidate
            .value
            .as_ref()
            .map(|v| v.display())
            .unwrap_or_else(|| "-".to_string());
        let flag = if field.field.valid { "" } else { " [invalid]" };
        output.push_str(&format!(
            "  {:<16} {:<24} {:.2}{}\n",
            candidate.name, value, field.score, flag
        ));
    }

    if !result.line_items.is_empty() {
        output.push('\n');
        output.push_str("Line items:\n");
        for item in &result.line_items {
            let candidate = &item.item.candidate;
            output.push_str(&format!(
                "  {:<24} {:<8} {:<10} {:.2}\n",
                candidate.service.as_deref().unwrap_or("-"),
                candidate.code.as_deref().unwrap_or("-"),
                candidate
                    .amount
                    .map(format_amount)
                    .unwrap_or_else(|| "-".to_string()),
                item.score
            ));
        }
    }

    if !result.missing_critical.is_empty() {
        output.push('\n');
        output.push_str(&format!(
            "Missing critical: {}\n",
            result.missing_critical.join(", ")
        ));
    }

    if !result.warnings.is_empty() {
        output.push('\n');
        output.push_str("Warnings:\n");
        for warning in &result.warnings {
            output.push_str(&format!("  - {}\n", warning));
        }
    }

    output
}
