//! Batch processing command for multiple documents.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use intake_core::{ExtractionResult, Pipeline, RawPage, RoutingDecision};

use super::process::{decision_label, format_text, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern (each file is one single-page document)
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Document type hint applied to every file
    #[arg(short, long)]
    type_hint: Option<String>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,
}

/// Result of processing a single file.
struct BatchResult {
    path: PathBuf,
    result: Option<ExtractionResult>,
    error: Option<String>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = super::load_config(config_path)?;
    let pipeline = Pipeline::from_config(config);

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "png" | "jpg" | "jpeg")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    // One failed document never aborts the batch.
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let document_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string();

        let outcome = match fs::read(&path) {
            Ok(bytes) => {
                let pages = [RawPage::new(0, bytes)];
                pipeline
                    .process(&document_id, &pages, args.type_hint.as_deref())
                    .await
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(result) => results.push(BatchResult {
                path,
                result: Some(result),
                error: None,
            }),
            Err(message) => {
                warn!("Failed to process {}: {}", path.display(), message);
                results.push(BatchResult {
                    path,
                    result: None,
                    error: Some(message),
                });
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    // Write per-file outputs
    if let Some(ref output_dir) = args.output_dir {
        for batch_result in results.iter().filter(|r| r.result.is_some()) {
            let Some(result) = &batch_result.result else {
                continue;
            };
            let stem = batch_result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document");
            let (extension, content) = match args.format {
                OutputFormat::Json => ("json", serde_json::to_string_pretty(result)?),
                OutputFormat::Text => ("txt", format_text(result)),
            };
            let output_path = output_dir.join(format!("{}.{}", stem, extension));
            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));
        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    // Print summary
    let approved = results
        .iter()
        .filter_map(|r| r.result.as_ref())
        .filter(|r| r.decision == RoutingDecision::AutoApproved)
        .count();
    let review = results
        .iter()
        .filter_map(|r| r.result.as_ref())
        .filter(|r| r.decision == RoutingDecision::PendingReview)
        .count();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} auto-approved, {} pending review, {} failed",
        style(approved).green(),
        style(review).yellow(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn write_summary(path: &PathBuf, results: &[BatchResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "document_type",
        "decision",
        "confidence",
        "missing_critical",
        "warnings",
        "error",
    ])?;

    for batch_result in results {
        let filename = batch_result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        if let Some(result) = &batch_result.result {
            wtr.write_record([
                filename,
                "ok",
                result.document_type.as_str(),
                decision_label(result.decision),
                &format!("{:.4}", result.document_confidence),
                &result.missing_critical.join(";"),
                &result.warnings.len().to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                "",
                batch_result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
