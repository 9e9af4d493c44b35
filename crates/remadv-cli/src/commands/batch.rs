//! Batch processing command for multiple payment advice files.

use std::fs;
use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;

use crate::commands::process::{OutputFormat, format_csv, process_file};
use crate::rules::load_processing_rules;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    pub input: String,

    /// Customer processing rules file
    #[arg(short, long)]
    pub rules: PathBuf,

    /// Directory containing the accounting map files (default: the rules
    /// file directory)
    #[arg(short, long)]
    pub maps_dir: Option<PathBuf>,

    /// External PDF text extractor executable (required for PDF input)
    #[arg(short, long)]
    pub extractor: Option<PathBuf>,

    /// Output directory for the extracted data files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Continue with the remaining files when one fails
    #[arg(long)]
    pub continue_on_error: bool,
}

pub async fn run(args: BatchArgs) -> anyhow::Result<()> {
    let maps_dir = args
        .maps_dir
        .clone()
        .or_else(|| args.rules.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let profiles = load_processing_rules(&args.rules, &maps_dir)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "pdf" | "txt")
        })
        .collect();

    if files.is_empty() {
        bail!("no matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(output_dir) = &args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut processed = 0usize;
    let mut failed = 0usize;

    for path in &files {
        match process_file(path, args.extractor.as_deref(), &profiles).await {
            Ok(result) => {
                let rendered = match args.format {
                    OutputFormat::Json => serde_json::to_string_pretty(&result)?,
                    OutputFormat::Csv => format_csv(&result)?,
                };

                if let Some(output_dir) = &args.output_dir {
                    let extension = match args.format {
                        OutputFormat::Json => "json",
                        OutputFormat::Csv => "csv",
                    };
                    let stem = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| result.remittance_number.clone());
                    fs::write(output_dir.join(format!("{stem}.{extension}")), &rendered)?;
                } else {
                    pb.suspend(|| println!("{rendered}"));
                }

                processed += 1;
            }
            Err(err) => {
                failed += 1;
                error!("{}: {:#}", path.display(), err);
                if !args.continue_on_error {
                    pb.finish_and_clear();
                    return Err(err);
                }
            }
        }

        pb.inc(1);
    }

    pb.finish_and_clear();

    if processed == 0 {
        bail!("processing failed for all files");
    }

    println!(
        "{} Processed {} of {} files ({} failed)",
        style("✓").green(),
        processed,
        files.len(),
        failed
    );

    Ok(())
}
