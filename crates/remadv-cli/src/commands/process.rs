//! Process command - extract accounting data from a single payment advice.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Args;
use console::style;
use tracing::info;

use remadv_core::advice::{self, ParsedAdvice};

use crate::convert;
use crate::rules::{CustomerProfile, load_processing_rules};

/// Conversion options used while identifying the customer, before the
/// customer-specific options are known.
const IDENTIFICATION_OPTIONS: &str = "-raw -enc UTF-8";

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, or already converted text)
    #[arg(required = true)]
    pub input: PathBuf,

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

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON document with items and metadata
    Json,
    /// CSV rendering of the item table
    Csv,
}

pub async fn run(args: ProcessArgs) -> anyhow::Result<()> {
    let maps_dir = args
        .maps_dir
        .clone()
        .or_else(|| args.rules.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let profiles = load_processing_rules(&args.rules, &maps_dir)?;

    let result = process_file(&args.input, args.extractor.as_deref(), &profiles).await?;

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
        OutputFormat::Csv => format_csv(&result)?,
    };

    if let Some(path) = &args.output {
        fs::write(path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            path.display()
        );
    } else {
        println!("{output}");
    }

    Ok(())
}

/// Convert (when needed), identify the customer and parse one document.
pub(crate) async fn process_file(
    input: &Path,
    extractor: Option<&Path>,
    profiles: &HashMap<String, CustomerProfile>,
) -> anyhow::Result<ParsedAdvice> {
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let text = match extension.as_str() {
        "txt" => fs::read_to_string(input)
            .with_context(|| format!("cannot read {}", input.display()))?
            .trim_start_matches('\u{feff}')
            .to_string(),
        "pdf" => {
            let Some(extractor) = extractor else {
                bail!("--extractor is required for PDF input");
            };
            let work_dir = std::env::temp_dir();
            convert::extract_text(input, &work_dir, extractor, IDENTIFICATION_OPTIONS).await?
        }
        _ => bail!("unsupported file format: {extension:?}"),
    };

    let customer = advice::identify_customer(&text)?;
    info!("Customer identified: {}", customer.tag());

    let profile = profiles
        .get(customer.tag())
        .with_context(|| format!("no processing rules defined for {}", customer.tag()))?;

    // A PDF is converted again once the customer-specific conversion
    // options are known.
    let text = match (&extension[..], extractor, &profile.rules.conversion_options) {
        ("pdf", Some(extractor), Some(options)) if options != IDENTIFICATION_OPTIONS => {
            convert::extract_text(input, &std::env::temp_dir(), extractor, options).await?
        }
        _ => text,
    };

    let result = advice::parse(
        &text,
        &profile.map,
        profile.rules.threshold,
        &profile.rules.layout,
        &profile.rules.date_format,
    )?;

    info!(
        "Extracted {} accounting items from advice {}",
        result.items.len(),
        result.remittance_number
    );

    Ok(result)
}

pub(crate) fn format_csv(advice: &ParsedAdvice) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(advice.items.fields())?;
    for row in advice.items.rows() {
        wtr.write_record(row.iter().map(|cell| cell.to_string()))?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}
