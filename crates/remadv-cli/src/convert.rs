//! Text extraction from PDF documents via an external converter binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

const CONVERSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Extract text from a PDF document.
///
/// The extractor is invoked as a black box: it either yields a converted
/// text file or the conversion is treated as failed. A scanned PDF comes
/// back as an empty string.
pub async fn extract_text(
    pdf: &Path,
    dst_dir: &Path,
    extractor: &Path,
    options: &str,
) -> anyhow::Result<String> {
    if !pdf.is_file() {
        bail!("pdf file not found: {}", pdf.display());
    }
    if !dst_dir.is_dir() {
        bail!("conversion output folder not found: {}", dst_dir.display());
    }
    if !extractor.is_file() {
        bail!("extractor not found: {}", extractor.display());
    }

    let txt_path = output_path(pdf, dst_dir)?;

    let mut command = Command::new(extractor);
    command.args(options.split_whitespace());
    command.arg(pdf).arg(&txt_path);

    debug!("Running text extractor: {:?}", command);

    let status = timeout(CONVERSION_TIMEOUT, command.status())
        .await
        .context("text extraction timed out")?
        .context("failed to start the text extractor")?;

    if !status.success() {
        bail!(
            "file conversion failed with return code: {}",
            status.code().map_or_else(|| "none".to_string(), |c| c.to_string())
        );
    }

    if !txt_path.is_file() {
        bail!(
            "the conversion returned with no error, however the output file was not found: {}",
            txt_path.display()
        );
    }

    let content = tokio::fs::read_to_string(&txt_path).await?;
    Ok(content.trim_start_matches('\u{feff}').to_string())
}

fn output_path(pdf: &Path, dst_dir: &Path) -> anyhow::Result<PathBuf> {
    let stem = pdf
        .file_stem()
        .context("pdf path has no file name")?
        .to_string_lossy();
    Ok(dst_dir.join(format!("{stem}.txt")))
}
