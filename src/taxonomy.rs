//! File-level taxonomy commands: reading the source document, parsing it
//! off the async runtime, `nace validate`, and `nace split`.

use anyhow::{Context, Result};
use nace_core::{ClassificationRecord, ValidationReport};
use std::path::{Path, PathBuf};

use crate::config::Config;

pub fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read taxonomy document: {}", path.display()))
}

/// Parse on a blocking worker; the parser is synchronous and CPU-bound.
pub async fn parse_document(text: String) -> Result<Vec<ClassificationRecord>> {
    let records = tokio::task::spawn_blocking(move || nace_core::parse(&text))
        .await
        .context("taxonomy parser task failed")?;
    Ok(records)
}

/// `nace validate [--file PATH]`
///
/// Prints the report and returns whether the document validated.
pub async fn run_validate(config: &Config, file: Option<PathBuf>) -> Result<bool> {
    let path = file.unwrap_or_else(|| config.taxonomy.document.clone());
    let text = read_document(&path)?;
    let records = parse_document(text).await?;

    let report = ValidationReport::from_records(&records);
    println!("validate {}", path.display());
    print!("{}", report);

    if report.is_valid() {
        println!("ok");
    } else {
        tracing::warn!(
            total = report.total,
            expected = nace_core::validate::EXPECTED_CLASSES,
            "taxonomy did not validate"
        );
    }
    Ok(report.is_valid())
}

/// `nace split [--out DIR]`
pub async fn run_split(config: &Config, out: Option<PathBuf>) -> Result<()> {
    let out_dir = out.unwrap_or_else(|| config.taxonomy.sections_dir.clone());
    let text = read_document(&config.taxonomy.document)?;
    let written = write_segments(&text, &out_dir)?;

    for path in &written {
        println!("  wrote {}", path.display());
    }
    println!("split: {} sections into {}", written.len(), out_dir.display());
    Ok(())
}

/// Segment `text` and write one file per section into `out_dir`.
pub fn write_segments(text: &str, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut written = Vec::new();
    for segment in nace_core::segment(text) {
        let path = out_dir.join(segment.file_name());
        std::fs::write(&path, &segment.content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
