//! Serialisation of filtered listings to files.
//!
//! Files are written to a temporary file next to the destination and only
//! moved into place once complete, so a failed export leaves nothing behind.
use crate::core::model::PriceRecord;
use chrono::{DateTime, Datelike, Local, NaiveDate};
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

pub const CSV_HEADERS: [&str; 7] = [
    "Product", "Market", "Region", "Price", "Currency", "Unit", "Date",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: no records match the current filters")]
    NothingToExport,
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to move export into {path}: {message}")]
    Persist { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Report,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Report => "txt",
        }
    }

    pub fn default_file_name(self, date: NaiveDate) -> String {
        format!("market_prices_{}.{}", date.format("%Y-%m-%d"), self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "report" | "txt" => Ok(ExportFormat::Report),
            _ => Err(anyhow::anyhow!("Invalid export format: {}", s)),
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Report => write!(f, "report"),
        }
    }
}

/// Writes a header row and one row per record.
pub fn write_csv<W: Write>(writer: W, records: &[&PriceRecord]) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADERS)?;
    for record in records {
        let price = record.price.to_string();
        let date = record.date.format("%Y-%m-%d").to_string();
        csv_writer.write_record([
            record.product.name.as_str(),
            record.market.name.as_str(),
            record.market.region.name.as_str(),
            price.as_str(),
            record.currency.as_str(),
            record.unit.as_str(),
            date.as_str(),
        ])?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Header and footer details stamped onto a report snapshot.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub title: String,
    pub generated_at: DateTime<Local>,
    pub filter_summary: String,
    pub record_count: usize,
}

pub fn render_report(meta: &ReportMeta, table: &str) -> String {
    let generated = meta.generated_at.format("%Y-%m-%d %H:%M:%S");
    let mut output = String::new();
    output.push_str(&format!("{}\n", meta.title));
    output.push_str(&format!("Generated: {generated}\n"));
    output.push_str(&format!("Filters: {}\n", meta.filter_summary));
    output.push_str(&format!("Records: {}\n\n", meta.record_count));
    output.push_str(table);
    output.push_str("\n\n");
    output.push_str(&format!(
        "© {} AgroMarket. All rights reserved. Generated on {generated}.\n",
        meta.generated_at.year()
    ));
    output
}

fn write_atomically<F>(path: &Path, write: F) -> Result<(), ExportError>
where
    F: FnOnce(&mut tempfile::NamedTempFile) -> Result<(), ExportError>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let io_err = |source: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
    write(&mut tmp)?;
    tmp.as_file_mut().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| ExportError::Persist {
        path: path.to_path_buf(),
        message: e.error.to_string(),
    })?;
    debug!(path = %path.display(), "Export written");
    Ok(())
}

pub fn export_csv(path: &Path, records: &[&PriceRecord]) -> Result<(), ExportError> {
    if records.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    write_atomically(path, |file| write_csv(file, records))
}

pub fn export_report(path: &Path, meta: &ReportMeta, table: &str) -> Result<(), ExportError> {
    if meta.record_count == 0 || table.trim().is_empty() {
        return Err(ExportError::NothingToExport);
    }
    let content = render_report(meta, table);
    write_atomically(path, |file| {
        file.write_all(content.as_bytes())
            .map_err(|source| ExportError::Io {
                path: path.to_path_buf(),
                source,
            })
    })
}
