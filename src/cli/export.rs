use super::prices::build_price_table;
use super::{FilterOptions, guard, print_skipped_notice, ui};
use crate::core::export::{self, ExportFormat, ReportMeta};
use crate::core::market::MarketDataProvider;
use crate::core::routing::Route;
use crate::core::session::Session;
use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, clap::Args)]
pub struct ExportOptions {
    #[command(flatten)]
    pub filter: FilterOptions,
    /// Output format: csv or report
    #[arg(long, default_value = "csv")]
    pub format: ExportFormat,
    /// Destination file, defaults to a dated file name in the export directory
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Explicit output path, else the dated default name inside `export_dir`
/// (or the working directory).
pub fn output_path(options: &ExportOptions, export_dir: Option<&Path>) -> PathBuf {
    if let Some(output) = &options.output {
        return output.clone();
    }
    let file_name = options.format.default_file_name(Local::now().date_naive());
    match export_dir {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Exports every record matching the filters, ignoring pagination.
pub async fn run(
    market: &dyn MarketDataProvider,
    session: &Session,
    options: &ExportOptions,
    export_dir: Option<&Path>,
    report_title: &str,
) -> Result<()> {
    guard(Route::MarketPrices, session)?;
    let data = options.filter.load(market).await?;
    print_skipped_notice(data.skipped);

    let records = data.filtered();
    let path = output_path(options, export_dir);
    let written = match options.format {
        ExportFormat::Csv => export::export_csv(&path, &records),
        ExportFormat::Report => {
            let mut table = build_price_table(&records);
            table.force_no_tty();
            let meta = ReportMeta {
                title: report_title.to_string(),
                generated_at: Local::now(),
                filter_summary: data.filter.summary(),
                record_count: records.len(),
            };
            export::export_report(&path, &meta, &table.to_string())
        }
    };
    written.with_context(|| {
        format!(
            "Failed to export {} to {}",
            options.format,
            path.display()
        )
    })?;

    info!(path = %path.display(), records = records.len(), "Export complete");
    println!(
        "Exported {} record(s) to {}",
        records.len(),
        ui::style_text(&path.display().to_string(), ui::StyleType::Value)
    );
    Ok(())
}
