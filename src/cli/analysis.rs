use super::{guard, load_market_data, print_skipped_notice, ui};
use crate::core::analytics::{self, MarketAnalysis};
use crate::core::market::MarketDataProvider;
use crate::core::model::PriceRecord;
use crate::core::routing::Route;
use crate::core::session::Session;
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::{Cell, CellAlignment, Table};

#[derive(Debug, Clone, Default, clap::Args)]
pub struct AnalysisOptions {
    /// Region id or name ("all" for every region)
    #[arg(long)]
    pub region: Option<String>,
    /// Earliest price date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Latest price date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

fn extreme_row(label: &str, record: Option<&PriceRecord>) -> Vec<Cell> {
    match record {
        Some(r) => vec![
            Cell::new(label),
            Cell::new(&r.product.name),
            Cell::new(format!("{} ({})", r.market.name, r.market.region.name)),
            ui::price_cell(r.price, &r.currency),
        ],
        None => vec![Cell::new(label), Cell::new("-"), Cell::new("-"), Cell::new("-")],
    }
}

pub fn build_extremes_table(analysis: &MarketAnalysis<'_>) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(""),
        ui::header_cell("Product"),
        ui::header_cell("Market"),
        ui::header_cell("Price"),
    ]);
    table.add_row(extreme_row("Most expensive", analysis.most_expensive));
    table.add_row(extreme_row("Least expensive", analysis.least_expensive));
    table
}

pub fn build_counts_table(header: (&str, &str), rows: &[(String, usize)]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell(header.0), ui::header_cell(header.1)]);
    for (name, count) in rows {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(count).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub async fn run(
    market: &dyn MarketDataProvider,
    session: &Session,
    options: &AnalysisOptions,
) -> Result<()> {
    guard(Route::MarketAnalysis, session)?;
    let data = load_market_data(
        market,
        options.region.as_deref(),
        &[],
        None,
        (options.from, options.to),
    )
    .await?;
    let records = data.filtered();
    let analysis = analytics::analyse_market(&records);

    println!("\n{}", ui::style_text("Market analysis", ui::StyleType::Title));
    println!(
        "{}",
        ui::style_text(&data.filter.summary(), ui::StyleType::Subtle)
    );
    print_skipped_notice(data.skipped);
    if records.is_empty() {
        println!("No prices recorded for this selection.");
        return Ok(());
    }

    println!("{}", build_extremes_table(&analysis));

    let top: Vec<(String, usize)> = analysis
        .top_products
        .iter()
        .map(|p| (p.product.clone(), p.count))
        .collect();
    println!("\n{}", ui::style_text("Most quoted products", ui::StyleType::Label));
    println!("{}", build_counts_table(("Product", "Records"), &top));

    let volumes: Vec<(String, usize)> = analysis
        .volume_by_region
        .iter()
        .map(|v| (v.region.clone(), v.volume))
        .collect();
    println!("\n{}", ui::style_text("Volume by region", ui::StyleType::Label));
    println!("{}", build_counts_table(("Region", "Records"), &volumes));
    Ok(())
}
