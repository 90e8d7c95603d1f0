use super::{FilterOptions, guard, print_skipped_notice, ui};
use crate::core::analytics::{self, OptimalMarketEntry};
use crate::core::market::MarketDataProvider;
use crate::core::routing::Route;
use crate::core::session::Session;
use anyhow::Result;
use comfy_table::{Cell, Table};

pub fn build_optimal_table(entries: &[OptimalMarketEntry]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Product"),
        ui::header_cell("Best market"),
        ui::header_cell("Price"),
        ui::header_cell("Unit"),
    ]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(&entry.product),
            Cell::new(&entry.market),
            ui::price_cell(entry.price, &entry.currency),
            Cell::new(&entry.unit),
        ]);
    }
    table
}

/// Cheapest market per product among the records matching the filters.
pub async fn run(
    market: &dyn MarketDataProvider,
    session: &Session,
    options: &FilterOptions,
) -> Result<()> {
    guard(Route::MarketPrices, session)?;
    let data = options.load(market).await?;

    let entries = analytics::optimal_markets(data.filtered());
    println!("\n{}", ui::style_text("Optimal markets", ui::StyleType::Title));
    print_skipped_notice(data.skipped);
    if entries.is_empty() {
        println!("No prices match the current filters.");
        return Ok(());
    }
    println!("{}", build_optimal_table(&entries));
    Ok(())
}
