use super::{ListingOptions, guard, print_skipped_notice, ui};
use crate::core::market::MarketDataProvider;
use crate::core::model::PriceRecord;
use crate::core::pagination::{ListingPage, ListingView, PageSize};
use crate::core::routing::Route;
use crate::core::session::Session;
use anyhow::Result;
use comfy_table::{Cell, Table};

/// One row per record: product, market, region, price, unit, change, date.
pub fn build_price_table(records: &[&PriceRecord]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Product"),
        ui::header_cell("Market"),
        ui::header_cell("Region"),
        ui::header_cell("Price"),
        ui::header_cell("Unit"),
        ui::header_cell("Change"),
        ui::header_cell("Date"),
    ]);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.product.name),
            Cell::new(&record.market.name),
            Cell::new(&record.market.region.name),
            ui::price_cell(record.price, &record.currency),
            Cell::new(&record.unit),
            ui::change_cell(record.change),
            Cell::new(record.date.format("%Y-%m-%d")),
        ]);
    }
    table
}

pub fn page_footer(page: &ListingPage<'_>) -> String {
    format!(
        "Page {} of {} ({} matching records)",
        page.index + 1,
        page.page_count,
        page.total_matches
    )
}

pub async fn run(
    market: &dyn MarketDataProvider,
    session: &Session,
    options: &ListingOptions,
    default_page_size: PageSize,
) -> Result<()> {
    guard(Route::MarketPrices, session)?;
    let page_size = match options.page_size {
        Some(size) => PageSize::new(size)?,
        None => default_page_size,
    };

    let data = options.filter.load(market).await?;

    let mut view = ListingView::new(page_size);
    view.set_filter(data.filter.clone());
    view.go_to_page(options.page.saturating_sub(1));
    let page = view.view(&data.records);

    println!("\n{}", ui::style_text("Market prices", ui::StyleType::Title));
    println!(
        "{}",
        ui::style_text(&view.filter().summary(), ui::StyleType::Subtle)
    );
    print_skipped_notice(data.skipped);

    if page.rows.is_empty() {
        println!("No prices match the current filters.");
        if view.filter().is_active() {
            println!(
                "{}",
                ui::style_text(
                    "Run the command without --region, --product or --search to see every price.",
                    ui::StyleType::Subtle
                )
            );
        }
        return Ok(());
    }

    println!("{}", build_price_table(&page.rows));
    println!("{}", page_footer(&page));
    Ok(())
}
