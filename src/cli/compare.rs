use super::{ProductOptions, guard, print_skipped_notice, ui};
use crate::core::analytics::{self, PriceComparison};
use crate::core::market::MarketDataProvider;
use crate::core::routing::Route;
use crate::core::session::Session;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Table};

pub fn build_comparison_table(comparison: &PriceComparison, currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Market"),
        ui::header_cell("Region"),
        ui::header_cell("Price"),
        ui::header_cell("Difference"),
        ui::header_cell("Difference %"),
    ]);
    for row in &comparison.rows {
        table.add_row(vec![
            Cell::new(&row.market),
            Cell::new(&row.region),
            ui::price_cell(row.price, currency),
            Cell::new(format!("{:+.2}", row.difference)).set_alignment(CellAlignment::Right),
            ui::change_cell(row.percent_difference),
        ]);
    }
    table
}

pub fn build_regional_table(comparison: &PriceComparison, currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Region"),
        ui::header_cell("Average price"),
        ui::header_cell("Records"),
    ]);
    for aggregate in &comparison.regional_averages {
        table.add_row(vec![
            Cell::new(&aggregate.region),
            Cell::new(format!("{:.0} {}", aggregate.average_price, currency))
                .set_alignment(CellAlignment::Right),
            Cell::new(aggregate.sample_count).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub async fn run(
    market: &dyn MarketDataProvider,
    session: &Session,
    options: &ProductOptions,
) -> Result<()> {
    guard(Route::PriceComparison, session)?;
    let data = options.load(market).await?;
    let records = data.filtered();

    println!(
        "\n{}",
        ui::style_text(
            &format!("Price comparison: {}", options.product),
            ui::StyleType::Title
        )
    );
    print_skipped_notice(data.skipped);
    let Some(first) = records.first() else {
        println!("No prices recorded for this product.");
        return Ok(());
    };
    let currency = first.currency.clone();

    let comparison = analytics::compare_prices(records);
    println!(
        "{} {}",
        ui::style_text("Average price:", ui::StyleType::Label),
        ui::style_text(
            &ui::format_price(comparison.average_price, &currency),
            ui::StyleType::Value
        )
    );
    println!("{}", build_comparison_table(&comparison, &currency));
    println!("\n{}", ui::style_text("Regional averages", ui::StyleType::Label));
    println!("{}", build_regional_table(&comparison, &currency));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::{StaticMarketData, sample_records, session};
    use crate::core::filter::tests::record;
    use crate::core::session::Role;

    #[test]
    fn test_tables_show_differences() {
        let records = vec![
            record("1", ("p1", "Rice"), "Central", ("r1", "North"), 400.0),
            record("2", ("p1", "Rice"), "Harbour", ("r2", "South"), 600.0),
        ];
        let comparison = analytics::compare_prices(&records);

        let mut table = build_comparison_table(&comparison, "XOF");
        table.force_no_tty();
        let rendered = table.to_string();
        assert!(rendered.contains("-100.00"));
        assert!(rendered.contains("+20.00%"));

        let mut regional = build_regional_table(&comparison, "XOF");
        regional.force_no_tty();
        assert!(regional.to_string().contains("600 XOF"));
    }

    #[tokio::test]
    async fn test_run_sends_product_query() {
        let market = StaticMarketData::new(sample_records());
        run(&market, &session(Role::Agent), &ProductOptions::new("Rice"))
            .await
            .unwrap();

        let query = market.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(query.product_ids, vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_product_fails() {
        let market = StaticMarketData::new(sample_records());
        let result = run(&market, &session(Role::Agent), &ProductOptions::new("Millet")).await;
        assert!(result.is_err());
    }
}
