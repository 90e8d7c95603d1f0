use super::{ProductOptions, guard, print_skipped_notice, ui};
use crate::core::analytics::{self, ForecastReport, Recommendation};
use crate::core::market::MarketDataProvider;
use crate::core::routing::Route;
use crate::core::session::Session;
use anyhow::Result;
use comfy_table::{Cell, Color, Table};

fn recommendation_cell(recommendation: Recommendation) -> Cell {
    let color = match recommendation {
        Recommendation::Buy => Color::Green,
        Recommendation::Sell => Color::Yellow,
    };
    Cell::new(recommendation).fg(color)
}

pub fn build_forecast_table(report: &ForecastReport, currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Region"),
        ui::header_cell("Average price"),
        ui::header_cell("Forecast"),
        ui::header_cell("Recommendation"),
    ]);
    for entry in &report.entries {
        table.add_row(vec![
            Cell::new(&entry.region),
            ui::price_cell(entry.average_price, currency),
            ui::price_cell(entry.forecast_price, currency),
            recommendation_cell(entry.recommendation),
        ]);
    }
    table
}

pub async fn run(
    market: &dyn MarketDataProvider,
    session: &Session,
    options: &ProductOptions,
) -> Result<()> {
    guard(Route::TrendPrediction, session)?;
    let data = options.load(market).await?;
    let records = data.filtered();
    let currency = records
        .first()
        .map(|r| r.currency.clone())
        .unwrap_or_default();
    let report = analytics::forecast(records);

    println!(
        "\n{}",
        ui::style_text(
            &format!("Price forecast: {}", options.product),
            ui::StyleType::Title
        )
    );
    print_skipped_notice(data.skipped);
    let Some(overall) = report.overall else {
        println!("Not enough data to forecast this product.");
        return Ok(());
    };

    println!("{}", build_forecast_table(&report, &currency));
    println!(
        "{} {}",
        ui::style_text("Overall recommendation:", ui::StyleType::Label),
        ui::style_text(&overall.to_string(), ui::StyleType::Value)
    );
    println!(
        "{} {}",
        ui::style_text("Average variation:", ui::StyleType::Label),
        report
            .average_variation
            .map_or("N/A".to_string(), |v| format!("{v:.2}%"))
    );
    println!(
        "{}",
        ui::style_text(
            "Forecasts are indicative only and change between runs.",
            ui::StyleType::Subtle
        )
    );
    Ok(())
}
