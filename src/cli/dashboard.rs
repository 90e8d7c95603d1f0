use super::optimal::build_optimal_table;
use super::prices::build_price_table;
use super::{load_market_data, print_skipped_notice, ui};
use crate::core::analytics;
use crate::core::market::MarketDataProvider;
use crate::core::model::{DashboardStat, MarketInsight};
use crate::core::routing::{self, Navigation, Route};
use crate::core::session::Session;
use crate::providers::AgroApiClient;
use anyhow::{Result, bail};
use comfy_table::{Cell, Table};

pub fn build_stats_table(stats: &[DashboardStat]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Indicator"),
        ui::header_cell("Value"),
        ui::header_cell("Change"),
    ]);
    for stat in stats {
        let change = match (stat.change, &stat.change_label) {
            (Some(change), _) => ui::change_cell(change),
            (None, Some(label)) => Cell::new(label),
            (None, None) => ui::format_optional_cell(None::<f64>, |c| c.to_string()),
        };
        table.add_row(vec![
            Cell::new(&stat.title),
            Cell::new(stat.display_value()),
            change,
        ]);
    }
    table
}

fn print_insights(insights: &[MarketInsight]) {
    println!("\n{}", ui::style_text("Market insights", ui::StyleType::Label));
    if insights.is_empty() {
        println!("{}", ui::style_text("No insights yet.", ui::StyleType::Subtle));
    }
    for insight in insights {
        println!(
            "- {}: {}",
            ui::style_text(&insight.title, ui::StyleType::Label),
            insight.content
        );
    }
}

async fn admin_home(client: &AgroApiClient) -> Result<()> {
    let pb = ui::new_spinner("Fetching dashboard...");
    let result = futures::try_join!(client.fetch_dashboard_stats(), client.fetch_market_insights());
    pb.finish_and_clear();
    let (stats, insights) = result?;

    println!("\n{}", ui::style_text("Admin dashboard", ui::StyleType::Title));
    println!("{}", build_stats_table(&stats));
    print_insights(&insights);
    Ok(())
}

async fn agent_home(market: &dyn MarketDataProvider) -> Result<()> {
    let data = load_market_data(market, None, &[], None, (None, None)).await?;
    println!("\n{}", ui::style_text("Agent dashboard", ui::StyleType::Title));
    print_skipped_notice(data.skipped);

    println!("\n{}", ui::style_text("Optimal markets", ui::StyleType::Label));
    println!(
        "{}",
        build_optimal_table(&analytics::optimal_markets(&data.records))
    );
    println!("\n{}", ui::style_text("Latest prices", ui::StyleType::Label));
    println!(
        "{}",
        build_price_table(&analytics::latest_prices(&data.records))
    );
    Ok(())
}

/// Shows the home screen of the logged-in user's role.
pub async fn run(
    client: &AgroApiClient,
    market: &dyn MarketDataProvider,
    session: &Session,
) -> Result<()> {
    match routing::resolve(Route::Root, session) {
        Navigation::Redirect(Route::AdminHome) => admin_home(client).await,
        Navigation::Redirect(Route::AgentHome) => agent_home(market).await,
        _ => bail!("Not logged in, run `agromarket login` first"),
    }
}
