use super::{guard, ui};
use crate::core::routing::Route;
use crate::core::session::Session;
use crate::providers::AgroApiClient;
use anyhow::Result;

pub async fn run(client: &AgroApiClient, session: &Session) -> Result<()> {
    guard(Route::MarketPrices, session)?;
    let categories = client.fetch_categories().await?;

    println!("\n{}", ui::style_text("Product categories", ui::StyleType::Title));
    if categories.is_empty() {
        println!("No categories defined.");
    }
    for category in &categories {
        println!("- {category}");
    }
    Ok(())
}
