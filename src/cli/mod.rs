//! Terminal front end: one module per command plus shared helpers.
pub mod analysis;
pub mod auth;
pub mod categories;
pub mod compare;
pub mod dashboard;
pub mod export;
pub mod forecast;
pub mod optimal;
pub mod prices;
pub mod setup;
pub mod ui;

use crate::core::filter::{FilterState, RegionSelection};
use crate::core::market::{MarketDataProvider, PriceQuery};
use crate::core::model::{ALL, PriceFeed, PriceRecord, Product, Region};
use crate::core::routing::{self, Navigation, Route};
use crate::core::session::Session;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use tracing::debug;

/// Filters shared by the commands that read the price listing.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct FilterOptions {
    /// Region id or name ("all" for every region)
    #[arg(long)]
    pub region: Option<String>,
    /// Product id or name, repeat for several products
    #[arg(long = "product")]
    pub products: Vec<String>,
    /// Case-insensitive text search over product, market, region, currency and price
    #[arg(long)]
    pub search: Option<String>,
    /// Earliest price date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Latest price date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

impl FilterOptions {
    async fn load(&self, market: &dyn MarketDataProvider) -> Result<MarketData> {
        load_market_data(
            market,
            self.region.as_deref(),
            &self.products,
            self.search.as_deref(),
            (self.from, self.to),
        )
        .await
    }
}

/// Filters plus paging, for the paginated price listing.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListingOptions {
    #[command(flatten)]
    pub filter: FilterOptions,
    /// Page to display, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// Rows per page (5, 10, 25 or 50)
    #[arg(long)]
    pub page_size: Option<usize>,
}

/// Options of the single-product views (comparison and forecast).
#[derive(Debug, Clone, clap::Args)]
pub struct ProductOptions {
    /// Product id or name
    #[arg(long)]
    pub product: String,
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

impl ProductOptions {
    pub fn new(product: &str) -> Self {
        ProductOptions {
            product: product.to_string(),
            region: None,
            from: None,
            to: None,
        }
    }

    async fn load(&self, market: &dyn MarketDataProvider) -> Result<MarketData> {
        load_market_data(
            market,
            self.region.as_deref(),
            std::slice::from_ref(&self.product),
            None,
            (self.from, self.to),
        )
        .await
    }
}

/// Fails unless the session may open `route`.
pub fn guard(route: Route, session: &Session) -> Result<()> {
    match routing::resolve(route, session) {
        Navigation::Render(r) if r == route => Ok(()),
        Navigation::Redirect(Route::Login) | Navigation::Render(_) => {
            bail!("Not logged in, run `agromarket login` first")
        }
        Navigation::Redirect(home) => {
            bail!("{route} is not available for your role, your home is {home}")
        }
    }
}

/// Maps a region id or name to a selection.
pub fn resolve_region(regions: &[Region], input: Option<&str>) -> Result<RegionSelection> {
    let selection = RegionSelection::parse(input.unwrap_or(ALL));
    let RegionSelection::Only(wanted) = selection else {
        return Ok(RegionSelection::All);
    };
    match regions
        .iter()
        .find(|r| r.id == wanted || r.name.eq_ignore_ascii_case(&wanted))
    {
        Some(region) => Ok(RegionSelection::Only(region.id.clone())),
        None => {
            let known: Vec<&str> = regions.iter().map(|r| r.name.as_str()).collect();
            bail!("Unknown region '{}'. Known regions: {}", wanted, known.join(", "))
        }
    }
}

/// Maps product ids or names to product ids. "all" selects everything.
pub fn resolve_products(products: &[Product], inputs: &[String]) -> Result<Vec<String>> {
    if inputs.iter().any(|p| p.eq_ignore_ascii_case(ALL)) {
        return Ok(Vec::new());
    }
    inputs
        .iter()
        .map(|input| {
            products
                .iter()
                .find(|p| p.id == *input || p.name.eq_ignore_ascii_case(input))
                .map(|p| p.id.clone())
                .ok_or_else(|| anyhow::anyhow!("Unknown product '{}'", input))
        })
        .collect()
}

/// Reference lists and the validated price records for one request.
pub struct MarketData {
    pub products: Vec<Product>,
    pub regions: Vec<Region>,
    pub records: Vec<PriceRecord>,
    pub skipped: usize,
    pub filter: FilterState,
}

impl MarketData {
    pub fn filtered(&self) -> Vec<&PriceRecord> {
        self.filter.apply(&self.records)
    }
}

fn needs_resolution(region: Option<&str>, products: &[String]) -> bool {
    let narrows_region = region.is_some_and(|r| RegionSelection::parse(r) != RegionSelection::All);
    let narrows_products =
        !products.is_empty() && !products.iter().any(|p| p.eq_ignore_ascii_case(ALL));
    narrows_region || narrows_products
}

/// Fetches reference data and prices. Without a region or product selection
/// all three are fetched together; otherwise the selection is resolved to
/// ids first so the server can narrow the price listing.
pub async fn load_market_data(
    market: &dyn MarketDataProvider,
    region: Option<&str>,
    products: &[String],
    search: Option<&str>,
    dates: (Option<NaiveDate>, Option<NaiveDate>),
) -> Result<MarketData> {
    let search = search.unwrap_or_default().trim().to_string();
    let pb = ui::new_spinner("Fetching market data...");

    let fetched = if needs_resolution(region, products) {
        resolve_then_fetch(market, region, products, search, dates).await
    } else {
        let query = PriceQuery {
            start_date: dates.0,
            end_date: dates.1,
            ..Default::default()
        };
        futures::try_join!(
            market.fetch_products(),
            market.fetch_regions(),
            market.fetch_prices(&query)
        )
        .map(|(product_list, region_list, feed)| {
            let filter = FilterState {
                search,
                ..Default::default()
            };
            (product_list, region_list, feed, filter, query)
        })
    };
    pb.finish_and_clear();
    let (product_list, region_list, feed, filter, query) = fetched?;

    let skipped = feed.malformed.len();
    let records: Vec<PriceRecord> = feed
        .records
        .into_iter()
        .filter(|r| query.contains_date(r.date))
        .collect();
    debug!(records = records.len(), skipped, "Market data loaded");

    Ok(MarketData {
        products: product_list,
        regions: region_list,
        records,
        skipped,
        filter,
    })
}

type Fetched = (Vec<Product>, Vec<Region>, PriceFeed, FilterState, PriceQuery);

async fn resolve_then_fetch(
    market: &dyn MarketDataProvider,
    region: Option<&str>,
    products: &[String],
    search: String,
    dates: (Option<NaiveDate>, Option<NaiveDate>),
) -> Result<Fetched> {
    let (product_list, region_list) =
        futures::try_join!(market.fetch_products(), market.fetch_regions())?;
    let filter = FilterState {
        region: resolve_region(&region_list, region)?,
        products: resolve_products(&product_list, products)?,
        search,
    };
    let query = PriceQuery::for_filter(&filter, dates.0, dates.1);
    let feed = market.fetch_prices(&query).await?;
    Ok((product_list, region_list, feed, filter, query))
}

pub fn print_skipped_notice(skipped: usize) {
    if skipped > 0 {
        println!(
            "{}",
            ui::style_text(
                &format!("{skipped} malformed price record(s) were skipped"),
                ui::StyleType::Subtle
            )
        );
    }
}
