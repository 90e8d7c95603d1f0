//! Derived views over price records: optimal markets, regional averages,
//! forecasts, price comparison and market analysis.
use crate::core::model::PriceRecord;
use rand::Rng;
use std::collections::HashMap;
use std::fmt::Display;
use tracing::debug;

/// Maximum relative perturbation applied by [`forecast`].
pub const FORECAST_SPREAD: f64 = 0.05;

/// Number of entries reported by [`analyse_market`] in `top_products`.
pub const TOP_PRODUCTS: usize = 5;

/// Cheapest observed record for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimalMarketEntry {
    pub product: String,
    pub market: String,
    pub price: f64,
    pub unit: String,
    pub currency: String,
}

impl From<&PriceRecord> for OptimalMarketEntry {
    fn from(record: &PriceRecord) -> Self {
        OptimalMarketEntry {
            product: record.product.name.clone(),
            market: record.market.name.clone(),
            price: record.price,
            unit: record.unit.clone(),
            currency: record.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionAggregate {
    pub region: String,
    pub average_price: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Buy,
    Sell,
}

impl Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recommendation::Buy => write!(f, "Buy"),
            Recommendation::Sell => write!(f, "Sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEntry {
    pub region: String,
    pub average_price: f64,
    pub forecast_price: f64,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastReport {
    pub entries: Vec<ForecastEntry>,
    /// `Sell` only when every region is expected to rise; `None` without data.
    pub overall: Option<Recommendation>,
    /// Mean absolute `change` of the analysed records.
    pub average_variation: Option<f64>,
}

/// Keeps the cheapest record per product name, first seen wins on ties.
/// Entries are returned in order of each product's first occurrence.
pub fn optimal_markets<'a, I>(records: I) -> Vec<OptimalMarketEntry>
where
    I: IntoIterator<Item = &'a PriceRecord>,
{
    let mut entries: Vec<OptimalMarketEntry> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for record in records {
        match index.get(record.product.name.as_str()) {
            Some(&i) => {
                if record.price < entries[i].price {
                    entries[i] = OptimalMarketEntry::from(record);
                }
            }
            None => {
                index.insert(record.product.name.as_str(), entries.len());
                entries.push(OptimalMarketEntry::from(record));
            }
        }
    }
    entries
}

/// Most recent record per product, in order of each product's first
/// occurrence. Equal dates keep the earlier record.
pub fn latest_prices<'a, I>(records: I) -> Vec<&'a PriceRecord>
where
    I: IntoIterator<Item = &'a PriceRecord>,
{
    let mut latest: Vec<&'a PriceRecord> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for record in records {
        match index.get(record.product.id.as_str()) {
            Some(&i) if record.date > latest[i].date => latest[i] = record,
            Some(_) => {}
            None => {
                index.insert(record.product.id.as_str(), latest.len());
                latest.push(record);
            }
        }
    }
    latest
}

/// Groups records by region name (first-seen order) and averages their price.
pub fn regional_averages<'a, I>(records: I) -> Vec<RegionAggregate>
where
    I: IntoIterator<Item = &'a PriceRecord>,
{
    let mut groups: Vec<(String, f64, usize)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for record in records {
        let name = record.market.region.name.as_str();
        match index.get(name) {
            Some(&i) => {
                groups[i].1 += record.price;
                groups[i].2 += 1;
            }
            None => {
                index.insert(name, groups.len());
                groups.push((name.to_string(), record.price, 1));
            }
        }
    }

    groups
        .into_iter()
        .map(|(region, sum, count)| RegionAggregate {
            region,
            average_price: sum / count as f64,
            sample_count: count,
        })
        .collect()
}

/// Mean of the absolute `change` values, `None` for an empty set.
pub fn average_variation<'a, I>(records: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a PriceRecord>,
{
    let (sum, count) = records
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), r| (sum + r.change.abs(), count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Projects each regional average with a random perturbation of up to
/// ±[`FORECAST_SPREAD`]. Not a predictive model: results change on every call.
pub fn forecast<'a, I>(records: I) -> ForecastReport
where
    I: IntoIterator<Item = &'a PriceRecord>,
{
    forecast_with_rng(records, &mut rand::thread_rng())
}

pub fn forecast_with_rng<'a, I, R>(records: I, rng: &mut R) -> ForecastReport
where
    I: IntoIterator<Item = &'a PriceRecord>,
    R: Rng,
{
    let records: Vec<&PriceRecord> = records.into_iter().collect();

    let entries: Vec<ForecastEntry> = regional_averages(records.iter().copied())
        .into_iter()
        .map(|aggregate| {
            let perturbation = rng.gen_range(-FORECAST_SPREAD..FORECAST_SPREAD);
            let forecast_price = aggregate.average_price * (1.0 + perturbation);
            let recommendation = if forecast_price > aggregate.average_price {
                Recommendation::Sell
            } else {
                Recommendation::Buy
            };
            debug!(
                region = %aggregate.region,
                average = aggregate.average_price,
                forecast = forecast_price,
                "Forecast computed"
            );
            ForecastEntry {
                region: aggregate.region,
                average_price: aggregate.average_price,
                forecast_price,
                recommendation,
            }
        })
        .collect();

    let overall = if entries.is_empty() {
        None
    } else if entries
        .iter()
        .all(|e| e.recommendation == Recommendation::Sell)
    {
        Some(Recommendation::Sell)
    } else {
        Some(Recommendation::Buy)
    };

    ForecastReport {
        entries,
        overall,
        average_variation: average_variation(records.iter().copied()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub market: String,
    pub region: String,
    pub price: f64,
    pub difference: f64,
    pub percent_difference: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceComparison {
    pub average_price: f64,
    pub rows: Vec<ComparisonRow>,
    /// Regional averages rounded to whole currency units.
    pub regional_averages: Vec<RegionAggregate>,
}

/// Compares each market's price against the overall average of the set.
pub fn compare_prices<'a, I>(records: I) -> PriceComparison
where
    I: IntoIterator<Item = &'a PriceRecord>,
{
    let records: Vec<&PriceRecord> = records.into_iter().collect();
    let average_price = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.price).sum::<f64>() / records.len() as f64
    };

    let rows = records
        .iter()
        .map(|r| {
            let difference = r.price - average_price;
            let percent_difference = if average_price == 0.0 {
                0.0
            } else {
                difference / average_price * 100.0
            };
            ComparisonRow {
                market: r.market.name.clone(),
                region: r.market.region.name.clone(),
                price: r.price,
                difference,
                percent_difference,
            }
        })
        .collect();

    let regional_averages = regional_averages(records.iter().copied())
        .into_iter()
        .map(|mut aggregate| {
            aggregate.average_price = aggregate.average_price.round();
            aggregate
        })
        .collect();

    PriceComparison {
        average_price,
        rows,
        regional_averages,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCount {
    pub product: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionVolume {
    pub region: String,
    pub volume: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketAnalysis<'a> {
    pub most_expensive: Option<&'a PriceRecord>,
    pub least_expensive: Option<&'a PriceRecord>,
    pub top_products: Vec<ProductCount>,
    pub volume_by_region: Vec<RegionVolume>,
}

fn count_by<'a>(
    records: &[&'a PriceRecord],
    key: impl Fn(&'a PriceRecord) -> &'a str,
) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for record in records {
        let k = key(*record);
        match index.get(k) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(k, counts.len());
                counts.push((k.to_string(), 1));
            }
        }
    }
    counts
}

/// Extremes, most frequently quoted products and record volume per region.
pub fn analyse_market<'a>(records: &[&'a PriceRecord]) -> MarketAnalysis<'a> {
    let most_expensive = records
        .iter()
        .copied()
        .reduce(|best, r| if r.price > best.price { r } else { best });
    let least_expensive = records
        .iter()
        .copied()
        .reduce(|best, r| if r.price < best.price { r } else { best });

    let mut products = count_by(records, |r| r.product.name.as_str());
    // stable: equal counts keep first-seen order
    products.sort_by(|a, b| b.1.cmp(&a.1));
    let top_products = products
        .into_iter()
        .take(TOP_PRODUCTS)
        .map(|(product, count)| ProductCount { product, count })
        .collect();

    let volume_by_region = count_by(records, |r| r.market.region.name.as_str())
        .into_iter()
        .map(|(region, volume)| RegionVolume { region, volume })
        .collect();

    MarketAnalysis {
        most_expensive,
        least_expensive,
        top_products,
        volume_by_region,
    }
}
