//! Market data abstractions

use crate::core::filter::{FilterState, RegionSelection};
use crate::core::model::{ALL, PriceFeed, Product, Region};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Server-side narrowing of the price listing. The client filters again
/// locally, so an empty query is always correct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceQuery {
    pub product_ids: Vec<String>,
    pub region: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl PriceQuery {
    /// Builds the server query matching a client filter plus a date range.
    pub fn for_filter(
        filter: &FilterState,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Self {
        let product_ids = if filter.products.iter().any(|p| p == ALL) {
            Vec::new()
        } else {
            filter.products.clone()
        };
        let region = match &filter.region {
            RegionSelection::All => None,
            RegionSelection::Only(id) => Some(id.clone()),
        };
        PriceQuery {
            product_ids,
            region,
            start_date,
            end_date,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.query_pairs().is_empty()
    }

    /// Whether `date` falls inside the requested range, bounds inclusive.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.product_ids.is_empty() {
            pairs.push(("products", self.product_ids.join(",")));
        }
        if let Some(region) = &self.region {
            pairs.push(("region", region.clone()));
        }
        if let Some(start) = self.start_date {
            pairs.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }
        pairs
    }
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_products(&self) -> Result<Vec<Product>>;
    async fn fetch_regions(&self) -> Result<Vec<Region>>;
    async fn fetch_prices(&self, query: &PriceQuery) -> Result<PriceFeed>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_from_filter() {
        let filter = FilterState {
            region: RegionSelection::Only("3".to_string()),
            products: vec!["1".to_string(), "2".to_string()],
            search: "ignored".to_string(),
        };
        let start = NaiveDate::from_ymd_opt(2024, 1, 1);
        let query = PriceQuery::for_filter(&filter, start, None);
        assert_eq!(
            query.query_pairs(),
            vec![
                ("products", "1,2".to_string()),
                ("region", "3".to_string()),
                ("start_date", "2024-01-01".to_string()),
            ]
        );
    }

    #[test]
    fn test_sentinels_are_not_sent() {
        let filter = FilterState {
            products: vec![ALL.to_string(), "1".to_string()],
            ..Default::default()
        };
        assert!(PriceQuery::for_filter(&filter, None, None).is_empty());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let query = PriceQuery {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 10),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 20),
            ..Default::default()
        };
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        assert!(query.contains_date(day(10)));
        assert!(query.contains_date(day(20)));
        assert!(!query.contains_date(day(9)));
        assert!(!query.contains_date(day(21)));
        assert!(PriceQuery::default().contains_date(day(1)));
    }
}
