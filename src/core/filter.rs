//! Region, product and free-text filtering of price records.
//!
//! Filtering is a pure function of the records and the [`FilterState`]: the
//! output keeps the input order and every active criterion must pass.
use crate::core::model::{ALL, PriceRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RegionSelection {
    #[default]
    All,
    Only(String),
}

impl RegionSelection {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(ALL) {
            RegionSelection::All
        } else {
            RegionSelection::Only(value.to_string())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub region: RegionSelection,
    /// Selected product ids. Empty, or containing [`ALL`], selects every product.
    pub products: Vec<String>,
    pub search: String,
}

impl FilterState {
    pub fn matches(&self, record: &PriceRecord) -> bool {
        self.matches_region(record) && self.matches_product(record) && self.matches_search(record)
    }

    fn matches_region(&self, record: &PriceRecord) -> bool {
        match &self.region {
            RegionSelection::All => true,
            RegionSelection::Only(id) => record.market.region.id == *id,
        }
    }

    fn matches_product(&self, record: &PriceRecord) -> bool {
        self.products.is_empty()
            || self.products.iter().any(|p| p == ALL)
            || self.products.contains(&record.product.id)
    }

    fn matches_search(&self, record: &PriceRecord) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        [
            record.product.name.as_str(),
            record.market.name.as_str(),
            record.market.region.name.as_str(),
            record.currency.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
            || record.price.to_string().contains(&needle)
    }

    /// Returns the matching records in input order.
    pub fn apply<'a, I>(&self, records: I) -> Vec<&'a PriceRecord>
    where
        I: IntoIterator<Item = &'a PriceRecord>,
    {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }

    pub fn is_active(&self) -> bool {
        self.region != RegionSelection::All
            || !(self.products.is_empty() || self.products.iter().any(|p| p == ALL))
            || !self.search.is_empty()
    }

    /// Human readable description of the active criteria, used in report headers.
    pub fn summary(&self) -> String {
        if !self.is_active() {
            return "No filters".to_string();
        }
        let mut parts = Vec::new();
        if let RegionSelection::Only(id) = &self.region {
            parts.push(format!("region={id}"));
        }
        if !self.products.is_empty() && !self.products.iter().any(|p| p == ALL) {
            parts.push(format!("products={}", self.products.join(",")));
        }
        if !self.search.is_empty() {
            parts.push(format!("search=\"{}\"", self.search));
        }
        parts.join(", ")
    }
}
