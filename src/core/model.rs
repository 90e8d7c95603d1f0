//! Market data records and validation of raw API payloads

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use tracing::warn;

/// Sentinel accepted by region and product selections meaning "no restriction".
pub const ALL: &str = "all";

/// Identifiers arrive either as JSON numbers or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Int(i64),
    Text(String),
}

impl IdValue {
    pub fn into_string(self) -> String {
        match self {
            IdValue::Int(i) => i.to_string(),
            IdValue::Text(s) => s,
        }
    }
}

/// Decimal fields are sometimes serialised as strings ("125.50").
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Number(n) => Some(*n),
            Numeric::Text(s) => s.trim().parse().ok(),
        }
    }
}

pub(crate) fn deserialize_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(IdValue::deserialize(d)?.into_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Market {
    pub id: String,
    pub name: String,
    pub region: Region,
}

/// One observed price at one market on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecord {
    pub id: String,
    pub product: Product,
    pub market: Market,
    pub price: f64,
    pub currency: String,
    pub unit: String,
    /// Signed percentage change reported by the server.
    pub change: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct RawRegion {
    #[serde(default)]
    pub id: Option<IdValue>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawProduct {
    #[serde(default)]
    pub id: Option<IdValue>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawMarket {
    #[serde(default)]
    pub id: Option<IdValue>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<RawRegion>,
}

/// Price record as sent by the server, before validation.
#[derive(Debug, Deserialize)]
pub struct RawPriceRecord {
    #[serde(default)]
    pub id: Option<IdValue>,
    #[serde(default)]
    pub product: Option<RawProduct>,
    #[serde(default)]
    pub market: Option<RawMarket>,
    #[serde(default)]
    pub price: Option<Numeric>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub change: Option<Numeric>,
    #[serde(default)]
    pub date: Option<String>,
}

/// A server record that could not be turned into a [`PriceRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub id: Option<String>,
    pub field: &'static str,
}

impl Display for MalformedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "record {id}: missing or invalid `{}`", self.field),
            None => write!(f, "record without id: missing or invalid `{}`", self.field),
        }
    }
}

pub fn parse_record_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

impl TryFrom<RawPriceRecord> for PriceRecord {
    type Error = MalformedRecord;

    fn try_from(raw: RawPriceRecord) -> Result<Self, Self::Error> {
        let id = raw.id.map(IdValue::into_string);
        let missing = |field: &'static str| MalformedRecord {
            id: id.clone(),
            field,
        };

        let product = raw.product.ok_or_else(|| missing("product"))?;
        let product = Product {
            id: product
                .id
                .map(IdValue::into_string)
                .ok_or_else(|| missing("product.id"))?,
            name: product.name.ok_or_else(|| missing("product.name"))?,
            category: product.category,
        };

        let market = raw.market.ok_or_else(|| missing("market"))?;
        let region = market.region.ok_or_else(|| missing("market.region"))?;
        let market = Market {
            id: market
                .id
                .map(IdValue::into_string)
                .ok_or_else(|| missing("market.id"))?,
            name: market.name.ok_or_else(|| missing("market.name"))?,
            region: Region {
                id: region
                    .id
                    .map(IdValue::into_string)
                    .ok_or_else(|| missing("market.region.id"))?,
                name: region.name.ok_or_else(|| missing("market.region.name"))?,
            },
        };

        let price = raw
            .price
            .as_ref()
            .and_then(Numeric::as_f64)
            .filter(|p| p.is_finite())
            .ok_or_else(|| missing("price"))?;
        let change = match &raw.change {
            None => 0.0,
            Some(c) => c.as_f64().ok_or_else(|| missing("change"))?,
        };
        let date = raw
            .date
            .as_deref()
            .and_then(parse_record_date)
            .ok_or_else(|| missing("date"))?;

        Ok(PriceRecord {
            id: id.clone().ok_or_else(|| missing("id"))?,
            product,
            market,
            price,
            currency: raw.currency.ok_or_else(|| missing("currency"))?,
            unit: raw.unit.ok_or_else(|| missing("unit"))?,
            change,
            date,
        })
    }
}

/// Validated price records together with the ones that were rejected.
#[derive(Debug, Clone, Default)]
pub struct PriceFeed {
    pub records: Vec<PriceRecord>,
    pub malformed: Vec<MalformedRecord>,
}

impl PriceFeed {
    pub fn from_raw(raw: Vec<RawPriceRecord>) -> Self {
        let mut feed = PriceFeed::default();
        for item in raw {
            match PriceRecord::try_from(item) {
                Ok(record) => feed.records.push(record),
                Err(e) => {
                    warn!(%e, "Skipping malformed price record");
                    feed.malformed.push(e);
                }
            }
        }
        feed
    }
}

/// A headline figure from the dashboard statistics endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardStat {
    pub title: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default, alias = "changeLabel")]
    pub change_label: Option<String>,
}

impl DashboardStat {
    pub fn display_value(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketInsight {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    pub content: String,
}
