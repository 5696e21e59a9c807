//! Price statistics over a handful of sold listings.
//!
//! Search results are noisy: prices come as numbers, as `"$1,299.00"`, as
//! ranges, or not at all. Unusable prices are dropped rather than failing
//! the valuation, and a snapshot with no usable prices simply carries no
//! statistics so the caller can fall back to a knowledge-based estimate.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const MAX_LISTINGS: usize = 5;
const MAX_EXAMPLE_TITLES: usize = 3;

static LEADING_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:\d+\.?\d*|\.\d+)").ok());

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PriceField {
    Number(f64),
    Text(String),
}

impl PriceField {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_f64().map(PriceField::Number),
            Value::String(text) => Some(PriceField::Text(text.clone())),
            _ => None,
        }
    }

    fn value(&self) -> Option<f64> {
        match self {
            PriceField::Number(value) => Some(*value).filter(|value| value.is_finite() && *value > 0.0),
            PriceField::Text(text) => parse_price(text),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingPrice {
    pub extracted: Option<PriceField>,
    pub raw: Option<String>,
}

impl ListingPrice {
    /// Structured `{extracted, raw}` prices, a bare string, or a bare number.
    /// Other shapes (such as `{from, to}` ranges) carry no price.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self {
                extracted: fields.get("extracted").and_then(PriceField::from_value),
                raw: fields.get("raw").and_then(Value::as_str).map(str::to_string),
            }),
            Value::String(raw) => Some(Self {
                extracted: None,
                raw: Some(raw.clone()),
            }),
            Value::Number(_) => Some(Self {
                extracted: PriceField::from_value(value),
                raw: None,
            }),
            _ => None,
        }
    }
}

/// One search result. Decoding never fails on a well-formed JSON value: a
/// listing with an odd title or price keeps whatever part is readable, so one
/// unusual result cannot discard the rest of the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Listing {
    pub title: String,
    pub price: Option<ListingPrice>,
}

impl<'de> Deserialize<'de> for Listing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|value| Listing::from_value(&value))
    }
}

impl Listing {
    pub fn new(title: impl Into<String>, raw_price: Option<&str>) -> Self {
        Self {
            title: title.into(),
            price: raw_price.map(|raw| ListingPrice {
                extracted: None,
                raw: Some(raw.to_string()),
            }),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        Self {
            title: value
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            price: value.get("price").and_then(ListingPrice::from_value),
        }
    }

    /// The extracted number when it is a usable price, otherwise whatever the
    /// raw text reads as.
    pub fn price_value(&self) -> Option<f64> {
        let price = self.price.as_ref()?;
        price
            .extracted
            .as_ref()
            .and_then(PriceField::value)
            .or_else(|| price.raw.as_deref().and_then(parse_price))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub listings_considered: usize,
    pub prices: Vec<f64>,
    pub stats: Option<PriceStats>,
    pub example_titles: Vec<String>,
    pub summary: Option<String>,
}

impl MarketSnapshot {
    pub fn has_prices(&self) -> bool {
        self.stats.is_some()
    }
}

/// Keep digits and dots, then read the leading decimal number.
///
/// `"$1,299.00"` reads as 1299.0 and `"$20.00 to $30.00"` as 20.003, the
/// same leading-number reading the storefront applies.
pub fn parse_price(text: &str) -> Option<f64> {
    let stripped: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let number = LEADING_NUMBER.as_ref()?.find(&stripped)?.as_str();
    let value = number.parse::<f64>().ok()?;

    (value.is_finite() && value > 0.0).then_some(value)
}

fn price_stats(prices: &[f64]) -> Option<PriceStats> {
    if prices.is_empty() {
        return None;
    }

    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = prices.iter().sum::<f64>() / prices.len() as f64;

    Some(PriceStats {
        count: prices.len(),
        min,
        max,
        mean,
    })
}

fn summary_text(stats: &PriceStats, example_titles: &[String]) -> String {
    format!(
        "Found {} recent eBay sold listings. Price range: ${:.2} - ${:.2}. Average sold price: ${:.2}. Recent sales include: {}",
        stats.count,
        stats.min,
        stats.max,
        stats.mean,
        example_titles.join("; ")
    )
}

pub fn summarize(listings: &[Listing]) -> MarketSnapshot {
    let considered = &listings[..listings.len().min(MAX_LISTINGS)];

    let prices: Vec<f64> = considered
        .iter()
        .filter_map(Listing::price_value)
        .collect();

    // Titles come from the capped list before filtering: a listing without a
    // usable price still says something about the market.
    let example_titles: Vec<String> = considered
        .iter()
        .take(MAX_EXAMPLE_TITLES)
        .map(|listing| listing.title.clone())
        .collect();

    let stats = price_stats(&prices);
    let summary = stats.as_ref().map(|stats| summary_text(stats, &example_titles));

    MarketSnapshot {
        listings_considered: considered.len(),
        prices,
        stats,
        example_titles,
        summary,
    }
}
