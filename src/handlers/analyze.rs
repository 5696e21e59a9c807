//! Sell-or-donate verdict for a described item.
//!
//! Recent eBay sold listings are folded into the prompt when the search
//! finds usable prices; otherwise the model is asked to estimate from its own
//! knowledge.

use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::completion;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::{self, FunctionRequest, FunctionResponse, present};
use crate::market::{self, MarketSnapshot};
use crate::services::{self, anthropic, scan_log, serpapi};

const MAX_TOKENS: u32 = 1500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub item_description: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub original_price: Option<Value>,
    pub urgency: Option<String>,
    pub brand: Option<String>,
    pub defects: Option<String>,
    pub additional_info: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Sell,
    Donate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Easy,
    Medium,
    Hard,
}

/// The JSON object the prompt asks the model to answer with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAnalysis {
    pub recommendation: Recommendation,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub market_data: String,
    #[serde(default)]
    pub estimated_sale_price: f64,
    #[serde(default)]
    pub platform_fees: f64,
    #[serde(default)]
    pub shipping_cost: f64,
    #[serde(default)]
    pub net_profit: f64,
    #[serde(default)]
    pub tax_deduction: f64,
    pub effort_score: Option<Effort>,
    #[serde(default)]
    pub effort_reason: String,
}

fn original_price_text(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::Number(number)) => Some(format!("${number}")),
        Some(Value::String(text)) if !text.trim().is_empty() => Some(format!("${}", text.trim())),
        _ => None,
    }
}

pub fn search_query(request: &AnalyzeRequest, description: &str) -> String {
    match present(&request.brand) {
        Some(brand) => format!("{brand} {description}"),
        None => description.to_string(),
    }
}

pub fn build_prompt(request: &AnalyzeRequest, description: &str, market_summary: Option<&str>) -> String {
    let or = |value: &Option<String>, fallback: &'static str| {
        present(value).unwrap_or(fallback).to_string()
    };

    let market = match market_summary {
        Some(summary) => format!("REAL EBAY MARKET DATA:\n{summary}"),
        None => "No recent eBay sold data available - estimate based on your knowledge.".to_string(),
    };

    format!(
        r#"You are an expert at evaluating items for resale on eBay and other marketplaces. Analyze this item and provide a recommendation.

ITEM DETAILS:
- Description: {description}
- Category: {category}
- Condition: {condition}
- Original Price Paid: {original_price}
- Time to Sell: {urgency}
- Brand: {brand}
- Defects: {defects}
- Additional Info: {additional_info}

{market}

INSTRUCTIONS:
1. Based on the market data (if available) and your knowledge, estimate a realistic selling price
2. Calculate eBay fees (13% + $0.30 payment processing)
3. Estimate shipping cost based on typical item size/weight
4. Calculate net profit after fees and shipping
5. Determine if selling is worth the effort (consider time to list, ship, handle questions)
6. Rate the effort level: "easy" (quick ship, standard item), "medium" (some effort), or "hard" (fragile, complex, low demand)

RESPOND WITH ONLY THIS JSON FORMAT (no other text):
{{
  "recommendation": "sell" or "donate",
  "reason": "Brief explanation of your recommendation",
  "marketData": "Summary of market findings or estimate basis",
  "estimatedSalePrice": 00.00,
  "platformFees": 00.00,
  "shippingCost": 00.00,
  "netProfit": 00.00,
  "taxDeduction": 00.00,
  "effortScore": "easy" or "medium" or "hard",
  "effortReason": "Why this effort level"
}}

RULES:
- If net profit < $10 after fees/shipping, recommend "donate"
- If item is very hard to ship or low demand, lean toward "donate"
- Tax deduction should be ~30% of fair market value for donations
- Be realistic about shipping costs (USPS, UPS, or FedEx rates)
- Consider the seller's time (listing, photos, packing, shipping, customer service)"#,
        category = or(&request.category, "Not specified"),
        condition = or(&request.condition, "Not specified"),
        original_price = original_price_text(&request.original_price).unwrap_or_else(|| "Unknown".to_string()),
        urgency = or(&request.urgency, "Flexible"),
        brand = or(&request.brand, "Not specified"),
        defects = or(&request.defects, "None mentioned"),
        additional_info = or(&request.additional_info, "None"),
    )
}

fn with_extras(mut response: Value, analysis: Option<ItemAnalysis>, snapshot: &MarketSnapshot) -> Result<Value> {
    if let Value::Object(map) = &mut response {
        if let Some(analysis) = analysis {
            map.insert("analysis".to_string(), serde_json::to_value(analysis)?);
        }
        if snapshot.has_prices() {
            map.insert("market".to_string(), serde_json::to_value(snapshot)?);
        }
    }
    Ok(response)
}

async fn analyze(config: &Config, request: AnalyzeRequest) -> Result<Value> {
    let description = present(&request.item_description)
        .ok_or_else(|| Error::validation("itemDescription is required"))?
        .to_string();
    tracing::info!(item = %description, "analyzing item");

    let client = services::client()?;

    let search = serpapi::search_sold(&client, config, &search_query(&request, &description)).await;
    let snapshot = market::summarize(search.listings());

    let prompt = build_prompt(&request, &description, snapshot.summary.as_deref());
    let response = anthropic::complete(&client, config, &prompt, MAX_TOKENS).await?;
    tracing::info!("analysis complete");

    scan_log::spawn(
        client.clone(),
        config.scan_log_url.clone(),
        scan_log::ScanLogEntry {
            item: description.clone(),
            category: present(&request.category).unwrap_or("Not specified").to_string(),
            condition: present(&request.condition).unwrap_or("Not specified").to_string(),
            user_type: "unknown".to_string(),
        },
    );

    let analysis = anthropic::completion_text(&response).and_then(|text| {
        completion::parse::<ItemAnalysis>(text)
            .map_err(|error| tracing::warn!(%error, "completion was not valid analysis JSON"))
            .ok()
    });

    with_extras(response, analysis, &snapshot)
}

pub async fn handle(config: &Config, request: FunctionRequest) -> FunctionResponse {
    if let Some(response) = http::guard_post(&request) {
        return response;
    }

    let result = match http::parse_json::<AnalyzeRequest>(&request) {
        Ok(payload) => analyze(config, payload).await,
        Err(error) => Err(error),
    };

    match result {
        Ok(body) => http::json_response(StatusCode::OK, body),
        Err(Error::Upstream { message, .. }) => http::json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": message, "type": "anthropic_error" }),
        ),
        Err(error @ Error::Validation { .. }) => {
            http::error_response(error.status_code(), error.to_string())
        }
        Err(error) => {
            tracing::error!(%error, "analyze failed");
            http::json_response(
                error.status_code(),
                json!({ "error": error.to_string(), "type": "function_error" }),
            )
        }
    }
}
