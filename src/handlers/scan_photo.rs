use hyper::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::completion;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::{self, FunctionRequest, FunctionResponse, present};
use crate::services::{self, openai};

const FAILURE_MESSAGE: &str = "Failed to analyze image. Please try again.";
const DEFAULT_MIME_TYPE: &str = "image/jpeg";

pub const VALUATION_PROMPT: &str = r#"You are an expert resale value estimator. Analyze this image of an item and provide:

1. **Item Identification**: What is this item? Be specific (brand, model, type if visible)
2. **Condition Assessment**: Rate as Excellent, Good, Fair, or Poor based on visible condition
3. **Estimated Resale Value**: Your best estimate in USD
4. **Value Range**: Low to high realistic range
5. **Best Selling Platforms**: Top 2-3 platforms for this specific item
6. **Quick Tips**: 1-2 sentences on how to maximize value

Respond in this exact JSON format:
{
  "itemName": "Specific item name",
  "condition": "Good",
  "estimatedValue": 45,
  "valueRange": { "low": 30, "high": 60 },
  "bestPlatforms": ["eBay", "Facebook Marketplace"],
  "tips": "Clean thoroughly before listing. Include original packaging if available.",
  "confidence": "high"
}

Confidence levels:
- "high": Clear image, recognizable item, strong market data
- "medium": Decent image but some uncertainty
- "low": Unclear image or very niche item

If you cannot identify the item, respond with:
{
  "error": "Could not identify item. Please try a clearer photo.",
  "suggestion": "Try taking the photo in better lighting or from a different angle."
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanPhotoRequest {
    image: Option<String>,
    mime_type: Option<String>,
}

/// What the model made of the photo.
///
/// Both branches carry the model's object untouched. The valuation fields are
/// whatever the model wrote (`"estimatedValue": "45"`, `"confidence": "High"`)
/// and are the client's to read.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoVerdict {
    Identified(Value),
    /// The model answered with an `error` field.
    Unidentified(Value),
}

fn reports_error(reply: &Value) -> bool {
    match reply.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(message)) => !message.is_empty(),
        Some(_) => true,
    }
}

pub fn interpret(content: &str) -> Result<PhotoVerdict> {
    let reply: Value = completion::parse(content)?;
    if !reply.is_object() {
        return Err(Error::Upstream {
            service: "openai",
            status: 200,
            message: "valuation was not a JSON object".to_string(),
        });
    }
    if reports_error(&reply) {
        return Ok(PhotoVerdict::Unidentified(reply));
    }
    Ok(PhotoVerdict::Identified(reply))
}

async fn scan(config: &Config, image: &str, mime_type: &str) -> Result<PhotoVerdict> {
    let client = services::client()?;
    let content = openai::describe_image(&client, config, VALUATION_PROMPT, image, mime_type).await?;
    interpret(&content)
}

pub async fn handle(config: &Config, request: FunctionRequest) -> FunctionResponse {
    if let Some(response) = http::guard_post(&request) {
        return response;
    }

    let payload: ScanPhotoRequest = match http::parse_json(&request) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::warn!(%error, "rejected photo scan body");
            return http::error_response(StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE);
        }
    };

    let Some(image) = present(&payload.image) else {
        return http::error_response(StatusCode::BAD_REQUEST, "No image provided");
    };
    let mime_type = present(&payload.mime_type).unwrap_or(DEFAULT_MIME_TYPE);

    match scan(config, image, mime_type).await {
        Ok(PhotoVerdict::Identified(valuation)) => {
            tracing::info!(
                item = valuation.get("itemName").and_then(serde_json::Value::as_str).unwrap_or("unnamed"),
                value = %valuation.get("estimatedValue").unwrap_or(&serde_json::Value::Null),
                "photo valued"
            );
            http::json_response(StatusCode::OK, valuation)
        }
        Ok(PhotoVerdict::Unidentified(reply)) => {
            tracing::info!("item in photo could not be identified");
            http::json_response(StatusCode::UNPROCESSABLE_ENTITY, reply)
        }
        Err(error) => failure(error),
    }
}

fn failure(error: Error) -> FunctionResponse {
    tracing::error!(%error, "photo scan failed");
    http::error_response(StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE)
}
