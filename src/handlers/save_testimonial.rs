use hyper::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::emails::{self, TestimonialNotice};
use crate::error::Result;
use crate::http::{self, FunctionRequest, FunctionResponse, present};
use crate::services::resend::{self, Email};
use crate::services;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialRequest {
    pub feedback: Option<String>,
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "http::lenient_flag")]
    pub can_feature: Option<bool>,
    #[serde(default, deserialize_with = "http::lenient_number")]
    pub trigger_value: Option<f64>,
    #[serde(default, deserialize_with = "http::lenient_count")]
    pub scan_count: Option<u64>,
    pub submitted_at: Option<String>,
}

async fn forward(config: &Config, payload: &TestimonialRequest, feedback: &str) -> Result<()> {
    let notice = TestimonialNotice {
        feedback,
        first_name: present(&payload.first_name),
        can_feature: payload.can_feature.unwrap_or(false),
        trigger_value: payload.trigger_value,
        scan_count: payload.scan_count,
        submitted_at: present(&payload.submitted_at),
    };
    let rendered = emails::testimonial(&notice)?;
    let client = services::client()?;
    resend::send(&client, config, &Email::new(&config.from_email, &config.admin_email, rendered)).await?;
    Ok(())
}

pub async fn handle(config: &Config, request: FunctionRequest) -> FunctionResponse {
    match *request.method() {
        Method::POST => {}
        Method::OPTIONS => return http::preflight(),
        _ => return http::text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
    }

    let payload: TestimonialRequest = match http::parse_json(&request) {
        Ok(payload) => payload,
        Err(error) => return http::text_response(error.status_code(), error.to_string()),
    };

    let Some(feedback) = present(&payload.feedback) else {
        return http::text_response(StatusCode::BAD_REQUEST, "Feedback required");
    };

    match forward(config, &payload, feedback).await {
        Ok(()) => {
            tracing::info!(can_feature = ?payload.can_feature, "testimonial forwarded");
            http::json_response(StatusCode::OK, json!({ "success": true }))
        }
        Err(error) => {
            tracing::error!(%error, "testimonial forwarding failed");
            http::error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save testimonial")
        }
    }
}
