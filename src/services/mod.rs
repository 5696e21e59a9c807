//! Thin typed clients for the upstream APIs the functions call.

pub mod anthropic;
pub mod convertkit;
pub mod meta;
pub mod openai;
pub mod resend;
pub mod scan_log;
pub mod serpapi;
pub mod stripe;

use std::time::Duration;

use reqwest::Response;
use serde_json::Value;

use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Best human-readable message in an upstream error body.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    let error = value.get("error");
    error
        .and_then(|e| e.get("message"))
        .or(error)
        .or_else(|| value.get("message"))
        .map(|message| match message {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Pass 2xx responses through; turn anything else into [`Error::Upstream`].
pub(crate) async fn ensure_success(service: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(service, status = status.as_u16(), "upstream request failed");

    Err(Error::Upstream {
        service,
        status: status.as_u16(),
        message: error_message(&body),
    })
}
