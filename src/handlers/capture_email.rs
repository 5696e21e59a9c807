//! Paywall email capture: one email now, then the follow-up sequence.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::emails::{self, FollowUp};
use crate::error::{Error, Result};
use crate::http::{self, FunctionRequest, FunctionResponse, present};
use crate::services::resend::{self, Email, SentEmail};
use crate::services;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "http::lenient_count")]
    pub scans_used: Option<u64>,
    pub last_item_scanned: Option<String>,
}

/// The follow-up emails with their delivery times, counted from `now`.
pub fn follow_ups(
    config: &Config,
    to: &str,
    first_name: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Email>> {
    FollowUp::SEQUENCE
        .iter()
        .map(|step| {
            let rendered = step.render(first_name, to, &config.app_base_url)?;
            Ok(Email::new(&config.from_email, to, rendered).scheduled(now + step.delay()))
        })
        .collect()
}

async fn send_immediate(
    client: &reqwest::Client,
    config: &Config,
    to: &str,
    first_name: &str,
    last_item: Option<&str>,
) -> Result<SentEmail> {
    let rendered = emails::capture_immediate(first_name, last_item, to, &config.app_base_url)?;
    resend::send(client, config, &Email::new(&config.from_email, to, rendered)).await
}

/// Queue the sequence concurrently. Returns how many were accepted.
async fn schedule(client: &reqwest::Client, config: &Config, to: &str, first_name: &str) -> usize {
    let scheduled = match follow_ups(config, to, first_name, Utc::now()) {
        Ok(scheduled) => scheduled,
        Err(error) => {
            tracing::error!(%error, "could not render follow-up emails");
            return 0;
        }
    };

    let results = join_all(scheduled.iter().map(|email| resend::send(client, config, email))).await;
    results
        .into_iter()
        .zip(&scheduled)
        .filter_map(|(result, email)| match result {
            Ok(_) => Some(()),
            Err(error) => {
                tracing::warn!(%error, subject = %email.subject, "follow-up scheduling failed");
                None
            }
        })
        .count()
}

async fn capture(config: &Config, payload: CaptureRequest) -> Result<Option<String>> {
    let email = present(&payload.email).ok_or_else(|| Error::validation("Email is required"))?;
    let first_name = present(&payload.first_name).unwrap_or("there");
    tracing::info!(email, scans_used = ?payload.scans_used, "capturing email");

    let client = services::client()?;
    let sent = send_immediate(
        &client,
        config,
        email,
        first_name,
        present(&payload.last_item_scanned),
    )
    .await?;

    let accepted = schedule(&client, config, email, first_name).await;
    tracing::info!(email, accepted, total = FollowUp::SEQUENCE.len(), "follow-up sequence queued");

    Ok(sent.id)
}

pub async fn handle(config: &Config, request: FunctionRequest) -> FunctionResponse {
    if let Some(response) = http::guard_post(&request) {
        return response;
    }

    let result = match http::parse_json::<CaptureRequest>(&request) {
        Ok(payload) => capture(config, payload).await,
        Err(error) => Err(error),
    };

    match result {
        Ok(email_id) => http::json_response(
            StatusCode::OK,
            json!({
                "success": true,
                "message": "Email captured and sequence started",
                "emailId": email_id,
            }),
        ),
        Err(error) => {
            if !matches!(error, Error::Validation { .. }) {
                tracing::error!(%error, "email capture failed");
            }
            http::error_response(error.status_code(), error.to_string())
        }
    }
}
