use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::emails::RenderedEmail;
use crate::error::Result;
use crate::services::ensure_success;

#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
}

impl Email {
    pub fn new(from: &str, to: &str, rendered: RenderedEmail) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: rendered.subject,
            html: rendered.html,
            scheduled_at: None,
        }
    }

    /// Deliver at `when` instead of immediately.
    pub fn scheduled(mut self, when: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(when.to_rfc3339_opts(SecondsFormat::Millis, true));
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SentEmail {
    pub id: Option<String>,
}

pub async fn send(client: &reqwest::Client, config: &Config, email: &Email) -> Result<SentEmail> {
    let key = Config::require(&config.resend_api_key, "RESEND_API_KEY")?;

    let response = client
        .post(format!("{}/emails", config.endpoints.resend))
        .bearer_auth(key)
        .json(email)
        .send()
        .await?;

    let sent: SentEmail = ensure_success("resend", response).await?.json().await?;
    tracing::info!(to = %email.to, id = ?sent.id, scheduled = email.scheduled_at.is_some(), "email accepted");
    Ok(sent)
}
