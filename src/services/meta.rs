use serde::Serialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use urlencoding::encode;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::error_message;

pub const GRAPH_VERSION: &str = "v18.0";

/// SHA-256 of the trimmed, lower-cased address, as the conversion API expects.
pub fn hash_email(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub em: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomData {
    pub currency: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_name: Option<String>,
    pub content_category: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionEvent {
    pub event_name: String,
    pub event_time: i64,
    pub event_id: String,
    pub action_source: &'static str,
    pub event_source_url: String,
    pub user_data: UserData,
    pub custom_data: CustomData,
}

pub async fn send_event(
    client: &reqwest::Client,
    config: &Config,
    event: &ConversionEvent,
) -> Result<Value> {
    let token = Config::require(&config.meta_access_token, "META_ACCESS_TOKEN")?;

    let mut body = json!({ "data": [event] });
    if let Some(code) = &config.meta_test_code {
        body["test_event_code"] = Value::String(code.clone());
    }

    let url = format!(
        "{}/{}/{}/events?access_token={}",
        config.endpoints.meta_graph,
        GRAPH_VERSION,
        config.meta_pixel_id,
        encode(token)
    );

    let response = client.post(url).json(&body).send().await?;
    let status = response.status();
    let text = response.text().await?;
    let reply: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

    if reply.get("error").is_some() || !status.is_success() {
        return Err(Error::Upstream {
            service: "meta",
            status: status.as_u16(),
            message: error_message(&text),
        });
    }

    tracing::info!(event_name = %event.event_name, event_id = %event.event_id, "conversion event sent");
    Ok(reply)
}
