use serde_json::{Value, json};

use crate::config::Config;
use crate::error::Result;
use crate::services::ensure_success;

async fn subscribe(
    client: &reqwest::Client,
    config: &Config,
    path: String,
    mut body: Value,
) -> Result<()> {
    let key = Config::require(&config.convertkit_api_key, "CONVERTKIT_API_KEY")?;
    body["api_key"] = Value::String(key.to_string());

    let response = client
        .post(format!("{}{}", config.endpoints.convertkit, path))
        .json(&body)
        .send()
        .await?;

    ensure_success("convertkit", response).await?;
    Ok(())
}

pub async fn subscribe_to_tag(
    client: &reqwest::Client,
    config: &Config,
    email: &str,
    tag_id: &str,
    fields: Value,
) -> Result<()> {
    subscribe(
        client,
        config,
        format!("/v3/tags/{tag_id}/subscribe"),
        json!({ "email": email, "fields": fields }),
    )
    .await?;
    tracing::info!(tag_id, "subscriber tagged");
    Ok(())
}

pub async fn subscribe_to_sequence(
    client: &reqwest::Client,
    config: &Config,
    email: &str,
    sequence_id: &str,
) -> Result<()> {
    subscribe(
        client,
        config,
        format!("/v3/sequences/{sequence_id}/subscribe"),
        json!({ "email": email }),
    )
    .await?;
    tracing::info!(sequence_id, "subscriber added to sequence");
    Ok(())
}
