use serde_json::{Value, json};

use crate::config::Config;
use crate::error::Result;
use crate::services::ensure_success;

pub const MODEL: &str = "claude-sonnet-4-20250514";
pub const API_VERSION: &str = "2023-06-01";

/// Send a single-turn prompt and return the raw messages response.
pub async fn complete(
    client: &reqwest::Client,
    config: &Config,
    prompt: &str,
    max_tokens: u32,
) -> Result<Value> {
    let key = Config::require(&config.anthropic_api_key, "ANTHROPIC_API_KEY")?;

    let response = client
        .post(format!("{}/v1/messages", config.endpoints.anthropic))
        .header("x-api-key", key)
        .header("anthropic-version", API_VERSION)
        .json(&json!({
            "model": MODEL,
            "max_tokens": max_tokens,
            "messages": [{ "role": "user", "content": prompt }]
        }))
        .send()
        .await?;

    Ok(ensure_success("anthropic", response).await?.json().await?)
}

/// Text of the first text block in a messages response.
pub fn completion_text(response: &Value) -> Option<&str> {
    response
        .get("content")?
        .as_array()?
        .iter()
        .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))?
        .get("text")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_text_block_is_returned() {
        let response = json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "{\"recommendation\":\"sell\"}"}
            ]
        });
        assert_eq!(
            completion_text(&response),
            Some("{\"recommendation\":\"sell\"}")
        );
    }

    #[test]
    fn responses_without_text_yield_none() {
        assert_eq!(completion_text(&json!({"content": []})), None);
        assert_eq!(completion_text(&json!({})), None);
    }
}
