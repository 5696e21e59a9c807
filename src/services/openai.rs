use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::ensure_success;

pub const VISION_MODEL: &str = "gpt-4o";

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Ask the vision model about a base64-encoded image; returns the reply text.
pub async fn describe_image(
    client: &reqwest::Client,
    config: &Config,
    prompt: &str,
    image_base64: &str,
    mime_type: &str,
) -> Result<String> {
    let key = Config::require(&config.openai_api_key, "OPENAI_API_KEY")?;

    let body = json!({
        "model": VISION_MODEL,
        "max_tokens": 1000,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                {
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:{mime_type};base64,{image_base64}"),
                        "detail": "high"
                    }
                }
            ]
        }]
    });

    let response = client
        .post(format!("{}/v1/chat/completions", config.endpoints.openai))
        .bearer_auth(key)
        .json(&body)
        .send()
        .await?;

    let reply: ChatReply = ensure_success("openai", response).await?.json().await?;
    reply
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::Upstream {
            service: "openai",
            status: 200,
            message: "completion had no content".to_string(),
        })
}
