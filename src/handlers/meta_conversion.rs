use chrono::Utc;
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::{self, FunctionRequest, FunctionResponse, present};
use crate::services::meta::{self, ConversionEvent, CustomData, UserData};
use crate::services;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub event_name: Option<String>,
    #[serde(default, deserialize_with = "http::lenient_timestamp")]
    pub event_time: Option<i64>,
    pub event_id: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "http::lenient_number")]
    pub value: Option<f64>,
    pub currency: Option<String>,
    pub content_name: Option<String>,
    pub content_category: Option<String>,
    pub event_source_url: Option<String>,
    pub client_user_agent: Option<String>,
    pub client_ip_address: Option<String>,
    pub fbc: Option<String>,
    pub fbp: Option<String>,
}

/// Connection details the runtime saw, used when the browser sends none.
#[derive(Debug, Clone, Default)]
pub struct ClientHints {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientHints {
    pub fn from_request(request: &FunctionRequest) -> Self {
        let forwarded = http::header(request, "x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        Self {
            ip_address: forwarded
                .or_else(|| http::header(request, "client-ip"))
                .map(str::to_string),
            user_agent: http::header(request, "user-agent").map(str::to_string),
        }
    }
}

fn owned(value: &Option<String>) -> Option<String> {
    present(value).map(str::to_string)
}

pub fn build_event(
    payload: &ConversionRequest,
    hints: ClientHints,
    now: i64,
    app_base_url: &str,
) -> ConversionEvent {
    ConversionEvent {
        event_name: owned(&payload.event_name).unwrap_or_else(|| "Purchase".to_string()),
        event_time: payload.event_time.unwrap_or(now),
        event_id: owned(&payload.event_id).unwrap_or_else(|| Uuid::new_v4().to_string()),
        action_source: "website",
        event_source_url: owned(&payload.event_source_url)
            .unwrap_or_else(|| app_base_url.to_string()),
        user_data: UserData {
            em: present(&payload.email).map(|email| vec![meta::hash_email(email)]),
            client_ip_address: owned(&payload.client_ip_address).or(hints.ip_address),
            client_user_agent: owned(&payload.client_user_agent).or(hints.user_agent),
            fbc: owned(&payload.fbc),
            fbp: owned(&payload.fbp),
        },
        custom_data: CustomData {
            currency: owned(&payload.currency).unwrap_or_else(|| "USD".to_string()),
            value: payload.value.unwrap_or(0.0),
            content_name: owned(&payload.content_name),
            content_category: owned(&payload.content_category)
                .unwrap_or_else(|| "ItemValue Bundle".to_string()),
        },
    }
}

async fn relay(config: &Config, event: &ConversionEvent) -> Result<serde_json::Value> {
    let client = services::client()?;
    meta::send_event(&client, config, event).await
}

pub async fn handle(config: &Config, request: FunctionRequest) -> FunctionResponse {
    if let Some(response) = http::guard_post(&request) {
        return response;
    }

    let payload: ConversionRequest = match http::parse_json(&request) {
        Ok(payload) => payload,
        Err(error) => {
            return http::json_response(
                error.status_code(),
                json!({ "success": false, "error": error.to_string() }),
            );
        }
    };

    let event = build_event(
        &payload,
        ClientHints::from_request(&request),
        Utc::now().timestamp(),
        &config.app_base_url,
    );

    match relay(config, &event).await {
        Ok(result) => http::json_response(StatusCode::OK, json!({ "success": true, "result": result })),
        Err(Error::Upstream { message, status, .. }) => {
            tracing::error!(%message, status, "conversion API rejected event");
            http::json_response(
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": message }),
            )
        }
        Err(error) => {
            tracing::error!(%error, "conversion event failed");
            http::json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": error.to_string() }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use hyper::body::Bytes;

    use super::*;

    #[test]
    fn defaults_fill_an_empty_request() {
        let event = build_event(
            &ConversionRequest::default(),
            ClientHints::default(),
            1_760_000_000,
            "https://itemvalue.app",
        );
        assert_eq!(event.event_name, "Purchase");
        assert_eq!(event.event_time, 1_760_000_000);
        assert_eq!(event.event_source_url, "https://itemvalue.app");
        assert_eq!(event.custom_data.currency, "USD");
        assert_eq!(event.custom_data.content_category, "ItemValue Bundle");
        assert!(Uuid::parse_str(&event.event_id).is_ok());
        assert!(event.user_data.em.is_none());
    }

    #[test]
    fn body_values_win_over_headers() {
        let request = hyper::Request::builder()
            .method("POST")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("user-agent", "Mozilla/5.0")
            .body(Bytes::new())
            .unwrap();
        let hints = ClientHints::from_request(&request);
        assert_eq!(hints.ip_address.as_deref(), Some("203.0.113.7"));

        let payload = ConversionRequest {
            email: Some("Test@Example.com".to_string()),
            client_user_agent: Some("ItemValue iOS".to_string()),
            event_id: Some("evt-42".to_string()),
            ..ConversionRequest::default()
        };
        let event = build_event(&payload, hints, 0, "https://itemvalue.app");
        assert_eq!(event.event_id, "evt-42");
        assert_eq!(event.user_data.client_ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(event.user_data.client_user_agent.as_deref(), Some("ItemValue iOS"));
        assert_eq!(
            event.user_data.em,
            Some(vec![
                "973dfe463ec85785f5f95af5ba3906eedb2d931c24e69824a89ea65dba4e813b".to_string()
            ])
        );
    }

    #[test]
    fn client_ip_header_is_the_fallback() {
        let request = hyper::Request::builder()
            .header("client-ip", "198.51.100.2")
            .body(Bytes::new())
            .unwrap();
        let hints = ClientHints::from_request(&request);
        assert_eq!(hints.ip_address.as_deref(), Some("198.51.100.2"));
        assert_eq!(hints.user_agent, None);
    }
}
