#![allow(dead_code)]

use hyper::body::Bytes;
use hyper::Request;
use itemvalue::config::{Config, Endpoints};
use itemvalue::http::{FunctionRequest, FunctionResponse};
use serde_json::Value;

pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// Every key set and every upstream pointed at the mock server.
pub fn config(base_url: &str) -> Config {
    Config {
        stripe_secret_key: Some("sk_test_123".to_string()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        resend_api_key: Some("re_test_123".to_string()),
        serpapi_key: Some("serp_test_123".to_string()),
        anthropic_api_key: Some("anthropic_test_123".to_string()),
        openai_api_key: Some("openai_test_123".to_string()),
        convertkit_api_key: Some("ck_test_123".to_string()),
        meta_access_token: Some("meta_test_123".to_string()),
        endpoints: Endpoints::all(base_url),
        ..Config::default()
    }
}

pub fn request(method: &str, body: impl Into<Bytes>) -> FunctionRequest {
    Request::builder()
        .method(method)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

pub fn post(body: &Value) -> FunctionRequest {
    request("POST", body.to_string())
}

pub fn json(response: &FunctionResponse) -> Value {
    serde_json::from_str(response.body()).unwrap()
}
