use hyper::body::Bytes;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, HeaderValue,
};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use crate::error::{Error, Result};

/// What a function sees: the runtime request with its body already collected.
pub type FunctionRequest = Request<Bytes>;
pub type FunctionResponse = Response<String>;

fn response(status: StatusCode, body: String) -> FunctionResponse {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

pub fn json_response(status: StatusCode, body: Value) -> FunctionResponse {
    let mut response = response(status, body.to_string());
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn text_response(status: StatusCode, body: impl Into<String>) -> FunctionResponse {
    let mut response = response(status, body.into());
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> FunctionResponse {
    json_response(status, json!({ "error": message.into() }))
}

pub fn preflight() -> FunctionResponse {
    let mut response = response(StatusCode::OK, String::new());
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    response
}

/// Answer CORS preflights and turn away anything but POST. `None` means the
/// request should be handled.
pub fn guard_post(request: &FunctionRequest) -> Option<FunctionResponse> {
    match *request.method() {
        Method::POST => None,
        Method::OPTIONS => Some(preflight()),
        _ => Some(error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
        )),
    }
}

pub fn parse_json<T: DeserializeOwned>(request: &FunctionRequest) -> Result<T> {
    serde_json::from_slice(request.body())
        .map_err(|e| Error::validation(format!("Invalid JSON body: {e}")))
}

pub fn header<'a>(request: &'a FunctionRequest, name: &str) -> Option<&'a str> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

/// Trimmed, non-empty text field.
pub fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(_) => number(value).map(|number| number != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn lenient<'de, D, T>(deserializer: D, read: fn(&Value) -> Option<T>) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.as_ref().and_then(read))
}

// Informational request fields come from several clients that disagree on
// types. These accept numbers or numeric strings and read anything else as
// absent instead of rejecting the whole body.

pub fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    lenient(deserializer, number)
}

pub fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u64>, D::Error> {
    lenient(deserializer, |value| {
        number(value).filter(|number| *number >= 0.0).map(|number| number as u64)
    })
}

pub fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<i64>, D::Error> {
    lenient(deserializer, |value| number(value).map(|number| number as i64))
}

pub fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<bool>, D::Error> {
    lenient(deserializer, flag)
}
