use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::error_message;

const SERVICE: &str = "stripe";

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

pub struct ChargeRequest<'a> {
    pub amount_cents: i64,
    pub payment_method: &'a str,
    pub description: String,
    pub receipt_email: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Succeeded { id: String },
    NotSucceeded { id: Option<String>, status: String },
    Declined { message: String },
}

#[derive(Deserialize)]
struct PaymentIntentReply {
    id: Option<String>,
    status: Option<String>,
    error: Option<Value>,
}

/// Create and confirm a payment intent in one call.
pub async fn create_payment_intent(
    client: &reqwest::Client,
    config: &Config,
    charge: &ChargeRequest<'_>,
) -> Result<ChargeOutcome> {
    let key = Config::require(&config.stripe_secret_key, "STRIPE_SECRET_KEY")?;
    let amount = charge.amount_cents.to_string();

    let response = client
        .post(format!("{}/v1/payment_intents", config.endpoints.stripe))
        .bearer_auth(key)
        .form(&[
            ("amount", amount.as_str()),
            ("currency", "usd"),
            ("payment_method", charge.payment_method),
            ("confirm", "true"),
            ("description", charge.description.as_str()),
            ("receipt_email", charge.receipt_email),
        ])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    let reply: PaymentIntentReply = serde_json::from_str(&body).map_err(|_| Error::Upstream {
        service: SERVICE,
        status: status.as_u16(),
        message: error_message(&body),
    })?;

    // Card errors come back as 402 with an `error` object; report them as a
    // decline rather than an outage.
    if reply.error.is_some() {
        return Ok(ChargeOutcome::Declined {
            message: error_message(&body),
        });
    }

    match (reply.id, reply.status.as_deref()) {
        (Some(id), Some("succeeded")) => Ok(ChargeOutcome::Succeeded { id }),
        (id, state) => Ok(ChargeOutcome::NotSucceeded {
            id,
            status: state.unwrap_or("unknown").to_string(),
        }),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSession {
    pub id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    pub amount_total: Option<i64>,
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref()?.email.as_deref())
            .filter(|email| !email.trim().is_empty())
    }

    pub fn product_name(&self) -> Option<&str> {
        self.metadata
            .get("product_name")
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: Option<i64>,
    pub receipt_email: Option<String>,
}

#[derive(Debug, Clone)]
pub enum WebhookEvent {
    CheckoutCompleted(CheckoutSession),
    PaymentSucceeded(PaymentIntent),
    Other(String),
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: Value,
}

fn parse_event(payload: &[u8]) -> Result<WebhookEvent> {
    let raw: RawEvent = serde_json::from_slice(payload)?;
    let event = match raw.kind.as_str() {
        "checkout.session.completed" => {
            WebhookEvent::CheckoutCompleted(serde_json::from_value(raw.data.object)?)
        }
        "payment_intent.succeeded" => {
            WebhookEvent::PaymentSucceeded(serde_json::from_value(raw.data.object)?)
        }
        _ => WebhookEvent::Other(raw.kind),
    };
    Ok(event)
}

fn mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::signature("webhook secret is unusable"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// A `Stripe-Signature` header value for `payload` signed at `timestamp`.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let signature = hex::encode(mac(secret, timestamp, payload)?.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={signature}"))
}

/// Check the signature header against the raw payload, then parse the event.
///
/// `now` is unix seconds; signatures older or newer than
/// [`SIGNATURE_TOLERANCE_SECS`] are rejected.
pub fn verify_webhook(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    now: i64,
) -> Result<WebhookEvent> {
    let header = header.ok_or_else(|| Error::signature("No signatures found matching the expected signature for payload"))?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| Error::signature("Unable to extract timestamp and signatures from header"))?;
    if signatures.is_empty() {
        return Err(Error::signature("No v1 signatures found in header"));
    }

    let expected = mac(secret, timestamp, payload)?;
    let matched = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|bytes| expected.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err(Error::signature(
            "No signatures found matching the expected signature for payload",
        ));
    }

    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(Error::signature("Timestamp outside the tolerance zone"));
    }

    parse_event(payload)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_760_000_000;

    fn checkout_payload() -> Vec<u8> {
        json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_1",
                "customer_email": null,
                "customer_details": {"email": "buyer@example.com"},
                "amount_total": 3700,
                "customer": "cus_9",
                "metadata": {"product_name": "Moving Master", "price_id": "price_1"}
            }}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn valid_signature_yields_the_event() {
        let payload = checkout_payload();
        let header = signature_header(&payload, SECRET, NOW).unwrap();

        let event = verify_webhook(&payload, Some(&header), SECRET, NOW + 10).unwrap();
        let WebhookEvent::CheckoutCompleted(session) = event else {
            panic!("expected a checkout session");
        };
        assert_eq!(session.email(), Some("buyer@example.com"));
        assert_eq!(session.product_name(), Some("Moving Master"));
        assert_eq!(session.amount_total, Some(3700));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let payload = checkout_payload();
        let header = signature_header(&payload, SECRET, NOW).unwrap();
        let mut tampered = payload.clone();
        tampered.extend_from_slice(b" ");

        let error = verify_webhook(&tampered, Some(&header), SECRET, NOW).unwrap_err();
        assert!(matches!(error, Error::Signature { .. }));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = checkout_payload();
        let header = signature_header(&payload, "whsec_other", NOW).unwrap();
        assert!(verify_webhook(&payload, Some(&header), SECRET, NOW).is_err());
    }

    #[test]
    fn stale_signature_is_rejected() {
        let payload = checkout_payload();
        let header = signature_header(&payload, SECRET, NOW).unwrap();
        let error = verify_webhook(&payload, Some(&header), SECRET, NOW + 301).unwrap_err();
        assert!(error.to_string().contains("tolerance"));
    }

    #[test]
    fn missing_or_malformed_header_is_rejected() {
        let payload = checkout_payload();
        assert!(verify_webhook(&payload, None, SECRET, NOW).is_err());
        assert!(verify_webhook(&payload, Some("v1=abcd"), SECRET, NOW).is_err());
        assert!(verify_webhook(&payload, Some(&format!("t={NOW}")), SECRET, NOW).is_err());
    }

    #[test]
    fn any_matching_v1_signature_is_accepted() {
        let payload = checkout_payload();
        let header = signature_header(&payload, SECRET, NOW).unwrap();
        let rotated = header.replacen("v1=", "v1=00ff,v1=", 1);
        assert!(verify_webhook(&payload, Some(&rotated), SECRET, NOW).is_ok());
    }

    #[test]
    fn unknown_event_types_are_passed_through() {
        let payload = json!({"type": "customer.created", "data": {"object": {}}})
            .to_string()
            .into_bytes();
        let header = signature_header(&payload, SECRET, NOW).unwrap();
        let event = verify_webhook(&payload, Some(&header), SECRET, NOW).unwrap();
        assert!(matches!(event, WebhookEvent::Other(kind) if kind == "customer.created"));
    }
}
