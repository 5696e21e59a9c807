//! Checkout events from Stripe. Verified purchases are added to the marketing
//! audience for their bundle.

use chrono::{SecondsFormat, Utc};
use hyper::{Method, StatusCode};
use serde_json::json;

use crate::config::Config;
use crate::error::Error;
use crate::http::{self, FunctionRequest, FunctionResponse};
use crate::services::stripe::{self, CheckoutSession, WebhookEvent};
use crate::services::{self, convertkit};
use crate::tiers;

const SIGNATURE_HEADER: &str = "stripe-signature";
const DEFAULT_PRODUCT: &str = "Item Value Purchase";

fn webhook_error(error: Error) -> FunctionResponse {
    let reason = match error {
        Error::Signature { reason } => reason,
        other => other.to_string(),
    };
    tracing::warn!(%reason, "webhook rejected");
    http::text_response(StatusCode::BAD_REQUEST, format!("Webhook Error: {reason}"))
}

/// Purchase-time fields stored on the subscriber.
pub fn subscriber_fields(session: &CheckoutSession, product: &str) -> serde_json::Value {
    let amount = session.amount_total.unwrap_or(0) as f64 / 100.0;
    json!({
        "purchase_date": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "product": product,
        "amount": format!("{amount:.2}"),
        "stripe_customer_id": session.customer,
    })
}

async fn checkout_completed(client: &reqwest::Client, config: &Config, session: &CheckoutSession) {
    let Some(email) = session.email() else {
        tracing::warn!(session = ?session.id, "checkout session has no customer email");
        return;
    };

    // Without a product name the buyer only gets the generic customer tag.
    let bundle = session
        .product_name()
        .map(|name| tiers::resolve(Some(name), session.amount_total).key);
    let product = session.product_name().unwrap_or(DEFAULT_PRODUCT);
    tracing::info!(email, product, bundle = ?bundle, "checkout completed");

    match config.audiences.tag_for(bundle) {
        Some(tag_id) => {
            let fields = subscriber_fields(session, product);
            if let Err(error) = convertkit::subscribe_to_tag(client, config, email, tag_id, fields).await {
                tracing::warn!(%error, tag_id, "tagging subscriber failed");
            }
        }
        None => tracing::info!("no audience tag configured for purchase"),
    }

    if let Some(sequence_id) = bundle.and_then(|key| config.audiences.sequence_for(key)) {
        if let Err(error) = convertkit::subscribe_to_sequence(client, config, email, sequence_id).await {
            tracing::warn!(%error, sequence_id, "sequence enrolment failed");
        }
    }
}

pub async fn handle(config: &Config, request: FunctionRequest) -> FunctionResponse {
    if *request.method() != Method::POST {
        return http::text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }

    let secret = match Config::require(&config.stripe_webhook_secret, "STRIPE_WEBHOOK_SECRET") {
        Ok(secret) => secret,
        Err(error) => return webhook_error(error),
    };

    let event = match stripe::verify_webhook(
        request.body(),
        http::header(&request, SIGNATURE_HEADER),
        secret,
        Utc::now().timestamp(),
    ) {
        Ok(event) => event,
        Err(error) => return webhook_error(error),
    };

    let client = match services::client() {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(%error, "could not build http client");
            return http::text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    match event {
        WebhookEvent::CheckoutCompleted(session) => {
            checkout_completed(&client, config, &session).await;
        }
        WebhookEvent::PaymentSucceeded(intent) => {
            tracing::info!(payment_intent = %intent.id, "payment succeeded");
        }
        WebhookEvent::Other(kind) => {
            tracing::info!(%kind, "unhandled event type");
        }
    }

    http::text_response(StatusCode::OK, "Success")
}
