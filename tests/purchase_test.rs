mod common;

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Utc;
use httpmock::prelude::*;
use hyper::body::Bytes;
use hyper::{Request, StatusCode};
use itemvalue::config::{Audiences, Config};
use itemvalue::handlers::{payment_success, stripe_webhook};
use itemvalue::services::stripe;
use itemvalue::tiers::BundleKey;
use regex::Regex;
use serde_json::json;

use common::{WEBHOOK_SECRET, config, json, post, request};

fn succeeded_intent() -> serde_json::Value {
    json!({ "id": "pi_123", "object": "payment_intent", "status": "succeeded", "amount": 3700 })
}

#[tokio::test]
async fn successful_charge_issues_a_code_and_sends_both_emails() -> Result<()> {
    let server = MockServer::start_async().await;

    let charge = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/payment_intents")
                .header("authorization", "Bearer sk_test_123")
                .body_contains("amount=3700")
                .body_contains("currency=usd")
                .body_contains("payment_method=pm_card_visa")
                .body_contains("confirm=true");
            then.status(200).json_body(succeeded_intent());
        })
        .await;

    let emails = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/emails")
                .header("authorization", "Bearer re_test_123");
            then.status(200).json_body(json!({ "id": "email_1" }));
        })
        .await;

    let response = payment_success::handle(
        &config(&server.base_url()),
        post(&json!({
            "paymentMethodId": "pm_card_visa",
            "customerEmail": "buyer@example.com",
            "firstName": "Dana",
            "amount": 3700,
            "bundleType": "Moving Master",
            "orderBump": true
        })),
    )
    .await;

    charge.assert_async().await;
    emails.assert_hits_async(2).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(&response);
    assert_eq!(body["success"], true);
    assert_eq!(body["bundleType"], "Moving Master");
    assert_eq!(body["scans"], 200);
    assert_eq!(body["days"], 365);
    let code = body["accessCode"].as_str().unwrap();
    assert!(Regex::new(r"^MOVING-[0-9A-Z]{6}-\d{4}-YEAR$")?.is_match(code), "{code}");
    Ok(())
}

#[tokio::test]
async fn amount_picks_the_bundle_when_no_name_is_sent() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/payment_intents");
            then.status(200).json_body(succeeded_intent());
        })
        .await;

    let config = Config {
        resend_api_key: None,
        ..config(&server.base_url())
    };
    let response = payment_success::handle(
        &config,
        post(&json!({
            "paymentMethodId": "pm_card_visa",
            "customerEmail": "buyer@example.com",
            "amount": 1700
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(&response);
    assert_eq!(body["bundleType"], "weekend");
    assert_eq!(body["scans"], 50);
    assert_eq!(body["days"], 30);
    assert!(body["accessCode"].as_str().unwrap().starts_with("WEEKEND-"));
    Ok(())
}

#[tokio::test]
async fn declined_card_is_reported_without_emails() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/payment_intents");
            then.status(402).json_body(json!({
                "error": { "type": "card_error", "code": "card_declined", "message": "Your card was declined." }
            }));
        })
        .await;
    let emails = server
        .mock_async(|when, then| {
            when.path("/emails");
            then.status(200).json_body(json!({ "id": "email_1" }));
        })
        .await;

    let response = payment_success::handle(
        &config(&server.base_url()),
        post(&json!({
            "paymentMethodId": "pm_card_chargeDeclined",
            "customerEmail": "buyer@example.com",
            "amount": 3700
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json(&response),
        json!({ "success": false, "error": "Your card was declined." })
    );
    assert_eq!(emails.hits_async().await, 0);
    Ok(())
}

#[tokio::test]
async fn incomplete_payment_is_not_successful() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/payment_intents");
            then.status(200)
                .json_body(json!({ "id": "pi_9", "status": "requires_action" }));
        })
        .await;

    let response = payment_success::handle(
        &config(&server.base_url()),
        post(&json!({
            "paymentMethodId": "pm_card_threeDSecure2Required",
            "customerEmail": "buyer@example.com",
            "amount": 700
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(&response)["error"], "Payment was not successful");
    Ok(())
}

#[tokio::test]
async fn email_failures_do_not_fail_the_purchase() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/payment_intents");
            then.status(200).json_body(succeeded_intent());
        })
        .await;
    let emails = server
        .mock_async(|when, then| {
            when.method(POST).path("/emails");
            then.status(500).json_body(json!({ "message": "Internal server error" }));
        })
        .await;

    let response = payment_success::handle(
        &config(&server.base_url()),
        post(&json!({
            "paymentMethodId": "pm_card_visa",
            "customerEmail": "buyer@example.com",
            "amount": 9700,
            "bundleType": "Estate Pro"
        })),
    )
    .await;

    emails.assert_hits_async(2).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(&response);
    assert_eq!(body["success"], true);
    assert_eq!(body["scans"], 1000);
    assert_eq!(body["days"], 90);
    Ok(())
}

#[tokio::test]
async fn invalid_purchases_never_reach_stripe() -> Result<()> {
    let server = MockServer::start_async().await;
    let charge = server
        .mock_async(|when, then| {
            when.path("/v1/payment_intents");
            then.status(200).json_body(succeeded_intent());
        })
        .await;

    for body in [
        json!({ "paymentMethodId": "pm_card_visa", "amount": 3700 }),
        json!({ "customerEmail": "buyer@example.com", "amount": 3700 }),
        json!({ "paymentMethodId": "pm_card_visa", "customerEmail": "buyer@example.com", "amount": 0 }),
        json!({ "paymentMethodId": "pm_card_visa", "customerEmail": "buyer@example.com" }),
    ] {
        let response = payment_success::handle(&config(&server.base_url()), post(&body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json(&response)["success"], false);
    }

    assert_eq!(charge.hits_async().await, 0);
    Ok(())
}

fn audiences() -> Audiences {
    Audiences {
        tags: BTreeMap::from([
            (BundleKey::Moving, "tag_moving".to_string()),
            (BundleKey::Challenge, "tag_challenge".to_string()),
        ]),
        sequences: BTreeMap::from([(BundleKey::Challenge, "seq_challenge".to_string())]),
        customer_tag: Some("tag_customer".to_string()),
    }
}

fn checkout_event(product_name: Option<&str>, amount_total: i64) -> Vec<u8> {
    let metadata = match product_name {
        Some(name) => json!({ "product_name": name, "price_id": "price_1" }),
        None => json!({}),
    };
    json!({
        "id": "evt_1",
        "object": "event",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "customer_email": null,
            "customer_details": { "email": "buyer@example.com" },
            "amount_total": amount_total,
            "customer": "cus_42",
            "metadata": metadata
        }}
    })
    .to_string()
    .into_bytes()
}

fn signed(payload: Vec<u8>, secret: &str) -> Result<Request<Bytes>> {
    let signature = stripe::signature_header(&payload, secret, Utc::now().timestamp())?;
    Ok(Request::builder()
        .method("POST")
        .header("stripe-signature", signature)
        .body(Bytes::from(payload))?)
}

#[tokio::test]
async fn checkout_tags_the_buyer_for_their_bundle() -> Result<()> {
    let server = MockServer::start_async().await;
    let tag = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v3/tags/tag_moving/subscribe")
                .body_contains(r#""api_key":"ck_test_123""#)
                .body_contains(r#""email":"buyer@example.com""#)
                .body_contains(r#""amount":"37.00""#)
                .body_contains(r#""stripe_customer_id":"cus_42""#);
            then.status(200).json_body(json!({ "subscription": { "id": 1 } }));
        })
        .await;
    let sequence = server
        .mock_async(|when, then| {
            when.path_contains("/v3/sequences/");
            then.status(200).json_body(json!({}));
        })
        .await;

    let config = Config {
        audiences: audiences(),
        ..config(&server.base_url())
    };
    let response = stripe_webhook::handle(
        &config,
        signed(checkout_event(Some("Moving Master"), 3700), WEBHOOK_SECRET)?,
    )
    .await;

    tag.assert_async().await;
    assert_eq!(sequence.hits_async().await, 0);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), "Success");
    Ok(())
}

#[tokio::test]
async fn challenge_buyers_join_the_sequence_even_when_tagging_fails() -> Result<()> {
    let server = MockServer::start_async().await;
    let tag = server
        .mock_async(|when, then| {
            when.method(POST).path("/v3/tags/tag_challenge/subscribe");
            then.status(500).body("boom");
        })
        .await;
    let sequence = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v3/sequences/seq_challenge/subscribe")
                .body_contains(r#""email":"buyer@example.com""#);
            then.status(200).json_body(json!({}));
        })
        .await;

    let config = Config {
        audiences: audiences(),
        ..config(&server.base_url())
    };
    let response = stripe_webhook::handle(
        &config,
        signed(checkout_event(Some("Declutter Challenge"), 2700), WEBHOOK_SECRET)?,
    )
    .await;

    tag.assert_async().await;
    sequence.assert_async().await;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn checkout_without_a_product_gets_the_customer_tag() -> Result<()> {
    let server = MockServer::start_async().await;
    let tag = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v3/tags/tag_customer/subscribe")
                .body_contains(r#""product":"Item Value Purchase""#);
            then.status(200).json_body(json!({}));
        })
        .await;

    let config = Config {
        audiences: audiences(),
        ..config(&server.base_url())
    };
    let response =
        stripe_webhook::handle(&config, signed(checkout_event(None, 700), WEBHOOK_SECRET)?).await;

    tag.assert_async().await;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn forged_webhooks_are_rejected() -> Result<()> {
    let server = MockServer::start_async().await;
    let convertkit = server
        .mock_async(|when, then| {
            when.path_contains("/v3/");
            then.status(200).json_body(json!({}));
        })
        .await;

    let config = Config {
        audiences: audiences(),
        ..config(&server.base_url())
    };

    let forged = stripe_webhook::handle(
        &config,
        signed(checkout_event(Some("Moving Master"), 3700), "whsec_wrong")?,
    )
    .await;
    assert_eq!(forged.status(), StatusCode::BAD_REQUEST);
    assert!(forged.body().starts_with("Webhook Error: "), "{}", forged.body());

    let unsigned = stripe_webhook::handle(
        &config,
        request("POST", checkout_event(Some("Moving Master"), 3700)),
    )
    .await;
    assert_eq!(unsigned.status(), StatusCode::BAD_REQUEST);

    assert_eq!(convertkit.hits_async().await, 0);
    Ok(())
}

#[tokio::test]
async fn webhook_only_accepts_post_and_ignores_other_events() -> Result<()> {
    let config = Config {
        stripe_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        ..Config::default()
    };

    let get = stripe_webhook::handle(&config, request("GET", "")).await;
    assert_eq!(get.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(get.body(), "Method Not Allowed");

    let payload = json!({
        "id": "evt_2",
        "type": "customer.created",
        "data": { "object": { "id": "cus_1" } }
    })
    .to_string()
    .into_bytes();
    let response = stripe_webhook::handle(&config, signed(payload, WEBHOOK_SECRET)?).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), "Success");
    Ok(())
}
