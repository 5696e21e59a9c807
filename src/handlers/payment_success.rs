//! Charge the card, then issue the access code for the resolved bundle.
//!
//! Only the charge is critical. Once it succeeds the buyer always gets their
//! code back, whether or not the notification emails go out.

use chrono::Utc;
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::access_code::{self, AccessCode};
use crate::config::Config;
use crate::emails::{self, PurchaseNotice};
use crate::error::{Error, Result};
use crate::http::{self, FunctionRequest, FunctionResponse, present};
use crate::services::resend::{self, Email};
use crate::services::stripe::{self, ChargeOutcome, ChargeRequest};
use crate::services;
use crate::tiers::{self, BundleDefinition};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub payment_method_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "http::lenient_flag")]
    pub order_bump: Option<bool>,
    pub amount: Option<i64>,
    pub bundle_type: Option<String>,
}

/// A request that has passed validation.
struct Purchase<'a> {
    payment_method: &'a str,
    email: &'a str,
    amount_cents: i64,
    add_on: bool,
    bundle_hint: Option<&'a str>,
    customer_name: &'a str,
    first_name: &'a str,
}

impl PaymentRequest {
    fn validate(&self) -> Result<Purchase<'_>> {
        let email = present(&self.customer_email)
            .ok_or_else(|| Error::validation("customerEmail is required"))?;
        let payment_method = present(&self.payment_method_id)
            .ok_or_else(|| Error::validation("paymentMethodId is required"))?;
        let amount_cents = self
            .amount
            .filter(|amount| *amount > 0)
            .ok_or_else(|| Error::validation("amount must be a positive number of cents"))?;

        let first_name = present(&self.first_name);
        Ok(Purchase {
            payment_method,
            email,
            amount_cents,
            add_on: self.order_bump.unwrap_or(false),
            bundle_hint: present(&self.bundle_type),
            customer_name: present(&self.customer_name).or(first_name).unwrap_or("Customer"),
            first_name: first_name.unwrap_or("there"),
        })
    }
}

fn rejected(status: StatusCode, message: impl Into<String>) -> FunctionResponse {
    http::json_response(status, json!({ "success": false, "error": message.into() }))
}

/// Send the admin and customer emails side by side; failures are logged only.
async fn notify(client: &reqwest::Client, config: &Config, notice: &PurchaseNotice<'_>) {
    if config.resend_api_key.is_none() {
        tracing::info!("RESEND_API_KEY not set, skipping purchase emails");
        return;
    }

    let admin = async {
        let rendered = emails::purchase_admin(notice)?;
        resend::send(client, config, &Email::new(&config.from_email, &config.admin_email, rendered)).await
    };
    let customer = async {
        let rendered = emails::purchase_customer(notice, &config.app_base_url)?;
        resend::send(client, config, &Email::new(&config.from_email, notice.customer_email, rendered)).await
    };

    let (admin, customer) = futures::join!(admin, customer);
    if let Err(error) = admin {
        tracing::warn!(%error, "admin purchase email failed");
    }
    if let Err(error) = customer {
        tracing::warn!(%error, "customer purchase email failed");
    }
}

fn issue(bundle: &BundleDefinition, add_on: bool) -> AccessCode {
    access_code::issue(bundle, add_on, &mut rand::thread_rng())
}

pub async fn handle(config: &Config, request: FunctionRequest) -> FunctionResponse {
    if let Some(response) = http::guard_post(&request) {
        return response;
    }

    let payload: PaymentRequest = match http::parse_json(&request) {
        Ok(payload) => payload,
        Err(error) => return rejected(error.status_code(), error.to_string()),
    };
    let purchase = match payload.validate() {
        Ok(purchase) => purchase,
        Err(error) => return rejected(error.status_code(), error.to_string()),
    };

    let client = match services::client() {
        Ok(client) => client,
        Err(error) => return rejected(error.status_code(), error.to_string()),
    };

    let charge = ChargeRequest {
        amount_cents: purchase.amount_cents,
        payment_method: purchase.payment_method,
        description: format!("ItemValue - {}", purchase.bundle_hint.unwrap_or("Bundle")),
        receipt_email: purchase.email,
    };

    let payment_id = match stripe::create_payment_intent(&client, config, &charge).await {
        Ok(ChargeOutcome::Succeeded { id }) => id,
        Ok(ChargeOutcome::Declined { message }) => {
            tracing::warn!(%message, "card declined");
            return rejected(StatusCode::BAD_REQUEST, message);
        }
        Ok(ChargeOutcome::NotSucceeded { id, status }) => {
            tracing::warn!(?id, %status, "payment did not succeed");
            return rejected(StatusCode::BAD_REQUEST, "Payment was not successful");
        }
        Err(error) => {
            tracing::error!(%error, "charge failed");
            return rejected(error.status_code(), error.to_string());
        }
    };
    tracing::info!(%payment_id, email = %purchase.email, "payment succeeded");

    let bundle = tiers::resolve(purchase.bundle_hint, Some(purchase.amount_cents));
    let code = issue(bundle, purchase.add_on);
    let bundle_label = purchase.bundle_hint.unwrap_or(bundle.key.as_str());
    tracing::info!(bundle = %bundle.key, code = %code, "access code issued");

    let notice = PurchaseNotice {
        customer_name: purchase.customer_name,
        customer_email: purchase.email,
        first_name: purchase.first_name,
        bundle_label,
        amount_cents: purchase.amount_cents,
        access_code: &code,
        payment_id: &payment_id,
        purchased_at: Utc::now(),
    };
    notify(&client, config, &notice).await;

    http::json_response(
        StatusCode::OK,
        json!({
            "success": true,
            "accessCode": code.code(),
            "bundleType": bundle_label,
            "scans": code.scans,
            "days": code.days,
        }),
    )
}
