// SPDX-License-Identifier: MIT

//! Payment webhook routes for Stripe and Cashfree.
//!
//! Both endpoints verify a provider HMAC signature over the raw body
//! before trusting anything in the payload. Verified events are applied
//! idempotently: a replayed transaction id is acknowledged without a
//! second mutation or payment record.
//!
//! Response policy: 401 for a bad signature, 500 for a store failure (so
//! the provider retries), 200 for everything else including unparseable
//! payloads and unrecognized amounts (acknowledged, logged, no mutation).

use crate::error::AppError;
use crate::models::{PaymentProvider, PaymentRecord};
use crate::services::payments::{
    self, CashfreeEvent, StripeEvent, verify_cashfree_signature, verify_stripe_signature,
};
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use std::sync::Arc;

/// Webhook routes. POST only; other methods get 405 from axum.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhooks/stripe", post(handle_stripe))
        .route("/webhooks/cashfree", post(handle_cashfree))
}

/// Handle a Stripe webhook event.
async fn handle_stripe(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    let now = chrono::Utc::now().timestamp();
    if !verify_stripe_signature(&state.config.stripe_webhook_secret, signature, &body, now) {
        tracing::warn!("Stripe webhook signature verification failed");
        return StatusCode::UNAUTHORIZED;
    }

    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse Stripe event");
            return StatusCode::OK; // Acknowledge to avoid retry storms
        }
    };

    if event.event_type != "checkout.session.completed" {
        tracing::debug!(event_type = %event.event_type, "Ignoring Stripe event type");
        return StatusCode::OK;
    }

    let session = event.data.object;
    let Some(uid) = session.metadata.uid else {
        tracing::warn!(event_id = %event.id, "Stripe session missing uid metadata");
        return StatusCode::OK;
    };
    let Some(amount_minor) = session.amount_total else {
        tracing::warn!(event_id = %event.id, "Stripe session missing amount_total");
        return StatusCode::OK;
    };

    apply_payment(
        &state,
        PaymentProvider::Stripe,
        &event.id,
        &uid,
        amount_minor,
    )
    .await
}

/// Handle a Cashfree webhook event.
async fn handle_cashfree(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let timestamp = headers
        .get("x-webhook-timestamp")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if !verify_cashfree_signature(
        &state.config.cashfree_webhook_secret,
        timestamp,
        signature,
        &body,
    ) {
        tracing::warn!("Cashfree webhook signature verification failed");
        return StatusCode::UNAUTHORIZED;
    }

    let event: CashfreeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse Cashfree event");
            return StatusCode::OK;
        }
    };

    if event.event_type != "PAYMENT_SUCCESS_WEBHOOK" {
        tracing::debug!(event_type = %event.event_type, "Ignoring Cashfree event type");
        return StatusCode::OK;
    }
    if !event.data.payment.payment_status.eq_ignore_ascii_case("success") {
        tracing::debug!(
            payment_status = %event.data.payment.payment_status,
            "Ignoring non-success Cashfree payment"
        );
        return StatusCode::OK;
    }

    let Some(uid) = event.data.order.order_tags.uid else {
        tracing::warn!("Cashfree order missing uid tag");
        return StatusCode::OK;
    };
    let amount_minor = payments::rupees_to_minor(event.data.order.order_amount);
    let transaction_id = event.data.payment.cf_payment_id.to_string();

    apply_payment(
        &state,
        PaymentProvider::Cashfree,
        &transaction_id,
        &uid,
        amount_minor,
    )
    .await
}

/// Map the amount to a tier and apply it through the idempotent
/// transaction. Unrecognized amounts are acknowledged without mutation.
async fn apply_payment(
    state: &AppState,
    provider: PaymentProvider,
    transaction_id: &str,
    uid: &str,
    amount_minor: u32,
) -> StatusCode {
    let Some(tier) = payments::tier_for_amount(amount_minor) else {
        tracing::warn!(
            provider = %provider,
            transaction_id,
            amount_minor,
            "Payment amount does not map to any tier; acknowledged without mutation"
        );
        return StatusCode::OK;
    };

    let payment = PaymentRecord {
        user_id: uid.to_string(),
        provider,
        transaction_id: transaction_id.to_string(),
        amount_minor,
        tier,
        timestamp: now_rfc3339(),
    };

    match state.db.apply_payment_atomic(&payment).await {
        Ok(true) => {
            tracing::info!(
                provider = %provider,
                transaction_id,
                uid,
                tier = %tier,
                "Payment applied"
            );
            StatusCode::OK
        }
        Ok(false) => {
            tracing::info!(
                provider = %provider,
                transaction_id,
                "Replayed payment webhook acknowledged"
            );
            StatusCode::OK
        }
        Err(AppError::NotFound(_)) => {
            tracing::warn!(
                provider = %provider,
                transaction_id,
                uid,
                "Payment for unknown user acknowledged without mutation"
            );
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(error = %e, provider = %provider, transaction_id, "Failed to apply payment");
            // Non-200 so the provider retries once the store recovers.
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
