// SPDX-License-Identifier: MIT

//! Payment webhook verification and price mapping.
//!
//! Both providers sign the raw request body with HMAC-SHA256; signatures
//! are compared in constant time. A paid amount maps to a tier through a
//! static table; unrecognized amounts are acknowledged without mutation.

use crate::models::Tier;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Accepted timestamp skew for Stripe signatures (replay window).
const STRIPE_TOLERANCE_SECS: i64 = 300;

/// Price (minor units, paise) to tier. Amounts outside this table are
/// logged and acknowledged without any entitlement change.
const PRICE_TIER_TABLE: &[(u32, Tier)] = &[(29900, Tier::Silver), (59900, Tier::Gold)];

/// Map a paid amount (minor units) to a subscription tier.
pub fn tier_for_amount(amount_minor: u32) -> Option<Tier> {
    PRICE_TIER_TABLE
        .iter()
        .find(|(price, _)| *price == amount_minor)
        .map(|(_, tier)| *tier)
}

fn hmac_sha256(secret: &str, message: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length; new_from_slice cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

// ─── Stripe ──────────────────────────────────────────────────────

/// Verify a `Stripe-Signature` header against the raw body.
///
/// Header format: `t=<unix>,v1=<hex hmac of "{t}.{body}">`. The timestamp
/// must be within the tolerance window of `now_unix`.
pub fn verify_stripe_signature(
    secret: &str,
    signature_header: &str,
    raw_body: &[u8],
    now_unix: i64,
) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    // The header is attacker-controlled; an extreme timestamp must read
    // as out-of-window, not overflow.
    match now_unix.checked_sub(timestamp) {
        Some(skew) if skew.unsigned_abs() <= STRIPE_TOLERANCE_SECS as u64 => {}
        _ => return false,
    }

    let mut signed_payload = format!("{}.", timestamp).into_bytes();
    signed_payload.extend_from_slice(raw_body);
    let expected = hmac_sha256(secret, &signed_payload);

    candidates
        .iter()
        .any(|candidate| candidate.ct_eq(&expected).into())
}

/// Stripe event envelope (only the fields we act on).
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    /// Event id, the idempotency key.
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: StripeCheckoutSession,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    /// Paid amount in the currency's minor unit.
    #[serde(default)]
    pub amount_total: Option<u32>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeMetadata {
    /// Our user id, set when the checkout session is created.
    #[serde(default)]
    pub uid: Option<String>,
}

// ─── Cashfree ────────────────────────────────────────────────────

/// Verify a Cashfree `x-webhook-signature` header.
///
/// Signature = base64(HMAC-SHA256(secret, timestamp + raw_body)) where
/// `timestamp` is the `x-webhook-timestamp` header value.
pub fn verify_cashfree_signature(
    secret: &str,
    timestamp: &str,
    signature: &str,
    raw_body: &[u8],
) -> bool {
    let mut signed_payload = timestamp.as_bytes().to_vec();
    signed_payload.extend_from_slice(raw_body);
    let expected = hmac_sha256(secret, &signed_payload);

    match BASE64.decode(signature) {
        Ok(provided) => bool::from(provided.ct_eq(&expected)),
        Err(_) => false,
    }
}

/// Cashfree webhook envelope (only the fields we act on).
#[derive(Debug, Deserialize)]
pub struct CashfreeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: CashfreeEventData,
}

#[derive(Debug, Deserialize)]
pub struct CashfreeEventData {
    pub order: CashfreeOrder,
    pub payment: CashfreePayment,
}

#[derive(Debug, Deserialize)]
pub struct CashfreeOrder {
    /// Order amount in rupees.
    pub order_amount: f64,
    #[serde(default)]
    pub order_tags: CashfreeOrderTags,
}

#[derive(Debug, Default, Deserialize)]
pub struct CashfreeOrderTags {
    /// Our user id, set when the order is created.
    #[serde(default)]
    pub uid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CashfreePayment {
    /// Cashfree payment id, the idempotency key.
    pub cf_payment_id: serde_json::Number,
    #[serde(default)]
    pub payment_status: String,
}

/// Convert a rupee amount to minor units (paise).
pub fn rupees_to_minor(amount: f64) -> u32 {
    (amount * 100.0).round() as u32
}
