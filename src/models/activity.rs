// SPDX-License-Identifier: MIT

//! Append-only audit records: activity log and payment history.

use crate::models::{FeatureKey, Tier};
use serde::{Deserialize, Serialize};

/// One metered action, appended to `activity_log` (never mutated).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogRecord {
    pub user_id: String,
    pub user_email: Option<String>,
    /// What happened, e.g. "consume" or "generate".
    pub action: String,
    pub feature: FeatureKey,
    pub amount: u32,
    /// ISO 8601.
    pub timestamp: String,
}

/// Payment provider the webhook came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Cashfree,
}

impl std::fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentProvider::Stripe => write!(f, "stripe"),
            PaymentProvider::Cashfree => write!(f, "cashfree"),
        }
    }
}

/// One successful payment, appended to `payments` (never mutated).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub user_id: String,
    pub provider: PaymentProvider,
    /// Provider transaction id, also the idempotency key.
    pub transaction_id: String,
    /// Amount in the currency's minor unit (paise).
    pub amount_minor: u32,
    pub tier: Tier,
    /// ISO 8601.
    pub timestamp: String,
}

impl PaymentRecord {
    /// Idempotency marker document id: `{provider}:{transaction_id}`.
    pub fn marker_id(&self) -> String {
        format!("{}:{}", self.provider, self.transaction_id)
    }
}

/// Idempotency marker stored at `processed_transactions/{provider:txnId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedTransaction {
    pub provider: PaymentProvider,
    pub transaction_id: String,
    pub processed_at: String,
}
