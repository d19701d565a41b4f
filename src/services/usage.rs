// SPDX-License-Identifier: MIT

//! Usage application: check-and-consume plus the activity trail.
//!
//! Consumption is authoritative here, not in the client: the caller sends
//! an intent ("consume N of feature X") and this service decides against
//! the freshest snapshot inside a Firestore transaction. A per-user mutex
//! serializes consumes within this instance so concurrent requests from
//! one user do not burn transaction retries against each other; the
//! transaction itself protects against other instances.

use crate::db::{ConsumeOutcome, FirestoreDb};
use crate::error::AppError;
use crate::models::{ActivityLogRecord, AppConfig, FeatureKey, UserEntitlement};
use crate::time_utils::{now_rfc3339, today_utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-user consume locks shared across the instance.
pub type ConsumeLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Applies usage deltas and appends activity records.
#[derive(Clone)]
pub struct UsageService {
    db: FirestoreDb,
    consume_locks: ConsumeLocks,
}

impl UsageService {
    pub fn new(db: FirestoreDb, consume_locks: ConsumeLocks) -> Self {
        Self { db, consume_locks }
    }

    /// Load the caller's entitlement, creating the first-sign-in document
    /// when none exists yet.
    pub async fn get_or_create_entitlement(
        &self,
        uid: &str,
        email: Option<String>,
        signup_bonus_credits: u32,
    ) -> Result<UserEntitlement, AppError> {
        if let Some(entitlement) = self.db.get_entitlement(uid).await? {
            return Ok(entitlement);
        }

        let entitlement = UserEntitlement::new_signup(
            uid,
            email,
            signup_bonus_credits,
            today_utc(),
            &now_rfc3339(),
        );
        self.db.upsert_entitlement(&entitlement).await?;

        tracing::info!(uid, credits = signup_bonus_credits, "Entitlement created");
        Ok(entitlement)
    }

    /// Check-and-consume one intent; logs the activity on success.
    ///
    /// The activity append is best-effort and spawned: a failed append is
    /// logged and swallowed, it never blocks or fails the consume.
    pub async fn consume(
        &self,
        config: &AppConfig,
        uid: &str,
        email: Option<String>,
        action: &str,
        feature: FeatureKey,
        amount: u32,
    ) -> Result<ConsumeOutcome, AppError> {
        let lock = self
            .consume_locks
            .entry(uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let outcome = self
            .db
            .consume_atomic(config, uid, feature, amount, today_utc())
            .await?;

        if outcome.decision.is_allowed() {
            self.log_activity(uid, email, action, feature, amount);
        }

        Ok(outcome)
    }

    fn log_activity(
        &self,
        uid: &str,
        email: Option<String>,
        action: &str,
        feature: FeatureKey,
        amount: u32,
    ) {
        let record = ActivityLogRecord {
            user_id: uid.to_string(),
            user_email: email,
            action: action.to_string(),
            feature,
            amount,
            timestamp: now_rfc3339(),
        };

        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(e) = db.append_activity(&record).await {
                tracing::warn!(
                    error = %e,
                    uid = %record.user_id,
                    feature = %record.feature,
                    "Failed to append activity record (ignored)"
                );
            }
        });
    }
}
