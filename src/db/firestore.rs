// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - User entitlements (tier, credits, daily usage)
//! - The global app config singleton
//! - Activity log and payment history (append-only)
//! - Transactional consumption and payment application

use crate::db::collections;
use crate::error::AppError;
use crate::models::{
    ActivityLogRecord, AppConfig, PaymentRecord, ProcessedTransaction, SubscriptionStatus,
    UserEntitlement,
};
use crate::policy::{self, Decision};
use crate::time_utils::now_rfc3339;
use chrono::NaiveDate;

/// Result of a transactional consume: the decision made against the
/// in-transaction snapshot, and the entitlement after it (unchanged on
/// deny).
#[derive(Debug, Clone)]
pub struct ConsumeOutcome {
    pub decision: Decision,
    pub entitlement: UserEntitlement,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Entitlement Operations ──────────────────────────────────

    /// Get a user's entitlement document.
    pub async fn get_entitlement(&self, uid: &str) -> Result<Option<UserEntitlement>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user's entitlement document.
    pub async fn upsert_entitlement(&self, entitlement: &UserEntitlement) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&entitlement.uid)
            .object(entitlement)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── App Config Operations ───────────────────────────────────

    /// Get the global config document. `None` means it has never been
    /// seeded; callers treat that as fail-closed.
    pub async fn get_app_config(&self) -> Result<Option<AppConfig>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CONFIG)
            .obj()
            .one(collections::CONFIG_DOC)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace the global config document (admin only).
    pub async fn set_app_config(&self, config: &AppConfig) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CONFIG)
            .document_id(collections::CONFIG_DOC)
            .object(config)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Activity Log ────────────────────────────────────────────

    /// Append one activity record.
    ///
    /// The document id embeds a nanosecond timestamp so records are
    /// append-only and naturally ordered.
    pub async fn append_activity(&self, record: &ActivityLogRecord) -> Result<(), AppError> {
        let doc_id = format!(
            "{}_{}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            record.user_id
        );

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITY_LOG)
            .document_id(&doc_id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Transactional Consumption ───────────────────────────────

    /// Check-and-consume in one Firestore transaction.
    ///
    /// The entitlement is re-read and the policy re-evaluated inside the
    /// transaction, so a stale client-side snapshot can never over-consume:
    /// if another device raced us, Firestore retries with fresh data and
    /// the fresh data decides.
    pub async fn consume_atomic(
        &self,
        config: &AppConfig,
        uid: &str,
        feature: crate::models::FeatureKey,
        amount: u32,
        today: NaiveDate,
    ) -> Result<ConsumeOutcome, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Read the authoritative snapshot; this registers the document for
        // conflict detection.
        let entitlement: Option<UserEntitlement> = client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read entitlement in transaction: {}", e))
            })?;

        let Some(mut entitlement) = entitlement else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("User {} not found", uid)));
        };

        let decision = policy::can_use(config, &entitlement, feature, amount, today);
        if let Decision::Denied(ref reason) = decision {
            tracing::debug!(
                uid,
                feature = %feature,
                amount,
                reason = ?reason,
                "Consumption denied"
            );
            let _ = transaction.rollback().await;
            return Ok(ConsumeOutcome {
                decision,
                entitlement,
            });
        }

        let delta = policy::compute_consumption(config, &entitlement, feature, amount, today);
        delta.apply(&mut entitlement);
        entitlement.updated_at = now_rfc3339();

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(uid)
            .object(&entitlement)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add entitlement to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            uid,
            feature = %feature,
            amount,
            credits = entitlement.credits,
            "Consumption applied"
        );

        Ok(ConsumeOutcome {
            decision,
            entitlement,
        })
    }

    // ─── Payment Application ─────────────────────────────────────

    /// Whether a provider transaction was already applied.
    pub async fn is_payment_processed(&self, marker_id: &str) -> Result<bool, AppError> {
        let marker: Option<ProcessedTransaction> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROCESSED_TRANSACTIONS)
            .obj()
            .one(marker_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(marker.is_some())
    }

    /// Apply a verified payment atomically: tier upgrade, status active,
    /// payment record, and idempotency marker in one transaction.
    ///
    /// Returns `false` when the transaction id was already processed
    /// (replayed webhook); nothing is written in that case.
    pub async fn apply_payment_atomic(&self, payment: &PaymentRecord) -> Result<bool, AppError> {
        let marker_id = payment.marker_id();

        if self.is_payment_processed(&marker_id).await? {
            tracing::info!(
                marker_id = %marker_id,
                "Payment already processed (idempotent skip)"
            );
            return Ok(false);
        }

        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let entitlement: Option<UserEntitlement> = client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&payment.user_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read entitlement in transaction: {}", e))
            })?;

        let Some(mut entitlement) = entitlement else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "User {} not found for payment",
                payment.user_id
            )));
        };

        entitlement.subscription_tier = payment.tier;
        entitlement.subscription_status = SubscriptionStatus::Active;
        entitlement.updated_at = now_rfc3339();

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&payment.user_id)
            .object(&entitlement)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add entitlement to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::PAYMENTS)
            .document_id(&marker_id)
            .object(payment)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add payment record to transaction: {}", e))
            })?;

        let marker = ProcessedTransaction {
            provider: payment.provider,
            transaction_id: payment.transaction_id.clone(),
            processed_at: now_rfc3339(),
        };
        client
            .fluent()
            .update()
            .in_col(collections::PROCESSED_TRANSACTIONS)
            .document_id(&marker_id)
            .object(&marker)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add marker to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            uid = %payment.user_id,
            provider = %payment.provider,
            tier = %payment.tier,
            "Payment applied"
        );

        Ok(true)
    }
}
