//! Database layer (Firestore).

pub mod firestore;

pub use firestore::{ConsumeOutcome, FirestoreDb};

/// Collection names as constants.
pub mod collections {
    /// Per-user entitlement documents, keyed by uid.
    pub const USERS: &str = "users";
    /// Singleton config collection; the document id is [`CONFIG_DOC`].
    pub const CONFIG: &str = "config";
    /// Append-only usage audit trail.
    pub const ACTIVITY_LOG: &str = "activity_log";
    /// Append-only payment history.
    pub const PAYMENTS: &str = "payments";
    /// Webhook idempotency markers, keyed by `{provider}:{txnId}`.
    pub const PROCESSED_TRANSACTIONS: &str = "processed_transactions";

    pub const CONFIG_DOC: &str = "app";
}
