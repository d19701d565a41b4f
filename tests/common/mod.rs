// SPDX-License-Identifier: MIT

use edusathi_api::config::Config;
use edusathi_api::db::FirestoreDb;
use edusathi_api::models::{AppConfig, FeatureAccess, FeatureKey, Tier};
use edusathi_api::routes::create_router;
use edusathi_api::services::{AppConfigService, GenerationClient, UsageService};
use edusathi_api::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection (emulator).
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// App config covering the metered features, for tests.
#[allow(dead_code)]
pub fn test_app_config() -> AppConfig {
    let mut config = AppConfig::default();
    for feature in [
        FeatureKey::TopicSearches,
        FeatureKey::Summarizer,
        FeatureKey::QuizGeneration,
        FeatureKey::LessonPlans,
    ] {
        config.feature_access.insert(
            feature,
            FeatureAccess {
                enabled: true,
                min_tier: Tier::Free,
            },
        );
    }
    config.feature_access.insert(
        FeatureKey::LiveAssistant,
        FeatureAccess {
            enabled: true,
            min_tier: Tier::Gold,
        },
    );
    config
        .usage_limits
        .free_tier_daily_limits
        .insert(FeatureKey::TopicSearches, 5);
    config
        .usage_limits
        .credit_costs
        .insert(FeatureKey::LessonPlans, 10);
    config
        .ai_model_selection
        .insert("default".to_string(), "gemini-2.0-flash".to_string());
    config
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();

    let app_config = AppConfigService::new(db.clone());
    let consume_locks = Arc::new(dashmap::DashMap::new());
    let usage = UsageService::new(db.clone(), consume_locks);
    let generation = GenerationClient::new(
        config.generation_api_url.clone(),
        config.generation_api_key.clone(),
    );

    let state = Arc::new(AppState {
        config,
        db,
        app_config,
        usage,
        generation,
    });

    (create_router(state.clone()), state)
}

/// Mint a session JWT with the test signing key.
#[allow(dead_code)]
pub fn test_jwt(uid: &str) -> String {
    edusathi_api::middleware::auth::create_jwt(
        uid,
        Some(format!("{}@example.com", uid)),
        &Config::test_default().jwt_signing_key,
    )
    .expect("Failed to mint test JWT")
}
