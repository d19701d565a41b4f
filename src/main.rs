// SPDX-License-Identifier: MIT

//! Edusathi API Server
//!
//! Trusted backend for the Edusathi learning app: entitlement decisions,
//! usage metering, payment webhooks, and the Gemini generation proxy.

use edusathi_api::{
    config::Config,
    db::FirestoreDb,
    services::{AppConfigService, GenerationClient, UsageService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Edusathi API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Cached view of the global config document
    let app_config = AppConfigService::new(db.clone());

    // Per-user consume locks shared across this instance
    let consume_locks = Arc::new(dashmap::DashMap::new());
    let usage = UsageService::new(db.clone(), consume_locks);

    let generation = GenerationClient::new(
        config.generation_api_url.clone(),
        config.generation_api_key.clone(),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        app_config,
        usage,
        generation,
    });

    // Build router
    let app = edusathi_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("edusathi_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
