//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as env vars by the deployment (Cloud Run secret
//! bindings) and cached in memory for the process lifetime.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Credits granted on first sign-in
    pub signup_bonus_credits: u32,
    /// Base URL of the Gemini generation API
    pub generation_api_url: String,

    // --- Secrets (injected via secret bindings) ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Gemini API key
    pub generation_api_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Cashfree webhook signing secret
    pub cashfree_webhook_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            signup_bonus_credits: env::var("SIGNUP_BONUS_CREDITS")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),
            generation_api_url: env::var("GENERATION_API_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            generation_api_key: env::var("GENERATION_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GENERATION_API_KEY"))?,
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))?,
            cashfree_webhook_secret: env::var("CASHFREE_WEBHOOK_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CASHFREE_WEBHOOK_SECRET"))?,
        })
    }

    /// Fixed config for tests (no env access, deterministic secrets).
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            signup_bonus_credits: 50,
            generation_api_url: "http://localhost:9090".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            generation_api_key: "test_generation_key".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            cashfree_webhook_secret: "cf_test_secret".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
