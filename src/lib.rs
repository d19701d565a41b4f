// SPDX-License-Identifier: MIT

//! Edusathi API: entitlement and usage-metering backend.
//!
//! This crate is the trusted boundary for subscription-tier gating,
//! credit/daily-count metering, and payment webhook processing. Clients
//! send intents ("consume one topic search"); the server decides against
//! the authoritative Firestore snapshot and replies with the result.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod routes;
pub mod services;
pub mod session;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{AppConfigService, GenerationClient, UsageService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub app_config: AppConfigService,
    pub usage: UsageService,
    pub generation: GenerationClient,
}
