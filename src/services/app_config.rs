// SPDX-License-Identifier: MIT

//! Cached reader for the global config document.
//!
//! Every entitlement decision needs the config; reading the singleton from
//! Firestore on every request would dominate our read quota, so the loaded
//! document is cached in-process with a short TTL. A missing or unloadable
//! config is surfaced as `ConfigUnavailable` (fail closed), never as a
//! permissive default.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::AppConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct CacheEntry {
    config: AppConfig,
    expires_at: Instant,
}

/// Shared, TTL-cached view of `config/app`.
#[derive(Clone)]
pub struct AppConfigService {
    db: FirestoreDb,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    ttl: Duration,
}

impl AppConfigService {
    pub fn new(db: FirestoreDb) -> Self {
        Self {
            db,
            cache: Arc::new(RwLock::new(None)),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Current config, from cache when fresh.
    pub async fn get(&self) -> Result<AppConfig, AppError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.as_ref() {
                if Instant::now() < entry.expires_at {
                    return Ok(entry.config.clone());
                }
            }
        }

        let config = match self.db.get_app_config().await {
            Ok(Some(config)) => config,
            Ok(None) => {
                tracing::warn!("App config document missing; denying all features");
                return Err(AppError::ConfigUnavailable);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load app config");
                return Err(AppError::ConfigUnavailable);
            }
        };

        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            config: config.clone(),
            expires_at: Instant::now() + self.ttl,
        });

        Ok(config)
    }

    /// Drop the cached copy (after an admin config edit) so the next read
    /// fetches the updated document.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }

    /// Seed the cache directly, bypassing Firestore. For tests.
    pub async fn seed(&self, config: AppConfig) {
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            config,
            expires_at: Instant::now() + Duration::from_secs(3600),
        });
    }
}
