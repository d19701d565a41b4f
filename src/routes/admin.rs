// SPDX-License-Identifier: MIT

//! Admin routes: direct entitlement edits and config management.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{AccountStatus, AppConfig, Role, SubscriptionStatus, Tier};
use crate::routes::api::EntitlementResponse;
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::put,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Admin routes (require authentication; admin flag checked per handler).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/users/{uid}", put(update_user))
        .route("/api/admin/config", put(update_config))
}

/// Verify the caller is an active admin.
async fn require_admin(state: &AppState, user: &AuthUser) -> Result<()> {
    let caller = state
        .db
        .get_entitlement(&user.uid)
        .await?
        .ok_or(AppError::AdminRequired)?;
    if caller.is_blocked() {
        return Err(AppError::AccountBlocked);
    }
    if !caller.is_admin {
        return Err(AppError::AdminRequired);
    }
    Ok(())
}

/// Partial entitlement edit; absent fields are left unchanged.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminUserUpdate {
    subscription_tier: Option<Tier>,
    subscription_status: Option<SubscriptionStatus>,
    credits: Option<u32>,
    account_status: Option<AccountStatus>,
    is_admin: Option<bool>,
    /// Double-Option: absent = unchanged, `null` = clear the role.
    #[serde(default, with = "double_option")]
    role: Option<Option<Role>>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Edit a user's entitlement directly.
async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(uid): Path<String>,
    Json(update): Json<AdminUserUpdate>,
) -> Result<Json<EntitlementResponse>> {
    require_admin(&state, &user).await?;

    let mut entitlement = state
        .db
        .get_entitlement(&uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

    if let Some(tier) = update.subscription_tier {
        entitlement.subscription_tier = tier;
    }
    if let Some(status) = update.subscription_status {
        entitlement.subscription_status = status;
    }
    if let Some(credits) = update.credits {
        entitlement.credits = credits;
    }
    if let Some(account_status) = update.account_status {
        entitlement.account_status = account_status;
    }
    if let Some(is_admin) = update.is_admin {
        entitlement.is_admin = is_admin;
    }
    if let Some(role) = update.role {
        entitlement.role = role;
    }
    entitlement.updated_at = now_rfc3339();

    state.db.upsert_entitlement(&entitlement).await?;

    tracing::info!(
        admin = %user.uid,
        uid = %uid,
        tier = %entitlement.subscription_tier,
        account_status = ?entitlement.account_status,
        "Entitlement edited by admin"
    );

    Ok(Json(EntitlementResponse::from_entitlement(&entitlement)))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UpdateConfigResponse {
    pub success: bool,
}

/// Replace the global app config and drop the in-process cache.
async fn update_config(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(config): Json<AppConfig>,
) -> Result<Json<UpdateConfigResponse>> {
    require_admin(&state, &user).await?;

    state.db.set_app_config(&config).await?;
    state.app_config.invalidate().await;

    tracing::info!(admin = %user.uid, "App config updated");
    Ok(Json(UpdateConfigResponse { success: true }))
}
