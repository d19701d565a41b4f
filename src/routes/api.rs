// SPDX-License-Identifier: MIT

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{AppConfig, FeatureKey, Role, SubscriptionStatus, Tier, UserEntitlement};
use crate::policy::{self, Decision, DenyReason};
use crate::services::GenerationInput;
use crate::session::{AdminView, SessionEvent, SessionMachine, SessionState};
use crate::time_utils::{now_rfc3339, today_utc};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Logical model name used when a request does not pick one.
const DEFAULT_MODEL_NAME: &str = "default";

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/config", get(get_feature_config))
        .route("/api/session", get(get_session))
        .route("/api/session/role", post(set_role))
        .route("/api/session/view", post(set_admin_view))
        .route("/api/consume", post(consume))
        .route("/api/generate", post(generate))
}

// ─── Entitlement Snapshot ────────────────────────────────────

/// Entitlement snapshot returned to the client.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EntitlementResponse {
    pub uid: String,
    pub email: Option<String>,
    pub subscription_tier: Tier,
    pub subscription_status: SubscriptionStatus,
    pub credits: u32,
    /// Effective per-feature usage for the server's current date; stale
    /// stored counters already read as zero here.
    pub usage_today: HashMap<FeatureKey, u32>,
    pub role: Option<Role>,
    pub is_admin: bool,
}

impl EntitlementResponse {
    pub fn from_entitlement(entitlement: &UserEntitlement) -> Self {
        let today = today_utc();
        let usage_today = FeatureKey::ALL
            .iter()
            .map(|&f| (f, policy::effective_usage(entitlement, f, today)))
            .filter(|(_, used)| *used > 0)
            .collect();

        Self {
            uid: entitlement.uid.clone(),
            email: entitlement.email.clone(),
            subscription_tier: entitlement.subscription_tier,
            subscription_status: entitlement.subscription_status,
            credits: entitlement.credits,
            usage_today,
            role: entitlement.role,
            is_admin: entitlement.is_admin,
        }
    }
}

/// Load the caller's entitlement, creating it on first sign-in, and
/// reject blocked accounts.
async fn load_entitlement(state: &AppState, user: &AuthUser) -> Result<UserEntitlement> {
    let entitlement = state
        .usage
        .get_or_create_entitlement(&user.uid, user.email.clone(), state.config.signup_bonus_credits)
        .await?;

    if entitlement.is_blocked() {
        return Err(AppError::AccountBlocked);
    }
    Ok(entitlement)
}

/// Get current user entitlement.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<EntitlementResponse>> {
    let entitlement = load_entitlement(&state, &user).await?;
    Ok(Json(EntitlementResponse::from_entitlement(&entitlement)))
}

// ─── Feature Config View ─────────────────────────────────────

/// Per-feature gate as the client renders it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FeatureGateView {
    pub enabled: bool,
    pub min_tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_cost: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_tier_daily_limit: Option<u32>,
}

/// Feature-access view of the app config.
async fn get_feature_config(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
) -> Result<Json<HashMap<FeatureKey, FeatureGateView>>> {
    let config = state.app_config.get().await?;

    let view = config
        .feature_access
        .iter()
        .map(|(&feature, access)| {
            (
                feature,
                FeatureGateView {
                    enabled: access.enabled,
                    min_tier: access.min_tier,
                    credit_cost: config.credit_cost(feature),
                    free_tier_daily_limit: config.daily_limit(feature),
                },
            )
        })
        .collect();

    Ok(Json(view))
}

// ─── Session ─────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: SessionState,
    pub effective_role: Option<Role>,
}

fn session_response(machine: &SessionMachine) -> SessionResponse {
    SessionResponse {
        session: machine.state(),
        effective_role: machine.effective_role(),
    }
}

/// Resolve the caller's session state.
async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SessionResponse>> {
    let entitlement = load_entitlement(&state, &user).await?;
    let machine = SessionMachine::resolved(&entitlement);
    Ok(Json(session_response(&machine)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleRequest {
    /// `null` clears the role ("change role").
    role: Option<Role>,
}

/// Select or clear the caller's role.
///
/// Persists to the entitlement for regular users. Admins never persist a
/// role from here; emulation goes through the view endpoint.
async fn set_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<RoleRequest>,
) -> Result<Json<SessionResponse>> {
    let mut entitlement = load_entitlement(&state, &user).await?;

    if entitlement.is_admin {
        return Err(AppError::BadRequest(
            "Admins select a view, not a role".to_string(),
        ));
    }

    let mut machine = SessionMachine::resolved(&entitlement);
    match request.role {
        Some(role) => {
            // Re-selection from a ready state re-enters the selector first.
            machine.apply(SessionEvent::ChangeRole);
            machine.apply(SessionEvent::SelectRole(role));
        }
        None => {
            machine.apply(SessionEvent::ChangeRole);
        }
    }

    if entitlement.role != request.role {
        entitlement.role = request.role;
        entitlement.updated_at = now_rfc3339();
        state.db.upsert_entitlement(&entitlement).await?;
        tracing::info!(uid = %user.uid, role = ?request.role, "Role updated");
    }

    Ok(Json(session_response(&machine)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminViewRequest {
    /// `null` re-enters the view selector ("switch role").
    view: Option<AdminView>,
}

/// Select an admin console or emulation view (session-local only; the
/// persisted entitlement is never touched).
async fn set_admin_view(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<AdminViewRequest>,
) -> Result<Json<SessionResponse>> {
    let entitlement = load_entitlement(&state, &user).await?;
    if !entitlement.is_admin {
        return Err(AppError::AdminRequired);
    }

    let mut machine = SessionMachine::resolved(&entitlement);
    match request.view {
        Some(view) => {
            machine.apply(SessionEvent::AdminSelectView(view));
        }
        None => {
            // Coming from a view, AdminSwitchRole is a no-op at the selector.
            machine.apply(SessionEvent::AdminSwitchRole);
        }
    }

    Ok(Json(session_response(&machine)))
}

// ─── Consume ─────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ConsumeRequest {
    feature: FeatureKey,
    #[serde(default = "default_amount")]
    #[validate(range(min = 1, max = 100))]
    amount: u32,
}

fn default_amount() -> u32 {
    1
}

/// Consume result: a denial is a normal response (the client shows an
/// upgrade or limit prompt), never an error status.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConsumeResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_reason: Option<DenyReason>,
    pub entitlement: EntitlementResponse,
}

/// Check-and-consume a usage intent.
async fn consume(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ConsumeRequest>,
) -> Result<Json<ConsumeResponse>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // Order matters: blocked accounts 403 before anything else.
    load_entitlement(&state, &user).await?;
    let config = state.app_config.get().await?;

    let outcome = state
        .usage
        .consume(
            &config,
            &user.uid,
            user.email.clone(),
            "consume",
            request.feature,
            request.amount,
        )
        .await?;

    Ok(Json(ConsumeResponse {
        allowed: outcome.decision.is_allowed(),
        deny_reason: match outcome.decision {
            Decision::Allowed => None,
            Decision::Denied(reason) => Some(reason),
        },
        entitlement: EntitlementResponse::from_entitlement(&outcome.entitlement),
    }))
}

// ─── Generate ────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    feature: FeatureKey,
    #[validate(length(min = 1, max = 20000))]
    prompt: String,
    #[serde(default)]
    params: Option<serde_json::Value>,
    #[serde(default)]
    output_language: Option<String>,
    /// Logical model name resolved through the app config.
    #[serde(default)]
    model: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GenerateResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_reason: Option<DenyReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub entitlement: EntitlementResponse,
}

/// Run a generation call for a metered feature.
///
/// Permission is checked before calling the AI service (no generation
/// happens for a denied request) and re-checked transactionally when the
/// usage is applied afterwards, so a racing session cannot over-consume.
async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let entitlement = load_entitlement(&state, &user).await?;
    let config = state.app_config.get().await?;

    let precheck = policy::can_use(&config, &entitlement, request.feature, 1, today_utc());
    if let Decision::Denied(reason) = precheck {
        return Ok(Json(GenerateResponse {
            allowed: false,
            deny_reason: Some(reason),
            text: None,
            model: None,
            entitlement: EntitlementResponse::from_entitlement(&entitlement),
        }));
    }

    let model_id = resolve_model_id(&config, request.model.as_deref())?;
    let payload = state
        .generation
        .generate(
            &model_id,
            &GenerationInput {
                prompt: request.prompt.clone(),
                params: request.params.clone(),
                output_language: request.output_language.clone(),
            },
        )
        .await?;

    // Usage is applied only after a successful generation.
    let outcome = state
        .usage
        .consume(
            &config,
            &user.uid,
            user.email.clone(),
            "generate",
            request.feature,
            1,
        )
        .await?;

    if let Decision::Denied(reason) = outcome.decision {
        // Lost a race between precheck and apply; the content was produced
        // but the quota is gone. Surface the denial without the payload.
        tracing::warn!(
            uid = %user.uid,
            feature = %request.feature,
            "Consumption denied after generation (raced)"
        );
        return Ok(Json(GenerateResponse {
            allowed: false,
            deny_reason: Some(reason),
            text: None,
            model: None,
            entitlement: EntitlementResponse::from_entitlement(&outcome.entitlement),
        }));
    }

    Ok(Json(GenerateResponse {
        allowed: true,
        deny_reason: None,
        text: Some(payload.text),
        model: Some(payload.model),
        entitlement: EntitlementResponse::from_entitlement(&outcome.entitlement),
    }))
}

fn resolve_model_id(config: &AppConfig, logical_name: Option<&str>) -> Result<String> {
    let name = logical_name.unwrap_or(DEFAULT_MODEL_NAME);
    config
        .model_id(name)
        .map(String::from)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown model selection: {}", name)))
}
