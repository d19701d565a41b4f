// SPDX-License-Identifier: MIT

//! Usage policy engine: pure permission decisions and consumption deltas.
//!
//! No I/O and no errors. Missing config entries are a deny, never a panic,
//! so a caller holding a half-loaded config fails closed.
//!
//! Checks run fail-fast in a fixed order:
//! 1. blocked account (denies everything)
//! 2. admin-only features gate solely on `isAdmin`
//! 3. feature must exist in config and be enabled
//! 4. admins bypass the remaining tier/credit/count checks
//! 5. minimum tier
//! 6. credit-metered: balance must cover `cost * amount`
//! 7. count-metered (free tier only): today's usage + amount within limit
//! 8. otherwise allowed (paid tiers without a cost entry are unlimited)

use crate::models::{AppConfig, DailyUsage, FeatureKey, Tier, UserEntitlement};
use chrono::NaiveDate;
use serde::Serialize;

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Machine-readable reason for a denial; the client renders these as
/// upgrade or limit prompts, never as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DenyReason {
    AccountBlocked,
    AdminRequired,
    /// Feature missing from config or explicitly disabled.
    FeatureDisabled,
    #[serde(rename_all = "camelCase")]
    TierTooLow { required: Tier },
    #[serde(rename_all = "camelCase")]
    InsufficientCredits { required: u32, available: u32 },
    #[serde(rename_all = "camelCase")]
    DailyLimitReached { limit: u32, used: u32 },
}

/// State change to apply when an allowed action completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumptionDelta {
    /// New (clamped) credit balance for a credit-metered feature.
    Credits { credits: u32 },
    /// Rebuilt usage record for a count-metered free-tier feature.
    Usage { usage: DailyUsage },
    /// No entitlement change; the activity is still logged.
    NoChange,
}

impl ConsumptionDelta {
    /// Apply the delta to an entitlement in place.
    ///
    /// Only credits or usage ever change; tier, role, and status are
    /// untouched by consumption.
    pub fn apply(&self, entitlement: &mut UserEntitlement) {
        match self {
            ConsumptionDelta::Credits { credits } => entitlement.credits = *credits,
            ConsumptionDelta::Usage { usage } => entitlement.usage = usage.clone(),
            ConsumptionDelta::NoChange => {}
        }
    }
}

/// Today's effective usage of a feature.
///
/// Counters stamped with a stale date read as zero: the lazy daily
/// rollover lives here rather than in a midnight job.
pub fn effective_usage(entitlement: &UserEntitlement, feature: FeatureKey, today: NaiveDate) -> u32 {
    if !entitlement.usage.is_current(today) {
        return 0;
    }
    entitlement
        .usage
        .counters
        .get(&feature)
        .copied()
        .unwrap_or(0)
}

/// Decide whether `entitlement` may use `feature` `amount` times.
pub fn can_use(
    config: &AppConfig,
    entitlement: &UserEntitlement,
    feature: FeatureKey,
    amount: u32,
    today: NaiveDate,
) -> Decision {
    if entitlement.is_blocked() {
        return Decision::Denied(DenyReason::AccountBlocked);
    }

    if feature.requires_admin() {
        return if entitlement.is_admin {
            Decision::Allowed
        } else {
            Decision::Denied(DenyReason::AdminRequired)
        };
    }

    let access = match config.feature_access.get(&feature) {
        Some(access) if access.enabled => access,
        _ => return Decision::Denied(DenyReason::FeatureDisabled),
    };

    // Admins (including emulation views) bypass tier and metering checks.
    if entitlement.is_admin {
        return Decision::Allowed;
    }

    if entitlement.subscription_tier.rank() < access.min_tier.rank() {
        return Decision::Denied(DenyReason::TierTooLow {
            required: access.min_tier,
        });
    }

    if let Some(cost) = config.credit_cost(feature) {
        let required = cost.saturating_mul(amount);
        if entitlement.credits < required {
            return Decision::Denied(DenyReason::InsufficientCredits {
                required,
                available: entitlement.credits,
            });
        }
        return Decision::Allowed;
    }

    if entitlement.subscription_tier == Tier::Free {
        if let Some(limit) = config.daily_limit(feature) {
            let used = effective_usage(entitlement, feature, today);
            if used.saturating_add(amount) > limit {
                return Decision::Denied(DenyReason::DailyLimitReached { limit, used });
            }
        }
    }

    Decision::Allowed
}

/// Compute the entitlement delta for an allowed consumption.
///
/// Callers must have already passed [`can_use`] against the same snapshot;
/// this only computes state, it does not re-validate.
pub fn compute_consumption(
    config: &AppConfig,
    entitlement: &UserEntitlement,
    feature: FeatureKey,
    amount: u32,
    today: NaiveDate,
) -> ConsumptionDelta {
    if let Some(cost) = config.credit_cost(feature) {
        let spent = cost.saturating_mul(amount);
        return ConsumptionDelta::Credits {
            credits: entitlement.credits.saturating_sub(spent),
        };
    }

    if entitlement.subscription_tier == Tier::Free && config.daily_limit(feature).is_some() {
        // Rebuild from zero on a stale date; never merge stale counters.
        let mut usage = if entitlement.usage.is_current(today) {
            entitlement.usage.clone()
        } else {
            DailyUsage::zeroed(today)
        };
        let counter = usage.counters.entry(feature).or_insert(0);
        *counter = counter.saturating_add(amount);
        return ConsumptionDelta::Usage { usage };
    }

    ConsumptionDelta::NoChange
}
