// SPDX-License-Identifier: MIT

//! Global application configuration document (`config/app`).
//!
//! Owned by admins, read by every request that makes an entitlement
//! decision. A missing document is fail-closed: nothing is usable until
//! the config loads.

use crate::models::{FeatureKey, Tier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Access gate for a single feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAccess {
    pub enabled: bool,
    #[serde(default)]
    pub min_tier: Tier,
}

/// Usage metering tables.
///
/// A feature present in `credit_costs` is credit-metered; otherwise a
/// free-tier feature present in `free_tier_daily_limits` is count-metered;
/// otherwise it is unlimited once the tier gate passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLimits {
    #[serde(default)]
    pub free_tier_daily_limits: HashMap<FeatureKey, u32>,
    #[serde(default)]
    pub credit_costs: HashMap<FeatureKey, u32>,
}

/// Singleton config document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub feature_access: HashMap<FeatureKey, FeatureAccess>,
    #[serde(default)]
    pub usage_limits: UsageLimits,
    /// Logical model name -> concrete model id, e.g. "fast" -> "gemini-2.0-flash".
    /// Configuration only; not part of entitlement decisions.
    #[serde(default)]
    pub ai_model_selection: HashMap<String, String>,
}

impl AppConfig {
    /// Credit cost of a feature, if it is credit-metered.
    pub fn credit_cost(&self, feature: FeatureKey) -> Option<u32> {
        self.usage_limits.credit_costs.get(&feature).copied()
    }

    /// Free-tier daily cap of a feature, if it is count-metered.
    pub fn daily_limit(&self, feature: FeatureKey) -> Option<u32> {
        self.usage_limits
            .free_tier_daily_limits
            .get(&feature)
            .copied()
    }

    /// Resolve a logical model name to its concrete model id.
    pub fn model_id(&self, logical_name: &str) -> Option<&str> {
        self.ai_model_selection
            .get(logical_name)
            .map(String::as_str)
    }
}
