// SPDX-License-Identifier: MIT

//! Per-user entitlement document: tier, credits, daily usage, role.

use crate::models::FeatureKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Subscription tier, ordered `free < silver < gold`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Silver,
    Gold,
}

impl Tier {
    /// Numeric rank used for minimum-tier comparisons.
    pub fn rank(&self) -> u8 {
        match self {
            Tier::Free => 0,
            Tier::Silver => 1,
            Tier::Gold => 2,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Free => write!(f, "free"),
            Tier::Silver => write!(f, "silver"),
            Tier::Gold => write!(f, "gold"),
        }
    }
}

/// Billing status of the subscription, mutated only by webhooks and admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    #[default]
    Inactive,
    Canceled,
    PastDue,
}

/// Whether the account is allowed to use the service at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Blocked,
}

/// Selected user role. Admins never persist a role; they emulate one
/// per-session instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

/// Per-day usage counters.
///
/// Counters are only meaningful when `date` is today; a stale date reads
/// as all-zero (lazy rollover, see the policy module).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
    /// ISO calendar date ("2026-08-30") the counters belong to.
    pub date: String,
    #[serde(default)]
    pub counters: HashMap<FeatureKey, u32>,
}

impl DailyUsage {
    /// Fresh zeroed counters stamped with the given date.
    pub fn zeroed(date: NaiveDate) -> Self {
        Self {
            date: date.to_string(),
            counters: HashMap::new(),
        }
    }

    /// Whether the stored counters are valid for `today`.
    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.date == today.to_string()
    }
}

/// Entitlement document stored at `users/{uid}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntitlement {
    /// Identity-provider user id (also the document id).
    pub uid: String,
    pub email: Option<String>,
    #[serde(default)]
    pub subscription_tier: Tier,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    /// Consumable credits; clamped at zero, never negative.
    #[serde(default)]
    pub credits: u32,
    pub usage: DailyUsage,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub account_status: AccountStatus,
    /// When the user first signed in (ISO 8601).
    pub created_at: String,
    /// Last entitlement mutation (ISO 8601).
    pub updated_at: String,
}

impl UserEntitlement {
    /// New entitlement created on first sign-in: free tier, signup bonus
    /// credits, usage zeroed at today's date.
    pub fn new_signup(
        uid: &str,
        email: Option<String>,
        signup_bonus_credits: u32,
        today: NaiveDate,
        now: &str,
    ) -> Self {
        Self {
            uid: uid.to_string(),
            email,
            subscription_tier: Tier::Free,
            subscription_status: SubscriptionStatus::Inactive,
            credits: signup_bonus_credits,
            usage: DailyUsage::zeroed(today),
            role: None,
            is_admin: false,
            account_status: AccountStatus::Active,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Whether the account must be treated as unauthenticated.
    pub fn is_blocked(&self) -> bool {
        self.account_status == AccountStatus::Blocked
    }
}
