// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod activity;
pub mod app_config;
pub mod entitlement;
pub mod feature;

pub use activity::{ActivityLogRecord, PaymentProvider, PaymentRecord, ProcessedTransaction};
pub use app_config::{AppConfig, FeatureAccess, UsageLimits};
pub use entitlement::{
    AccountStatus, DailyUsage, Role, SubscriptionStatus, Tier, UserEntitlement,
};
pub use feature::FeatureKey;
