// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod app_config;
pub mod generation;
pub mod payments;
pub mod usage;

pub use app_config::AppConfigService;
pub use generation::{GenerationClient, GenerationInput, GenerationPayload};
pub use usage::{ConsumeLocks, UsageService};
