// SPDX-License-Identifier: MIT

//! Gated feature identifiers.
//!
//! Every meterable capability is a variant here. Config maps, usage
//! counters, and activity records are all keyed by this enum so that a
//! missing mapping is a compile error rather than a silent deny.

use serde::{Deserialize, Serialize};

/// A gated capability of the application.
///
/// Serialized with the camelCase names used in the Firestore documents,
/// e.g. `topicSearches`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureKey {
    TopicSearches,
    LessonPlans,
    QuizGeneration,
    Summarizer,
    Presentations,
    FactLists,
    LiveAssistant,
    AdminTools,
}

impl FeatureKey {
    /// All feature keys, in a stable order.
    pub const ALL: [FeatureKey; 8] = [
        FeatureKey::TopicSearches,
        FeatureKey::LessonPlans,
        FeatureKey::QuizGeneration,
        FeatureKey::Summarizer,
        FeatureKey::Presentations,
        FeatureKey::FactLists,
        FeatureKey::LiveAssistant,
        FeatureKey::AdminTools,
    ];

    /// Wire/document name of the feature.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::TopicSearches => "topicSearches",
            FeatureKey::LessonPlans => "lessonPlans",
            FeatureKey::QuizGeneration => "quizGeneration",
            FeatureKey::Summarizer => "summarizer",
            FeatureKey::Presentations => "presentations",
            FeatureKey::FactLists => "factLists",
            FeatureKey::LiveAssistant => "liveAssistant",
            FeatureKey::AdminTools => "adminTools",
        }
    }

    /// Whether this feature is restricted to admin accounts regardless of
    /// tier or config.
    pub fn requires_admin(&self) -> bool {
        matches!(self, FeatureKey::AdminTools)
    }
}

impl std::fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
