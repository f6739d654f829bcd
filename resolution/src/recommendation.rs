//! Automated severity recommendation supplied by checklist scoring.
//!
//! The scoring heuristics live outside this crate. The engine only asks a
//! [`RecommendationSource`] whether a recommendation exists for a cycle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::record::CycleKey;
use crate::severity::Severity;

/// Opaque output of the checklist-scoring step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemRecommendation {
    pub verdict: Severity,
    pub urgency_score: f64,
    pub has_critical: bool,
}

impl SystemRecommendation {
    pub fn new(verdict: Severity, urgency_score: f64, has_critical: bool) -> Self {
        Self {
            verdict,
            urgency_score,
            has_critical,
        }
    }
}

/// Collaborator that knows whether both checklists have been scored.
///
/// Returning `None` means scoring has not finished; the engine reports
/// `RecommendationNotReady` and the caller retries later.
pub trait RecommendationSource: Send + Sync {
    fn recommendation(&self, key: &CycleKey) -> Option<SystemRecommendation>;
}

/// In-memory source fed by the scoring step (and by tests).
#[derive(Debug, Default)]
pub struct StaticRecommendations {
    entries: RwLock<HashMap<CycleKey, SystemRecommendation>>,
}

impl StaticRecommendations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the recommendation for a cycle, replacing any earlier one
    pub fn publish(&self, key: CycleKey, recommendation: SystemRecommendation) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, recommendation);
        }
    }
}

impl RecommendationSource for StaticRecommendations {
    fn recommendation(&self, key: &CycleKey) -> Option<SystemRecommendation> {
        self.entries.read().ok()?.get(key).copied()
    }
}

/// A source that already holds the single answer, used by the CLI where the
/// recommendation arrives as command-line flags.
impl RecommendationSource for Option<SystemRecommendation> {
    fn recommendation(&self, _key: &CycleKey) -> Option<SystemRecommendation> {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_source_lookup() {
        let source = StaticRecommendations::new();
        let key = CycleKey::new("press-3", "m-1", "e-1");
        assert!(source.recommendation(&key).is_none());

        source.publish(
            key.clone(),
            SystemRecommendation::new(Severity::Stop, 91.5, true),
        );
        let rec = source.recommendation(&key).unwrap();
        assert_eq!(rec.verdict, Severity::Stop);
        assert!(rec.has_critical);
    }

    #[test]
    fn test_option_source() {
        let key = CycleKey::new("press-3", "m-1", "e-1");
        let none: Option<SystemRecommendation> = None;
        assert!(none.recommendation(&key).is_none());

        let some = Some(SystemRecommendation::new(Severity::Monitor, 10.0, false));
        assert_eq!(some.recommendation(&key).unwrap().verdict, Severity::Monitor);
    }
}
