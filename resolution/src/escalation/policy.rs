//! Escalation Policy: tier gating, justification rule, promotion
//!
//! Consumes consensus outcomes and moves records up the authority ladder.
//! All decisions are deterministic.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consensus::ConsensusOutcome;
use crate::error::{ResolutionError, ResolutionResult};
use crate::record::{AssessmentRecord, EscalationLevel, EscalationRecord, Role};
use crate::severity::Severity;

/// Minimum justification length per verdict, identical at every tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JustificationRule {
    /// Characters required for `monitor`
    pub monitor_min_chars: usize,
    /// Characters required for `stop`
    pub stop_min_chars: usize,
}

impl Default for JustificationRule {
    fn default() -> Self {
        Self {
            monitor_min_chars: 30,
            stop_min_chars: 50,
        }
    }
}

impl JustificationRule {
    pub fn required_for(&self, verdict: Severity) -> usize {
        match verdict {
            Severity::Operational => 0,
            Severity::Monitor => self.monitor_min_chars,
            Severity::Stop => self.stop_min_chars,
        }
    }

    /// Length is counted in characters of the trimmed text
    pub fn check(&self, verdict: Severity, justification: Option<&str>) -> ResolutionResult<()> {
        let required = self.required_for(verdict);
        let actual = justification.map_or(0, |text| text.trim().chars().count());
        if actual < required {
            return Err(ResolutionError::JustificationTooShort {
                verdict,
                required,
                actual,
            });
        }
        Ok(())
    }
}

/// Result of promoting a record one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDecision {
    pub from: EscalationLevel,
    pub to: EscalationLevel,
    /// Actors whose verdict is now required
    pub required_actors: Vec<Role>,
}

/// The Escalation Policy: one-directional tier state machine
#[derive(Debug, Clone, Default)]
pub struct EscalationPolicy {
    rule: JustificationRule,
}

impl EscalationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(rule: JustificationRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> &JustificationRule {
        &self.rule
    }

    /// Reject roles that do not belong to the record's current tier
    pub fn authorize(&self, record: &AssessmentRecord, role: Role) -> ResolutionResult<()> {
        let required = role.required_level();
        if required != record.escalation_level {
            return Err(ResolutionError::TierMismatch {
                role,
                required,
                current: record.escalation_level,
            });
        }
        Ok(())
    }

    /// Apply the justification rule before a verdict is accepted.
    ///
    /// The rule is the same at every tier. Admins must also leave decision
    /// notes, whatever the verdict.
    pub fn validate(
        &self,
        role: Role,
        verdict: Severity,
        justification: Option<&str>,
    ) -> ResolutionResult<()> {
        let has_notes = justification.is_some_and(|text| !text.trim().is_empty());
        if role == Role::Admin && !has_notes {
            return Err(ResolutionError::DecisionNotesRequired { role });
        }
        self.rule.check(verdict, justification)
    }

    /// Actors whose verdict the record is waiting on
    pub fn required_actors(&self, record: &AssessmentRecord) -> Vec<Role> {
        if record.is_finalized() {
            return Vec::new();
        }
        match record.escalation_level {
            EscalationLevel::None => record.missing_inspectors(),
            level => level.required_roles().to_vec(),
        }
    }

    /// Promote the record by exactly one tier in response to a disagreement.
    ///
    /// Fails with `InvalidMutation` if the outcome is not a disagreement or
    /// does not target the tier directly above the current one.
    pub fn promote(
        &self,
        record: &mut AssessmentRecord,
        outcome: &ConsensusOutcome,
    ) -> ResolutionResult<EscalationDecision> {
        let ConsensusOutcome::Disagreement {
            escalate_to,
            conflicting,
        } = outcome
        else {
            return Err(ResolutionError::invalid_mutation(
                &record.id,
                "escalation_level",
                format!("cannot escalate on outcome {}", outcome),
            ));
        };

        let from = record.escalation_level;
        if from.next() != Some(*escalate_to) {
            return Err(ResolutionError::invalid_mutation(
                &record.id,
                "escalation_level",
                format!("cannot move from {} to {}", from, escalate_to),
            ));
        }

        record.escalation_level = *escalate_to;
        record.escalation_history.push(EscalationRecord {
            from,
            to: *escalate_to,
            conflicting: conflicting.clone(),
            timestamp: Utc::now(),
        });

        info!(
            record_id = %record.id,
            from = %from,
            to = %escalate_to,
            "Escalated assessment"
        );

        Ok(EscalationDecision {
            from,
            to: *escalate_to,
            required_actors: self.required_actors(record),
        })
    }
}
