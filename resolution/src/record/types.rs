//! Core types for assessment records
//!
//! One [`AssessmentRecord`] exists per equipment inspection cycle. The types
//! here carry data and structural invariants only; consensus and escalation
//! policy live in their own modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ResolutionError, ResolutionResult};
use crate::recommendation::SystemRecommendation;
use crate::severity::Severity;

/// Unique identifier for assessment records
pub type RecordId = String;

/// Authority tier a record has been escalated to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    /// Inspector pair decides
    None,
    /// Inspectors disagreed; an engineer decides
    Engineer,
    /// Engineer split three ways; an administrator decides
    Admin,
}

impl EscalationLevel {
    /// Roles allowed to submit at this tier
    pub fn required_roles(&self) -> &'static [Role] {
        match self {
            Self::None => &[Role::MechanicalInspector, Role::ElectricalInspector],
            Self::Engineer => &[Role::Engineer],
            Self::Admin => &[Role::Admin],
        }
    }

    /// The tier above this one, if any
    pub fn next(&self) -> Option<EscalationLevel> {
        match self {
            Self::None => Some(Self::Engineer),
            Self::Engineer => Some(Self::Admin),
            Self::Admin => None,
        }
    }

    /// Queue name used by dashboards (`inspector`, `engineer`, `admin`)
    pub fn queue_name(&self) -> &'static str {
        match self {
            Self::None => "inspector",
            Self::Engineer => "engineer",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Engineer => write!(f, "engineer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for EscalationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "inspector" => Ok(Self::None),
            "engineer" => Ok(Self::Engineer),
            "admin" => Ok(Self::Admin),
            other => Err(format!(
                "unknown tier '{}' (expected inspector, engineer or admin)",
                other
            )),
        }
    }
}

/// Actor submitting a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    MechanicalInspector,
    ElectricalInspector,
    Engineer,
    Admin,
}

impl Role {
    /// The only escalation level at which this role may submit
    pub fn required_level(&self) -> EscalationLevel {
        match self {
            Self::MechanicalInspector | Self::ElectricalInspector => EscalationLevel::None,
            Self::Engineer => EscalationLevel::Engineer,
            Self::Admin => EscalationLevel::Admin,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MechanicalInspector => write!(f, "mechanical_inspector"),
            Self::ElectricalInspector => write!(f, "electrical_inspector"),
            Self::Engineer => write!(f, "engineer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mechanical_inspector" | "mechanical" => Ok(Self::MechanicalInspector),
            "electrical_inspector" | "electrical" => Ok(Self::ElectricalInspector),
            "engineer" => Ok(Self::Engineer),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Mechanism that produced the final verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    /// Both inspectors submitted the same verdict
    Agreement,
    /// Resolved by the critical-flag rule alone
    SafetyRule,
    /// Engineer sided with one of the inspectors
    Engineer,
    /// Administrator decision
    Admin,
}

impl std::fmt::Display for ResolvedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agreement => write!(f, "agreement"),
            Self::SafetyRule => write!(f, "safety_rule"),
            Self::Engineer => write!(f, "engineer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Record of a tier promotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub from: EscalationLevel,
    pub to: EscalationLevel,
    /// Verdicts that disagreed, in submission order
    pub conflicting: Vec<Severity>,
    pub timestamp: DateTime<Utc>,
}

/// Identity of one open inspection cycle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleKey {
    pub equipment_id: String,
    pub mechanical_inspector_id: String,
    pub electrical_inspector_id: String,
}

impl CycleKey {
    pub fn new(
        equipment_id: impl Into<String>,
        mechanical_inspector_id: impl Into<String>,
        electrical_inspector_id: impl Into<String>,
    ) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            mechanical_inspector_id: mechanical_inspector_id.into(),
            electrical_inspector_id: electrical_inspector_id.into(),
        }
    }
}

/// Final assessment for one equipment inspection cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: RecordId,
    pub equipment_id: String,
    pub mechanical_inspector_id: String,
    pub electrical_inspector_id: String,

    // Automated recommendation, fixed at creation
    pub system_verdict: Severity,
    pub system_urgency_score: f64,
    pub system_has_critical: bool,

    pub mech_verdict: Option<Severity>,
    pub mech_justification: Option<String>,
    pub elec_verdict: Option<Severity>,
    pub elec_justification: Option<String>,

    pub escalation_level: EscalationLevel,
    #[serde(default)]
    pub escalation_history: Vec<EscalationRecord>,

    pub engineer_verdict: Option<Severity>,
    pub engineer_notes: Option<String>,

    pub admin_verdict: Option<Severity>,
    pub admin_decision_notes: Option<String>,

    pub final_status: Option<Severity>,
    pub resolved_by: Option<ResolvedBy>,
    pub finalized_at: Option<DateTime<Utc>>,
    /// Set when the critical flag raised the committed status
    #[serde(default)]
    pub safety_floor_applied: bool,

    pub created_at: DateTime<Utc>,
}

impl AssessmentRecord {
    /// Create a fresh, unassessed record for a cycle
    pub fn new(key: &CycleKey, recommendation: &SystemRecommendation) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            equipment_id: key.equipment_id.clone(),
            mechanical_inspector_id: key.mechanical_inspector_id.clone(),
            electrical_inspector_id: key.electrical_inspector_id.clone(),
            system_verdict: recommendation.verdict,
            system_urgency_score: recommendation.urgency_score,
            system_has_critical: recommendation.has_critical,
            mech_verdict: None,
            mech_justification: None,
            elec_verdict: None,
            elec_justification: None,
            escalation_level: EscalationLevel::None,
            escalation_history: Vec::new(),
            engineer_verdict: None,
            engineer_notes: None,
            admin_verdict: None,
            admin_decision_notes: None,
            final_status: None,
            resolved_by: None,
            finalized_at: None,
            safety_floor_applied: false,
            created_at: Utc::now(),
        }
    }

    pub fn cycle_key(&self) -> CycleKey {
        CycleKey::new(
            self.equipment_id.clone(),
            self.mechanical_inspector_id.clone(),
            self.electrical_inspector_id.clone(),
        )
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    /// Verdict and justification a role has already submitted
    pub fn submission(&self, role: Role) -> Option<(Severity, Option<&str>)> {
        let (verdict, text) = match role {
            Role::MechanicalInspector => (self.mech_verdict, &self.mech_justification),
            Role::ElectricalInspector => (self.elec_verdict, &self.elec_justification),
            Role::Engineer => (self.engineer_verdict, &self.engineer_notes),
            Role::Admin => (self.admin_verdict, &self.admin_decision_notes),
        };
        verdict.map(|v| (v, text.as_deref()))
    }

    /// Store a verdict for a role. Tier and duplicate checks happen upstream.
    pub(crate) fn set_submission(
        &mut self,
        role: Role,
        verdict: Severity,
        justification: Option<String>,
    ) {
        match role {
            Role::MechanicalInspector => {
                self.mech_verdict = Some(verdict);
                self.mech_justification = justification;
            }
            Role::ElectricalInspector => {
                self.elec_verdict = Some(verdict);
                self.elec_justification = justification;
            }
            Role::Engineer => {
                self.engineer_verdict = Some(verdict);
                self.engineer_notes = justification;
            }
            Role::Admin => {
                self.admin_verdict = Some(verdict);
                self.admin_decision_notes = justification;
            }
        }
    }

    /// Inspector roles that have not submitted yet
    pub fn missing_inspectors(&self) -> Vec<Role> {
        let mut missing = Vec::new();
        if self.mech_verdict.is_none() {
            missing.push(Role::MechanicalInspector);
        }
        if self.elec_verdict.is_none() {
            missing.push(Role::ElectricalInspector);
        }
        missing
    }

    /// Validate that `next` is a legal successor of this record.
    ///
    /// Checks structural invariants only: immutable fields, write-once
    /// resolution, monotonic escalation, tier-gated fields, the safety floor
    /// and no writes after finalization.
    pub fn check_transition(&self, next: &AssessmentRecord) -> ResolutionResult<()> {
        let fail = |field: &'static str, reason: &str| -> ResolutionResult<()> {
            Err(ResolutionError::invalid_mutation(&self.id, field, reason))
        };

        if self.is_finalized() && self != next {
            return fail("finalized_at", "record is terminal");
        }

        if self.id != next.id
            || self.equipment_id != next.equipment_id
            || self.mechanical_inspector_id != next.mechanical_inspector_id
            || self.electrical_inspector_id != next.electrical_inspector_id
            || self.created_at != next.created_at
        {
            return fail("id", "identity is immutable");
        }

        if self.system_verdict != next.system_verdict
            || self.system_urgency_score.to_bits() != next.system_urgency_score.to_bits()
            || self.system_has_critical != next.system_has_critical
        {
            return fail("system_verdict", "automated recommendation is immutable");
        }

        if !write_once(&self.mech_verdict, &next.mech_verdict)
            || !write_once(&self.mech_justification, &next.mech_justification)
        {
            return fail("mech_verdict", "inspector verdict is immutable once set");
        }
        if !write_once(&self.elec_verdict, &next.elec_verdict)
            || !write_once(&self.elec_justification, &next.elec_justification)
        {
            return fail("elec_verdict", "inspector verdict is immutable once set");
        }
        if !write_once(&self.engineer_verdict, &next.engineer_verdict) {
            return fail("engineer_verdict", "engineer verdict is immutable once set");
        }
        if !write_once(&self.admin_verdict, &next.admin_verdict) {
            return fail("admin_verdict", "admin verdict is immutable once set");
        }

        if next.escalation_level < self.escalation_level {
            return fail("escalation_level", "escalation level cannot decrease");
        }
        if !next.escalation_history.starts_with(&self.escalation_history) {
            return fail("escalation_history", "escalation history is append-only");
        }

        if next.engineer_verdict.is_some() && next.escalation_level < EscalationLevel::Engineer {
            return fail("engineer_verdict", "engineer tier not reached");
        }
        if (next.admin_verdict.is_some() || next.admin_decision_notes.is_some())
            && next.escalation_level < EscalationLevel::Admin
        {
            return fail("admin_decision_notes", "admin tier not reached");
        }

        let resolution_fields = [
            next.final_status.is_some(),
            next.resolved_by.is_some(),
            next.finalized_at.is_some(),
        ];
        if resolution_fields.iter().any(|set| *set) && !resolution_fields.iter().all(|set| *set) {
            return fail("final_status", "resolution fields must be set together");
        }

        if next.system_has_critical
            && next.final_status.is_some_and(|status| status < Severity::Stop)
        {
            return fail("final_status", "critical record cannot finalize below stop");
        }

        Ok(())
    }

    /// Get a summary for logging
    pub fn summary(&self) -> String {
        format!(
            "record={} equipment={} level={} mech={} elec={} final={}",
            self.id,
            self.equipment_id,
            self.escalation_level,
            display_opt(self.mech_verdict),
            display_opt(self.elec_verdict),
            display_opt(self.final_status),
        )
    }
}

fn write_once<T: PartialEq>(before: &Option<T>, after: &Option<T>) -> bool {
    match before {
        Some(_) => before == after,
        None => true,
    }
}

fn display_opt(verdict: Option<Severity>) -> String {
    verdict.map_or_else(|| "pending".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AssessmentRecord {
        AssessmentRecord::new(
            &CycleKey::new("pump-1", "mech-1", "elec-1"),
            &SystemRecommendation::new(Severity::Monitor, 42.0, false),
        )
    }

    #[test]
    fn test_new_record_is_open() {
        let rec = record();
        assert!(!rec.is_finalized());
        assert_eq!(rec.escalation_level, EscalationLevel::None);
        assert_eq!(
            rec.missing_inspectors(),
            vec![Role::MechanicalInspector, Role::ElectricalInspector]
        );
    }

    #[test]
    fn test_level_ordering_and_next() {
        assert!(EscalationLevel::None < EscalationLevel::Engineer);
        assert!(EscalationLevel::Engineer < EscalationLevel::Admin);
        assert_eq!(EscalationLevel::None.next(), Some(EscalationLevel::Engineer));
        assert_eq!(EscalationLevel::Admin.next(), None);
        assert_eq!("inspector".parse::<EscalationLevel>().unwrap(), EscalationLevel::None);
    }

    #[test]
    fn test_inspector_verdict_is_write_once() {
        let mut before = record();
        before.set_submission(Role::MechanicalInspector, Severity::Operational, None);

        let mut next = before.clone();
        next.mech_verdict = Some(Severity::Stop);
        let err = before.check_transition(&next).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::InvalidMutation {
                field: "mech_verdict",
                ..
            }
        ));
    }

    #[test]
    fn test_escalation_cannot_decrease() {
        let mut before = record();
        before.escalation_level = EscalationLevel::Engineer;
        let mut next = before.clone();
        next.escalation_level = EscalationLevel::None;
        assert!(before.check_transition(&next).is_err());
    }

    #[test]
    fn test_engineer_verdict_requires_tier() {
        let before = record();
        let mut next = before.clone();
        next.engineer_verdict = Some(Severity::Stop);
        assert!(before.check_transition(&next).is_err());
    }

    #[test]
    fn test_resolution_fields_set_together() {
        let before = record();
        let mut next = before.clone();
        next.final_status = Some(Severity::Monitor);
        assert!(before.check_transition(&next).is_err());

        next.resolved_by = Some(ResolvedBy::Agreement);
        next.finalized_at = Some(Utc::now());
        assert!(before.check_transition(&next).is_ok());
    }

    #[test]
    fn test_finalized_record_rejects_writes() {
        let mut before = record();
        before.final_status = Some(Severity::Monitor);
        before.resolved_by = Some(ResolvedBy::Agreement);
        before.finalized_at = Some(Utc::now());

        assert!(before.check_transition(&before.clone()).is_ok());

        let mut next = before.clone();
        next.engineer_notes = Some("late note".to_string());
        assert!(before.check_transition(&next).is_err());
    }

    #[test]
    fn test_critical_record_cannot_finalize_below_stop() {
        let mut before = record();
        before.system_has_critical = true;
        let mut next = before.clone();
        next.final_status = Some(Severity::Operational);
        next.resolved_by = Some(ResolvedBy::Agreement);
        next.finalized_at = Some(Utc::now());
        assert!(before.check_transition(&next).is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("engineer".parse::<Role>().unwrap(), Role::Engineer);
        assert_eq!(
            "mechanical_inspector".parse::<Role>().unwrap(),
            Role::MechanicalInspector
        );
        assert!("visitor".parse::<Role>().is_err());
        assert_eq!(Role::Admin.required_level(), EscalationLevel::Admin);
    }
}
