//! Audit trail projection: read-only view of how a record was decided.

use serde::{Deserialize, Serialize};

use crate::record::{AssessmentRecord, EscalationLevel, ResolvedBy};
use crate::severity::Severity;

/// Who produced a step of the trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    System,
    Mechanical,
    Electrical,
    Engineer,
    Admin,
}

impl std::fmt::Display for AuditActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Mechanical => write!(f, "mechanical"),
            Self::Electrical => write!(f, "electrical"),
            Self::Engineer => write!(f, "engineer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditStep {
    pub actor: AuditActor,
    /// Inspector id for inspector steps
    pub actor_id: Option<String>,
    /// `None` while the step is pending
    pub verdict: Option<Severity>,
    pub notes: Option<String>,
    /// This step moved the record to its current escalation level. At the
    /// engineer tier both inspector steps are marked.
    pub produced_escalation: bool,
}

impl AuditStep {
    pub fn verdict_label(&self) -> String {
        self.verdict
            .map_or_else(|| "pending".to_string(), |v| v.to_string())
    }
}

/// Terminal line of the trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResolution {
    pub final_status: Severity,
    pub resolved_by: ResolvedBy,
    pub safety_floor_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub record_id: String,
    pub escalation_level: EscalationLevel,
    pub steps: Vec<AuditStep>,
    pub resolution: Option<AuditResolution>,
}

/// Project the ordered trail `System → Mechanical → Electrical → [Engineer] → [Admin]`.
pub fn project(record: &AssessmentRecord) -> AuditTrail {
    let level = record.escalation_level;
    // The disagreeing pair produced the engineer tier, so both inspector
    // steps carry the mark regardless of submission order
    let pair_escalated = level == EscalationLevel::Engineer;
    let mut steps = vec![
        AuditStep {
            actor: AuditActor::System,
            actor_id: None,
            verdict: Some(record.system_verdict),
            notes: Some(format!(
                "urgency={:.1} critical={}",
                record.system_urgency_score, record.system_has_critical
            )),
            produced_escalation: false,
        },
        AuditStep {
            actor: AuditActor::Mechanical,
            actor_id: Some(record.mechanical_inspector_id.clone()),
            verdict: record.mech_verdict,
            notes: record.mech_justification.clone(),
            produced_escalation: pair_escalated,
        },
        AuditStep {
            actor: AuditActor::Electrical,
            actor_id: Some(record.electrical_inspector_id.clone()),
            verdict: record.elec_verdict,
            notes: record.elec_justification.clone(),
            produced_escalation: pair_escalated,
        },
    ];

    if level >= EscalationLevel::Engineer {
        steps.push(AuditStep {
            actor: AuditActor::Engineer,
            actor_id: None,
            verdict: record.engineer_verdict,
            notes: record.engineer_notes.clone(),
            produced_escalation: level == EscalationLevel::Admin,
        });
    }
    if level >= EscalationLevel::Admin {
        steps.push(AuditStep {
            actor: AuditActor::Admin,
            actor_id: None,
            verdict: record.admin_verdict,
            notes: record.admin_decision_notes.clone(),
            produced_escalation: false,
        });
    }

    let resolution = match (record.final_status, record.resolved_by) {
        (Some(final_status), Some(resolved_by)) => Some(AuditResolution {
            final_status,
            resolved_by,
            safety_floor_applied: record.safety_floor_applied,
        }),
        _ => None,
    };

    AuditTrail {
        record_id: record.id.clone(),
        escalation_level: level,
        steps,
        resolution,
    }
}
