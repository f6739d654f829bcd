//! Event types for assessment resolution
//!
//! Published on the event bus after each committed state change so that
//! notification and dashboard collaborators can react.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{EscalationLevel, RecordId, ResolvedBy, Role};
use crate::severity::Severity;

/// All assessment lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssessmentEvent {
    /// A record was created for a completed inspection cycle
    RecordCreated {
        record_id: RecordId,
        equipment_id: String,
        system_verdict: Severity,
        system_has_critical: bool,
        timestamp: DateTime<Utc>,
    },

    /// A verdict was accepted
    VerdictSubmitted {
        record_id: RecordId,
        role: Role,
        verdict: Severity,
        timestamp: DateTime<Utc>,
    },

    /// A disagreement moved the record up one tier
    Escalated {
        record_id: RecordId,
        from: EscalationLevel,
        to: EscalationLevel,
        required_actors: Vec<Role>,
        timestamp: DateTime<Utc>,
    },

    /// The record reached its terminal state
    Finalized {
        record_id: RecordId,
        equipment_id: String,
        final_status: Severity,
        resolved_by: ResolvedBy,
        safety_floor_applied: bool,
        timestamp: DateTime<Utc>,
    },

    /// A submission was refused
    SubmissionRejected {
        record_id: RecordId,
        role: Role,
        code: String,
        timestamp: DateTime<Utc>,
    },
}

impl AssessmentEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::RecordCreated { timestamp, .. }
            | Self::VerdictSubmitted { timestamp, .. }
            | Self::Escalated { timestamp, .. }
            | Self::Finalized { timestamp, .. }
            | Self::SubmissionRejected { timestamp, .. } => *timestamp,
        }
    }

    /// Event type name, matching the serialized tag
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RecordCreated { .. } => "record_created",
            Self::VerdictSubmitted { .. } => "verdict_submitted",
            Self::Escalated { .. } => "escalated",
            Self::Finalized { .. } => "finalized",
            Self::SubmissionRejected { .. } => "submission_rejected",
        }
    }

    pub fn record_id(&self) -> &str {
        match self {
            Self::RecordCreated { record_id, .. }
            | Self::VerdictSubmitted { record_id, .. }
            | Self::Escalated { record_id, .. }
            | Self::Finalized { record_id, .. }
            | Self::SubmissionRejected { record_id, .. } => record_id,
        }
    }
}
