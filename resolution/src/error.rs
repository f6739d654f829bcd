//! Resolution error types
//!
//! Every engine operation returns [`ResolutionResult`]. Errors fall into three
//! groups: validation failures the submitting actor can correct, transient
//! conditions the caller should retry, and internal failures (invariant
//! violations, IO) that indicate an integration bug.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::record::{EscalationLevel, Role};
use crate::severity::Severity;

/// Result type alias for resolution operations
pub type ResolutionResult<T> = Result<T, ResolutionError>;

// ============================================================================
// Structured Error Response
// ============================================================================

/// Transport-neutral error payload handed to callers (HTTP handlers, queues,
/// the CLI).
///
/// # Example Response
/// ```json
/// {
///   "code": "JUSTIFICATION_TOO_SHORT",
///   "message": "Justification for 'stop' must be at least 50 characters (got 12)",
///   "recovery_action": "Expand the justification to at least 50 characters and resubmit",
///   "context": { "record_id": "6f1c..." },
///   "retryable": false
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// What the caller should do next
    pub recovery_action: String,

    /// Relevant identifiers for the failed call
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Whether the same call may succeed later without changes
    #[serde(default)]
    pub retryable: bool,
}

impl StructuredError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        recovery_action: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recovery_action: recovery_action.into(),
            context: HashMap::new(),
            retryable: false,
        }
    }

    /// Add context key-value pair
    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Mark as retryable
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for StructuredError {}

/// Errors that can occur during resolution operations
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// No record with this id
    #[error("Assessment record not found: {record_id}")]
    NotFound { record_id: String },

    /// The checklist-scoring collaborator has not produced a recommendation yet
    #[error("Automated recommendation not ready for equipment {equipment_id}")]
    RecommendationNotReady { equipment_id: String },

    /// Role does not match the tier the record currently requires
    #[error("Role {role} cannot submit while escalation level is {current}")]
    TierMismatch {
        role: Role,
        required: EscalationLevel,
        current: EscalationLevel,
    },

    /// The role already submitted a different verdict
    #[error("Role {role} already submitted {existing} on record {record_id}")]
    AlreadySubmitted {
        record_id: String,
        role: Role,
        existing: Severity,
    },

    /// Justification shorter than the tier rule for the verdict
    #[error("Justification for '{verdict}' must be at least {required} characters (got {actual})")]
    JustificationTooShort {
        verdict: Severity,
        required: usize,
        actual: usize,
    },

    /// Admin decisions must carry written notes
    #[error("Role {role} must provide decision notes")]
    DecisionNotesRequired { role: Role },

    /// Record is terminal
    #[error("Assessment record {record_id} is already finalized")]
    AlreadyFinalized { record_id: String },

    /// A write would break a structural invariant of the record
    #[error("Invalid mutation of {field} on record {record_id}: {reason}")]
    InvalidMutation {
        record_id: String,
        field: &'static str,
        reason: String,
    },

    /// A per-record or index lock was poisoned by a panicking writer
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// Snapshot written by a newer schema
    #[error("Snapshot version {found} is newer than supported version {supported}")]
    SnapshotVersion { found: u32, supported: u32 },

    /// Configuration error
    #[error("Configuration error at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResolutionError {
    pub fn not_found(record_id: impl Into<String>) -> Self {
        Self::NotFound {
            record_id: record_id.into(),
        }
    }

    pub fn already_finalized(record_id: impl Into<String>) -> Self {
        Self::AlreadyFinalized {
            record_id: record_id.into(),
        }
    }

    pub fn invalid_mutation(
        record_id: impl Into<String>,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidMutation {
            record_id: record_id.into(),
            field,
            reason: reason.into(),
        }
    }

    /// Check if this error is transient and the same call may later succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RecommendationNotReady { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Whether the submitting actor can fix the request themselves
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::TierMismatch { .. }
                | Self::JustificationTooShort { .. }
                | Self::DecisionNotesRequired { .. }
        )
    }

    /// Invariant violations and infrastructure failures
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::InvalidMutation { .. }
                | Self::LockPoisoned(_)
                | Self::SnapshotVersion { .. }
                | Self::Config { .. }
                | Self::Io(_)
                | Self::Json(_)
        )
    }

    /// Machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::RecommendationNotReady { .. } => "RECOMMENDATION_NOT_READY",
            Self::TierMismatch { .. } => "TIER_MISMATCH",
            Self::AlreadySubmitted { .. } => "ALREADY_SUBMITTED",
            Self::JustificationTooShort { .. } => "JUSTIFICATION_TOO_SHORT",
            Self::DecisionNotesRequired { .. } => "DECISION_NOTES_REQUIRED",
            Self::AlreadyFinalized { .. } => "ALREADY_FINALIZED",
            Self::InvalidMutation { .. } => "INVALID_MUTATION",
            Self::LockPoisoned(_) => "LOCK_POISONED",
            Self::SnapshotVersion { .. } => "SNAPSHOT_VERSION",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// Get recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::NotFound { .. } => "Verify the record id; list open records with `pending`".to_string(),
            Self::RecommendationNotReady { .. } => {
                "Checklist scoring has not finished. Retry creation later".to_string()
            }
            Self::TierMismatch { current, .. } => match current.required_roles() {
                [] => "Record accepts no further verdicts".to_string(),
                roles => format!(
                    "Record is at the {} tier; only {} may submit",
                    current,
                    roles
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<_>>()
                        .join(" or ")
                ),
            },
            Self::AlreadySubmitted { .. } => {
                "Verdicts are permanent. Resubmit only the identical payload".to_string()
            }
            Self::JustificationTooShort { required, .. } => format!(
                "Expand the justification to at least {} characters and resubmit",
                required
            ),
            Self::DecisionNotesRequired { .. } => {
                "Record the reasoning behind the decision and resubmit".to_string()
            }
            Self::AlreadyFinalized { .. } => {
                "Record is terminal; read it with `show` for the final status".to_string()
            }
            Self::InvalidMutation { .. } | Self::LockPoisoned(_) => {
                "Internal invariant violation. Report this record id to the maintainers".to_string()
            }
            Self::SnapshotVersion { .. } => {
                "Upgrade the resolution engine before loading this snapshot".to_string()
            }
            Self::Config { .. } => "Fix the configuration file and restart".to_string(),
            Self::Io(_) => "Check the state path exists and is writable".to_string(),
            Self::Json(_) => "State file is not valid JSON; restore it from backup".to_string(),
        }
    }

    /// Convert to structured error for transport collaborators
    pub fn to_structured(&self) -> StructuredError {
        let mut structured =
            StructuredError::new(self.code(), self.to_string(), self.recovery_suggestion());

        structured = match self {
            Self::NotFound { record_id }
            | Self::AlreadyFinalized { record_id }
            | Self::InvalidMutation { record_id, .. } => {
                structured.with_context("record_id", record_id.clone())
            }
            Self::AlreadySubmitted {
                record_id, role, ..
            } => structured
                .with_context("record_id", record_id.clone())
                .with_context("role", role.to_string()),
            Self::RecommendationNotReady { equipment_id } => {
                structured.with_context("equipment_id", equipment_id.clone())
            }
            Self::TierMismatch {
                role,
                required,
                current,
            } => structured
                .with_context("role", role.to_string())
                .with_context("required_level", required.to_string())
                .with_context("current_level", current.to_string()),
            Self::JustificationTooShort {
                required, actual, ..
            } => structured
                .with_context("required", *required as u64)
                .with_context("actual", *actual as u64),
            _ => structured,
        };

        if self.is_retryable() {
            structured = structured.retryable();
        }
        structured
    }
}
