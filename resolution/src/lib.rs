//! Final Assessment Resolution Engine
//!
//! Reconciles the automated checklist recommendation with the verdicts of two
//! field inspectors into one final equipment status, escalating to an
//! engineer and then an administrator when humans disagree.
//!
//! # Modules
//!
//! ## Core
//! - `severity`: the ordered verdict scale and the critical safety floor
//! - `record`: assessment records, cycle keys and the concurrent store
//! - `consensus`: pure evaluation of a record into a consensus outcome
//! - `escalation`: tier gating, justification rule and promotion
//! - `finalization`: terminal commit with the safety floor
//! - `audit`: derived, ordered audit trail
//! - `engine`: the caller-facing operations
//!
//! ## Ambient
//! - `config`: defaults, TOML file and `RESOLUTION_*` environment overrides
//! - `error`: typed errors and their structured transport form
//! - `events`: broadcast bus for lifecycle events
//! - `recommendation`: the checklist-scoring seam
//!
//! # Usage
//!
//! ```bash
//! # Open a record for a completed inspection cycle
//! resolution create pump-7 mech-12 elec-4 --system-verdict monitor --urgency-score 42.5
//!
//! # Submit an inspector verdict
//! resolution submit <record-id> electrical_inspector monitor \
//!     --justification "Vibration on the drive end bearing above baseline"
//!
//! # Engineer queue
//! resolution pending engineer
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod audit;
pub mod config;
pub mod consensus;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod events;
pub mod finalization;
pub mod recommendation;
pub mod record;
pub mod severity;

// Re-export the engine surface
pub use engine::{RecordView, ResolutionEngine, SubmissionReceipt};

// Re-export core types
pub use consensus::{ConsensusOutcome, Resolution};
pub use record::{
    AssessmentRecord, AssessmentStore, CycleKey, EscalationLevel, EscalationRecord, RecordId,
    ResolvedBy, Role, SharedAssessmentStore, StoreSnapshot,
};
pub use severity::{ParseSeverityError, Severity};

// Re-export escalation and finalization types
pub use escalation::{EscalationDecision, EscalationPolicy, JustificationRule};
pub use finalization::{Finalization, FinalizationService};

// Re-export audit types
pub use audit::{AuditActor, AuditResolution, AuditStep, AuditTrail};

// Re-export ambient types
pub use config::EngineConfig;
pub use error::{ResolutionError, ResolutionResult, StructuredError};
pub use events::{AssessmentEvent, EventBus, EventFilter, SharedEventBus};
pub use recommendation::{RecommendationSource, StaticRecommendations, SystemRecommendation};
