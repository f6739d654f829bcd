//! Assessment record store
//!
//! Owns the lifecycle of one [`AssessmentRecord`] per equipment inspection
//! cycle. The store enforces structural invariants only (immutable fields,
//! monotonic escalation, write-once resolution); consensus and escalation
//! policy are applied by the engine through [`AssessmentStore::update`].
//!
//! # Usage
//!
//! ```
//! use resolution::record::{AssessmentStore, CycleKey};
//! use resolution::{Severity, SystemRecommendation};
//!
//! let store = AssessmentStore::new();
//! let key = CycleKey::new("compressor-4", "mech-17", "elec-03");
//! let created = store
//!     .create(key.clone(), SystemRecommendation::new(Severity::Monitor, 48.0, false))
//!     .unwrap();
//!
//! // A duplicate completion event returns the same open record
//! let again = store
//!     .create(key, SystemRecommendation::new(Severity::Monitor, 48.0, false))
//!     .unwrap();
//! assert_eq!(created.record.id, again.record.id);
//! ```

pub mod store;
pub mod types;

pub use store::{AssessmentStore, Created, SharedAssessmentStore, StoreSnapshot};
pub use types::{
    AssessmentRecord, CycleKey, EscalationLevel, EscalationRecord, RecordId, ResolvedBy, Role,
};
