//! Escalation: deterministic state machine for authority tiers
//!
//! Routes disagreements up the authority ladder. Escalation is sticky: a
//! record never returns to a lower tier, and verdicts recorded at a lower
//! tier are kept for audit but never re-evaluated.
//!
//! # Escalation Ladder
//!
//! ```text
//! Inspector pair (mechanical + electrical)
//!     │
//!     ├─ both agree → finalize (resolved_by = agreement)
//!     ├─ verdicts differ → escalate
//!     │
//!     ▼
//! Engineer
//!     │
//!     ├─ sides with either inspector → finalize (resolved_by = engineer)
//!     ├─ matches neither (three-way split) → escalate
//!     │
//!     ▼
//! Admin
//!     │
//!     └─ any verdict → finalize (resolved_by = admin)
//!
//! The safety floor is applied at every finalization: a record flagged
//! critical by checklist scoring never commits below `stop`.
//! ```

pub mod policy;

pub use policy::{EscalationDecision, EscalationPolicy, JustificationRule};
