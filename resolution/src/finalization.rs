//! Finalization: the single committing operation of the engine.
//!
//! Applies the safety floor, stamps provenance and time, and makes the
//! record terminal. Finalizing a terminal record is a no-op.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::consensus::Resolution;
use crate::error::ResolutionResult;
use crate::record::{AssessmentRecord, SharedAssessmentStore};
use crate::severity::Severity;

/// Whether a finalize call changed the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
    /// Terminal fields were written by this call
    Committed,
    /// The record was already terminal; nothing changed
    AlreadyFinal,
}

/// Set the terminal fields on a record in place.
///
/// Must run inside the per-record critical section (the store's `update`
/// closure); [`FinalizationService::finalize`] does that for standalone use.
pub fn apply(
    record: &mut AssessmentRecord,
    resolution: Resolution,
    now: DateTime<Utc>,
) -> Finalization {
    if record.is_finalized() {
        debug!(record_id = %record.id, "Finalize on terminal record ignored");
        return Finalization::AlreadyFinal;
    }

    let final_status = Severity::apply_safety_floor(resolution.verdict, record.system_has_critical);
    let floor_applied = final_status != resolution.verdict;
    if floor_applied {
        warn!(
            record_id = %record.id,
            candidate = %resolution.verdict,
            committed = %final_status,
            resolved_by = %resolution.resolved_by,
            "Safety floor raised final status on critical record"
        );
    }

    record.final_status = Some(final_status);
    record.resolved_by = Some(resolution.resolved_by);
    record.finalized_at = Some(now);
    record.safety_floor_applied = floor_applied;

    info!(
        record_id = %record.id,
        equipment_id = %record.equipment_id,
        final_status = %final_status,
        resolved_by = %resolution.resolved_by,
        "Assessment finalized"
    );
    Finalization::Committed
}

/// Commits resolutions through the store's per-record lock
#[derive(Clone)]
pub struct FinalizationService {
    store: SharedAssessmentStore,
}

impl FinalizationService {
    pub fn new(store: SharedAssessmentStore) -> Self {
        Self { store }
    }

    /// Finalize `record_id` with `resolution`, returning the terminal record.
    ///
    /// Idempotent: a second call returns the existing terminal state
    /// unchanged, whatever resolution it carries.
    pub fn finalize(
        &self,
        record_id: &str,
        resolution: Resolution,
    ) -> ResolutionResult<AssessmentRecord> {
        let (_, record) = self
            .store
            .update(record_id, |record| Ok(apply(record, resolution, Utc::now())))?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AssessmentStore, CycleKey, ResolvedBy};
    use crate::recommendation::SystemRecommendation;

    fn service_with_record(critical: bool) -> (FinalizationService, String) {
        let store = AssessmentStore::new().shared();
        let record = store
            .create(
                CycleKey::new("lift-2", "m", "e"),
                SystemRecommendation::new(Severity::Operational, 12.0, critical),
            )
            .unwrap()
            .record;
        (FinalizationService::new(store), record.id)
    }

    #[test]
    fn test_finalize_sets_all_terminal_fields() {
        let (service, id) = service_with_record(false);
        let record = service
            .finalize(
                &id,
                Resolution {
                    verdict: Severity::Monitor,
                    resolved_by: ResolvedBy::Engineer,
                },
            )
            .unwrap();
        assert_eq!(record.final_status, Some(Severity::Monitor));
        assert_eq!(record.resolved_by, Some(ResolvedBy::Engineer));
        assert!(record.finalized_at.is_some());
        assert!(!record.safety_floor_applied);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let (service, id) = service_with_record(false);
        let resolution = Resolution {
            verdict: Severity::Operational,
            resolved_by: ResolvedBy::Agreement,
        };
        let first = service.finalize(&id, resolution).unwrap();
        let second = service.finalize(&id, resolution).unwrap();
        assert_eq!(first.final_status, second.final_status);
        assert_eq!(first.resolved_by, second.resolved_by);
        assert_eq!(first.finalized_at, second.finalized_at);

        // A conflicting retry cannot rewrite the terminal state either
        let third = service
            .finalize(
                &id,
                Resolution {
                    verdict: Severity::Stop,
                    resolved_by: ResolvedBy::Admin,
                },
            )
            .unwrap();
        assert_eq!(third, first);
    }

    #[test]
    fn test_safety_floor_applies_to_every_provenance() {
        for resolved_by in [
            ResolvedBy::Agreement,
            ResolvedBy::Engineer,
            ResolvedBy::Admin,
        ] {
            for &verdict in Severity::all() {
                let (service, id) = service_with_record(true);
                let record = service
                    .finalize(
                        &id,
                        Resolution {
                            verdict,
                            resolved_by,
                        },
                    )
                    .unwrap();
                assert_eq!(record.final_status, Some(Severity::Stop));
                assert_eq!(record.resolved_by, Some(resolved_by));
                assert_eq!(record.safety_floor_applied, verdict != Severity::Stop);
            }
        }
    }
}
