//! Resolution engine: the caller-facing contract
//!
//! Wires the store, consensus evaluator, escalation policy, finalization and
//! audit projection together. Every operation is a short synchronous unit of
//! work:
//!
//! - [`ResolutionEngine::create`]: checklist completion opens a record
//! - [`ResolutionEngine::submit_verdict`]: inspector / engineer / admin verdicts
//! - [`ResolutionEngine::record`]: record plus derived audit trail
//! - [`ResolutionEngine::pending`]: queue of open records per tier
//!
//! A submission, the evaluation it triggers and the resulting promotion or
//! finalization all happen inside one per-record critical section.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audit::{self, AuditTrail};
use crate::config::EngineConfig;
use crate::consensus::{self, ConsensusOutcome};
use crate::error::{ResolutionError, ResolutionResult};
use crate::escalation::{EscalationDecision, EscalationPolicy};
use crate::events::{AssessmentEvent, EventBus, SharedEventBus};
use crate::finalization::{self, Finalization, FinalizationService};
use crate::recommendation::RecommendationSource;
use crate::record::{
    AssessmentRecord, CycleKey, EscalationLevel, Role, SharedAssessmentStore,
};
use crate::severity::Severity;

/// Full record plus everything derived from it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordView {
    pub record: AssessmentRecord,
    pub outcome: ConsensusOutcome,
    pub required_actors: Vec<Role>,
    pub audit_trail: AuditTrail,
}

/// What an accepted submission did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub record: AssessmentRecord,
    pub outcome: ConsensusOutcome,
    /// Set when this submission promoted the record
    pub escalation: Option<EscalationDecision>,
    /// True when this submission committed the final status
    pub finalized: bool,
    /// True when the identical verdict had already been accepted
    pub duplicate: bool,
}

enum Step {
    Duplicate,
    Accepted {
        outcome: ConsensusOutcome,
        escalation: Option<EscalationDecision>,
        finalized: bool,
    },
}

/// Final Assessment Resolution Engine
pub struct ResolutionEngine {
    store: SharedAssessmentStore,
    recommendations: Arc<dyn RecommendationSource>,
    policy: EscalationPolicy,
    finalizer: FinalizationService,
    bus: SharedEventBus,
}

impl ResolutionEngine {
    /// Create an engine with default configuration
    pub fn new(
        store: SharedAssessmentStore,
        recommendations: Arc<dyn RecommendationSource>,
    ) -> Self {
        Self::with_config(&EngineConfig::default(), store, recommendations)
    }

    pub fn with_config(
        config: &EngineConfig,
        store: SharedAssessmentStore,
        recommendations: Arc<dyn RecommendationSource>,
    ) -> Self {
        Self {
            finalizer: FinalizationService::new(store.clone()),
            store,
            recommendations,
            policy: EscalationPolicy::with_rule(config.justification),
            bus: EventBus::with_capacity(config.event_capacity).shared(),
        }
    }

    /// Publish on an existing bus instead of a private one
    pub fn with_event_bus(mut self, bus: SharedEventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn store(&self) -> &SharedAssessmentStore {
        &self.store
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.bus
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    pub fn finalizer(&self) -> &FinalizationService {
        &self.finalizer
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Open the record for a completed inspection cycle.
    ///
    /// Idempotent per `(equipment, mechanical, electrical)` while the cycle is
    /// open. Fails with the retryable `RecommendationNotReady` when checklist
    /// scoring has not produced a recommendation yet.
    pub fn create(
        &self,
        equipment_id: &str,
        mechanical_inspector_id: &str,
        electrical_inspector_id: &str,
    ) -> ResolutionResult<AssessmentRecord> {
        let key = CycleKey::new(equipment_id, mechanical_inspector_id, electrical_inspector_id);

        if let Some(existing) = self.store.find_open(&key)? {
            debug!(record_id = %existing.id, "Duplicate completion trigger");
            return Ok(existing);
        }

        let Some(recommendation) = self.recommendations.recommendation(&key) else {
            debug!(equipment_id, "Recommendation not ready");
            return Err(ResolutionError::RecommendationNotReady {
                equipment_id: equipment_id.to_string(),
            });
        };
        if !recommendation.urgency_score.is_finite() {
            return Err(ResolutionError::invalid_mutation(
                format!("new:{}", equipment_id),
                "system_urgency_score",
                "urgency score must be finite",
            ));
        }

        let created = self.store.create(key, recommendation)?;
        let record = created.record;
        if created.inserted {
            info!(
                record_id = %record.id,
                equipment_id,
                system_verdict = %record.system_verdict,
                critical = record.system_has_critical,
                "Assessment record created"
            );
            self.bus.publish(AssessmentEvent::RecordCreated {
                record_id: record.id.clone(),
                equipment_id: record.equipment_id.clone(),
                system_verdict: record.system_verdict,
                system_has_critical: record.system_has_critical,
                timestamp: record.created_at,
            });
        }
        Ok(record)
    }

    // =========================================================================
    // Submit
    // =========================================================================

    /// Submit a verdict for `role` and run the resulting consensus step.
    ///
    /// Re-submitting the identical verdict and justification is a no-op that
    /// returns the current state with `duplicate = true`.
    pub fn submit_verdict(
        &self,
        record_id: &str,
        role: Role,
        verdict: Severity,
        justification: Option<&str>,
    ) -> ResolutionResult<SubmissionReceipt> {
        let justification = justification
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);

        let result = self.store.update(record_id, |record| {
            self.apply_submission(record, role, verdict, justification)
        });

        let (step, record) = match result {
            Ok(committed) => committed,
            Err(e) => {
                self.report_rejection(record_id, role, &e);
                return Err(e);
            }
        };

        match step {
            Step::Duplicate => {
                debug!(record_id, role = %role, "Identical resubmission ignored");
                Ok(SubmissionReceipt {
                    outcome: consensus::evaluate(&record),
                    record,
                    escalation: None,
                    finalized: false,
                    duplicate: true,
                })
            }
            Step::Accepted {
                outcome,
                escalation,
                finalized,
            } => {
                self.publish_accepted(&record, role, verdict, escalation.as_ref(), finalized);
                Ok(SubmissionReceipt {
                    record,
                    outcome,
                    escalation,
                    finalized,
                    duplicate: false,
                })
            }
        }
    }

    /// Runs inside the per-record critical section
    fn apply_submission(
        &self,
        record: &mut AssessmentRecord,
        role: Role,
        verdict: Severity,
        justification: Option<String>,
    ) -> ResolutionResult<Step> {
        if let Some((existing, existing_text)) = record.submission(role) {
            if existing == verdict && existing_text == justification.as_deref() {
                return Ok(Step::Duplicate);
            }
            if record.is_finalized() {
                return Err(ResolutionError::already_finalized(&record.id));
            }
            return Err(ResolutionError::AlreadySubmitted {
                record_id: record.id.clone(),
                role,
                existing,
            });
        }
        if record.is_finalized() {
            return Err(ResolutionError::already_finalized(&record.id));
        }

        self.policy.authorize(record, role)?;
        self.policy.validate(role, verdict, justification.as_deref())?;

        record.set_submission(role, verdict, justification);

        let outcome = consensus::evaluate(record);
        debug!(record_id = %record.id, outcome = %outcome, "Consensus evaluated");

        let escalation = if outcome.needs_escalation() {
            Some(self.policy.promote(record, &outcome)?)
        } else {
            None
        };

        let finalized = match outcome.resolution() {
            Some(resolution) => {
                finalization::apply(record, resolution, Utc::now()) == Finalization::Committed
            }
            None => false,
        };

        Ok(Step::Accepted {
            outcome,
            escalation,
            finalized,
        })
    }

    fn publish_accepted(
        &self,
        record: &AssessmentRecord,
        role: Role,
        verdict: Severity,
        escalation: Option<&EscalationDecision>,
        finalized: bool,
    ) {
        let now = Utc::now();
        self.bus.publish(AssessmentEvent::VerdictSubmitted {
            record_id: record.id.clone(),
            role,
            verdict,
            timestamp: now,
        });

        if let Some(decision) = escalation {
            self.bus.publish(AssessmentEvent::Escalated {
                record_id: record.id.clone(),
                from: decision.from,
                to: decision.to,
                required_actors: decision.required_actors.clone(),
                timestamp: now,
            });
        }

        if finalized {
            if let (Some(final_status), Some(resolved_by), Some(finalized_at)) =
                (record.final_status, record.resolved_by, record.finalized_at)
            {
                self.bus.publish(AssessmentEvent::Finalized {
                    record_id: record.id.clone(),
                    equipment_id: record.equipment_id.clone(),
                    final_status,
                    resolved_by,
                    safety_floor_applied: record.safety_floor_applied,
                    timestamp: finalized_at,
                });
            }
        }
    }

    fn report_rejection(&self, record_id: &str, role: Role, error: &ResolutionError) {
        if error.is_internal() {
            // Already logged at error level by the store
            return;
        }
        if matches!(error, ResolutionError::NotFound { .. }) {
            debug!(record_id, role = %role, "Submission for unknown record");
            return;
        }

        warn!(record_id, role = %role, error = %error, "Verdict submission rejected");
        self.bus.publish(AssessmentEvent::SubmissionRejected {
            record_id: record_id.to_string(),
            role,
            code: error.code().to_string(),
            timestamp: Utc::now(),
        });
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Record, consensus outcome, required actors and audit trail
    pub fn record(&self, record_id: &str) -> ResolutionResult<RecordView> {
        let record = self.store.get(record_id)?;
        Ok(RecordView {
            outcome: consensus::evaluate(&record),
            required_actors: self.policy.required_actors(&record),
            audit_trail: audit::project(&record),
            record,
        })
    }

    /// Open records awaiting action at `level`
    pub fn pending(&self, level: EscalationLevel) -> ResolutionResult<Vec<AssessmentRecord>> {
        self.store.pending(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::{StaticRecommendations, SystemRecommendation};
    use crate::record::{AssessmentStore, ResolvedBy};

    const MONITOR_NOTE: &str = "Bearing temperature trending upward over last shifts";
    const STOP_NOTE: &str = "Insulation resistance below minimum on phase B winding, unsafe";

    fn engine(critical: bool) -> (ResolutionEngine, AssessmentRecord) {
        let recommendations = Arc::new(StaticRecommendations::new());
        recommendations.publish(
            CycleKey::new("pump-1", "mech-1", "elec-1"),
            SystemRecommendation::new(Severity::Monitor, 61.0, critical),
        );
        let engine = ResolutionEngine::new(AssessmentStore::new().shared(), recommendations);
        let record = engine.create("pump-1", "mech-1", "elec-1").unwrap();
        (engine, record)
    }

    #[test]
    fn test_create_requires_recommendation() {
        let engine = ResolutionEngine::new(
            AssessmentStore::new().shared(),
            Arc::new(StaticRecommendations::new()),
        );
        let err = engine.create("pump-1", "mech-1", "elec-1").unwrap_err();
        assert!(matches!(err, ResolutionError::RecommendationNotReady { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_create_rejects_non_finite_score() {
        let recommendations = Arc::new(StaticRecommendations::new());
        recommendations.publish(
            CycleKey::new("pump-1", "mech-1", "elec-1"),
            SystemRecommendation::new(Severity::Monitor, f64::NAN, false),
        );
        let engine = ResolutionEngine::new(AssessmentStore::new().shared(), recommendations);
        assert!(matches!(
            engine.create("pump-1", "mech-1", "elec-1"),
            Err(ResolutionError::InvalidMutation { .. })
        ));
    }

    #[test]
    fn test_first_submission_awaits_peer() {
        let (engine, record) = engine(false);
        let receipt = engine
            .submit_verdict(&record.id, Role::MechanicalInspector, Severity::Operational, None)
            .unwrap();
        assert_eq!(
            receipt.outcome,
            ConsensusOutcome::AwaitingPeer {
                missing: Role::ElectricalInspector
            }
        );
        assert!(!receipt.finalized);
        assert!(receipt.escalation.is_none());
    }

    #[test]
    fn test_identical_resubmission_is_noop() {
        let (engine, record) = engine(false);
        engine
            .submit_verdict(&record.id, Role::MechanicalInspector, Severity::Monitor, Some(MONITOR_NOTE))
            .unwrap();
        let again = engine
            .submit_verdict(&record.id, Role::MechanicalInspector, Severity::Monitor, Some(MONITOR_NOTE))
            .unwrap();
        assert!(again.duplicate);

        let conflict = engine
            .submit_verdict(&record.id, Role::MechanicalInspector, Severity::Stop, Some(STOP_NOTE))
            .unwrap_err();
        assert!(matches!(
            conflict,
            ResolutionError::AlreadySubmitted {
                existing: Severity::Monitor,
                ..
            }
        ));
    }

    #[test]
    fn test_short_justification_leaves_record_unchanged() {
        let (engine, record) = engine(false);
        let err = engine
            .submit_verdict(&record.id, Role::ElectricalInspector, Severity::Stop, Some("bad"))
            .unwrap_err();
        assert!(matches!(err, ResolutionError::JustificationTooShort { .. }));
        assert_eq!(engine.store().get(&record.id).unwrap().elec_verdict, None);
    }

    #[test]
    fn test_submission_after_finalization() {
        let (engine, record) = engine(false);
        engine
            .submit_verdict(&record.id, Role::MechanicalInspector, Severity::Operational, None)
            .unwrap();
        let receipt = engine
            .submit_verdict(&record.id, Role::ElectricalInspector, Severity::Operational, None)
            .unwrap();
        assert!(receipt.finalized);
        assert_eq!(receipt.record.resolved_by, Some(ResolvedBy::Agreement));

        // Retried identical payload is still a no-op
        assert!(engine
            .submit_verdict(&record.id, Role::ElectricalInspector, Severity::Operational, None)
            .unwrap()
            .duplicate);

        // Anything else is rejected
        assert!(matches!(
            engine.submit_verdict(&record.id, Role::Engineer, Severity::Stop, Some(STOP_NOTE)),
            Err(ResolutionError::AlreadyFinalized { .. })
        ));
    }

    #[test]
    fn test_record_view_and_pending() {
        let (engine, record) = engine(false);
        let view = engine.record(&record.id).unwrap();
        assert_eq!(view.outcome, ConsensusOutcome::Incomplete);
        assert_eq!(view.audit_trail.steps.len(), 3);
        assert_eq!(engine.pending(EscalationLevel::None).unwrap().len(), 1);

        engine
            .submit_verdict(&record.id, Role::MechanicalInspector, Severity::Operational, None)
            .unwrap();
        engine
            .submit_verdict(&record.id, Role::ElectricalInspector, Severity::Monitor, Some(MONITOR_NOTE))
            .unwrap();

        assert!(engine.pending(EscalationLevel::None).unwrap().is_empty());
        let queue = engine.pending(EscalationLevel::Engineer).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, record.id);
        assert_eq!(engine.record(&record.id).unwrap().required_actors, vec![Role::Engineer]);
    }

    #[test]
    fn test_events_published_in_order() {
        let (engine, record) = engine(true);
        let mut rx = engine.events().subscribe();

        engine
            .submit_verdict(&record.id, Role::MechanicalInspector, Severity::Operational, None)
            .unwrap();
        engine
            .submit_verdict(&record.id, Role::ElectricalInspector, Severity::Operational, None)
            .unwrap();

        let types: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event_type())
            .collect();
        assert_eq!(types, vec!["verdict_submitted", "verdict_submitted", "finalized"]);
    }

    #[test]
    fn test_rejections_are_published() {
        let (engine, record) = engine(false);
        let mut rx = engine.events().subscribe();
        let _ = engine.submit_verdict(&record.id, Role::Engineer, Severity::Operational, None);

        match rx.try_recv().unwrap() {
            AssessmentEvent::SubmissionRejected { code, role, .. } => {
                assert_eq!(code, "TIER_MISMATCH");
                assert_eq!(role, Role::Engineer);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
