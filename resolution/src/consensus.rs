//! Consensus evaluator: decides whether a record is resolved.
//!
//! A pure function of the record snapshot. It runs after every
//! verdict-affecting write; the engine acts on the outcome (promote or
//! finalize) inside the same per-record critical section.
//!
//! Once a record has been escalated, only the verdict of the current tier is
//! considered. Lower-tier verdicts stay on the record for the audit trail but
//! are never re-evaluated on their own.

use serde::{Deserialize, Serialize};

use crate::record::{AssessmentRecord, EscalationLevel, ResolvedBy, Role};
use crate::severity::Severity;

/// A binding verdict and the mechanism that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub verdict: Severity,
    pub resolved_by: ResolvedBy,
}

/// Outcome of evaluating one record snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConsensusOutcome {
    /// No inspector has submitted yet
    Incomplete,
    /// One inspector submitted; waiting on the other
    AwaitingPeer { missing: Role },
    /// Escalated; waiting on the verdict of this tier
    AwaitingTier { level: EscalationLevel },
    /// Both inspectors submitted the same verdict
    Agreed { verdict: Severity },
    /// Verdicts conflict; the record must move up one tier
    Disagreement {
        escalate_to: EscalationLevel,
        conflicting: Vec<Severity>,
    },
    /// An escalated tier produced a binding verdict
    Resolved { resolution: Resolution },
}

impl ConsensusOutcome {
    /// The binding resolution, if this outcome terminates the process
    pub fn resolution(&self) -> Option<Resolution> {
        match self {
            Self::Agreed { verdict } => Some(Resolution {
                verdict: *verdict,
                resolved_by: ResolvedBy::Agreement,
            }),
            Self::Resolved { resolution } => Some(*resolution),
            _ => None,
        }
    }

    /// Whether escalation to the next tier is required
    pub fn needs_escalation(&self) -> bool {
        matches!(self, Self::Disagreement { .. })
    }
}

impl std::fmt::Display for ConsensusOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incomplete => write!(f, "incomplete"),
            Self::AwaitingPeer { missing } => write!(f, "awaiting_peer({})", missing),
            Self::AwaitingTier { level } => write!(f, "awaiting_tier({})", level),
            Self::Agreed { verdict } => write!(f, "agreed({})", verdict),
            Self::Disagreement { escalate_to, .. } => {
                write!(f, "disagreement(escalate_to={})", escalate_to)
            }
            Self::Resolved { resolution } => write!(
                f,
                "resolved({}, by={})",
                resolution.verdict, resolution.resolved_by
            ),
        }
    }
}

/// Evaluate the current verdicts on a record.
pub fn evaluate(record: &AssessmentRecord) -> ConsensusOutcome {
    if let (Some(verdict), Some(resolved_by)) = (record.final_status, record.resolved_by) {
        return ConsensusOutcome::Resolved {
            resolution: Resolution {
                verdict,
                resolved_by,
            },
        };
    }

    match record.escalation_level {
        EscalationLevel::None => evaluate_inspectors(record),
        EscalationLevel::Engineer => evaluate_engineer(record),
        EscalationLevel::Admin => evaluate_admin(record),
    }
}

/// An admin decision is a verdict plus written notes
fn evaluate_admin(record: &AssessmentRecord) -> ConsensusOutcome {
    let notes = record
        .admin_decision_notes
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty());
    match (record.admin_verdict, notes) {
        (Some(verdict), Some(_)) => ConsensusOutcome::Resolved {
            resolution: Resolution {
                verdict,
                resolved_by: ResolvedBy::Admin,
            },
        },
        _ => ConsensusOutcome::AwaitingTier {
            level: EscalationLevel::Admin,
        },
    }
}

fn evaluate_inspectors(record: &AssessmentRecord) -> ConsensusOutcome {
    match (record.mech_verdict, record.elec_verdict) {
        (None, None) => ConsensusOutcome::Incomplete,
        (Some(_), None) => ConsensusOutcome::AwaitingPeer {
            missing: Role::ElectricalInspector,
        },
        (None, Some(_)) => ConsensusOutcome::AwaitingPeer {
            missing: Role::MechanicalInspector,
        },
        (Some(mech), Some(elec)) if mech == elec => ConsensusOutcome::Agreed { verdict: mech },
        (Some(mech), Some(elec)) => ConsensusOutcome::Disagreement {
            escalate_to: EscalationLevel::Engineer,
            conflicting: vec![mech, elec],
        },
    }
}

fn evaluate_engineer(record: &AssessmentRecord) -> ConsensusOutcome {
    let Some(engineer) = record.engineer_verdict else {
        return ConsensusOutcome::AwaitingTier {
            level: EscalationLevel::Engineer,
        };
    };

    let sides_with_inspector =
        record.mech_verdict == Some(engineer) || record.elec_verdict == Some(engineer);
    if sides_with_inspector {
        return ConsensusOutcome::Resolved {
            resolution: Resolution {
                verdict: engineer,
                resolved_by: ResolvedBy::Engineer,
            },
        };
    }

    // Three-way split
    ConsensusOutcome::Disagreement {
        escalate_to: EscalationLevel::Admin,
        conflicting: record
            .mech_verdict
            .into_iter()
            .chain(record.elec_verdict)
            .chain(Some(engineer))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CycleKey;
    use crate::recommendation::SystemRecommendation;

    fn record(mech: Option<Severity>, elec: Option<Severity>) -> AssessmentRecord {
        let mut rec = AssessmentRecord::new(
            &CycleKey::new("eq-1", "m", "e"),
            &SystemRecommendation::new(Severity::Operational, 5.0, false),
        );
        rec.mech_verdict = mech;
        rec.elec_verdict = elec;
        rec
    }

    #[test]
    fn test_incomplete() {
        assert_eq!(evaluate(&record(None, None)), ConsensusOutcome::Incomplete);
    }

    #[test]
    fn test_awaiting_peer() {
        assert_eq!(
            evaluate(&record(Some(Severity::Stop), None)),
            ConsensusOutcome::AwaitingPeer {
                missing: Role::ElectricalInspector
            }
        );
        assert_eq!(
            evaluate(&record(None, Some(Severity::Monitor))),
            ConsensusOutcome::AwaitingPeer {
                missing: Role::MechanicalInspector
            }
        );
    }

    #[test]
    fn test_agreement_for_every_verdict() {
        for &v in Severity::all() {
            let outcome = evaluate(&record(Some(v), Some(v)));
            assert_eq!(outcome, ConsensusOutcome::Agreed { verdict: v });
            assert_eq!(
                outcome.resolution(),
                Some(Resolution {
                    verdict: v,
                    resolved_by: ResolvedBy::Agreement
                })
            );
        }
    }

    #[test]
    fn test_disagreement_escalates_to_engineer() {
        for &a in Severity::all() {
            for &b in Severity::all() {
                if a == b {
                    continue;
                }
                let outcome = evaluate(&record(Some(a), Some(b)));
                assert!(outcome.needs_escalation());
                assert_eq!(
                    outcome,
                    ConsensusOutcome::Disagreement {
                        escalate_to: EscalationLevel::Engineer,
                        conflicting: vec![a, b],
                    }
                );
            }
        }
    }

    #[test]
    fn test_engineer_siding_with_inspector_resolves() {
        let mut rec = record(Some(Severity::Operational), Some(Severity::Stop));
        rec.escalation_level = EscalationLevel::Engineer;
        assert_eq!(
            evaluate(&rec),
            ConsensusOutcome::AwaitingTier {
                level: EscalationLevel::Engineer
            }
        );

        rec.engineer_verdict = Some(Severity::Stop);
        assert_eq!(
            evaluate(&rec).resolution(),
            Some(Resolution {
                verdict: Severity::Stop,
                resolved_by: ResolvedBy::Engineer
            })
        );
    }

    #[test]
    fn test_three_way_split_escalates_to_admin() {
        let mut rec = record(Some(Severity::Operational), Some(Severity::Monitor));
        rec.escalation_level = EscalationLevel::Engineer;
        rec.engineer_verdict = Some(Severity::Stop);
        assert_eq!(
            evaluate(&rec),
            ConsensusOutcome::Disagreement {
                escalate_to: EscalationLevel::Admin,
                conflicting: vec![Severity::Operational, Severity::Monitor, Severity::Stop],
            }
        );
    }

    #[test]
    fn test_admin_always_terminates() {
        let mut rec = record(Some(Severity::Operational), Some(Severity::Monitor));
        rec.escalation_level = EscalationLevel::Admin;
        rec.engineer_verdict = Some(Severity::Stop);
        assert_eq!(
            evaluate(&rec),
            ConsensusOutcome::AwaitingTier {
                level: EscalationLevel::Admin
            }
        );

        rec.admin_decision_notes = Some("Reviewed photos and load history".to_string());
        for &v in Severity::all() {
            rec.admin_verdict = Some(v);
            assert_eq!(
                evaluate(&rec).resolution(),
                Some(Resolution {
                    verdict: v,
                    resolved_by: ResolvedBy::Admin
                })
            );
        }
    }

    #[test]
    fn test_admin_verdict_without_notes_does_not_resolve() {
        let mut rec = record(Some(Severity::Operational), Some(Severity::Monitor));
        rec.escalation_level = EscalationLevel::Admin;
        rec.engineer_verdict = Some(Severity::Stop);
        rec.admin_verdict = Some(Severity::Operational);

        for notes in [None, Some("   ".to_string())] {
            rec.admin_decision_notes = notes;
            assert_eq!(
                evaluate(&rec),
                ConsensusOutcome::AwaitingTier {
                    level: EscalationLevel::Admin
                }
            );
        }
    }

    #[test]
    fn test_escalated_record_ignores_inspector_agreement() {
        // Even if the inspector verdicts were equal, an escalated record waits
        // on its current tier.
        let mut rec = record(Some(Severity::Monitor), Some(Severity::Monitor));
        rec.escalation_level = EscalationLevel::Engineer;
        assert!(evaluate(&rec).resolution().is_none());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(ConsensusOutcome::Incomplete.to_string(), "incomplete");
        assert_eq!(
            ConsensusOutcome::Agreed {
                verdict: Severity::Stop
            }
            .to_string(),
            "agreed(stop)"
        );
    }
}
