//! Severity lattice: the ordered verdict domain shared by every tier.
//!
//! `operational < monitor < stop`. The legacy two-valued vocabulary
//! (`operational` / `urgent`) is folded into this enum at the ingress
//! boundary: `urgent` always becomes [`Severity::Stop`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Operational status verdict, totally ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Equipment may keep running.
    Operational,
    /// Equipment may run but needs follow-up.
    Monitor,
    /// Equipment must be taken out of service.
    #[serde(alias = "urgent")]
    Stop,
}

/// Error returned when a verdict string is not part of either vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity '{0}' (expected operational, monitor, stop or urgent)")]
pub struct ParseSeverityError(pub String);

impl Severity {
    /// All severities in ascending order.
    pub fn all() -> &'static [Severity] {
        &[Severity::Operational, Severity::Monitor, Severity::Stop]
    }

    /// Map a raw verdict from either vocabulary onto the lattice.
    pub fn normalize(raw: &str) -> Result<Self, ParseSeverityError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "operational" => Ok(Self::Operational),
            "monitor" => Ok(Self::Monitor),
            "stop" | "urgent" => Ok(Self::Stop),
            _ => Err(ParseSeverityError(raw.to_string())),
        }
    }

    /// The more severe of two verdicts.
    pub fn merge(self, other: Severity) -> Severity {
        self.max(other)
    }

    /// Most severe verdict of a collection, `None` when empty.
    pub fn most_severe<I>(verdicts: I) -> Option<Severity>
    where
        I: IntoIterator<Item = Severity>,
    {
        verdicts.into_iter().reduce(Severity::merge)
    }

    /// Raise `verdict` to at least `stop` when the critical flag is set.
    pub fn apply_safety_floor(verdict: Severity, has_critical: bool) -> Severity {
        if has_critical {
            verdict.merge(Severity::Stop)
        } else {
            verdict
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Monitor => "monitor",
            Self::Stop => "stop",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}
