pub mod fallback;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What the evaluator is asked about: the request itself, nothing more.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestFacts {
    pub leave_type: String,
    pub days: Decimal,
    pub half_day: bool,
    pub reason: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Snapshot of the facts surrounding a request, recomputed per submission
/// and never cached across requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyContext {
    pub remaining: Decimal,
    pub team_size: u32,
    pub on_leave_overlapping: u32,
    pub concurrency_ceiling: u32,
    pub blackout_dates: Vec<NaiveDate>,
    pub allow_negative_balance: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub code: String,
    pub message: String,
}

impl Violation {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// Evaluator output modeled as a tagged variant instead of a loose JSON
/// object: an approval never carries violations, an escalation always does.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Approved {
        confidence: f64,
        explanation: String,
    },
    Escalated {
        violations: Vec<Violation>,
        suggestions: Vec<String>,
        confidence: f64,
        explanation: String,
    },
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Approved { confidence, .. } | Self::Escalated { confidence, .. } => *confidence,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            Self::Approved { explanation, .. } | Self::Escalated { explanation, .. } => explanation,
        }
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Approved { .. } => &[],
            Self::Escalated { violations, .. } => violations,
        }
    }

    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::Approved { .. } => &[],
            Self::Escalated { suggestions, .. } => suggestions,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    /// Set when the local fail-closed path produced the verdict instead of
    /// the external decision service.
    pub fallback: bool,
}

/// Deterministic replacement for an absent `explanation` field.
pub fn default_explanation(approved: bool, violation_count: usize) -> String {
    if approved {
        "approved: all constraints satisfied".to_string()
    } else {
        format!("escalated: {violation_count} violation(s)")
    }
}

/// Seam for the decision service. Implementations must be referentially
/// transparent from the lifecycle manager's point of view: transport
/// failures are absorbed internally (fallback), never returned.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    async fn evaluate(&self, facts: &RequestFacts, context: &PolicyContext) -> Decision;
}
