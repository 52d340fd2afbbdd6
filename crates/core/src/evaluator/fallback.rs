use async_trait::async_trait;
use chrono::NaiveDate;

use crate::evaluator::{
    default_explanation, Decision, PolicyContext, PolicyEvaluator, RequestFacts, Verdict,
    Violation,
};

const MAX_SUGGESTIONS: usize = 5;

/// Local, deterministic decision path used whenever the external evaluator
/// is unreachable. Fail-closed: anything it cannot positively clear is
/// escalated to a human.
#[derive(Clone, Debug)]
pub struct FallbackEvaluator {
    confidence: f64,
}

impl FallbackEvaluator {
    /// `confidence` must sit below the primary path's nominal value so the
    /// reduced trust is visible downstream.
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }

    pub fn decide(&self, facts: &RequestFacts, context: &PolicyContext) -> Decision {
        let mut violations = Vec::new();

        if !context.allow_negative_balance && facts.days > context.remaining {
            violations.push(Violation::new(
                "FB_BALANCE",
                format!(
                    "requested {} day(s) exceeds remaining balance of {}",
                    facts.days, context.remaining
                ),
            ));
        }

        if facts.half_day {
            violations.push(Violation::new(
                "FB_HALF_DAY",
                "half-day requests require human review when the evaluator is unavailable",
            ));
        }

        if context.on_leave_overlapping >= context.concurrency_ceiling {
            violations.push(Violation::new(
                "FB_TEAM_CONCURRENCY",
                format!(
                    "{} of {} team member(s) already on leave in this window (ceiling {})",
                    context.on_leave_overlapping, context.team_size, context.concurrency_ceiling
                ),
            ));
        }

        if let Some(date) = first_blackout_conflict(facts, &context.blackout_dates) {
            violations.push(Violation::new(
                "FB_BLACKOUT",
                format!("window overlaps blackout date {date}"),
            ));
        }

        let verdict = if violations.is_empty() {
            Verdict::Approved {
                confidence: self.confidence,
                explanation: default_explanation(true, 0),
            }
        } else {
            let explanation = default_explanation(false, violations.len());
            let suggestions = suggestions_for(&violations, context);
            Verdict::Escalated {
                violations,
                suggestions,
                confidence: self.confidence,
                explanation,
            }
        };

        Decision { verdict, fallback: true }
    }
}

fn first_blackout_conflict(facts: &RequestFacts, blackout: &[NaiveDate]) -> Option<NaiveDate> {
    blackout
        .iter()
        .copied()
        .filter(|date| *date >= facts.start_date && *date <= facts.end_date)
        .min()
}

fn suggestions_for(violations: &[Violation], context: &PolicyContext) -> Vec<String> {
    let mut suggestions = Vec::new();
    for violation in violations {
        match violation.code.as_str() {
            "FB_BALANCE" => {
                suggestions
                    .push(format!("{} day(s) remain; request fewer days", context.remaining));
                suggestions.push("consider a different leave type with balance left".to_string());
            }
            "FB_HALF_DAY" => {
                suggestions.push("resubmit as a full day or wait for reviewer sign-off".to_string());
            }
            "FB_TEAM_CONCURRENCY" => {
                suggestions.push("try dates when fewer team members are on leave".to_string());
            }
            "FB_BLACKOUT" => {
                suggestions.push("choose dates outside the blackout period".to_string());
            }
            _ => {}
        }
    }
    suggestions.dedup();
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

#[async_trait]
impl PolicyEvaluator for FallbackEvaluator {
    async fn evaluate(&self, facts: &RequestFacts, context: &PolicyContext) -> Decision {
        self.decide(facts, context)
    }
}
