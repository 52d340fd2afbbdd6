use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::balance::BalanceKey;
use crate::evaluator::Decision;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaveRequestId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Escalated,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl std::fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Escalated => "escalated",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// The two resolutions a human reviewer can apply to an escalated request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanDecision {
    Approve,
    Reject,
}

impl HumanDecision {
    pub fn target_status(self) -> LeaveStatus {
        match self {
            Self::Approve => LeaveStatus::Approved,
            Self::Reject => LeaveStatus::Rejected,
        }
    }
}

/// A leave request as persisted. `days` always equals the amount reserved
/// or committed in the associated balance row; the lifecycle manager is the
/// only writer of `status` after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: LeaveRequestId,
    pub employee_id: String,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Decimal,
    pub half_day: bool,
    pub reason: String,
    pub status: LeaveStatus,
    pub decision: Decision,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_note: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// A request draws on the balance row of its start date's year, even
    /// when the window crosses December 31.
    pub fn year(&self) -> i32 {
        self.start_date.year()
    }

    pub fn balance_key(&self) -> BalanceKey {
        BalanceKey::new(self.employee_id.clone(), self.leave_type.clone(), self.year())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{HumanDecision, LeaveRequest, LeaveRequestId, LeaveStatus};
    use crate::evaluator::{Decision, Verdict};

    #[test]
    fn only_approved_and_rejected_are_terminal() {
        assert!(LeaveStatus::Approved.is_terminal());
        assert!(LeaveStatus::Rejected.is_terminal());
        assert!(!LeaveStatus::Escalated.is_terminal());
        assert!(!LeaveStatus::Pending.is_terminal());
    }

    #[test]
    fn human_decision_maps_to_terminal_status() {
        assert_eq!(HumanDecision::Approve.target_status(), LeaveStatus::Approved);
        assert_eq!(HumanDecision::Reject.target_status(), LeaveStatus::Rejected);
    }

    #[test]
    fn balance_key_uses_the_start_year_across_new_year_windows() {
        let now = Utc::now();
        let request = LeaveRequest {
            id: LeaveRequestId("LR-1".to_string()),
            employee_id: "EMP-001".to_string(),
            leave_type: "annual".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 12, 29).expect("date"),
            end_date: NaiveDate::from_ymd_opt(2027, 1, 2).expect("date"),
            days: Decimal::from(5),
            half_day: false,
            reason: "year-end travel".to_string(),
            status: LeaveStatus::Escalated,
            decision: Decision {
                verdict: Verdict::Escalated {
                    violations: Vec::new(),
                    suggestions: Vec::new(),
                    confidence: 0.9,
                    explanation: "escalated: 0 violation(s)".to_string(),
                },
                fallback: false,
            },
            sla_deadline: Some(now),
            resolved_by: None,
            resolution_note: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(request.year(), 2026);
        let key = request.balance_key();
        assert_eq!(key.year, 2026);
        assert_eq!(key.leave_type, "annual");
    }
}
