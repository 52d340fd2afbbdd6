use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::balance::to_half_days;
use crate::domain::leave_type::{LeaveTypePolicy, LeaveTypeRegistry};
use crate::errors::ValidationError;

const MIN_REASON_CHARS: usize = 5;
const MAX_REASON_CHARS: usize = 1000;
const MAX_PAST_DAYS: i64 = 365;
const MAX_FUTURE_DAYS: i64 = 180;
const HALF_DAY: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Field limits the validator enforces beyond the fixed window constants.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationLimits {
    pub max_days: Decimal,
    pub document_threshold_days: Decimal,
}

/// Raw submission as it arrives from the caller, before any state is
/// touched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionInput {
    pub employee_id: String,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Decimal,
    pub half_day: bool,
    pub reason: String,
    pub has_document: bool,
}

/// Submission after shape validation: canonical leave-type code, resolved
/// type policy, and the balance-row year.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedSubmission {
    pub employee_id: String,
    pub leave_type: LeaveTypePolicy,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Decimal,
    pub half_day: bool,
    pub reason: String,
    pub year: i32,
}

/// Validates the submission shape. Rejects with a field-level error before
/// the evaluator is called or any row is read.
pub fn validate_submission(
    input: &SubmissionInput,
    registry: &LeaveTypeRegistry,
    limits: &ValidationLimits,
    now: DateTime<Utc>,
) -> Result<ValidatedSubmission, ValidationError> {
    let leave_type = registry.resolve(&input.leave_type).ok_or_else(|| {
        ValidationError::UnknownLeaveType { leave_type: input.leave_type.clone() }
    })?;

    let length = input.reason.chars().count();
    if !(MIN_REASON_CHARS..=MAX_REASON_CHARS).contains(&length) {
        return Err(ValidationError::ReasonLength { length });
    }

    if input.end_date < input.start_date {
        return Err(ValidationError::InvalidDateRange {
            start: input.start_date,
            end: input.end_date,
        });
    }

    let today = now.date_naive();
    let earliest = today - Duration::days(MAX_PAST_DAYS);
    let latest = today + Duration::days(MAX_FUTURE_DAYS);
    if input.start_date < earliest || input.start_date > latest {
        return Err(ValidationError::StartDateOutOfWindow { start: input.start_date });
    }

    if to_half_days(input.days).is_err() {
        return Err(ValidationError::DaysOffGrid { days: input.days });
    }

    if input.days <= Decimal::ZERO || input.days > limits.max_days {
        return Err(ValidationError::DaysOutOfRange { days: input.days, max: limits.max_days });
    }

    if input.half_day {
        if input.days != HALF_DAY {
            return Err(ValidationError::HalfDayMismatch { days: input.days });
        }
        if !leave_type.half_day_allowed {
            return Err(ValidationError::HalfDayNotAllowed {
                leave_type: leave_type.code.clone(),
            });
        }
    }

    let needs_document =
        leave_type.requires_document || input.days > limits.document_threshold_days;
    if needs_document && !input.has_document {
        return Err(ValidationError::DocumentRequired {
            leave_type: leave_type.code.clone(),
            days: input.days,
        });
    }

    Ok(ValidatedSubmission {
        employee_id: input.employee_id.clone(),
        year: input.start_date.year(),
        leave_type,
        start_date: input.start_date,
        end_date: input.end_date,
        days: input.days,
        half_day: input.half_day,
        reason: input.reason.clone(),
    })
}
