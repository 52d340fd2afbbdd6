use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::LeaveStatus;

/// Bad input, rejected before any state is touched. Serialized with a
/// `kind` tag so callers get a structured, field-level failure.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("unknown leave type `{leave_type}`")]
    UnknownLeaveType { leave_type: String },
    #[error("reason must be 5-1000 characters, got {length}")]
    ReasonLength { length: usize },
    #[error("end date {end} precedes start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("start date {start} is outside the allowed window of [-365, +180] days")]
    StartDateOutOfWindow { start: NaiveDate },
    #[error("day count {days} must be greater than 0 and at most {max}")]
    DaysOutOfRange { days: Decimal, max: Decimal },
    #[error("day count {days} is not a multiple of 0.5")]
    DaysOffGrid { days: Decimal },
    #[error("a half-day request must be exactly 0.5 days, got {days}")]
    HalfDayMismatch { days: Decimal },
    #[error("leave type `{leave_type}` does not permit half-days")]
    HalfDayNotAllowed { leave_type: String },
    #[error("leave type `{leave_type}` requires a supporting document for {days} day(s)")]
    DocumentRequired { leave_type: String, days: Decimal },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownLeaveType { .. } => "unknown_leave_type",
            Self::ReasonLength { .. } => "reason_length",
            Self::InvalidDateRange { .. } => "invalid_date_range",
            Self::StartDateOutOfWindow { .. } => "start_date_out_of_window",
            Self::DaysOutOfRange { .. } => "days_out_of_range",
            Self::DaysOffGrid { .. } => "days_off_grid",
            Self::HalfDayMismatch { .. } => "half_day_mismatch",
            Self::HalfDayNotAllowed { .. } => "half_day_not_allowed",
            Self::DocumentRequired { .. } => "document_required",
        }
    }
}

/// Caller-facing failure taxonomy of the lifecycle engine. Every path
/// resolves to one of these; the engine never surfaces an untyped error.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("insufficient balance: requested {requested}, remaining {remaining}")]
    InsufficientBalance { requested: Decimal, remaining: Decimal },
    #[error("request {request_id} is already resolved ({status})")]
    AlreadyResolved { request_id: String, status: LeaveStatus },
    #[error("request {request_id} does not exist")]
    RequestNotFound { request_id: String },
    #[error("employee {employee_id} does not exist")]
    EmployeeNotFound { employee_id: String },
    #[error("transaction failure: {0}")]
    Transaction(String),
}

impl EngineError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Validation(inner) => inner.code(),
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::AlreadyResolved { .. } => "already_resolved",
            Self::RequestNotFound { .. } => "request_not_found",
            Self::EmployeeNotFound { .. } => "employee_not_found",
            Self::Transaction(_) => "transaction_failure",
        }
    }

    /// Safe to show verbatim; carries no internal detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "The request could not be validated. Check inputs and retry.",
            Self::InsufficientBalance { .. } => {
                "Not enough leave balance remaining for this request."
            }
            Self::AlreadyResolved { .. } => "This request has already been resolved.",
            Self::RequestNotFound { .. } => "No such leave request.",
            Self::EmployeeNotFound { .. } => "No such employee.",
            Self::Transaction(_) => {
                "A storage error interrupted the request. It is safe to retry."
            }
        }
    }

    /// Only storage failures are retryable without changing the input: the
    /// aborted transaction committed nothing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transaction(_))
    }
}
