pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod evaluator;
pub mod notify;
pub mod validation;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use domain::balance::{from_half_days, to_half_days, BalanceKey, LeaveBalance};
pub use domain::employee::Employee;
pub use domain::leave_type::{LeaveTypePolicy, LeaveTypeRegistry};
pub use domain::request::{HumanDecision, LeaveRequest, LeaveRequestId, LeaveStatus};
pub use errors::{EngineError, ValidationError};
pub use evaluator::fallback::FallbackEvaluator;
pub use evaluator::{Decision, PolicyContext, PolicyEvaluator, RequestFacts, Verdict, Violation};
pub use notify::{Notification, Notifier};
pub use validation::{validate_submission, SubmissionInput, ValidatedSubmission};
