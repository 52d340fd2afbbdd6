//! Transactional lifecycle manager for leave requests.
//!
//! `submit` validates, consults the evaluator against a read-only
//! snapshot, then reserves (and on approval commits) balance and
//! persists the request inside one transaction; `decide` applies a
//! human resolution to an escalated request. A failed transaction
//! leaves no partial state behind: the request row and its ledger
//! movement land together or not at all.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use timeoff_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use timeoff_core::config::PolicyConfig;
use timeoff_core::domain::balance::{BalanceKey, LeaveBalance};
use timeoff_core::domain::leave_type::LeaveTypeRegistry;
use timeoff_core::domain::request::{HumanDecision, LeaveRequest, LeaveRequestId, LeaveStatus};
use timeoff_core::errors::EngineError;
use timeoff_core::evaluator::{PolicyEvaluator, RequestFacts};
use timeoff_core::notify::{Notification, Notifier};
use timeoff_core::validation::{validate_submission, SubmissionInput, ValidationLimits};
use timeoff_db::repositories::{balance, employee, request as request_repo, LedgerOutcome};
use timeoff_db::DbPool;

use crate::context::build_policy_context;

/// Policy knobs the engine consults at runtime, converted once from the
/// loaded configuration into exact day quantities.
#[derive(Clone, Debug)]
pub struct PolicySettings {
    pub registry: LeaveTypeRegistry,
    pub limits: ValidationLimits,
    pub default_entitlement: Decimal,
    pub concurrency_ceiling: u32,
    pub allow_negative_balance: bool,
    pub sla_hours: i64,
    pub blackout_dates: Vec<NaiveDate>,
}

impl PolicySettings {
    pub fn from_config(policy: &PolicyConfig) -> Self {
        Self {
            registry: policy.registry(),
            limits: policy.validation_limits(),
            default_entitlement: policy.default_entitlement(),
            concurrency_ceiling: policy.concurrency_ceiling,
            allow_negative_balance: policy.allow_negative_balance,
            sla_hours: policy.sla_hours,
            blackout_dates: policy.blackout_dates.clone(),
        }
    }
}

pub struct LifecycleManager {
    pool: DbPool,
    evaluator: Arc<dyn PolicyEvaluator>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
    settings: PolicySettings,
}

const ACTOR: &str = "lifecycle-manager";

fn tx_failure(error: impl std::fmt::Display) -> EngineError {
    EngineError::Transaction(error.to_string())
}

impl LifecycleManager {
    pub fn new(
        pool: DbPool,
        evaluator: Arc<dyn PolicyEvaluator>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
        settings: PolicySettings,
    ) -> Self {
        Self { pool, evaluator, notifier, audit, settings }
    }

    /// Submits a new leave request. Validation runs before the evaluator
    /// is consulted or any row is touched; the ledger reservation and the
    /// request row commit atomically.
    pub async fn submit(&self, input: SubmissionInput) -> Result<LeaveRequest, EngineError> {
        let correlation_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let validated = match validate_submission(
            &input,
            &self.settings.registry,
            &self.settings.limits,
            now,
        ) {
            Ok(validated) => validated,
            Err(error) => {
                let context = AuditContext::new(
                    None,
                    Some(input.employee_id.clone()),
                    &correlation_id,
                    ACTOR,
                );
                self.audit.emit(
                    AuditEvent::new(
                        &context,
                        "request.rejected",
                        AuditCategory::Submission,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("reason", error.code()),
                );
                return Err(error.into());
            }
        };

        let key = BalanceKey::new(
            validated.employee_id.clone(),
            validated.leave_type.code.clone(),
            validated.year,
        );
        let entitlement = self
            .settings
            .registry
            .entitlement_for(&validated.leave_type.code, self.settings.default_entitlement);

        // Snapshot phase: a read-only context assembled outside any write
        // transaction, so the evaluator call never holds the database open.
        // The reserve guard below re-checks the balance authoritatively.
        let context = {
            let mut conn = self.pool.acquire().await.map_err(tx_failure)?;
            let employee = employee::find_by_id(&mut conn, &validated.employee_id)
                .await
                .map_err(tx_failure)?
                .ok_or_else(|| EngineError::EmployeeNotFound {
                    employee_id: validated.employee_id.clone(),
                })?;
            let remaining = balance::fetch(&mut conn, &key)
                .await
                .map_err(tx_failure)?
                .map(|balance| balance.remaining())
                .unwrap_or(entitlement);
            build_policy_context(
                &mut conn,
                &employee.team,
                &employee.id,
                validated.start_date,
                validated.end_date,
                remaining,
                &self.settings,
            )
            .await
            .map_err(tx_failure)?
        };

        let facts = RequestFacts {
            leave_type: key.leave_type.clone(),
            days: validated.days,
            half_day: validated.half_day,
            reason: validated.reason.clone(),
            start_date: validated.start_date,
            end_date: validated.end_date,
        };
        let decision = self.evaluator.evaluate(&facts, &context).await;

        let mut tx = self.pool.begin().await.map_err(tx_failure)?;
        balance::get_or_create(&mut tx, &key, entitlement, now).await.map_err(tx_failure)?;
        let reserved = balance::reserve(
            &mut tx,
            &key,
            validated.days,
            self.settings.allow_negative_balance,
            now,
        )
        .await
        .map_err(tx_failure)?;
        if let LedgerOutcome::Insufficient { remaining } = reserved {
            drop(tx);
            let context =
                AuditContext::new(None, Some(key.employee_id.clone()), &correlation_id, ACTOR);
            self.audit.emit(
                AuditEvent::new(
                    &context,
                    "request.rejected",
                    AuditCategory::Ledger,
                    AuditOutcome::Rejected,
                )
                .with_metadata("requested", validated.days.to_string())
                .with_metadata("remaining", remaining.to_string()),
            );
            return Err(EngineError::InsufficientBalance { requested: validated.days, remaining });
        }

        let (status, sla_deadline) = if decision.verdict.is_approved() {
            let committed = balance::commit_reserved(&mut tx, &key, validated.days, now)
                .await
                .map_err(tx_failure)?;
            if let LedgerOutcome::Insufficient { .. } = committed {
                return Err(tx_failure("reservation vanished before commit"));
            }
            (LeaveStatus::Approved, None)
        } else {
            (LeaveStatus::Escalated, Some(now + Duration::hours(self.settings.sla_hours)))
        };

        let request = LeaveRequest {
            id: LeaveRequestId(format!("LR-{}", Uuid::new_v4().simple())),
            employee_id: validated.employee_id,
            leave_type: key.leave_type.clone(),
            start_date: validated.start_date,
            end_date: validated.end_date,
            days: validated.days,
            half_day: validated.half_day,
            reason: validated.reason,
            status,
            decision,
            sla_deadline,
            resolved_by: None,
            resolution_note: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };
        request_repo::insert(&mut tx, &request).await.map_err(tx_failure)?;

        tx.commit().await.map_err(tx_failure)?;

        self.record_submission(&request, &correlation_id).await;
        Ok(request)
    }

    /// Applies a human resolution to an escalated request. Approving
    /// commits the reservation; rejecting releases it. A terminal request
    /// is never mutated again.
    pub async fn decide(
        &self,
        request_id: &LeaveRequestId,
        decision: HumanDecision,
        resolved_by: &str,
        note: Option<String>,
    ) -> Result<LeaveRequest, EngineError> {
        let correlation_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(tx_failure)?;

        let request = request_repo::find_by_id(&mut tx, request_id)
            .await
            .map_err(tx_failure)?
            .ok_or_else(|| EngineError::RequestNotFound { request_id: request_id.0.clone() })?;
        if request.status != LeaveStatus::Escalated {
            return Err(EngineError::AlreadyResolved {
                request_id: request_id.0.clone(),
                status: request.status,
            });
        }

        let target = decision.target_status();
        let flipped = request_repo::resolve(
            &mut tx,
            request_id,
            target,
            resolved_by,
            note.as_deref(),
            now,
        )
        .await
        .map_err(tx_failure)?;
        if !flipped {
            return Err(EngineError::AlreadyResolved {
                request_id: request_id.0.clone(),
                status: request.status,
            });
        }

        let key = request.balance_key();
        let outcome = match decision {
            HumanDecision::Approve => {
                balance::commit_reserved(&mut tx, &key, request.days, now).await
            }
            HumanDecision::Reject => balance::release(&mut tx, &key, request.days, now).await,
        }
        .map_err(tx_failure)?;
        if let LedgerOutcome::Insufficient { .. } = outcome {
            return Err(tx_failure(format!(
                "reservation missing for request {}",
                request_id.0
            )));
        }

        tx.commit().await.map_err(tx_failure)?;

        let resolved = LeaveRequest {
            status: target,
            resolved_by: Some(resolved_by.to_string()),
            resolution_note: note,
            resolved_at: Some(now),
            updated_at: now,
            ..request
        };
        self.record_resolution(&resolved, &correlation_id).await;
        Ok(resolved)
    }

    pub async fn get_request(
        &self,
        request_id: &LeaveRequestId,
    ) -> Result<LeaveRequest, EngineError> {
        let mut conn = self.pool.acquire().await.map_err(tx_failure)?;
        request_repo::find_by_id(&mut conn, request_id)
            .await
            .map_err(tx_failure)?
            .ok_or_else(|| EngineError::RequestNotFound { request_id: request_id.0.clone() })
    }

    pub async fn list_requests(
        &self,
        employee_id: &str,
    ) -> Result<Vec<LeaveRequest>, EngineError> {
        let mut conn = self.pool.acquire().await.map_err(tx_failure)?;
        request_repo::list_for_employee(&mut conn, employee_id).await.map_err(tx_failure)
    }

    pub async fn balances(
        &self,
        employee_id: &str,
        year: i32,
    ) -> Result<Vec<LeaveBalance>, EngineError> {
        let mut conn = self.pool.acquire().await.map_err(tx_failure)?;
        if employee::find_by_id(&mut conn, employee_id).await.map_err(tx_failure)?.is_none() {
            return Err(EngineError::EmployeeNotFound { employee_id: employee_id.to_string() });
        }
        balance::list_for_employee(&mut conn, employee_id, year).await.map_err(tx_failure)
    }

    async fn record_submission(&self, request: &LeaveRequest, correlation_id: &str) {
        let (event_type, template) = match request.status {
            LeaveStatus::Approved => ("request.approved", "leave.approved"),
            _ => ("request.escalated", "leave.escalated"),
        };
        let context = AuditContext::new(
            Some(request.id.clone()),
            Some(request.employee_id.clone()),
            correlation_id,
            ACTOR,
        );
        let mut event = AuditEvent::new(
            &context,
            event_type,
            AuditCategory::Decision,
            AuditOutcome::Success,
        )
        .with_metadata("days", request.days.to_string())
        .with_metadata("fallback", request.decision.fallback.to_string());
        if let Some(deadline) = request.sla_deadline {
            event = event.with_metadata("sla_deadline", deadline.to_rfc3339());
        }
        self.audit.emit(event);

        self.notify(request, template, request.sla_deadline).await;
    }

    async fn record_resolution(&self, request: &LeaveRequest, correlation_id: &str) {
        let context = AuditContext::new(
            Some(request.id.clone()),
            Some(request.employee_id.clone()),
            correlation_id,
            request.resolved_by.as_deref().unwrap_or(ACTOR),
        );
        self.audit.emit(
            AuditEvent::new(
                &context,
                "request.resolved",
                AuditCategory::Decision,
                AuditOutcome::Success,
            )
            .with_metadata("status", request.status.to_string())
            .with_metadata("days", request.days.to_string()),
        );

        self.notify(request, "leave.resolved", None).await;
    }

    async fn notify(
        &self,
        request: &LeaveRequest,
        template: &str,
        sla_deadline: Option<DateTime<Utc>>,
    ) {
        let mut notification = Notification::new(request.employee_id.clone(), template)
            .with_param("request_id", request.id.0.clone())
            .with_param("status", request.status.to_string())
            .with_param("days", request.days.to_string());
        if let Some(deadline) = sla_deadline {
            notification = notification.with_param("sla_deadline", deadline.to_rfc3339());
        }
        if let Err(error) = self.notifier.dispatch(notification).await {
            warn!(
                request_id = %request.id.0,
                error = %error,
                "notification dispatch failed after commit"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use timeoff_core::audit::InMemoryAuditSink;
    use timeoff_core::domain::balance::BalanceKey;
    use timeoff_core::domain::employee::Employee;
    use timeoff_core::domain::request::{HumanDecision, LeaveStatus};
    use timeoff_core::errors::{EngineError, ValidationError};
    use timeoff_core::evaluator::{
        Decision, PolicyContext, PolicyEvaluator, RequestFacts, Verdict, Violation,
    };
    use timeoff_core::notify::InMemoryNotifier;
    use timeoff_core::validation::{SubmissionInput, ValidationLimits};
    use timeoff_db::repositories::{balance, employee, request as request_repo};
    use timeoff_db::{connect_with_settings, migrations, DbPool};

    use super::{LifecycleManager, PolicySettings};

    struct ScriptedEvaluator {
        decision: Decision,
        calls: AtomicUsize,
    }

    impl ScriptedEvaluator {
        fn new(decision: Decision) -> Self {
            Self { decision, calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PolicyEvaluator for ScriptedEvaluator {
        async fn evaluate(&self, _facts: &RequestFacts, _context: &PolicyContext) -> Decision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.decision.clone()
        }
    }

    fn approved() -> Decision {
        Decision {
            verdict: Verdict::Approved {
                confidence: 0.9,
                explanation: "approved: all constraints satisfied".to_string(),
            },
            fallback: false,
        }
    }

    fn escalated() -> Decision {
        Decision {
            verdict: Verdict::Escalated {
                violations: vec![Violation::new("POLICY", "team coverage too thin")],
                suggestions: vec!["try a later window".to_string()],
                confidence: 0.9,
                explanation: "escalated: 1 violation(s)".to_string(),
            },
            fallback: false,
        }
    }

    struct Harness {
        pool: DbPool,
        manager: Arc<LifecycleManager>,
        evaluator: Arc<ScriptedEvaluator>,
        notifier: InMemoryNotifier,
        audit: InMemoryAuditSink,
    }

    async fn harness(decision: Decision, entitlement: i64) -> Harness {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let mut conn = pool.acquire().await.expect("acquire");
        for (id, name) in [
            ("EMP-001", "Priya Sharma"),
            ("EMP-002", "Marcus Webb"),
            ("EMP-003", "Elena Petrova"),
        ] {
            employee::insert(
                &mut conn,
                &Employee {
                    id: id.to_string(),
                    full_name: name.to_string(),
                    team: "platform".to_string(),
                    created_at: Utc::now(),
                },
            )
            .await
            .expect("insert employee");
        }
        drop(conn);

        let evaluator = Arc::new(ScriptedEvaluator::new(decision));
        let notifier = InMemoryNotifier::default();
        let audit = InMemoryAuditSink::default();
        let settings = PolicySettings {
            registry: Default::default(),
            limits: ValidationLimits {
                max_days: Decimal::from(90),
                document_threshold_days: Decimal::from(30),
            },
            default_entitlement: Decimal::from(entitlement),
            concurrency_ceiling: 2,
            allow_negative_balance: false,
            sla_hours: 24,
            blackout_dates: Vec::new(),
        };
        let manager = Arc::new(LifecycleManager::new(
            pool.clone(),
            evaluator.clone(),
            Arc::new(notifier.clone()),
            Arc::new(audit.clone()),
            settings,
        ));

        Harness { pool, manager, evaluator, notifier, audit }
    }

    fn input(days: Decimal, half_day: bool) -> SubmissionInput {
        let start = Utc::now().date_naive() + Duration::days(7);
        let span = days.ceil().to_string().parse::<i64>().unwrap_or(1).max(1);
        SubmissionInput {
            employee_id: "EMP-001".to_string(),
            leave_type: "casual".to_string(),
            start_date: start,
            end_date: start + Duration::days(span - 1),
            days,
            half_day,
            reason: "family commitment out of town".to_string(),
            has_document: false,
        }
    }

    async fn stored_balance(pool: &DbPool, key: &BalanceKey) -> Option<timeoff_core::LeaveBalance> {
        let mut conn = pool.acquire().await.expect("acquire");
        balance::fetch(&mut conn, key).await.expect("fetch")
    }

    fn key_for(input: &SubmissionInput) -> BalanceKey {
        use chrono::Datelike;
        BalanceKey::new(input.employee_id.clone(), "casual", input.start_date.year())
    }

    #[tokio::test]
    async fn auto_approval_commits_the_ledger_atomically() {
        let h = harness(approved(), 12).await;
        let submission = input(Decimal::from(2), false);
        let key = key_for(&submission);

        let request = h.manager.submit(submission).await.expect("approved");
        assert_eq!(request.status, LeaveStatus::Approved);
        assert!(request.sla_deadline.is_none());
        assert!(!request.decision.fallback);

        let stored = stored_balance(&h.pool, &key).await.expect("balance row");
        assert_eq!(stored.used_days, Decimal::from(2));
        assert_eq!(stored.pending_days, Decimal::ZERO);
        assert_eq!(stored.remaining(), Decimal::from(10));

        let persisted = h.manager.get_request(&request.id).await.expect("persisted");
        assert_eq!(persisted.status, LeaveStatus::Approved);

        let events = h.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "request.approved");

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].template, "leave.approved");
        assert_eq!(sent[0].recipient, "EMP-001");
    }

    #[tokio::test]
    async fn half_day_flows_through_the_ledger_exactly() {
        let h = harness(approved(), 12).await;
        let submission = input(Decimal::new(5, 1), true);
        let key = key_for(&submission);

        let request = h.manager.submit(submission).await.expect("approved");
        assert_eq!(request.days, Decimal::new(5, 1));

        let stored = stored_balance(&h.pool, &key).await.expect("balance row");
        assert_eq!(stored.used_days, Decimal::new(5, 1));
        assert_eq!(stored.remaining(), Decimal::new(115, 1));
    }

    #[tokio::test]
    async fn validation_failure_precedes_evaluation_and_touches_nothing() {
        let h = harness(approved(), 12).await;
        // half_day flag with a full day count is a shape error
        let submission = input(Decimal::from(1), true);
        let key = key_for(&submission);

        let error = h.manager.submit(submission).await.expect_err("rejected");
        assert!(matches!(
            error,
            EngineError::Validation(ValidationError::HalfDayMismatch { .. })
        ));
        assert_eq!(h.evaluator.calls(), 0);
        assert!(stored_balance(&h.pool, &key).await.is_none());

        let events = h.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "request.rejected");
        assert_eq!(events[0].metadata.get("reason").map(String::as_str), Some("half_day_mismatch"));
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn insufficient_balance_aborts_without_persisting_anything() {
        let h = harness(approved(), 3).await;
        let submission = input(Decimal::from(10), false);
        let key = key_for(&submission);

        let error = h.manager.submit(submission).await.expect_err("rejected");
        assert_eq!(
            error,
            EngineError::InsufficientBalance {
                requested: Decimal::from(10),
                remaining: Decimal::from(3),
            }
        );
        assert!(!error.is_retryable());

        // The aborted transaction rolled back even the lazily created row.
        assert!(stored_balance(&h.pool, &key).await.is_none());
        let requests = h.manager.list_requests("EMP-001").await.expect("list");
        assert!(requests.is_empty());
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn escalation_reserves_balance_and_stamps_the_sla_deadline() {
        let h = harness(escalated(), 12).await;
        let submission = input(Decimal::from(3), false);
        let key = key_for(&submission);

        let request = h.manager.submit(submission).await.expect("escalated");
        assert_eq!(request.status, LeaveStatus::Escalated);
        assert_eq!(request.sla_deadline, Some(request.created_at + Duration::hours(24)));

        let stored = stored_balance(&h.pool, &key).await.expect("balance row");
        assert_eq!(stored.pending_days, Decimal::from(3));
        assert_eq!(stored.used_days, Decimal::ZERO);
        assert_eq!(stored.remaining(), Decimal::from(9));

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].template, "leave.escalated");
        assert!(sent[0].params.contains_key("sla_deadline"));
    }

    #[tokio::test]
    async fn rejecting_an_escalated_request_releases_the_reservation() {
        let h = harness(escalated(), 12).await;
        let submission = input(Decimal::from(3), false);
        let key = key_for(&submission);
        let request = h.manager.submit(submission).await.expect("escalated");

        let resolved = h
            .manager
            .decide(&request.id, HumanDecision::Reject, "hr-ops", Some("coverage".to_string()))
            .await
            .expect("rejected");
        assert_eq!(resolved.status, LeaveStatus::Rejected);
        assert_eq!(resolved.resolved_by.as_deref(), Some("hr-ops"));
        assert!(resolved.resolved_at.is_some());

        let stored = stored_balance(&h.pool, &key).await.expect("balance row");
        assert_eq!(stored.pending_days, Decimal::ZERO);
        assert_eq!(stored.used_days, Decimal::ZERO);
        assert_eq!(stored.remaining(), Decimal::from(12));

        let events = h.audit.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type, "request.resolved");
        assert_eq!(events[1].actor, "hr-ops");
    }

    #[tokio::test]
    async fn approving_an_escalated_request_commits_the_reservation() {
        let h = harness(escalated(), 12).await;
        let submission = input(Decimal::from(3), false);
        let key = key_for(&submission);
        let request = h.manager.submit(submission).await.expect("escalated");

        let resolved = h
            .manager
            .decide(&request.id, HumanDecision::Approve, "hr-ops", None)
            .await
            .expect("approved");
        assert_eq!(resolved.status, LeaveStatus::Approved);

        let stored = stored_balance(&h.pool, &key).await.expect("balance row");
        assert_eq!(stored.used_days, Decimal::from(3));
        assert_eq!(stored.pending_days, Decimal::ZERO);
        assert_eq!(stored.remaining(), Decimal::from(9));
    }

    #[tokio::test]
    async fn a_resolved_request_is_never_mutated_again() {
        let h = harness(escalated(), 12).await;
        let submission = input(Decimal::from(3), false);
        let key = key_for(&submission);
        let request = h.manager.submit(submission).await.expect("escalated");

        h.manager
            .decide(&request.id, HumanDecision::Approve, "hr-ops", None)
            .await
            .expect("approved");

        let error = h
            .manager
            .decide(&request.id, HumanDecision::Reject, "hr-ops", None)
            .await
            .expect_err("already resolved");
        assert_eq!(
            error,
            EngineError::AlreadyResolved {
                request_id: request.id.0.clone(),
                status: LeaveStatus::Approved,
            }
        );

        // Zero ledger movement from the refused second resolution.
        let stored = stored_balance(&h.pool, &key).await.expect("balance row");
        assert_eq!(stored.used_days, Decimal::from(3));
        assert_eq!(stored.pending_days, Decimal::ZERO);
    }

    #[tokio::test]
    async fn unknown_request_and_employee_are_distinct_failures() {
        let h = harness(approved(), 12).await;

        let error = h
            .manager
            .decide(
                &timeoff_core::LeaveRequestId("LR-missing".to_string()),
                HumanDecision::Approve,
                "hr-ops",
                None,
            )
            .await
            .expect_err("not found");
        assert!(matches!(error, EngineError::RequestNotFound { .. }));

        let mut submission = input(Decimal::from(1), false);
        submission.employee_id = "EMP-999".to_string();
        let error = h.manager.submit(submission).await.expect_err("no employee");
        assert!(matches!(error, EngineError::EmployeeNotFound { .. }));
    }

    #[tokio::test]
    async fn a_closed_pool_surfaces_a_retryable_transaction_error() {
        let h = harness(approved(), 12).await;
        h.pool.close().await;

        let error = h.manager.submit(input(Decimal::from(1), false)).await.expect_err("closed");
        assert!(matches!(error, EngineError::Transaction(_)));
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn concurrent_submissions_never_over_commit_the_balance() {
        let h = harness(approved(), 6).await;

        let mut handles = Vec::new();
        for _ in 0..5 {
            let manager = h.manager.clone();
            handles.push(tokio::spawn(async move {
                // Identical windows keep every submission on one balance row.
                let start = Utc::now().date_naive() + Duration::days(7);
                let submission = SubmissionInput {
                    employee_id: "EMP-001".to_string(),
                    leave_type: "casual".to_string(),
                    start_date: start,
                    end_date: start + Duration::days(1),
                    days: Decimal::from(2),
                    half_day: false,
                    reason: "family commitment out of town".to_string(),
                    has_document: false,
                };
                manager.submit(submission).await
            }));
        }

        let mut approved_count = 0;
        let mut insufficient_count = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(request) => {
                    assert_eq!(request.status, LeaveStatus::Approved);
                    approved_count += 1;
                }
                Err(EngineError::InsufficientBalance { .. }) => insufficient_count += 1,
                Err(other) => panic!("unexpected failure: {other}"),
            }
        }
        assert_eq!(approved_count, 3);
        assert_eq!(insufficient_count, 2);

        use chrono::Datelike;
        let year = (Utc::now().date_naive() + Duration::days(7)).year();
        let key = BalanceKey::new("EMP-001", "casual", year);
        let stored = stored_balance(&h.pool, &key).await.expect("balance row");
        assert_eq!(stored.used_days, Decimal::from(6));
        assert_eq!(stored.remaining(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn resolution_survives_a_cross_process_race_on_the_status_guard() {
        let h = harness(escalated(), 12).await;
        let request = h.manager.submit(input(Decimal::from(2), false)).await.expect("escalated");

        // Another process resolves the row first; the second resolution
        // must refuse instead of double-moving the ledger.
        {
            let mut conn = h.pool.acquire().await.expect("acquire");
            let flipped = request_repo::resolve(
                &mut conn,
                &request.id,
                LeaveStatus::Rejected,
                "other-process",
                None,
                Utc::now(),
            )
            .await
            .expect("resolve");
            assert!(flipped);
        }

        let error = h
            .manager
            .decide(&request.id, HumanDecision::Approve, "hr-ops", None)
            .await
            .expect_err("lost the race");
        assert!(matches!(error, EngineError::AlreadyResolved { .. }));
    }
}
