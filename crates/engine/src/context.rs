//! Builds the policy context snapshot handed to the evaluator. The
//! snapshot is recomputed per submission and advisory only: the ledger
//! guard inside the transaction is the authoritative balance check.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

use timeoff_core::evaluator::PolicyContext;
use timeoff_db::repositories::{employee, request, RepositoryError};

use crate::lifecycle::PolicySettings;

pub async fn build_policy_context(
    conn: &mut SqliteConnection,
    team: &str,
    employee_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    remaining: Decimal,
    settings: &PolicySettings,
) -> Result<PolicyContext, RepositoryError> {
    let team_size = employee::team_size(conn, team).await?;
    let on_leave_overlapping =
        request::count_overlapping_on_leave(conn, team, employee_id, start, end).await?;

    Ok(PolicyContext {
        remaining,
        team_size,
        on_leave_overlapping,
        concurrency_ceiling: settings.concurrency_ceiling,
        blackout_dates: settings.blackout_dates.clone(),
        allow_negative_balance: settings.allow_negative_balance,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal::Decimal;

    use timeoff_core::domain::employee::Employee;
    use timeoff_core::domain::request::{LeaveRequest, LeaveRequestId, LeaveStatus};
    use timeoff_core::evaluator::{Decision, Verdict};
    use timeoff_db::repositories::{employee, request};
    use timeoff_db::{connect_with_settings, migrations};

    use super::build_policy_context;
    use crate::lifecycle::PolicySettings;

    fn settings() -> PolicySettings {
        PolicySettings {
            registry: Default::default(),
            limits: timeoff_core::validation::ValidationLimits {
                max_days: Decimal::from(90),
                document_threshold_days: Decimal::from(10),
            },
            default_entitlement: Decimal::from(12),
            concurrency_ceiling: 2,
            allow_negative_balance: false,
            sla_hours: 24,
            blackout_dates: Vec::new(),
        }
    }

    fn approved_request(id: &str, employee_id: &str, start: NaiveDate) -> LeaveRequest {
        let now = Utc::now();
        LeaveRequest {
            id: LeaveRequestId(id.to_string()),
            employee_id: employee_id.to_string(),
            leave_type: "casual".to_string(),
            start_date: start,
            end_date: start + Duration::days(2),
            days: Decimal::from(3),
            half_day: false,
            reason: "planned family travel".to_string(),
            status: LeaveStatus::Approved,
            decision: Decision {
                verdict: Verdict::Approved {
                    confidence: 0.9,
                    explanation: "approved: all constraints satisfied".to_string(),
                },
                fallback: false,
            },
            sla_deadline: None,
            resolved_by: None,
            resolution_note: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn snapshot_reflects_team_and_overlap_counts() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let mut conn = pool.acquire().await.expect("acquire");

        for (id, team) in [("EMP-001", "platform"), ("EMP-002", "platform"), ("EMP-003", "platform")]
        {
            employee::insert(
                &mut conn,
                &Employee {
                    id: id.to_string(),
                    full_name: format!("Employee {id}"),
                    team: team.to_string(),
                    created_at: Utc::now(),
                },
            )
            .await
            .expect("insert");
        }

        let start = NaiveDate::from_ymd_opt(2026, 9, 7).expect("date");
        request::insert(&mut conn, &approved_request("LR-001", "EMP-002", start))
            .await
            .expect("insert request");

        let context = build_policy_context(
            &mut conn,
            "platform",
            "EMP-001",
            start,
            start + Duration::days(1),
            Decimal::from(9),
            &settings(),
        )
        .await
        .expect("context");

        assert_eq!(context.team_size, 3);
        assert_eq!(context.on_leave_overlapping, 1);
        assert_eq!(context.remaining, Decimal::from(9));
        assert_eq!(context.concurrency_ceiling, 2);
    }
}
