use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqliteConnection};

use timeoff_core::domain::balance::{from_half_days, to_half_days};
use timeoff_core::domain::request::{LeaveRequest, LeaveRequestId, LeaveStatus};
use timeoff_core::evaluator::{Decision, Verdict, Violation};

use super::RepositoryError;

fn parse_status(s: &str) -> LeaveStatus {
    match s {
        "approved" => LeaveStatus::Approved,
        "rejected" => LeaveStatus::Rejected,
        "escalated" => LeaveStatus::Escalated,
        _ => LeaveStatus::Pending,
    }
}

pub fn status_as_str(status: LeaveStatus) -> &'static str {
    match status {
        LeaveStatus::Pending => "pending",
        LeaveStatus::Escalated => "escalated",
        LeaveStatus::Approved => "approved",
        LeaveStatus::Rejected => "rejected",
    }
}

pub async fn insert(
    conn: &mut SqliteConnection,
    request: &LeaveRequest,
) -> Result<(), RepositoryError> {
    let days_hd = to_half_days(request.days).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let verdict = if request.decision.verdict.is_approved() { "approved" } else { "escalated" };
    let source = if request.decision.fallback { "fallback" } else { "service" };
    let violations = serde_json::to_string(request.decision.verdict.violations())
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let suggestions = serde_json::to_string(request.decision.verdict.suggestions())
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    sqlx::query(
        "INSERT INTO leave_request (id, employee_id, leave_type, year, start_date, end_date,
                                    days_hd, half_day, reason, status, verdict, decision_source,
                                    confidence, explanation, violations, suggestions,
                                    sla_deadline, resolved_by, resolution_note, resolved_at,
                                    created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&request.id.0)
    .bind(&request.employee_id)
    .bind(&request.leave_type)
    .bind(request.year())
    .bind(request.start_date.to_string())
    .bind(request.end_date.to_string())
    .bind(days_hd)
    .bind(request.half_day)
    .bind(&request.reason)
    .bind(status_as_str(request.status))
    .bind(verdict)
    .bind(source)
    .bind(request.decision.verdict.confidence())
    .bind(request.decision.verdict.explanation())
    .bind(violations)
    .bind(suggestions)
    .bind(request.sla_deadline.map(|dt| dt.to_rfc3339()))
    .bind(&request.resolved_by)
    .bind(&request.resolution_note)
    .bind(request.resolved_at.map(|dt| dt.to_rfc3339()))
    .bind(request.created_at.to_rfc3339())
    .bind(request.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: &LeaveRequestId,
) -> Result<Option<LeaveRequest>, RepositoryError> {
    let row = sqlx::query("SELECT * FROM leave_request WHERE id = ?")
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(ref r) => Ok(Some(row_to_request(r)?)),
        None => Ok(None),
    }
}

pub async fn list_for_employee(
    conn: &mut SqliteConnection,
    employee_id: &str,
) -> Result<Vec<LeaveRequest>, RepositoryError> {
    let rows: Vec<sqlx::sqlite::SqliteRow> =
        sqlx::query("SELECT * FROM leave_request WHERE employee_id = ? ORDER BY created_at DESC")
            .bind(employee_id)
            .fetch_all(&mut *conn)
            .await?;

    rows.iter().map(row_to_request).collect()
}

/// Flips an escalated request into a terminal state together with its
/// resolution metadata. The status guard makes a concurrent resolution
/// lose cleanly: zero rows affected means someone else got there first.
pub async fn resolve(
    conn: &mut SqliteConnection,
    id: &LeaveRequestId,
    status: LeaveStatus,
    resolved_by: &str,
    resolution_note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE leave_request
         SET status = ?, resolved_by = ?, resolution_note = ?, resolved_at = ?, updated_at = ?
         WHERE id = ? AND status = 'escalated'",
    )
    .bind(status_as_str(status))
    .bind(resolved_by)
    .bind(resolution_note)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .bind(&id.0)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Employees of `team` (other than the requester) with an approved or
/// escalated request overlapping [start, end]. Dates are ISO strings, so
/// string comparison matches date order.
pub async fn count_overlapping_on_leave(
    conn: &mut SqliteConnection,
    team: &str,
    exclude_employee_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<u32, RepositoryError> {
    let count: i64 = sqlx::query(
        "SELECT COUNT(DISTINCT lr.employee_id) AS count
         FROM leave_request lr
         JOIN employee e ON e.id = lr.employee_id
         WHERE e.team = ?
           AND lr.employee_id != ?
           AND lr.status IN ('approved', 'escalated')
           AND NOT (lr.end_date < ? OR lr.start_date > ?)",
    )
    .bind(team)
    .bind(exclude_employee_id)
    .bind(start.to_string())
    .bind(end.to_string())
    .fetch_one(&mut *conn)
    .await?
    .try_get("count")
    .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(count.max(0) as u32)
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<LeaveRequest, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let employee_id: String = row.try_get("employee_id").map_err(decode)?;
    let leave_type: String = row.try_get("leave_type").map_err(decode)?;
    let start_date_str: String = row.try_get("start_date").map_err(decode)?;
    let end_date_str: String = row.try_get("end_date").map_err(decode)?;
    let days_hd: i64 = row.try_get("days_hd").map_err(decode)?;
    let half_day: bool = row.try_get("half_day").map_err(decode)?;
    let reason: String = row.try_get("reason").map_err(decode)?;
    let status_str: String = row.try_get("status").map_err(decode)?;
    let verdict_str: String = row.try_get("verdict").map_err(decode)?;
    let source_str: String = row.try_get("decision_source").map_err(decode)?;
    let confidence: f64 = row.try_get("confidence").map_err(decode)?;
    let explanation: String = row.try_get("explanation").map_err(decode)?;
    let violations_json: String = row.try_get("violations").map_err(decode)?;
    let suggestions_json: String = row.try_get("suggestions").map_err(decode)?;
    let sla_deadline_str: Option<String> = row.try_get("sla_deadline").map_err(decode)?;
    let resolved_by: Option<String> = row.try_get("resolved_by").map_err(decode)?;
    let resolution_note: Option<String> = row.try_get("resolution_note").map_err(decode)?;
    let resolved_at_str: Option<String> = row.try_get("resolved_at").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;
    let updated_at_str: String = row.try_get("updated_at").map_err(decode)?;

    let start_date = start_date_str
        .parse::<NaiveDate>()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let end_date =
        end_date_str.parse::<NaiveDate>().map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let violations: Vec<Violation> = serde_json::from_str(&violations_json)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let suggestions: Vec<String> = serde_json::from_str(&suggestions_json)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let verdict = if verdict_str == "approved" {
        Verdict::Approved { confidence, explanation }
    } else {
        Verdict::Escalated { violations, suggestions, confidence, explanation }
    };
    let decision = Decision { verdict, fallback: source_str == "fallback" };

    let parse_ts = |s: &str| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    };

    Ok(LeaveRequest {
        id: LeaveRequestId(id),
        employee_id,
        leave_type,
        start_date,
        end_date,
        days: from_half_days(days_hd),
        half_day,
        reason,
        status: parse_status(&status_str),
        decision,
        sla_deadline: sla_deadline_str.as_deref().map(parse_ts),
        resolved_by,
        resolution_note,
        resolved_at: resolved_at_str.as_deref().map(parse_ts),
        created_at: parse_ts(&created_at_str),
        updated_at: parse_ts(&updated_at_str),
    })
}
