use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqliteConnection};

use timeoff_core::domain::balance::{from_half_days, to_half_days, BalanceKey, LeaveBalance};

use super::RepositoryError;

/// Result of a guarded ledger mutation. `Insufficient` means the guard in
/// the UPDATE matched no row: the caller must abort its transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum LedgerOutcome {
    Applied,
    Insufficient { remaining: Decimal },
}

/// All operations here take the caller's transaction connection. The
/// check-then-act lives inside a single conditional UPDATE, so concurrent
/// submissions against the same row serialize on the row's write lock and
/// can never over-reserve.

pub async fn get_or_create(
    conn: &mut SqliteConnection,
    key: &BalanceKey,
    default_entitlement: Decimal,
    now: DateTime<Utc>,
) -> Result<LeaveBalance, RepositoryError> {
    let entitlement_hd = units(default_entitlement)?;
    sqlx::query(
        "INSERT INTO leave_balance (employee_id, leave_type, year, entitlement_hd,
                                    carried_hd, used_hd, pending_hd, created_at, updated_at)
         VALUES (?, ?, ?, ?, 0, 0, 0, ?, ?)
         ON CONFLICT(employee_id, leave_type, year) DO NOTHING",
    )
    .bind(&key.employee_id)
    .bind(&key.leave_type)
    .bind(key.year)
    .bind(entitlement_hd)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    fetch(conn, key)
        .await?
        .ok_or_else(|| RepositoryError::Decode("balance row missing after upsert".to_string()))
}

pub async fn fetch(
    conn: &mut SqliteConnection,
    key: &BalanceKey,
) -> Result<Option<LeaveBalance>, RepositoryError> {
    let row = sqlx::query(
        "SELECT employee_id, leave_type, year, entitlement_hd, carried_hd, used_hd,
                pending_hd, created_at, updated_at
         FROM leave_balance WHERE employee_id = ? AND leave_type = ? AND year = ?",
    )
    .bind(&key.employee_id)
    .bind(&key.leave_type)
    .bind(key.year)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(ref r) => Ok(Some(row_to_balance(r)?)),
        None => Ok(None),
    }
}

pub async fn list_for_employee(
    conn: &mut SqliteConnection,
    employee_id: &str,
    year: i32,
) -> Result<Vec<LeaveBalance>, RepositoryError> {
    let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
        "SELECT employee_id, leave_type, year, entitlement_hd, carried_hd, used_hd,
                pending_hd, created_at, updated_at
         FROM leave_balance WHERE employee_id = ? AND year = ? ORDER BY leave_type ASC",
    )
    .bind(employee_id)
    .bind(year)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_balance).collect()
}

/// Increments `pending_hd`, guarded by the remaining-balance check unless
/// negative balances are policy-permitted.
pub async fn reserve(
    conn: &mut SqliteConnection,
    key: &BalanceKey,
    days: Decimal,
    allow_negative: bool,
    now: DateTime<Utc>,
) -> Result<LedgerOutcome, RepositoryError> {
    let hd = units(days)?;
    let result = sqlx::query(
        "UPDATE leave_balance
         SET pending_hd = pending_hd + ?, updated_at = ?
         WHERE employee_id = ? AND leave_type = ? AND year = ?
           AND (? OR entitlement_hd + carried_hd - used_hd - pending_hd >= ?)",
    )
    .bind(hd)
    .bind(now.to_rfc3339())
    .bind(&key.employee_id)
    .bind(&key.leave_type)
    .bind(key.year)
    .bind(allow_negative)
    .bind(hd)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return insufficient(conn, key).await;
    }
    Ok(LedgerOutcome::Applied)
}

/// Moves `days` from pending to used, guarded by `pending_hd >= days`.
pub async fn commit_reserved(
    conn: &mut SqliteConnection,
    key: &BalanceKey,
    days: Decimal,
    now: DateTime<Utc>,
) -> Result<LedgerOutcome, RepositoryError> {
    let hd = units(days)?;
    let result = sqlx::query(
        "UPDATE leave_balance
         SET pending_hd = pending_hd - ?, used_hd = used_hd + ?, updated_at = ?
         WHERE employee_id = ? AND leave_type = ? AND year = ? AND pending_hd >= ?",
    )
    .bind(hd)
    .bind(hd)
    .bind(now.to_rfc3339())
    .bind(&key.employee_id)
    .bind(&key.leave_type)
    .bind(key.year)
    .bind(hd)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return insufficient(conn, key).await;
    }
    Ok(LedgerOutcome::Applied)
}

/// Drops a reservation without touching `used_hd`, same pending guard.
pub async fn release(
    conn: &mut SqliteConnection,
    key: &BalanceKey,
    days: Decimal,
    now: DateTime<Utc>,
) -> Result<LedgerOutcome, RepositoryError> {
    let hd = units(days)?;
    let result = sqlx::query(
        "UPDATE leave_balance
         SET pending_hd = pending_hd - ?, updated_at = ?
         WHERE employee_id = ? AND leave_type = ? AND year = ? AND pending_hd >= ?",
    )
    .bind(hd)
    .bind(now.to_rfc3339())
    .bind(&key.employee_id)
    .bind(&key.leave_type)
    .bind(key.year)
    .bind(hd)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return insufficient(conn, key).await;
    }
    Ok(LedgerOutcome::Applied)
}

async fn insufficient(
    conn: &mut SqliteConnection,
    key: &BalanceKey,
) -> Result<LedgerOutcome, RepositoryError> {
    let remaining =
        fetch(conn, key).await?.map(|balance| balance.remaining()).unwrap_or(Decimal::ZERO);
    Ok(LedgerOutcome::Insufficient { remaining })
}

fn units(days: Decimal) -> Result<i64, RepositoryError> {
    to_half_days(days).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_balance(row: &sqlx::sqlite::SqliteRow) -> Result<LeaveBalance, RepositoryError> {
    let employee_id: String =
        row.try_get("employee_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let leave_type: String =
        row.try_get("leave_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let year: i32 = row.try_get("year").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let entitlement_hd: i64 =
        row.try_get("entitlement_hd").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let carried_hd: i64 =
        row.try_get("carried_hd").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let used_hd: i64 =
        row.try_get("used_hd").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let pending_hd: i64 =
        row.try_get("pending_hd").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(LeaveBalance {
        key: BalanceKey::new(employee_id, leave_type, year),
        entitlement: from_half_days(entitlement_hd),
        carried_forward: from_half_days(carried_hd),
        used_days: from_half_days(used_hd),
        pending_days: from_half_days(pending_hd),
        created_at,
        updated_at,
    })
}
