use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use timeoff_core::domain::employee::Employee;

use super::RepositoryError;

pub async fn insert(
    conn: &mut SqliteConnection,
    employee: &Employee,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO employee (id, full_name, team, created_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             full_name = excluded.full_name,
             team = excluded.team",
    )
    .bind(&employee.id)
    .bind(&employee.full_name)
    .bind(&employee.team)
    .bind(employee.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Employee>, RepositoryError> {
    let row = sqlx::query("SELECT id, full_name, team, created_at FROM employee WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else { return Ok(None) };

    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Some(Employee {
        id: row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        full_name: row.try_get("full_name").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        team: row.try_get("team").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        created_at,
    }))
}

pub async fn team_size(conn: &mut SqliteConnection, team: &str) -> Result<u32, RepositoryError> {
    let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM employee WHERE team = ?")
        .bind(team)
        .fetch_one(&mut *conn)
        .await?
        .try_get("count")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    Ok(count.max(0) as u32)
}
