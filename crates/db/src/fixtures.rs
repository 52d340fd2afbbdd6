//! Deterministic demo data for local runs and the CLI `seed` command.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use timeoff_core::domain::balance::BalanceKey;
use timeoff_core::domain::employee::Employee;
use timeoff_core::domain::leave_type::FALLBACK_LEAVE_TYPES;

use crate::repositories::{balance, employee, RepositoryError};
use crate::DbPool;

#[derive(Clone, Debug, Serialize)]
pub struct SeedSummary {
    pub employees: usize,
    pub balances: usize,
}

const DEMO_EMPLOYEES: &[(&str, &str, &str)] = &[
    ("EMP-001", "Priya Sharma", "platform"),
    ("EMP-002", "Marcus Webb", "platform"),
    ("EMP-003", "Elena Petrova", "platform"),
    ("EMP-004", "Dayo Adeyemi", "support"),
];

/// Inserts the demo roster and opens a balance per leave type for the
/// current year. Safe to run repeatedly: employees upsert and balances
/// are created lazily.
pub async fn seed_demo(
    pool: &DbPool,
    default_entitlement: Decimal,
) -> Result<SeedSummary, RepositoryError> {
    let mut conn = pool.acquire().await?;
    let now = Utc::now();
    let year = now.date_naive().year();
    let mut balances = 0;

    for (id, full_name, team) in DEMO_EMPLOYEES {
        employee::insert(
            &mut conn,
            &Employee {
                id: id.to_string(),
                full_name: full_name.to_string(),
                team: team.to_string(),
                created_at: now,
            },
        )
        .await?;

        for leave_type in FALLBACK_LEAVE_TYPES {
            let key = BalanceKey::new(*id, *leave_type, year);
            balance::get_or_create(&mut conn, &key, default_entitlement, now).await?;
            balances += 1;
        }
    }

    Ok(SeedSummary { employees: DEMO_EMPLOYEES.len(), balances })
}
