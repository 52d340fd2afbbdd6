use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of a ledger row: one row per employee, leave type, and calendar
/// year. Rows are created lazily on first use and never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub employee_id: String,
    pub leave_type: String,
    pub year: i32,
}

impl BalanceKey {
    pub fn new(employee_id: impl Into<String>, leave_type: impl Into<String>, year: i32) -> Self {
        Self { employee_id: employee_id.into(), leave_type: leave_type.into(), year }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("insufficient balance: requested {requested}, remaining {remaining}")]
    Insufficient { requested: Decimal, remaining: Decimal },
    #[error("ledger underflow on `{field}`: {amount} exceeds {available}")]
    Underflow { field: &'static str, amount: Decimal, available: Decimal },
    #[error("day quantity {0} is not a multiple of 0.5")]
    Granularity(Decimal),
}

/// Balance ledger row. All quantities are exact sums of 0.5-day multiples;
/// no rounding is ever applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaveBalance {
    pub key: BalanceKey,
    pub entitlement: Decimal,
    pub carried_forward: Decimal,
    pub used_days: Decimal,
    pub pending_days: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveBalance {
    pub fn open(key: BalanceKey, entitlement: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            key,
            entitlement,
            carried_forward: Decimal::ZERO,
            used_days: Decimal::ZERO,
            pending_days: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn remaining(&self) -> Decimal {
        self.entitlement + self.carried_forward - self.used_days - self.pending_days
    }

    /// Provisional hold for an undecided request. The remaining check and
    /// the increment belong in the same unit of work; the persistent ledger
    /// performs both inside a single guarded UPDATE.
    pub fn reserve(&mut self, days: Decimal, allow_negative: bool) -> Result<(), BalanceError> {
        if !allow_negative && self.remaining() < days {
            return Err(BalanceError::Insufficient { requested: days, remaining: self.remaining() });
        }
        self.pending_days += days;
        Ok(())
    }

    /// Converts a reservation into a final deduction.
    pub fn commit_reserved(&mut self, days: Decimal) -> Result<(), BalanceError> {
        if self.pending_days < days {
            return Err(BalanceError::Underflow {
                field: "pending_days",
                amount: days,
                available: self.pending_days,
            });
        }
        self.pending_days -= days;
        self.used_days += days;
        Ok(())
    }

    /// Drops a reservation without touching `used_days`.
    pub fn release(&mut self, days: Decimal) -> Result<(), BalanceError> {
        if self.pending_days < days {
            return Err(BalanceError::Underflow {
                field: "pending_days",
                amount: days,
                available: self.pending_days,
            });
        }
        self.pending_days -= days;
        Ok(())
    }
}

/// Converts a day quantity to half-day integer units, the ledger's storage
/// representation. Fails on anything off the 0.5 grid.
pub fn to_half_days(days: Decimal) -> Result<i64, BalanceError> {
    let doubled = days * Decimal::TWO;
    if !doubled.fract().is_zero() {
        return Err(BalanceError::Granularity(days));
    }
    doubled.to_i64().ok_or(BalanceError::Granularity(days))
}

pub fn from_half_days(units: i64) -> Decimal {
    Decimal::new(units * 5, 1).normalize()
}
