pub mod balance;
pub mod employee;
pub mod request;

use thiserror::Error;

pub use balance::LedgerOutcome;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}
