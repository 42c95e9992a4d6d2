//! Local user accounts.
//!
//! Storage is abstracted behind [`store::UserStore`]; the reconciler decides
//! whether an external identity creates, updates or reuses an account.

pub mod postgres;
pub mod reconcile;
pub mod store;

use thiserror::Error;

/// User store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same unique key already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}
