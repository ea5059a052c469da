//! Error types for the SQLite store.

use pulse_analytics::AnalyticsError;
use thiserror::Error;

/// Errors raised by [`crate::SqliteStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A row could not be decoded into a record.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// The connection mutex was poisoned by a panicking query.
    #[error("connection lock poisoned")]
    Poisoned,

    /// The blocking task running a query was cancelled or panicked.
    #[error("query task failed: {0}")]
    Task(String),
}

impl From<StoreError> for AnalyticsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidRow(msg) => AnalyticsError::InvalidRecord(msg),
            other => AnalyticsError::StoreUnavailable(other.to_string()),
        }
    }
}
