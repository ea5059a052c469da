//! SQLite persistence for Pulse reviews.
//!
//! [`SqliteStore`] implements both the read-side [`pulse_analytics::RecordStore`]
//! and the write-side [`pulse_analytics::RecordWriter`] over a single
//! `reviews` table.

mod error;
mod sqlite;

pub use error::StoreError;
pub use sqlite::SqliteStore;
