//! Record store capabilities consumed by the analytics core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AnalyticsError;
use crate::filter::Filter;
use crate::types::{Dimension, GroupStat, NewRecord, Record};

/// Read access to the feedback record set.
///
/// Every call may fail with [`AnalyticsError::StoreUnavailable`]. Implementations
/// own their own timeouts; the core never retries.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Number of records matching the filter.
    async fn count(&self, filter: &Filter) -> Result<u64, AnalyticsError>;

    /// Mean rating of matching records, `None` when nothing matches.
    async fn aggregate_average(&self, filter: &Filter) -> Result<Option<f64>, AnalyticsError>;

    /// Count and mean rating per distinct value of `dimension` among matching records.
    /// Order is unspecified.
    async fn group_by(
        &self,
        dimension: Dimension,
        filter: &Filter,
    ) -> Result<Vec<GroupStat>, AnalyticsError>;

    /// Up to `limit` matching records, newest first.
    async fn latest(&self, filter: &Filter, limit: usize) -> Result<Vec<Record>, AnalyticsError>;

    /// Creation time of the newest record in the whole store, ignoring filters.
    async fn latest_timestamp_overall(&self) -> Result<Option<DateTime<Utc>>, AnalyticsError>;

    /// Every record, newest first.
    async fn list_all(&self) -> Result<Vec<Record>, AnalyticsError>;
}

/// Write access used by the record-creation path.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Persist a record and return it as stored.
    async fn insert(&self, record: NewRecord) -> Result<Record, AnalyticsError>;
}
