//! In-memory record store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::trace;

use crate::error::AnalyticsError;
use crate::filter::Filter;
use crate::store::{RecordStore, RecordWriter};
use crate::types::{Dimension, GroupStat, NewRecord, Record};

/// A record store held entirely in memory.
///
/// Records are kept in insertion order. Availability can be toggled to
/// simulate an unreachable backend.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Record>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records.
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Toggle simulated availability. While unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check(&self) -> Result<(), AnalyticsError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AnalyticsError::StoreUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn matching(&self, filter: &Filter) -> Result<Vec<Record>, AnalyticsError> {
        self.check()?;
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| filter.matches(r)).cloned().collect())
    }
}

fn newest_first(records: &mut [Record]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn count(&self, filter: &Filter) -> Result<u64, AnalyticsError> {
        Ok(self.matching(filter).await?.len() as u64)
    }

    async fn aggregate_average(&self, filter: &Filter) -> Result<Option<f64>, AnalyticsError> {
        let matching = self.matching(filter).await?;
        if matching.is_empty() {
            return Ok(None);
        }
        let sum: u64 = matching.iter().map(|r| u64::from(r.rating)).sum();
        Ok(Some(sum as f64 / matching.len() as f64))
    }

    async fn group_by(
        &self,
        dimension: Dimension,
        filter: &Filter,
    ) -> Result<Vec<GroupStat>, AnalyticsError> {
        let matching = self.matching(filter).await?;

        // key -> (count, rating sum)
        let mut groups: BTreeMap<String, (u64, u64)> = BTreeMap::new();
        for record in &matching {
            let key = match dimension {
                Dimension::Website => record.website.clone(),
                Dimension::Product => record.product.clone(),
                Dimension::Classification => record.classification.as_str().to_string(),
            };
            let entry = groups.entry(key).or_default();
            entry.0 += 1;
            entry.1 += u64::from(record.rating);
        }

        Ok(groups
            .into_iter()
            .map(|(key, (count, sum))| GroupStat {
                key,
                count,
                avg_rating: sum as f64 / count as f64,
            })
            .collect())
    }

    async fn latest(&self, filter: &Filter, limit: usize) -> Result<Vec<Record>, AnalyticsError> {
        let mut matching = self.matching(filter).await?;
        newest_first(&mut matching);
        matching.truncate(limit);
        Ok(matching)
    }

    async fn latest_timestamp_overall(&self) -> Result<Option<DateTime<Utc>>, AnalyticsError> {
        self.check()?;
        let records = self.records.read().await;
        Ok(records.iter().map(|r| r.created_at).max())
    }

    async fn list_all(&self) -> Result<Vec<Record>, AnalyticsError> {
        let mut all = self.matching(&Filter::all()).await?;
        newest_first(&mut all);
        Ok(all)
    }
}

#[async_trait]
impl RecordWriter for MemoryStore {
    async fn insert(&self, record: NewRecord) -> Result<Record, AnalyticsError> {
        self.check()?;
        let record = record.into_record();
        self.records.write().await.push(record.clone());
        trace!(id = %record.id, "memory store: record inserted");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Classification;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[tokio::test]
    async fn test_latest_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        for i in 0..4 {
            store
                .insert(NewRecord::new(3, format!("r{i}")).created_at(at(i)))
                .await
                .unwrap();
        }

        let latest = store.latest(&Filter::all(), 2).await.unwrap();
        let texts: Vec<_> = latest.iter().map(|r| r.feedback.as_str()).collect();
        assert_eq!(texts, vec!["r3", "r2"]);
        assert_eq!(store.latest_timestamp_overall().await.unwrap(), Some(at(3)));
    }

    #[tokio::test]
    async fn test_group_by_classification() {
        let store = MemoryStore::new();
        store
            .insert(NewRecord::new(1, "a").classification(Classification::ProductIssue))
            .await
            .unwrap();
        store
            .insert(NewRecord::new(3, "b").classification(Classification::ProductIssue))
            .await
            .unwrap();

        let groups = store
            .group_by(Dimension::Classification, &Filter::all())
            .await
            .unwrap();
        assert_eq!(
            groups,
            vec![GroupStat {
                key: "product_issue".to_string(),
                count: 2,
                avg_rating: 2.0
            }]
        );
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(matches!(
            store.count(&Filter::all()).await,
            Err(AnalyticsError::StoreUnavailable(_))
        ));
        assert!(store.latest_timestamp_overall().await.is_err());
        assert!(store.insert(NewRecord::new(5, "x")).await.is_err());

        store.set_available(true);
        assert_eq!(store.count(&Filter::all()).await.unwrap(), 0);
    }
}
