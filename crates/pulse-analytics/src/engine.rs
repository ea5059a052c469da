//! Aggregate snapshot computation.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::DEFAULT_RECENT_LIMIT;
use crate::error::AnalyticsError;
use crate::filter::Filter;
use crate::store::RecordStore;
use crate::types::{
    AnalyticsSnapshot, Classification, ClassificationCounts, Dimension, FreshnessToken, GroupStat,
    ProductBreakdown, WebsiteBreakdown,
};

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sort groups by count descending, then by key ascending.
fn sort_groups(groups: &mut [GroupStat]) {
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
}

/// Computes [`AnalyticsSnapshot`]s directly from a record store.
///
/// Results are never cached: every call reflects the store's current state.
pub struct AggregationEngine {
    store: Arc<dyn RecordStore>,
    recent_limit: usize,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_recent_limit(store, DEFAULT_RECENT_LIMIT)
    }

    pub fn with_recent_limit(store: Arc<dyn RecordStore>, recent_limit: usize) -> Self {
        Self {
            store,
            recent_limit,
        }
    }

    /// The store this engine reads from.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Compute a snapshot of the records matching `filter`.
    ///
    /// The total, the average and the classification counts all come from one
    /// grouped read, so they always agree with each other. The breakdowns and
    /// the recent list are separate reads and may already include a record
    /// inserted while the snapshot was being built.
    #[instrument(skip_all, fields(filter = %filter))]
    pub async fn compute(&self, filter: &Filter) -> Result<AnalyticsSnapshot, AnalyticsError> {
        let (by_class, mut by_website, mut by_product, latest_reviews) = tokio::try_join!(
            self.store.group_by(Dimension::Classification, filter),
            self.store.group_by(Dimension::Website, filter),
            self.store.group_by(Dimension::Product, filter),
            self.store.latest(filter, self.recent_limit),
        )?;

        let mut classification_counts = ClassificationCounts::default();
        let mut rating_sum = 0.0;
        for group in &by_class {
            classification_counts.add(Classification::from_label(Some(&group.key)), group.count);
            // Ratings are integers, so each group's sum is too.
            rating_sum += (group.avg_rating * group.count as f64).round();
        }
        let total_reviews = classification_counts.total();

        sort_groups(&mut by_website);
        sort_groups(&mut by_product);

        let snapshot = AnalyticsSnapshot {
            total_reviews,
            avg_rating: if total_reviews == 0 {
                0.0
            } else {
                round2(rating_sum / total_reviews as f64)
            },
            classification_counts,
            website_breakdown: by_website
                .into_iter()
                .map(|g| WebsiteBreakdown {
                    website: g.key,
                    count: g.count,
                    avg_rating: round2(g.avg_rating),
                })
                .collect(),
            product_breakdown: by_product
                .into_iter()
                .map(|g| ProductBreakdown {
                    product: g.key,
                    count: g.count,
                    avg_rating: round2(g.avg_rating),
                })
                .collect(),
            latest_reviews,
        };

        debug!(
            total = snapshot.total_reviews,
            avg = snapshot.avg_rating,
            "computed analytics snapshot"
        );
        Ok(snapshot)
    }

    /// Current freshness token: the newest record's creation time across the
    /// whole store.
    pub async fn freshness(&self) -> Result<FreshnessToken, AnalyticsError> {
        Ok(self.store.latest_timestamp_overall().await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::RecordWriter;
    use crate::types::NewRecord;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn engine_with(store: Arc<MemoryStore>) -> AggregationEngine {
        AggregationEngine::new(store)
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(3.0), 3.0);
        assert_eq!(round2(2.666_666), 2.67);
        assert_eq!(round2(4.125_1), 4.13);
    }

    #[tokio::test]
    async fn test_empty_store_snapshot() {
        let engine = engine_with(Arc::new(MemoryStore::new()));
        let snapshot = engine.compute(&Filter::all()).await.unwrap();
        assert_eq!(snapshot, AnalyticsSnapshot::empty());
        assert_eq!(engine.freshness().await.unwrap(), FreshnessToken::EMPTY);
    }

    #[tokio::test]
    async fn test_two_record_scenario() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(NewRecord::new(1, "broken").classification(Classification::ProductIssue))
            .await
            .unwrap();
        store
            .insert(NewRecord::new(5, "great").classification(Classification::Genuine))
            .await
            .unwrap();

        let snapshot = engine_with(store).compute(&Filter::all()).await.unwrap();

        assert_eq!(snapshot.total_reviews, 2);
        assert_eq!(snapshot.avg_rating, 3.0);
        assert_eq!(
            snapshot.classification_counts,
            ClassificationCounts {
                product_issue: 1,
                delivery_issue: 0,
                sarcasm: 0,
                genuine: 1,
                other: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_breakdown_ties_sorted_by_key() {
        let store = Arc::new(MemoryStore::new());
        for (site, rating) in [
            ("zeta", 4),
            ("alpha", 2),
            ("zeta", 5),
            ("alpha", 3),
            ("mid", 1),
        ] {
            store
                .insert(NewRecord::new(rating, "x").website(site).product("p"))
                .await
                .unwrap();
        }

        let snapshot = engine_with(store).compute(&Filter::all()).await.unwrap();
        let sites: Vec<_> = snapshot
            .website_breakdown
            .iter()
            .map(|b| (b.website.as_str(), b.count, b.avg_rating))
            .collect();

        assert_eq!(sites, vec![("alpha", 2, 2.5), ("zeta", 2, 4.5), ("mid", 1, 1.0)]);
        assert_eq!(snapshot.product_breakdown.len(), 1);
        assert_eq!(snapshot.product_breakdown[0].avg_rating, 3.0);
    }

    #[tokio::test]
    async fn test_filter_restricts_every_aggregate() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(
                NewRecord::new(2, "late")
                    .website("gamma-mart")
                    .classification(Classification::DeliveryIssue),
            )
            .await
            .unwrap();
        store
            .insert(NewRecord::new(5, "good").website("alpha-shop"))
            .await
            .unwrap();

        let filter = Filter::all().with_website("gamma-mart");
        let snapshot = engine_with(store).compute(&filter).await.unwrap();

        assert_eq!(snapshot.total_reviews, 1);
        assert_eq!(snapshot.avg_rating, 2.0);
        assert_eq!(snapshot.classification_counts.delivery_issue, 1);
        assert_eq!(snapshot.website_breakdown.len(), 1);
        assert_eq!(snapshot.latest_reviews.len(), 1);
        assert_eq!(snapshot.latest_reviews[0].feedback, "late");
    }

    #[tokio::test]
    async fn test_recent_list_capped_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        for i in 0..8 {
            store
                .insert(NewRecord::new(4, format!("r{i}")).created_at(base + Duration::minutes(i)))
                .await
                .unwrap();
        }

        let snapshot = engine_with(store).compute(&Filter::all()).await.unwrap();
        let texts: Vec<_> = snapshot
            .latest_reviews
            .iter()
            .map(|r| r.feedback.as_str())
            .collect();
        assert_eq!(texts, vec!["r7", "r6", "r5", "r4", "r3"]);
    }

    /// Store whose scalar queries disagree with its grouped ones, as they can
    /// when a write lands between two reads.
    struct SkewedStore(MemoryStore);

    #[async_trait::async_trait]
    impl RecordStore for SkewedStore {
        async fn count(&self, _: &Filter) -> Result<u64, AnalyticsError> {
            Ok(999)
        }
        async fn aggregate_average(&self, _: &Filter) -> Result<Option<f64>, AnalyticsError> {
            Ok(Some(1.0))
        }
        async fn group_by(
            &self,
            dimension: Dimension,
            filter: &Filter,
        ) -> Result<Vec<GroupStat>, AnalyticsError> {
            self.0.group_by(dimension, filter).await
        }
        async fn latest(
            &self,
            filter: &Filter,
            limit: usize,
        ) -> Result<Vec<crate::types::Record>, AnalyticsError> {
            self.0.latest(filter, limit).await
        }
        async fn latest_timestamp_overall(
            &self,
        ) -> Result<Option<chrono::DateTime<Utc>>, AnalyticsError> {
            self.0.latest_timestamp_overall().await
        }
        async fn list_all(&self) -> Result<Vec<crate::types::Record>, AnalyticsError> {
            self.0.list_all().await
        }
    }

    #[tokio::test]
    async fn test_total_and_average_agree_with_classification_counts() {
        let inner = MemoryStore::new();
        for (rating, class) in [
            (1, Classification::ProductIssue),
            (2, Classification::ProductIssue),
            (5, Classification::Genuine),
            (4, Classification::Other),
        ] {
            inner
                .insert(NewRecord::new(rating, "x").classification(class))
                .await
                .unwrap();
        }

        let engine = AggregationEngine::new(Arc::new(SkewedStore(inner)));
        let snapshot = engine.compute(&Filter::all()).await.unwrap();

        assert_eq!(snapshot.total_reviews, 4);
        assert_eq!(snapshot.classification_counts.total(), snapshot.total_reviews);
        assert_eq!(snapshot.avg_rating, 3.0);
    }

    #[tokio::test]
    async fn test_average_rounds_half_up() {
        let store = Arc::new(MemoryStore::new());
        // 17 / 8 = 2.125, spread across labels so the sum is rebuilt from groups.
        for (rating, class) in [
            (5, Classification::Genuine),
            (4, Classification::Genuine),
            (1, Classification::ProductIssue),
            (1, Classification::ProductIssue),
            (1, Classification::ProductIssue),
            (2, Classification::DeliveryIssue),
            (2, Classification::DeliveryIssue),
            (1, Classification::Sarcasm),
        ] {
            store
                .insert(NewRecord::new(rating, "x").classification(class))
                .await
                .unwrap();
        }

        let snapshot = engine_with(store).compute(&Filter::all()).await.unwrap();
        assert_eq!(snapshot.total_reviews, 8);
        assert_eq!(snapshot.avg_rating, 2.13);
    }

    #[tokio::test]
    async fn test_store_unavailable_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.set_available(false);

        let result = engine_with(store).compute(&Filter::all()).await;
        assert!(matches!(result, Err(AnalyticsError::StoreUnavailable(_))));
    }
}
