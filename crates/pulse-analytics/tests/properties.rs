//! Property-based tests for snapshot aggregation over arbitrary record sets.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use tokio::runtime::Runtime;

use pulse_analytics::{
    AggregationEngine, Classification, Filter, MemoryStore, NewRecord, Record,
};

// Strategy for generating classification labels
fn classification() -> impl Strategy<Value = Classification> {
    prop_oneof![
        Just(Classification::ProductIssue),
        Just(Classification::DeliveryIssue),
        Just(Classification::Sarcasm),
        Just(Classification::Genuine),
        Just(Classification::Other),
    ]
}

// Small pools so that groups collide and ties are likely
fn website() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("alpha-shop".to_string()),
        Just("beta-store".to_string()),
        Just("gamma-mart".to_string()),
        Just(String::new()),
    ]
}

fn product() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("alpha-phone".to_string()),
        Just("beta-watch".to_string()),
        Just("gamma-band".to_string()),
    ]
}

fn record() -> impl Strategy<Value = Record> {
    (1u8..=5, website(), product(), classification(), 0i64..10_000).prop_map(
        |(rating, website, product, classification, minutes)| {
            NewRecord::new(rating, "generated feedback")
                .website(website)
                .product(product)
                .classification(classification)
                .created_at(
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                        + Duration::minutes(minutes),
                )
                .into_record()
        },
    )
}

fn filter() -> impl Strategy<Value = Filter> {
    (
        proptest::option::of(website()),
        proptest::option::of(product()),
        proptest::option::of(classification()),
    )
        .prop_map(|(website, product, classification)| {
            Filter::new(website, product, classification)
        })
}

fn engine_over(records: Vec<Record>) -> AggregationEngine {
    AggregationEngine::new(Arc::new(MemoryStore::with_records(records)))
}

proptest! {
    #[test]
    fn classification_counts_sum_to_total(
        records in prop::collection::vec(record(), 0..60),
        filter in filter(),
    ) {
        let rt = Runtime::new().unwrap();
        let snapshot = rt.block_on(engine_over(records).compute(&filter)).unwrap();

        prop_assert_eq!(snapshot.classification_counts.total(), snapshot.total_reviews);
        let website_total: u64 = snapshot.website_breakdown.iter().map(|w| w.count).sum();
        let product_total: u64 = snapshot.product_breakdown.iter().map(|p| p.count).sum();
        prop_assert_eq!(website_total, snapshot.total_reviews);
        prop_assert_eq!(product_total, snapshot.total_reviews);
    }

    #[test]
    fn breakdowns_sorted_by_count_then_key(
        records in prop::collection::vec(record(), 0..60),
    ) {
        let rt = Runtime::new().unwrap();
        let snapshot = rt.block_on(engine_over(records).compute(&Filter::all())).unwrap();

        for pair in snapshot.website_breakdown.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(
                a.count > b.count || (a.count == b.count && a.website < b.website),
                "out of order: {:?} before {:?}", a, b
            );
        }
        for pair in snapshot.product_breakdown.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(
                a.count > b.count || (a.count == b.count && a.product < b.product),
                "out of order: {:?} before {:?}", a, b
            );
        }
    }

    #[test]
    fn averages_stay_within_rating_range(
        records in prop::collection::vec(record(), 1..60),
        filter in filter(),
    ) {
        let rt = Runtime::new().unwrap();
        let snapshot = rt.block_on(engine_over(records).compute(&filter)).unwrap();

        if snapshot.total_reviews == 0 {
            prop_assert_eq!(snapshot.avg_rating, 0.0);
        } else {
            prop_assert!((1.0..=5.0).contains(&snapshot.avg_rating));
        }
        for w in &snapshot.website_breakdown {
            prop_assert!((1.0..=5.0).contains(&w.avg_rating));
        }
    }

    #[test]
    fn latest_reviews_match_filter_and_are_newest_first(
        records in prop::collection::vec(record(), 0..60),
        filter in filter(),
    ) {
        let rt = Runtime::new().unwrap();
        let snapshot = rt.block_on(engine_over(records).compute(&filter)).unwrap();

        prop_assert!(snapshot.latest_reviews.len() <= 5);
        prop_assert!(snapshot.latest_reviews.len() as u64 <= snapshot.total_reviews);
        for r in &snapshot.latest_reviews {
            prop_assert!(filter.matches(r));
        }
        for pair in snapshot.latest_reviews.windows(2) {
            prop_assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[test]
    fn empty_store_yields_zeros_for_any_filter(filter in filter()) {
        let rt = Runtime::new().unwrap();
        let snapshot = rt.block_on(engine_over(Vec::new()).compute(&filter)).unwrap();

        prop_assert_eq!(snapshot.total_reviews, 0);
        prop_assert_eq!(snapshot.avg_rating, 0.0);
        prop_assert_eq!(snapshot.classification_counts.total(), 0);
        prop_assert!(snapshot.website_breakdown.is_empty());
        prop_assert!(snapshot.product_breakdown.is_empty());
        prop_assert!(snapshot.latest_reviews.is_empty());
    }
}
