//! `pulse seed`: synthetic demo dataset.
//!
//! Three storefronts with distinct profiles: alpha-shop is well reviewed,
//! beta-store has product complaints, gamma-mart has delivery complaints.
//! A handful of sarcastic and neutral reviews are mixed in. Each review
//! carries the heuristic summary it would get on creation.

use chrono::{DateTime, Duration, Utc};
use miette::{Result, miette};
use tracing::info;

use pulse_analytics::Classification::{self, DeliveryIssue, Genuine, Other, ProductIssue, Sarcasm};
use pulse_analytics::{Filter, NewRecord, RecordStore, RecordWriter, heuristic_review_summary};
use pulse_store::SqliteStore;

use crate::serve::MEMORY_DB;

/// Smallest dataset produced; padded with positive alpha-shop reviews.
const MIN_RECORDS: usize = 50;

/// Spacing between consecutive seeded reviews, newest first.
const SPACING_MINUTES: i64 = 5;

struct Sample {
    website: &'static str,
    product: &'static str,
    rating: u8,
    feedback: &'static str,
    classification: Classification,
}

const fn sample(
    website: &'static str,
    product: &'static str,
    rating: u8,
    feedback: &'static str,
    classification: Classification,
) -> Sample {
    Sample {
        website,
        product,
        rating,
        feedback,
        classification,
    }
}

const ALPHA_PRAISE: [&str; 5] = [
    "Loved the alpha phone, smooth and reliable.",
    "Alpha case fits perfectly and feels premium.",
    "Alpha charge is fast and dependable.",
    "Great experience with alpha products.",
    "Alpha phone camera is excellent.",
];

const BETA_MOUSE_COMPLAINTS: [&str; 4] = [
    "beta mouse is laggy and unresponsive.",
    "beta mouse clicks fail often.",
    "beta mouse feels cheap and drags.",
    "beta mouse stopped working quickly.",
];

const GAMMA_DELIVERY_COMPLAINTS: [&str; 5] = [
    "gamma watch arrived late, delivery issue.",
    "gamma band shipped late and box was damaged.",
    "gamma scale delivery delay annoyed me.",
    "gamma watch delayed delivery, packaging dented.",
    "gamma band delivery tracking was missing.",
];

const ONE_OFFS: [Sample; 9] = [
    sample("beta-store", "beta-band", 2, "beta band is expensive and honestly too expensive for the features.", ProductIssue),
    sample("beta-store", "beta-band", 2, "beta band feels expensive with little value.", ProductIssue),
    sample("beta-store", "beta-laptop", 3, "beta laptop runs warm but usable.", ProductIssue),
    sample("beta-store", "beta-bag", 4, "beta bag is sturdy and spacious.", Genuine),
    sample("beta-store", "beta-mouse", 2, "Yeah right, totally the best mouse ever.", Sarcasm),
    sample("gamma-mart", "gamma-band", 2, "Sure, delivery was lightning fast... not really.", Sarcasm),
    sample("alpha-shop", "alpha-phone", 3, "Decent but nothing special.", Other),
    sample("beta-store", "beta-laptop", 3, "Average performance, okay value.", Other),
    sample("gamma-mart", "gamma-scale", 3, "Works fine so far.", Other),
];

const PADDING: Sample = sample(
    "alpha-shop",
    "alpha-charge",
    5,
    "Consistently great alpha experience.",
    Genuine,
);

/// Build the dataset with the newest review at `now`.
pub(crate) fn build_dataset(now: DateTime<Utc>) -> Vec<NewRecord> {
    let mut samples: Vec<(Sample, String)> = Vec::new();
    let mut push = |s: Sample, feedback: String| samples.push((s, feedback));

    for (product, rating, suffix) in [
        ("alpha-phone", 5, ""),
        ("alpha-case", 4, " Nice design."),
        ("alpha-charge", 5, " Battery lasts long."),
    ] {
        for text in ALPHA_PRAISE {
            push(
                sample("alpha-shop", product, rating, text, Genuine),
                format!("{}{}", text, suffix),
            );
        }
    }

    for text in BETA_MOUSE_COMPLAINTS {
        push(sample("beta-store", "beta-mouse", 1, text, ProductIssue), text.to_string());
        push(
            sample("beta-store", "beta-mouse", 2, text, ProductIssue),
            format!("{} Needs fixes.", text),
        );
    }

    for text in GAMMA_DELIVERY_COMPLAINTS {
        push(sample("gamma-mart", "gamma-watch", 2, text, DeliveryIssue), text.to_string());
        push(
            sample("gamma-mart", "gamma-band", 3, text, DeliveryIssue),
            format!("{} Please fix shipping.", text),
        );
    }

    for s in ONE_OFFS {
        let text = s.feedback.to_string();
        push(s, text);
    }

    while samples.len() < MIN_RECORDS {
        samples.push((PADDING, PADDING.feedback.to_string()));
    }

    samples
        .into_iter()
        .enumerate()
        .map(|(i, (s, feedback))| {
            let summary = heuristic_review_summary(s.rating, &feedback);
            NewRecord::new(s.rating, feedback)
                .summary(summary)
                .website(s.website)
                .product(s.product)
                .classification(s.classification)
                .created_at(now - Duration::minutes(SPACING_MINUTES * i as i64))
        })
        .collect()
}

pub(crate) async fn run(db: &str, reset: bool) -> Result<()> {
    if db == MEMORY_DB {
        return Err(miette!("refusing to seed an in-memory database; pass --db <path>"));
    }

    let store =
        SqliteStore::open(db).map_err(|e| miette!("failed to open database {}: {}", db, e))?;

    if reset {
        let removed = store.clear().await.map_err(|e| miette!("{}", e))?;
        info!(removed, "existing reviews deleted");
    }

    let dataset = build_dataset(Utc::now());
    let inserted = dataset.len();
    for record in dataset {
        store.insert(record).await.map_err(|e| miette!("{}", e))?;
    }

    let total = store
        .count(&Filter::all())
        .await
        .map_err(|e| miette!("{}", e))?;
    info!(inserted, total, db = %db, "seeding complete");
    Ok(())
}
