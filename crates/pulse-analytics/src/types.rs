//! Record and snapshot types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filter::Filter;
use crate::summary::ReviewSummary;

// =============================================================================
// Records
// =============================================================================

/// Classification label attached to a feedback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    ProductIssue,
    DeliveryIssue,
    Sarcasm,
    Genuine,
    Other,
}

impl Classification {
    /// Every label, in canonical order.
    pub const ALL: [Classification; 5] = [
        Classification::ProductIssue,
        Classification::DeliveryIssue,
        Classification::Sarcasm,
        Classification::Genuine,
        Classification::Other,
    ];

    /// Wire label for this classification.
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::ProductIssue => "product_issue",
            Classification::DeliveryIssue => "delivery_issue",
            Classification::Sarcasm => "sarcasm",
            Classification::Genuine => "genuine",
            Classification::Other => "other",
        }
    }

    /// Lenient conversion used on the read path: unknown or missing labels
    /// fold into [`Classification::Other`].
    pub fn from_label(label: Option<&str>) -> Self {
        label
            .and_then(|l| l.parse().ok())
            .unwrap_or(Classification::Other)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown classification label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownClassification(pub String);

impl fmt::Display for UnknownClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown classification '{}', expected one of product_issue, delivery_issue, sarcasm, genuine, other",
            self.0
        )
    }
}

impl std::error::Error for UnknownClassification {}

impl FromStr for Classification {
    type Err = UnknownClassification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product_issue" => Ok(Classification::ProductIssue),
            "delivery_issue" => Ok(Classification::DeliveryIssue),
            "sarcasm" => Ok(Classification::Sarcasm),
            "genuine" => Ok(Classification::Genuine),
            "other" => Ok(Classification::Other),
            _ => Err(UnknownClassification(s.to_string())),
        }
    }
}

/// Stores keep timestamps to the microsecond.
const TIMESTAMP_DIGITS: u16 = 6;

/// A stored feedback record.
///
/// Serializes in normalized form: the identifier as a canonical UUID string
/// under `_id`, the timestamp as ISO-8601 with a `Z` suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub rating: u8,
    pub feedback: String,
    pub website: String,
    pub product: String,
    pub classification: Classification,
    /// One-sentence summary generated when the review was created.
    #[serde(default)]
    pub ai_summary: String,
    #[serde(default)]
    pub ai_suggestions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A record about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub rating: u8,
    pub feedback: String,
    pub website: String,
    pub product: String,
    pub classification: Classification,
    pub ai_summary: String,
    pub ai_suggestions: Vec<String>,
    /// Creation time; stores stamp the current time when absent.
    pub created_at: Option<DateTime<Utc>>,
}

impl NewRecord {
    /// Build a record with empty dimensions and the `other` label.
    pub fn new(rating: u8, feedback: impl Into<String>) -> Self {
        Self {
            rating,
            feedback: feedback.into(),
            website: String::new(),
            product: String::new(),
            classification: Classification::Other,
            ai_summary: String::new(),
            ai_suggestions: Vec::new(),
            created_at: None,
        }
    }

    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.website = website.into();
        self
    }

    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    pub fn classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }

    pub fn summary(mut self, summary: ReviewSummary) -> Self {
        self.ai_summary = summary.summary;
        self.ai_suggestions = summary.suggestions;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Materialize into a stored record with a fresh identifier.
    ///
    /// The timestamp is truncated to microseconds so the returned record
    /// equals what a store reads back later.
    pub fn into_record(self) -> Record {
        Record {
            id: Uuid::new_v4(),
            rating: self.rating,
            feedback: self.feedback,
            website: self.website,
            product: self.product,
            classification: self.classification,
            ai_summary: self.ai_summary,
            ai_suggestions: self.ai_suggestions,
            created_at: self
                .created_at
                .unwrap_or_else(Utc::now)
                .trunc_subsecs(TIMESTAMP_DIGITS),
        }
    }
}

// =============================================================================
// Store aggregates
// =============================================================================

/// A categorical dimension records can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Website,
    Product,
    Classification,
}

impl Dimension {
    /// Column or field name for this dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Website => "website",
            Dimension::Product => "product",
            Dimension::Classification => "classification",
        }
    }
}

/// One group returned by [`crate::RecordStore::group_by`].
///
/// `avg_rating` is the raw mean; rounding happens in the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStat {
    pub key: String,
    pub count: u64,
    pub avg_rating: f64,
}

// =============================================================================
// Snapshots
// =============================================================================

/// Record counts per classification. All five labels are always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCounts {
    pub product_issue: u64,
    pub delivery_issue: u64,
    pub sarcasm: u64,
    pub genuine: u64,
    pub other: u64,
}

impl ClassificationCounts {
    pub fn get(&self, classification: Classification) -> u64 {
        match classification {
            Classification::ProductIssue => self.product_issue,
            Classification::DeliveryIssue => self.delivery_issue,
            Classification::Sarcasm => self.sarcasm,
            Classification::Genuine => self.genuine,
            Classification::Other => self.other,
        }
    }

    pub fn add(&mut self, classification: Classification, count: u64) {
        let slot = match classification {
            Classification::ProductIssue => &mut self.product_issue,
            Classification::DeliveryIssue => &mut self.delivery_issue,
            Classification::Sarcasm => &mut self.sarcasm,
            Classification::Genuine => &mut self.genuine,
            Classification::Other => &mut self.other,
        };
        *slot += count;
    }

    pub fn total(&self) -> u64 {
        Classification::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// Label with the highest count; ties go to the earlier label in
    /// [`Classification::ALL`]. `None` when every count is zero.
    pub fn dominant(&self) -> Option<Classification> {
        let mut best: Option<(Classification, u64)> = None;
        for c in Classification::ALL {
            let n = self.get(c);
            if n > 0 && best.is_none_or(|(_, b)| n > b) {
                best = Some((c, n));
            }
        }
        best.map(|(c, _)| c)
    }
}

/// Per-website breakdown entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteBreakdown {
    pub website: String,
    pub count: u64,
    pub avg_rating: f64,
}

/// Per-product breakdown entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductBreakdown {
    pub product: String,
    pub count: u64,
    pub avg_rating: f64,
}

/// A complete point-in-time analytics view over a filtered record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub total_reviews: u64,
    pub avg_rating: f64,
    pub classification_counts: ClassificationCounts,
    pub website_breakdown: Vec<WebsiteBreakdown>,
    pub product_breakdown: Vec<ProductBreakdown>,
    pub latest_reviews: Vec<Record>,
}

impl AnalyticsSnapshot {
    /// Snapshot of an empty record set.
    pub fn empty() -> Self {
        Self {
            total_reviews: 0,
            avg_rating: 0.0,
            classification_counts: ClassificationCounts::default(),
            website_breakdown: Vec::new(),
            product_breakdown: Vec::new(),
            latest_reviews: Vec::new(),
        }
    }
}

/// Message pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotEnvelope {
    AnalyticsSnapshot { summary: AnalyticsSnapshot },
}

impl SnapshotEnvelope {
    pub fn new(summary: AnalyticsSnapshot) -> Self {
        SnapshotEnvelope::AnalyticsSnapshot { summary }
    }

    pub fn summary(&self) -> &AnalyticsSnapshot {
        match self {
            SnapshotEnvelope::AnalyticsSnapshot { summary } => summary,
        }
    }
}

// =============================================================================
// Insights
// =============================================================================

/// Creation time of the most recent record in the whole store.
///
/// Serializes as an ISO-8601 string, or `null` for an empty store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FreshnessToken(pub Option<DateTime<Utc>>);

impl FreshnessToken {
    /// Token of an empty store.
    pub const EMPTY: FreshnessToken = FreshnessToken(None);

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl From<Option<DateTime<Utc>>> for FreshnessToken {
    fn from(ts: Option<DateTime<Utc>>) -> Self {
        FreshnessToken(ts)
    }
}

/// Derived narrative insight for one filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightPayload {
    #[serde(rename = "summary")]
    pub narrative: String,
    pub recommendations: [String; 3],
    pub generated_at: DateTime<Utc>,
    #[serde(rename = "source_last_review_at")]
    pub token: FreshnessToken,
    #[serde(rename = "filters")]
    pub filter: Filter,
}
