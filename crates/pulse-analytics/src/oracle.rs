//! Insight oracle capability and the deterministic heuristic oracle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::filter::Filter;
use crate::types::{AnalyticsSnapshot, Classification};

/// Recommendations returned by the heuristic oracle.
pub const GENERIC_RECOMMENDATIONS: [&str; 3] = [
    "Dig into the top theme and address root causes",
    "Highlight wins from high-rated segments",
    "Track changes after fixes and monitor rating trend",
];

/// Narrative and recommendations produced by an oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleInsight {
    pub narrative: String,
    pub recommendations: [String; 3],
}

/// Turns aggregate numbers into a short narrative and three recommendations.
#[async_trait]
pub trait InsightOracle: Send + Sync {
    async fn generate(
        &self,
        snapshot: &AnalyticsSnapshot,
        filter: &Filter,
    ) -> Result<OracleInsight, OracleError>;
}

/// Deterministic template-based insight built from a snapshot.
pub fn heuristic_insight(snapshot: &AnalyticsSnapshot, filter: &Filter) -> OracleInsight {
    let theme = snapshot
        .classification_counts
        .dominant()
        .unwrap_or(Classification::Other);

    OracleInsight {
        narrative: format!(
            "{} reviews with avg rating {:.2}. Top theme: {}. Filters: {}.",
            snapshot.total_reviews, snapshot.avg_rating, theme, filter
        ),
        recommendations: GENERIC_RECOMMENDATIONS.map(String::from),
    }
}

/// Oracle that never calls out; always answers with [`heuristic_insight`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicOracle;

#[async_trait]
impl InsightOracle for HeuristicOracle {
    async fn generate(
        &self,
        snapshot: &AnalyticsSnapshot,
        filter: &Filter,
    ) -> Result<OracleInsight, OracleError> {
        Ok(heuristic_insight(snapshot, filter))
    }
}
