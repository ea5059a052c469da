//! Insight memoization keyed by filter.
//!
//! Each entry remembers the freshness token it was computed against. An entry
//! is served only while the store's current token still equals it; the token
//! is global, so any newer record invalidates every entry at once. Stale
//! entries are replaced lazily on the next request for their filter.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::engine::AggregationEngine;
use crate::error::AnalyticsError;
use crate::filter::Filter;
use crate::oracle::{InsightOracle, heuristic_insight};
use crate::types::InsightPayload;

/// Cache of oracle output per filter combination.
pub struct InsightCache {
    engine: Arc<AggregationEngine>,
    oracle: Arc<dyn InsightOracle>,
    /// Filter -> payload. Keyed by the filter itself, so only equal
    /// constraint sets share an entry.
    entries: DashMap<Filter, Arc<InsightPayload>>,
}

impl InsightCache {
    pub fn new(engine: Arc<AggregationEngine>, oracle: Arc<dyn InsightOracle>) -> Self {
        Self {
            engine,
            oracle,
            entries: DashMap::new(),
        }
    }

    /// Return insights for `filter`, regenerating them only if the store has
    /// changed since they were cached.
    ///
    /// Oracle failures degrade to the heuristic insight; only store failures
    /// are returned. Concurrent misses on the same signature may each call the
    /// oracle; the last one to finish wins the slot.
    pub async fn get_insights(
        &self,
        filter: &Filter,
    ) -> Result<Arc<InsightPayload>, AnalyticsError> {
        let signature = filter.signature();
        let token = self.engine.freshness().await?;

        // Clone out of the map; no shard guard may be held across an await.
        let cached = self.entries.get(filter).map(|e| Arc::clone(e.value()));
        if let Some(payload) = cached {
            if payload.token == token {
                trace!(signature = %signature, "insight cache hit");
                return Ok(payload);
            }
            debug!(signature = %signature, "insight cache entry stale");
        } else {
            debug!(signature = %signature, "insight cache miss");
        }

        let snapshot = self.engine.compute(filter).await?;
        let insight = match self.oracle.generate(&snapshot, filter).await {
            Ok(insight) => insight,
            Err(e) => {
                warn!(error = %e, signature = %signature, "oracle failed, using heuristic insight");
                heuristic_insight(&snapshot, filter)
            }
        };

        let payload = Arc::new(InsightPayload {
            narrative: insight.narrative,
            recommendations: insight.recommendations,
            generated_at: Utc::now(),
            token,
            filter: filter.clone(),
        });
        self.entries.insert(filter.clone(), Arc::clone(&payload));
        Ok(payload)
    }

    /// Number of cached filters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
