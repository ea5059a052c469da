//! Top-level analytics service shared by the query, subscription and write paths.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::AnalyticsConfig;
use crate::engine::AggregationEngine;
use crate::error::{AnalyticsError, SubscriberError};
use crate::filter::Filter;
use crate::insights::InsightCache;
use crate::oracle::InsightOracle;
use crate::registry::{
    BroadcastOutcome, ChannelSubscriber, SnapshotReceiver, SubscriberId, SubscriberRegistry,
};
use crate::store::RecordStore;
use crate::types::{AnalyticsSnapshot, InsightPayload};

/// The analytics subsystem: engine, insight cache and subscriber registry.
///
/// Created once at start-up and shared behind an `Arc`.
pub struct Analytics {
    engine: Arc<AggregationEngine>,
    insights: InsightCache,
    registry: SubscriberRegistry,
    config: AnalyticsConfig,
}

impl Analytics {
    pub fn new(
        store: Arc<dyn RecordStore>,
        oracle: Arc<dyn InsightOracle>,
        config: AnalyticsConfig,
    ) -> Arc<Self> {
        let engine = Arc::new(AggregationEngine::with_recent_limit(
            store,
            config.recent_limit,
        ));
        Arc::new(Self {
            insights: InsightCache::new(Arc::clone(&engine), oracle),
            registry: SubscriberRegistry::new(Arc::clone(&engine)),
            engine,
            config,
        })
    }

    /// Snapshot for `filter`, computed fresh from the store.
    pub async fn summary(&self, filter: &Filter) -> Result<AnalyticsSnapshot, AnalyticsError> {
        self.engine.compute(filter).await
    }

    /// Cached or regenerated insights for `filter`.
    pub async fn insights(&self, filter: &Filter) -> Result<Arc<InsightPayload>, AnalyticsError> {
        self.insights.get_insights(filter).await
    }

    /// Register a channel-backed subscriber sized by the configured buffer.
    ///
    /// The receiver already holds the initial snapshot when this returns.
    pub async fn subscribe(
        &self,
    ) -> Result<(SubscriberId, SnapshotReceiver), SubscriberError> {
        let (handle, rx) = ChannelSubscriber::channel(self.config.subscriber_buffer);
        let id = self.registry.register(Arc::new(handle)).await?;
        Ok((id, rx))
    }

    pub async fn unsubscribe(&self, id: SubscriberId) {
        self.registry.unregister(id).await;
    }

    /// Hook for the record-creation path.
    ///
    /// Spawns the broadcast and returns immediately; the caller may drop the
    /// handle.
    pub fn on_record_created(self: &Arc<Self>) -> JoinHandle<BroadcastOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = this.registry.broadcast_update().await;
            debug!(?outcome, "record-created broadcast finished");
            outcome
        })
    }

    pub fn engine(&self) -> &Arc<AggregationEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    pub fn insight_cache(&self) -> &InsightCache {
        &self.insights
    }
}
