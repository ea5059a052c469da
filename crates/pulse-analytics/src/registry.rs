//! Live subscriber registry and snapshot broadcaster.
//!
//! Subscribers are opaque handles that accept [`SnapshotEnvelope`]s. The
//! registry pushes one snapshot on registration and one per broadcast.
//! Handles whose delivery fails are removed once the broadcast pass is over;
//! a failed send is the only disconnect signal the registry needs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::engine::AggregationEngine;
use crate::error::SubscriberError;
use crate::filter::Filter;
use crate::types::SnapshotEnvelope;

/// Registry-assigned identity of a subscriber.
pub type SubscriberId = u64;

/// Receiving end of a [`ChannelSubscriber`].
pub type SnapshotReceiver = mpsc::Receiver<Arc<SnapshotEnvelope>>;

/// Something that can receive pushed snapshots.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn send(&self, envelope: Arc<SnapshotEnvelope>) -> Result<(), SubscriberError>;
}

/// Subscriber backed by a bounded channel.
///
/// Delivery never waits: a full buffer counts as a failed send, so a stalled
/// consumer is pruned instead of slowing the broadcast.
pub struct ChannelSubscriber {
    tx: mpsc::Sender<Arc<SnapshotEnvelope>>,
}

impl ChannelSubscriber {
    /// Create a subscriber and the receiver its snapshots arrive on.
    pub fn channel(buffer: usize) -> (Self, SnapshotReceiver) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn send(&self, envelope: Arc<SnapshotEnvelope>) -> Result<(), SubscriberError> {
        self.tx.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubscriberError::Lagging,
            mpsc::error::TrySendError::Closed(_) => SubscriberError::Disconnected,
        })
    }
}

/// Result of one broadcast pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// The snapshot could not be computed; nothing was sent.
    Skipped,
    /// The snapshot was offered to every registered subscriber.
    Delivered { delivered: usize, pruned: usize },
}

/// Set of live subscribers.
///
/// Registration, unregistration and the send pass of a broadcast all hold the
/// same lock, so a handle is never sent to while it is being removed.
pub struct SubscriberRegistry {
    engine: Arc<AggregationEngine>,
    subscribers: Mutex<HashMap<SubscriberId, Arc<dyn Subscriber>>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new(engine: Arc<AggregationEngine>) -> Self {
        Self {
            engine,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a subscriber and push it one full unfiltered snapshot before
    /// returning.
    ///
    /// If the snapshot cannot be computed or delivered the subscriber is
    /// removed again and the error returned.
    pub async fn register(
        &self,
        handle: Arc<dyn Subscriber>,
    ) -> Result<SubscriberId, SubscriberError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut subscribers = self.subscribers.lock().await;
        subscribers.insert(id, Arc::clone(&handle));

        let initial = match self.engine.compute(&Filter::all()).await {
            Ok(snapshot) => handle.send(Arc::new(SnapshotEnvelope::new(snapshot))).await,
            Err(e) => Err(SubscriberError::from(e)),
        };

        if let Err(e) = initial {
            subscribers.remove(&id);
            warn!(subscriber = id, error = %e, "initial snapshot failed, subscriber dropped");
            return Err(e);
        }

        debug!(subscriber = id, total = subscribers.len(), "subscriber registered");
        Ok(id)
    }

    /// Remove a subscriber. Removing an absent id is a no-op.
    ///
    /// Returns whether the id was registered.
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().await.remove(&id).is_some();
        if removed {
            debug!(subscriber = id, "subscriber unregistered");
        }
        removed
    }

    /// Compute one unfiltered snapshot and push it to every subscriber.
    ///
    /// Failed deliveries do not stop the pass; those subscribers are pruned
    /// after every handle has been tried. A store failure skips the broadcast.
    pub async fn broadcast_update(&self) -> BroadcastOutcome {
        let snapshot = match self.engine.compute(&Filter::all()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "analytics broadcast skipped");
                return BroadcastOutcome::Skipped;
            }
        };
        let envelope = Arc::new(SnapshotEnvelope::new(snapshot));

        let mut subscribers = self.subscribers.lock().await;
        let mut dead = Vec::new();
        for (id, handle) in subscribers.iter() {
            if let Err(e) = handle.send(Arc::clone(&envelope)).await {
                debug!(subscriber = *id, error = %e, "snapshot delivery failed");
                dead.push(*id);
            }
        }

        let delivered = subscribers.len() - dead.len();
        for id in &dead {
            subscribers.remove(id);
        }
        if !dead.is_empty() {
            debug!(pruned = dead.len(), remaining = subscribers.len(), "pruned dead subscribers");
        }

        BroadcastOutcome::Delivered {
            delivered,
            pruned: dead.len(),
        }
    }

    /// Number of registered subscribers.
    pub async fn len(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.lock().await.is_empty()
    }

    /// Whether `id` is currently registered.
    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().await.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::RecordWriter;
    use crate::types::{AnalyticsSnapshot, NewRecord};

    /// Records every snapshot it receives; optionally always fails.
    #[derive(Default)]
    struct RecordingSubscriber {
        received: StdMutex<Vec<AnalyticsSnapshot>>,
        fail: bool,
    }

    impl RecordingSubscriber {
        fn failing() -> Self {
            Self {
                received: StdMutex::new(Vec::new()),
                fail: true,
            }
        }

        fn count(&self) -> usize {
            self.received.lock().unwrap().len()
        }

        fn last_total(&self) -> Option<u64> {
            self.received.lock().unwrap().last().map(|s| s.total_reviews)
        }
    }

    #[async_trait]
    impl Subscriber for RecordingSubscriber {
        async fn send(&self, envelope: Arc<SnapshotEnvelope>) -> Result<(), SubscriberError> {
            if self.fail {
                return Err(SubscriberError::Disconnected);
            }
            self.received
                .lock()
                .unwrap()
                .push(envelope.summary().clone());
            Ok(())
        }
    }

    async fn store_with(n: usize) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for i in 0..n {
            store
                .insert(NewRecord::new(4, format!("review {i}")))
                .await
                .unwrap();
        }
        store
    }

    fn registry_for(store: Arc<MemoryStore>) -> SubscriberRegistry {
        SubscriberRegistry::new(Arc::new(AggregationEngine::new(store)))
    }

    #[tokio::test]
    async fn test_register_pushes_initial_snapshot() {
        let registry = registry_for(store_with(7).await);
        let sub = Arc::new(RecordingSubscriber::default());

        let id = registry.register(sub.clone()).await.unwrap();

        assert!(registry.contains(id).await);
        assert_eq!(sub.count(), 1);
        assert_eq!(sub.last_total(), Some(7));
    }

    #[tokio::test]
    async fn test_broadcast_prunes_failed_subscriber() {
        let store = store_with(0).await;
        let registry = registry_for(store.clone());

        let first = Arc::new(RecordingSubscriber::default());
        let id1 = registry.register(first.clone()).await.unwrap();

        // Registered directly so the initial push doesn't already reject it.
        let second = Arc::new(RecordingSubscriber::failing());
        let id2 = registry.next_id.fetch_add(1, Ordering::SeqCst);
        registry
            .subscribers
            .lock()
            .await
            .insert(id2, second.clone());

        let third = Arc::new(RecordingSubscriber::default());
        let id3 = registry.register(third.clone()).await.unwrap();

        store.insert(NewRecord::new(5, "new")).await.unwrap();
        let outcome = registry.broadcast_update().await;

        assert_eq!(
            outcome,
            BroadcastOutcome::Delivered {
                delivered: 2,
                pruned: 1
            }
        );
        // One initial snapshot plus exactly one broadcast each.
        assert_eq!(first.count(), 2);
        assert_eq!(third.count(), 2);
        assert_eq!(first.last_total(), Some(1));
        assert_eq!(third.last_total(), Some(1));
        assert!(registry.contains(id1).await);
        assert!(!registry.contains(id2).await);
        assert!(registry.contains(id3).await);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_register_rejects_failing_subscriber() {
        let registry = registry_for(store_with(1).await);

        let result = registry.register(Arc::new(RecordingSubscriber::failing())).await;

        assert!(matches!(result, Err(SubscriberError::Disconnected)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = registry_for(store_with(0).await);
        let id = registry
            .register(Arc::new(RecordingSubscriber::default()))
            .await
            .unwrap();

        assert!(registry.unregister(id).await);
        assert!(!registry.unregister(id).await);
        assert!(!registry.unregister(9999).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_broadcast_skipped_when_store_unavailable() {
        let store = store_with(2).await;
        let registry = registry_for(store.clone());
        let sub = Arc::new(RecordingSubscriber::default());
        registry.register(sub.clone()).await.unwrap();

        store.set_available(false);
        assert_eq!(registry.broadcast_update().await, BroadcastOutcome::Skipped);

        assert_eq!(sub.count(), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_channel_subscriber_full_and_closed() {
        let (sub, mut rx) = ChannelSubscriber::channel(1);
        let envelope = Arc::new(SnapshotEnvelope::new(AnalyticsSnapshot::empty()));

        sub.send(envelope.clone()).await.unwrap();
        assert!(matches!(
            sub.send(envelope.clone()).await,
            Err(SubscriberError::Lagging)
        ));

        assert!(rx.recv().await.is_some());
        drop(rx);
        assert!(matches!(
            sub.send(envelope).await,
            Err(SubscriberError::Disconnected)
        ));
    }
}
