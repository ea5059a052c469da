//! Tunables for the analytics core.

/// Default number of recent records carried in a snapshot.
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// Default per-subscriber channel capacity.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;

/// Configuration for [`crate::Analytics`].
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Number of most recent records included in each snapshot.
    pub recent_limit: usize,
    /// Capacity of the channel backing each live subscriber.
    /// A subscriber whose buffer is full when a snapshot arrives is pruned.
    pub subscriber_buffer: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            recent_limit: DEFAULT_RECENT_LIMIT,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}
