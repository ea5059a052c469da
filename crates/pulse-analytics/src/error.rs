//! Error types for the analytics core.

use thiserror::Error;

/// Errors surfaced by direct analytics queries.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The record store could not be reached or failed mid-query.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    /// A record could not be decoded from the store.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Errors raised by an insight oracle.
///
/// These never reach callers of the insight cache; every variant triggers the
/// heuristic fallback.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The oracle backend could not be reached.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle answered, but not with a usable insight.
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),
}

/// Errors from delivering a snapshot to a subscriber.
#[derive(Debug, Error)]
pub enum SubscriberError {
    /// The subscriber's channel is closed.
    #[error("subscriber disconnected")]
    Disconnected,

    /// The subscriber is not draining its channel fast enough.
    #[error("subscriber lagging")]
    Lagging,

    /// The initial snapshot could not be computed.
    #[error("snapshot unavailable: {0}")]
    Snapshot(#[from] AnalyticsError),
}
