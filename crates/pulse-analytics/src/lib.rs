//! Feedback analytics core for Pulse.
//!
//! This crate provides:
//! - Filtered aggregate snapshots over a record store
//! - Insight generation cached per filter and invalidated by a global freshness token
//! - A subscriber registry that pushes a fresh snapshot to every live subscriber after each write
//! - Per-review summaries with a heuristic fallback for the write path
//! - An in-memory record store for tests and ephemeral deployments

mod config;
mod engine;
mod error;
mod filter;
mod hub;
mod insights;
pub mod memory;
pub mod oracle;
pub mod registry;
mod store;
pub mod summary;
mod types;

pub use config::AnalyticsConfig;
pub use engine::AggregationEngine;
pub use error::{AnalyticsError, OracleError, SubscriberError};
pub use filter::Filter;
pub use hub::Analytics;
pub use insights::InsightCache;
pub use memory::MemoryStore;
pub use oracle::{HeuristicOracle, InsightOracle, OracleInsight};
pub use registry::{
    BroadcastOutcome, ChannelSubscriber, SnapshotReceiver, Subscriber, SubscriberId,
    SubscriberRegistry,
};
pub use store::{RecordStore, RecordWriter};
pub use summary::{
    MAX_SUGGESTIONS, ReviewSummarizer, ReviewSummary, heuristic_review_summary,
    summarize_or_fallback,
};
pub use types::*;
