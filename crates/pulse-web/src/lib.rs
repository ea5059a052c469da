//! HTTP and WebSocket surface for Pulse.
//!
//! This crate provides:
//! - Filtered analytics summaries and cached insights
//! - A WebSocket feed that pushes a fresh snapshot after every new review
//! - Review submission and listing
//! - Health reporting

mod error;
mod routes;
mod ws;

pub use error::WebError;
pub use routes::{AppState, create_router};
