//! Insight oracle and review summarizer backed by an OpenAI-compatible
//! chat-completion API.
//!
//! The default endpoint is Groq. Any failure is reported as an
//! [`pulse_analytics::OracleError`]; callers fall back to heuristics.

mod chat;
mod config;
mod prompt;

pub use chat::ChatCompletionOracle;
pub use config::{DEFAULT_BASE_URL, DEFAULT_MODEL, OracleConfig};
pub use prompt::{build_prompt, build_review_prompt, parse_reply, parse_review_reply};
