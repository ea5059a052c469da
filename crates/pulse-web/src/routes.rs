//! HTTP routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::debug;

use pulse_analytics::{
    Analytics, AnalyticsSnapshot, Classification, Filter, HeuristicOracle, InsightPayload,
    NewRecord, Record, RecordStore, RecordWriter, ReviewSummarizer, summarize_or_fallback,
};

use crate::error::WebError;
use crate::ws::analytics_ws;

/// Longest accepted feedback text, in characters.
const MAX_FEEDBACK_CHARS: usize = 4000;

/// Shared state for the web server.
pub struct AppState {
    pub analytics: Arc<Analytics>,
    /// Read side, for listings and health checks.
    pub store: Arc<dyn RecordStore>,
    pub writer: Arc<dyn RecordWriter>,
    /// Summarizes each review before it is stored.
    pub summarizer: Arc<dyn ReviewSummarizer>,
}

impl AppState {
    /// State with heuristic review summaries.
    pub fn new(
        analytics: Arc<Analytics>,
        store: Arc<dyn RecordStore>,
        writer: Arc<dyn RecordWriter>,
    ) -> Self {
        Self {
            analytics,
            store,
            writer,
            summarizer: Arc::new(HeuristicOracle),
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn ReviewSummarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }
}

/// Create the web router.
///
/// If `static_dir` is given it is served under `/ui`.
pub fn create_router(state: AppState, static_dir: Option<&str>) -> Router {
    let state = Arc::new(state);

    let mut router = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/reviews", get(list_reviews).post(create_review))
        .route("/analytics/summary", get(summary))
        .route("/analytics/insights", get(insights))
        .route("/ws/analytics", get(analytics_ws))
        .with_state(state);

    if let Some(dir) = static_dir {
        router = router.nest_service("/ui", ServeDir::new(dir));
    }

    router.layer(CorsLayer::permissive())
}

// =============================================================================
// Query parameters and bodies
// =============================================================================

/// Optional filter constraints from the query string. Blank values are absent.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FilterQuery {
    website: Option<String>,
    product: Option<String>,
    classification: Option<String>,
}

impl FilterQuery {
    fn into_filter(self) -> Result<Filter, WebError> {
        let classification = parse_classification(self.classification)?;
        Ok(Filter::new(self.website, self.product, classification))
    }
}

/// Strict label parsing for client input; blank means absent.
fn parse_classification(raw: Option<String>) -> Result<Option<Classification>, WebError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(label) => label
            .parse::<Classification>()
            .map(Some)
            .map_err(|e| WebError::BadRequest(e.to_string())),
    }
}

/// Body of `POST /reviews`.
#[derive(Debug, Deserialize)]
pub(crate) struct ReviewInput {
    rating: i64,
    feedback: String,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    product: Option<String>,
    #[serde(default)]
    classification: Option<String>,
}

impl ReviewInput {
    fn validate(self) -> Result<NewRecord, WebError> {
        let rating = u8::try_from(self.rating)
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| {
                WebError::BadRequest(format!("rating must be between 1 and 5, got {}", self.rating))
            })?;

        if self.feedback.trim().is_empty() {
            return Err(WebError::BadRequest("feedback must not be empty".to_string()));
        }
        if self.feedback.chars().count() > MAX_FEEDBACK_CHARS {
            return Err(WebError::BadRequest(format!(
                "feedback must be at most {} characters",
                MAX_FEEDBACK_CHARS
            )));
        }

        let classification =
            parse_classification(self.classification)?.unwrap_or(Classification::Other);

        Ok(NewRecord::new(rating, self.feedback)
            .website(self.website.unwrap_or_default().trim())
            .product(self.product.unwrap_or_default().trim())
            .classification(classification))
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn index() -> impl IntoResponse {
    Json(json!({ "status": "ok", "message": "Pulse analytics service" }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_up = state.store.latest_timestamp_overall().await.is_ok();
    let subscribers = state.analytics.registry().len().await;

    Json(json!({
        "status": if store_up { "ok" } else { "degraded" },
        "store": if store_up { "up" } else { "down" },
        "subscribers": subscribers,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_reviews(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Record>>, WebError> {
    Ok(Json(state.store.list_all().await?))
}

async fn create_review(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<Json<Record>, WebError> {
    let Json(input) = body?;
    let new_record = input.validate()?;
    let summary =
        summarize_or_fallback(state.summarizer.as_ref(), new_record.rating, &new_record.feedback)
            .await;
    let record = state.writer.insert(new_record.summary(summary)).await?;
    debug!(id = %record.id, rating = record.rating, "review created");

    // Fire and forget; subscribers are updated in the background.
    state.analytics.on_record_created();

    Ok(Json(record))
}

async fn summary(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FilterQuery>, QueryRejection>,
) -> Result<Json<AnalyticsSnapshot>, WebError> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    Ok(Json(state.analytics.summary(&filter).await?))
}

async fn insights(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FilterQuery>, QueryRejection>,
) -> Result<Json<InsightPayload>, WebError> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    let payload = state.analytics.insights(&filter).await?;
    Ok(Json(InsightPayload::clone(&payload)))
}
