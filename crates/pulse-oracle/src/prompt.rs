//! Prompt construction and reply parsing.

use serde::Deserialize;

use pulse_analytics::{
    AnalyticsSnapshot, Filter, MAX_SUGGESTIONS, OracleError, OracleInsight, ReviewSummary,
};

pub(crate) const SYSTEM_MESSAGE: &str = "Return concise analytics insight.";

pub(crate) const REVIEW_SYSTEM_MESSAGE: &str = "Return concise, business-friendly insights only.";

/// Breakdown entries included in the prompt, per dimension.
const TOP_BREAKDOWNS: usize = 3;

/// Build the user message describing `snapshot` under `filter`.
pub fn build_prompt(snapshot: &AnalyticsSnapshot, filter: &Filter) -> String {
    let top_websites = &snapshot.website_breakdown
        [..snapshot.website_breakdown.len().min(TOP_BREAKDOWNS)];
    let top_products = &snapshot.product_breakdown
        [..snapshot.product_breakdown.len().min(TOP_BREAKDOWNS)];

    let metrics = format!(
        "Total reviews: {}\n\
         Average rating: {:.2}\n\
         Classification counts: {}\n\
         Top website breakdown: {}\n\
         Top product breakdown: {}\n\
         Filters: {}",
        snapshot.total_reviews,
        snapshot.avg_rating,
        serde_json::to_string(&snapshot.classification_counts).unwrap_or_default(),
        serde_json::to_string(top_websites).unwrap_or_default(),
        serde_json::to_string(top_products).unwrap_or_default(),
        filter,
    );

    format!(
        "You are an analytics copilot. Given metrics, produce a short, non-redundant insight \
         (1-2 sentences) and 3 concise action recommendations. Keep it business-focused and \
         avoid repeating raw numbers.\n\n\
         Metrics:\n{}\n\n\
         Return JSON with keys 'insight' (string) and 'actions' (array of 3 short strings).",
        metrics
    )
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    insight: String,
    #[serde(default)]
    actions: Vec<String>,
}

/// The outermost `{...}` of a reply, ignoring surrounding prose or fences.
fn json_object(content: &str) -> Result<&str, OracleError> {
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&content[start..=end]),
        _ => Err(OracleError::MalformedResponse(
            "no JSON object in reply".to_string(),
        )),
    }
}

/// Parse the model's message content into an insight.
///
/// Surrounding prose or code fences are ignored; the outermost `{...}` is
/// decoded. Blank actions are dropped and anything past the third is ignored.
pub fn parse_reply(content: &str) -> Result<OracleInsight, OracleError> {
    let reply: Reply = serde_json::from_str(json_object(content)?)
        .map_err(|e| OracleError::MalformedResponse(format!("invalid reply JSON: {}", e)))?;

    let narrative = reply.insight.trim().to_string();
    if narrative.is_empty() {
        return Err(OracleError::MalformedResponse("empty insight".to_string()));
    }

    let mut actions = reply
        .actions
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    match (actions.next(), actions.next(), actions.next()) {
        (Some(a), Some(b), Some(c)) => Ok(OracleInsight {
            narrative,
            recommendations: [a, b, c],
        }),
        _ => Err(OracleError::MalformedResponse(
            "fewer than three actions".to_string(),
        )),
    }
}

/// Build the user message asking for a single review's summary.
pub fn build_review_prompt(rating: u8, feedback: &str) -> String {
    format!(
        "You are an assistant for customer feedback insights. Given a star rating (1-5) and \
         review text, return a JSON object with: 'summary' (one concise sentence) and \
         'suggestions' (3-4 short, actionable items).\n\n\
         Rating: {}/5\nReview: {}\n\n\
         Respond ONLY with JSON having keys 'summary' and 'suggestions'.",
        rating, feedback
    )
}

#[derive(Debug, Deserialize)]
struct ReviewReply {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    suggestions: Vec<String>,
}

/// Parse a review summary reply.
///
/// Needs a non-empty summary and at least one non-blank suggestion; extra
/// suggestions past the limit are dropped.
pub fn parse_review_reply(content: &str) -> Result<ReviewSummary, OracleError> {
    let reply: ReviewReply = serde_json::from_str(json_object(content)?)
        .map_err(|e| OracleError::MalformedResponse(format!("invalid reply JSON: {}", e)))?;

    let summary = reply.summary.trim().to_string();
    if summary.is_empty() {
        return Err(OracleError::MalformedResponse("empty summary".to_string()));
    }

    let suggestions: Vec<String> = reply
        .suggestions
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect();
    if suggestions.is_empty() {
        return Err(OracleError::MalformedResponse("no suggestions".to_string()));
    }

    Ok(ReviewSummary {
        summary,
        suggestions,
    })
}
