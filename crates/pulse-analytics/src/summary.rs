//! Per-review summaries attached on the write path.
//!
//! Every created review gets a one-sentence summary and a few follow-up
//! suggestions. A [`ReviewSummarizer`] produces them; when it fails the
//! rating-tone heuristic answers instead, so review creation never fails on
//! summarization.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::OracleError;
use crate::oracle::HeuristicOracle;

/// Most suggestions kept per review.
pub const MAX_SUGGESTIONS: usize = 4;

/// Feedback longer than this is shortened in the heuristic summary.
const SUMMARY_MAX_CHARS: usize = 220;
const SUMMARY_CUT_CHARS: usize = 210;

/// Summary and suggestions for one review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub summary: String,
    pub suggestions: Vec<String>,
}

/// Summarizes a single review.
#[async_trait]
pub trait ReviewSummarizer: Send + Sync {
    async fn summarize(&self, rating: u8, feedback: &str) -> Result<ReviewSummary, OracleError>;
}

fn tone(rating: u8) -> &'static str {
    match rating {
        5.. => "extremely positive",
        4 => "positive",
        3 => "mixed",
        2 => "negative",
        _ => "very negative",
    }
}

fn rating_suggestions(rating: u8) -> [&'static str; 3] {
    match rating {
        5.. => [
            "Acknowledge the praise and keep consistency",
            "Identify what delighted the user and amplify it",
            "Invite a testimonial or referral",
        ],
        4 => [
            "Thank the user and address minor issues",
            "Monitor recurring themes to reach 5/5",
            "Offer tips or resources to enhance value",
        ],
        3 => [
            "Reach out to clarify pain points",
            "Prioritize quick wins to improve experience",
            "Provide guidance or better onboarding",
        ],
        2 => [
            "Contact the user to resolve issues",
            "Fix top friction points causing dissatisfaction",
            "Offer a make-good (discount, support session)",
        ],
        _ => [
            "Escalate and remediate critical issues immediately",
            "Conduct root-cause analysis on failures",
            "Proactively follow up after fixes",
        ],
    }
}

/// Keyword groups checked in order; the first group with a hit adds its
/// suggestion.
const KEYWORD_SUGGESTIONS: [(&[&str], &str); 4] = [
    (
        &["slow", "lag", "performance", "loading"],
        "Improve performance and loading responsiveness",
    ),
    (
        &["bug", "crash", "error", "issue"],
        "Fix stability issues and add regression tests",
    ),
    (
        &["price", "cost", "expensive", "pricing"],
        "Review pricing and communicate value more clearly",
    ),
    (
        &["support", "help", "service", "response"],
        "Improve support responsiveness and resolution quality",
    ),
];

/// Collapse whitespace and shorten long feedback at a word boundary.
fn shorten(feedback: &str) -> String {
    let cleaned = feedback.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() <= SUMMARY_MAX_CHARS {
        return cleaned;
    }
    let head: String = cleaned.chars().take(SUMMARY_CUT_CHARS).collect();
    let head = match head.rsplit_once(' ') {
        Some((words, _)) => words.to_string(),
        None => head,
    };
    format!("{}…", head)
}

/// Deterministic summary built from the rating tone and feedback keywords.
pub fn heuristic_review_summary(rating: u8, feedback: &str) -> ReviewSummary {
    let summary = format!("A {} {}/5 review: {}", tone(rating), rating, shorten(feedback));

    let mut suggestions: Vec<String> = rating_suggestions(rating)
        .iter()
        .map(|s| s.to_string())
        .collect();

    let lowered = feedback.to_lowercase();
    if let Some((_, extra)) = KEYWORD_SUGGESTIONS
        .iter()
        .find(|(words, _)| words.iter().any(|w| lowered.contains(w)))
    {
        suggestions.push(extra.to_string());
    }
    suggestions.truncate(MAX_SUGGESTIONS);

    ReviewSummary {
        summary,
        suggestions,
    }
}

/// Ask `summarizer`, falling back to [`heuristic_review_summary`] on error.
pub async fn summarize_or_fallback(
    summarizer: &dyn ReviewSummarizer,
    rating: u8,
    feedback: &str,
) -> ReviewSummary {
    match summarizer.summarize(rating, feedback).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, "review summarizer failed, using heuristic summary");
            heuristic_review_summary(rating, feedback)
        }
    }
}

#[async_trait]
impl ReviewSummarizer for HeuristicOracle {
    async fn summarize(&self, rating: u8, feedback: &str) -> Result<ReviewSummary, OracleError> {
        Ok(heuristic_review_summary(rating, feedback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct DownSummarizer;

    #[async_trait]
    impl ReviewSummarizer for DownSummarizer {
        async fn summarize(&self, _: u8, _: &str) -> Result<ReviewSummary, OracleError> {
            Err(OracleError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_tone_follows_rating() {
        assert_eq!(
            heuristic_review_summary(5, "Love it").summary,
            "A extremely positive 5/5 review: Love it"
        );
        assert_eq!(
            heuristic_review_summary(3, "  okay \n  I guess ").summary,
            "A mixed 3/5 review: okay I guess"
        );
        assert_eq!(
            heuristic_review_summary(1, "awful").summary,
            "A very negative 1/5 review: awful"
        );
    }

    #[test]
    fn test_keyword_adds_fourth_suggestion() {
        let plain = heuristic_review_summary(2, "box was dented");
        assert_eq!(plain.suggestions.len(), 3);
        assert_eq!(plain.suggestions[0], "Contact the user to resolve issues");

        let slow = heuristic_review_summary(2, "App is SLOW and crashes");
        assert_eq!(slow.suggestions.len(), MAX_SUGGESTIONS);
        // Only the first matching group contributes.
        assert_eq!(
            slow.suggestions[3],
            "Improve performance and loading responsiveness"
        );

        let pricey = heuristic_review_summary(4, "a bit expensive");
        assert_eq!(
            pricey.suggestions.last().map(String::as_str),
            Some("Review pricing and communicate value more clearly")
        );
    }

    #[test]
    fn test_long_feedback_is_shortened_at_a_word() {
        let feedback = "word ".repeat(100);
        let summary = heuristic_review_summary(4, &feedback).summary;

        let body = summary.trim_start_matches("A positive 4/5 review: ");
        assert!(body.ends_with("word…"), "{}", body);
        assert!(body.chars().count() <= SUMMARY_CUT_CHARS + 1);
    }

    #[tokio::test]
    async fn test_failed_summarizer_falls_back() {
        let summary = summarize_or_fallback(&DownSummarizer, 1, "crashed twice").await;
        assert_eq!(summary, heuristic_review_summary(1, "crashed twice"));
        assert_eq!(
            summary.suggestions[3],
            "Fix stability issues and add regression tests"
        );
    }

    #[tokio::test]
    async fn test_heuristic_oracle_summarizes() {
        let summary = HeuristicOracle.summarize(4, "nice").await.unwrap();
        assert_eq!(summary.summary, "A positive 4/5 review: nice");
    }
}
