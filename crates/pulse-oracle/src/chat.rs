//! Chat-completion oracle client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pulse_analytics::{
    AnalyticsSnapshot, Filter, InsightOracle, OracleError, OracleInsight, ReviewSummarizer,
    ReviewSummary,
};

use crate::config::OracleConfig;
use crate::prompt::{
    REVIEW_SYSTEM_MESSAGE, SYSTEM_MESSAGE, build_prompt, build_review_prompt, parse_reply,
    parse_review_reply,
};

/// Longest error body excerpt kept in an error message.
const SNIPPET_LEN: usize = 200;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_LEN).collect()
}

/// Insight oracle and review summarizer that asks an OpenAI-compatible chat
/// model.
pub struct ChatCompletionOracle {
    http: Client,
    config: OracleConfig,
    url: String,
}

impl ChatCompletionOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10).min(config.timeout))
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        let url = config.chat_url();

        debug!(model = %config.model, url = %url, "chat-completion oracle configured");

        Ok(Self { http, config, url })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let started = Instant::now();
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                %status,
                latency_ms = started.elapsed().as_millis() as u64,
                "chat completion returned non-success status"
            );
            return Err(OracleError::Unavailable(format!(
                "HTTP {}: {}",
                status,
                snippet(&text)
            )));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::MalformedResponse(format!("undecodable response: {}", e)))?;

        debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            choices = reply.choices.len(),
            "chat completion received"
        );

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| OracleError::MalformedResponse("no message content".to_string()))
    }
}

#[async_trait]
impl InsightOracle for ChatCompletionOracle {
    async fn generate(
        &self,
        snapshot: &AnalyticsSnapshot,
        filter: &Filter,
    ) -> Result<OracleInsight, OracleError> {
        let prompt = build_prompt(snapshot, filter);
        let content = self.complete(SYSTEM_MESSAGE, &prompt).await?;
        parse_reply(&content)
    }
}

#[async_trait]
impl ReviewSummarizer for ChatCompletionOracle {
    async fn summarize(&self, rating: u8, feedback: &str) -> Result<ReviewSummary, OracleError> {
        let prompt = build_review_prompt(rating, feedback);
        let content = self.complete(REVIEW_SYSTEM_MESSAGE, &prompt).await?;
        parse_review_reply(&content)
    }
}
