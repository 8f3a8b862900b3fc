use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::models::moderation::VisualSafetyReport;

pub const DEFAULT_CLAUDE_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-opus-20240229";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Produces a short prose summary of an aggregated report.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, report: &VisualSafetyReport) -> Result<String, SummaryError>;

    /// Release per-run resources. Called once at the end of every job run.
    ///
    /// [`ClaudeSummaryClient`] keeps its connections in a shared `reqwest`
    /// pool, so it holds nothing per run.
    async fn release(&self) {}
}

/// Claude messages API client for reviewer summaries.
pub struct ClaudeSummaryClient {
    http: Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl ClaudeSummaryClient {
    pub fn new(api_url: &str, api_key: &str, model: &str) -> Result<Self, SummaryError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SummaryError::Http)?;

        Ok(Self {
            http,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Summarizer for ClaudeSummaryClient {
    async fn summarize(&self, report: &VisualSafetyReport) -> Result<String, SummaryError> {
        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": build_prompt(report)?,
            }],
        });

        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body)
            .send()
            .await
            .map_err(SummaryError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SummaryError::Status(status.as_u16()));
        }

        let body: MessagesResponse = response.json().await.map_err(SummaryError::Http)?;
        first_text(body)
    }
}

fn first_text(body: MessagesResponse) -> Result<String, SummaryError> {
    body.content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(SummaryError::EmptyResponse)
}

fn build_prompt(report: &VisualSafetyReport) -> Result<String, SummaryError> {
    let results = serde_json::to_string_pretty(&serde_json::json!({ "visual": report }))
        .map_err(SummaryError::Serialize)?;
    let overall = report
        .overall_visual_score
        .map(|score| format!("{score:.2}"))
        .unwrap_or_else(|| "unavailable".to_string());

    Ok(format!(
        "You are an AI content safety assistant.\n\n\
         Given the following moderation results, produce a short summary\n\
         for a non-technical reviewer.\n\n\
         Requirements:\n\
         - Be concise (3-5 sentences)\n\
         - Mention any Warning or Unsafe categories\n\
         - Clearly state whether the content appears safe for campaign use\n\n\
         Moderation results:\n{results}\n\n\
         Overall visual safety score: {overall}\n"
    ))
}

/// Fixed summary used when `USE_FAKE_AI` is set.
#[derive(Debug, Default, Clone)]
pub struct FakeSummarizer;

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, _report: &VisualSafetyReport) -> Result<String, SummaryError> {
        Ok("Content appears generally safe. \
            Minor spoof-related risks detected. \
            Manual review is recommended."
            .to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("summary request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("summary service returned HTTP {0}")]
    Status(u16),

    #[error("summary service returned no text")]
    EmptyResponse,

    #[error("failed to serialize report for summary: {0}")]
    Serialize(#[from] serde_json::Error),
}
