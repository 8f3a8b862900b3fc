use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

const SIGHTENGINE_URL: &str = "https://api.sightengine.com/1.0/check.json";
const SIGHTENGINE_MODELS: &str = "nudity,weapon,violence,medical,spoof";

/// External visual-moderation scorer.
///
/// Returns the raw payload: scorer model name → sub-signal name → presence
/// probability in [0, 1].
#[async_trait]
pub trait ModerationScorer: Send + Sync {
    async fn analyze_image(&self, image_url: &str) -> Result<Value, ScorerError>;

    /// Release per-run resources. Called once at the end of every job run.
    ///
    /// [`SightengineClient`] keeps its connections in a shared `reqwest` pool,
    /// so it holds nothing per run.
    async fn release(&self) {}
}

/// Client for the Sightengine moderation API.
pub struct SightengineClient {
    http: Client,
    base_url: String,
    api_user: String,
    api_secret: String,
}

impl SightengineClient {
    pub fn new(api_user: &str, api_secret: &str, timeout: Duration) -> Result<Self, ScorerError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ScorerError::Network)?;

        Ok(Self {
            http,
            base_url: SIGHTENGINE_URL.to_string(),
            api_user: api_user.to_string(),
            api_secret: api_secret.to_string(),
        })
    }

    /// Point the client at a different endpoint (staging or a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ModerationScorer for SightengineClient {
    async fn analyze_image(&self, image_url: &str) -> Result<Value, ScorerError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("url", image_url),
                ("models", SIGHTENGINE_MODELS),
                ("api_user", self.api_user.as_str()),
                ("api_secret", self.api_secret.as_str()),
            ])
            .send()
            .await
            .map_err(ScorerError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScorerError::Status(status.as_u16()));
        }

        let payload: Value = response.json().await.map_err(ScorerError::Network)?;
        check_payload(payload)
    }
}

fn check_payload(payload: Value) -> Result<Value, ScorerError> {
    match payload.get("status").and_then(Value::as_str) {
        Some("success") => Ok(payload),
        _ => {
            let message = payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| payload.to_string());
            Err(ScorerError::Api(message))
        }
    }
}

/// Deterministic offline scorer used when `USE_FAKE_AI` is set.
#[derive(Debug, Default, Clone)]
pub struct FakeScorer;

#[async_trait]
impl ModerationScorer for FakeScorer {
    async fn analyze_image(&self, _image_url: &str) -> Result<Value, ScorerError> {
        Ok(serde_json::json!({
            "status": "success",
            "nudity": {"sexual_activity": 0.01},
            "violence": {"violence": 0.02},
            "weapon": {"firearm": 0.0},
            "medical": {"gore": 0.0},
            "spoof": {"fake": 0.15},
        }))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("network error while calling moderation scorer: {0}")]
    Network(#[from] reqwest::Error),

    #[error("moderation scorer returned HTTP {0}")]
    Status(u16),

    #[error("moderation scorer API error: {0}")]
    Api(String),
}
