//! HTTP client for the classification endpoint

use crate::error::{Error, Result};
use crate::types::{AnalyzeRequest, AnalyzeResponse, ErrorBody};

/// Relative path of the analyze endpoint.
const ANALYZE_PATH: &str = "/api/symptoms/analyze";
/// Relative path of the conversation reset endpoint.
const RESET_PATH: &str = "/api/symptoms/reset";

/// Client for the symptom classification backend.
pub struct SymptomClient {
    client: reqwest::Client,
    base_url: String,
}

impl SymptomClient {
    /// Create a new client for the given deployment origin.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The deployment origin this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit an utterance plus history for classification.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse> {
        let url = format!("{}{}", self.base_url, ANALYZE_PATH);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(Error::RateLimited { retry_after });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), recover_error_message(&text)));
        }

        let parsed = response.json::<AnalyzeResponse>().await?;
        Ok(parsed)
    }

    /// Ask the backend to drop its conversation context. Callers treat
    /// failures as best-effort: local state resets regardless.
    pub async fn reset(&self) -> Result<()> {
        let url = format!("{}{}", self.base_url, RESET_PATH);

        let response = self.client.post(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("Backend reset failed ({}): {}", status, text);
            return Err(Error::api(status.as_u16(), recover_error_message(&text)));
        }

        Ok(())
    }
}

/// Pull a human-readable message out of a non-200 body. The backend may
/// send `{"error": "..."}`; anything else is passed through raw.
fn recover_error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if !parsed.error.is_empty() {
            return parsed.error;
        }
    }
    if body.is_empty() {
        "no response body".to_string()
    } else {
        body.to_string()
    }
}
