//! Classification boundary and retry policy

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sana_client::{AnalyzeRequest, AnalyzeResponse, Error, Result, SymptomClient};

/// Bounded retry policy for classification requests: fixed delay, fixed
/// attempt count, independent of UI state.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt should be made after `attempt` (1-indexed)
    /// failed with `error`.
    pub fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }
}

/// Boundary trait over the classification endpoint, so the controller can
/// be exercised against a mock in tests.
#[async_trait]
pub trait Classify: Send + Sync {
    /// Run one classification attempt. Implementations race the request
    /// against `cancel` and return [`Error::Aborted`] when cancelled.
    async fn analyze(
        &self,
        request: AnalyzeRequest,
        cancel: CancellationToken,
    ) -> Result<AnalyzeResponse>;

    /// Ask the backend to drop its conversation context. Best-effort.
    async fn reset(&self) -> Result<()>;
}

/// HTTP-backed classifier. Cancellation is cooperative: the select drops
/// the request future; the transport connection is not forcibly torn down.
pub struct HttpClassify {
    client: Arc<SymptomClient>,
}

impl HttpClassify {
    pub fn new(client: Arc<SymptomClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Classify for HttpClassify {
    async fn analyze(
        &self,
        request: AnalyzeRequest,
        cancel: CancellationToken,
    ) -> Result<AnalyzeResponse> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Aborted),
            result = self.client.analyze(&request) => result,
        }
    }

    async fn reset(&self) -> Result<()> {
        self.client.reset().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry_transient_within_bound() {
        let policy = RetryPolicy::default();
        let err = Error::api(503, "unavailable");
        assert!(policy.should_retry(1, &err));
        assert!(policy.should_retry(2, &err));
        assert!(!policy.should_retry(3, &err));
    }

    #[test]
    fn test_should_not_retry_client_error() {
        let policy = RetryPolicy::default();
        let err = Error::api(400, "bad request");
        assert!(!policy.should_retry(1, &err));
    }

    #[test]
    fn test_should_not_retry_aborted() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(1, &Error::Aborted));
    }

    #[tokio::test]
    async fn test_http_classify_returns_aborted_when_cancelled() {
        // An unroutable address: the select should hit the cancelled arm
        // long before the connection attempt resolves.
        let client = Arc::new(SymptomClient::new("http://192.0.2.1:9"));
        let classify = HttpClassify::new(client);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = AnalyzeRequest {
            symptom: "test".into(),
            conversation_history: vec![],
            context_notes: String::new(),
        };
        let result = classify.analyze(request, cancel).await;
        assert!(matches!(result, Err(Error::Aborted)));
    }
}
