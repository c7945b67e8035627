//! Remote sink contract and its HTTP implementation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::submissions::Submission;

/// Transport-level delivery failure: the sink was unreachable, timed out or
/// answered with something other than a well-formed response.
///
/// A transport failure means nothing was accepted or rejected per item, so
/// it never mutates a submission's retry bookkeeping.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("invalid sink base URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Http(e)
        }
    }
}

/// Batch request body for `POST /api/sync-submissions`.
#[derive(Debug, Serialize)]
struct SyncRequest<'a> {
    submissions: &'a [Submission],
}

/// Per-item rejection reported by the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSync {
    pub submission_id: String,
    pub error: String,
    #[serde(default = "default_can_retry")]
    pub can_retry: bool,
}

fn default_can_retry() -> bool {
    true
}

/// Response body of the remote sink.
///
/// The sink is idempotent per submission id: re-delivering an id it already
/// holds reports that id as synced again rather than duplicating or erroring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkResponse {
    pub success: bool,
    #[serde(default)]
    pub synced_count: usize,
    #[serde(default)]
    pub synced_ids: Vec<String>,
    #[serde(default)]
    pub failed_syncs: Vec<FailedSync>,
    #[serde(default)]
    pub message: String,
}

/// The external server endpoint that durably accepts synced submissions.
pub trait RemoteSink: Send + Sync + 'static {
    /// Deliver a batch of submissions in one request.
    fn deliver(
        &self,
        batch: &[Submission],
    ) -> impl Future<Output = Result<SinkResponse, TransportError>> + Send;
}

/// Production sink: `POST {base_url}/api/sync-submissions` over HTTP with a
/// bounded request timeout.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        if base_url.trim().is_empty() {
            return Err(TransportError::InvalidUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/sync-submissions", base_url.trim_end_matches('/')),
        })
    }
}

impl RemoteSink for HttpSink {
    async fn deliver(&self, batch: &[Submission]) -> Result<SinkResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SyncRequest { submissions: batch })
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<SinkResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_decodes_wire_format() {
        let response: SinkResponse = serde_json::from_str(
            r#"{
                "success": true,
                "syncedCount": 1,
                "syncedIds": ["permit-1700000000000-abc123"],
                "failedSyncs": [
                    { "submissionId": "permit-1700000000001-def456", "error": "validation" }
                ],
                "message": "partial"
            }"#,
        )
        .unwrap();

        assert!(response.success);
        assert_eq!(response.synced_ids.len(), 1);
        let failed = response.failed_syncs.first().unwrap();
        assert_eq!(failed.error, "validation");
        assert!(failed.can_retry);
    }

    #[test]
    fn test_response_tolerates_missing_optional_fields() {
        let response: SinkResponse =
            serde_json::from_str(r#"{ "success": true }"#).unwrap();
        assert!(response.synced_ids.is_empty());
        assert!(response.failed_syncs.is_empty());
    }

    #[test]
    fn test_sink_rejects_empty_base_url() {
        assert!(matches!(
            HttpSink::new("", Duration::from_secs(10)),
            Err(TransportError::InvalidUrl(_))
        ));
    }
}
