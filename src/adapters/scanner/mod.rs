//! Scanner node client: the execution backend adapter.
//!
//! One long-lived reqwest client, reused for every submission. Timeouts
//! are bounded; a timed-out submission is a dispatch failure, never an
//! indefinite block.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ScannerConfig;
use crate::domain::ports::{DispatchPayload, ExecutionBackend};

/// HTTP client for the scanner node API.
pub struct ScannerNodeClient {
    config: ScannerConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    job_name: String,
}

impl ScannerNodeClient {
    pub fn new(config: ScannerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }
}

#[async_trait]
impl ExecutionBackend for ScannerNodeClient {
    async fn dispatch(&self, payload: &DispatchPayload) -> DomainResult<String> {
        let url = format!("{}/api/scan/execute", self.config.base_url);
        tracing::info!(job_id = %payload.job_id, %url, "submitting job to scanner node");

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DomainError::Dispatch {
                job_id: payload.job_id.clone(),
                reason: format!("failed to connect to scanner node: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::Dispatch {
                job_id: payload.job_id.clone(),
                reason: format!("scanner node rejected job ({status}): {body}"),
            });
        }

        let parsed: ExecuteResponse =
            response.json().await.map_err(|e| DomainError::Dispatch {
                job_id: payload.job_id.clone(),
                reason: format!("unparseable scanner node response: {e}"),
            })?;

        Ok(parsed.job_name)
    }

    async fn delete(&self, execution_handle: &str) -> DomainResult<()> {
        let url = format!("{}/api/scanner_jobs/{execution_handle}", self.config.base_url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| DomainError::Backend(format!("handle deletion failed: {e}")))?;

        if !response.status().is_success() {
            return Err(DomainError::Backend(format!(
                "handle deletion rejected ({}): {execution_handle}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> DispatchPayload {
        DispatchPayload {
            tool: "port-scan".into(),
            targets: vec!["a.example".into()],
            options: json!({"ports": "1-1000"}),
            job_id: "scan-port-scan-abc123".into(),
            workflow_id: Some("workflow-11112222".into()),
            callback_url: "http://controller:8000/api/scan_results".into(),
            vpn_lease: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_records_handle() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/scan/execute")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"job_name": "scan-pod-42"}"#)
            .create_async()
            .await;

        let client = ScannerNodeClient::new(ScannerConfig {
            base_url: server.url(),
            callback_url: "http://controller:8000/api/scan_results".into(),
            timeout_secs: 5,
        });

        let handle = client.dispatch(&payload()).await.unwrap();
        assert_eq!(handle, "scan-pod-42");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_dispatch_rejection_is_dispatch_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/scan/execute")
            .with_status(503)
            .with_body("no capacity")
            .create_async()
            .await;

        let client = ScannerNodeClient::new(ScannerConfig {
            base_url: server.url(),
            callback_url: "cb".into(),
            timeout_secs: 5,
        });

        let err = client.dispatch(&payload()).await.unwrap_err();
        assert!(matches!(err, DomainError::Dispatch { .. }));
    }

    #[tokio::test]
    async fn test_delete_handle() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/scanner_jobs/scan-pod-42")
            .with_status(200)
            .create_async()
            .await;

        let client = ScannerNodeClient::new(ScannerConfig {
            base_url: server.url(),
            callback_url: "cb".into(),
            timeout_secs: 5,
        });

        client.delete("scan-pod-42").await.unwrap();
        mock.assert_async().await;
    }
}
