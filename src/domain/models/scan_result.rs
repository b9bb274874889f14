//! Scan result model and the callback payload shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload posted by a scanner worker when a tool finishes.
///
/// `scan_metadata` is a free-form per-tool blob; the `job_id` key inside
/// it correlates the result back to its sub-job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResultPayload {
    pub target: String,
    #[serde(default)]
    pub resolved_ips: Vec<String>,
    #[serde(default)]
    pub open_ports: serde_json::Value,
    #[serde(default)]
    pub scan_metadata: serde_json::Value,
    #[serde(default)]
    pub workflow_id: Option<String>,
}

impl ScanResultPayload {
    /// Correlation key, if the worker supplied one.
    pub fn job_id(&self) -> Option<&str> {
        self.scan_metadata.get("job_id").and_then(|v| v.as_str())
    }

    /// Tool-reported terminal status. Workers that hit a tool-level
    /// failure report `status: "failed"`; anything else means success.
    pub fn reported_failure(&self) -> Option<String> {
        match self.scan_metadata.get("status").and_then(|v| v.as_str()) {
            Some("failed") => Some(
                self.scan_metadata
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("tool reported failure")
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// Persisted, append-only scan result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub id: i64,
    pub target: String,
    pub resolved_ips: Vec<String>,
    pub open_ports: serde_json::Value,
    pub metadata: serde_json::Value,
    /// Extracted from `metadata.job_id` at ingest for indexed lookup.
    pub job_id: Option<String>,
    pub workflow_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn from_payload(payload: &ScanResultPayload) -> Self {
        Self {
            id: 0,
            target: payload.target.clone(),
            resolved_ips: payload.resolved_ips.clone(),
            open_ports: payload.open_ports.clone(),
            metadata: payload.scan_metadata.clone(),
            job_id: payload.job_id().map(str::to_string),
            workflow_id: payload.workflow_id.clone(),
            created_at: Utc::now(),
        }
    }
}
