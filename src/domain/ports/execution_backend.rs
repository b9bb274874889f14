use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::{ScanJob, VpnLease};

/// Backend-agnostic submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub tool: String,
    pub targets: Vec<String>,
    pub options: serde_json::Value,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    pub callback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpn_lease: Option<VpnLease>,
}

impl DispatchPayload {
    pub fn from_job(job: &ScanJob, callback_url: impl Into<String>) -> Self {
        Self {
            tool: job.tool.clone(),
            targets: job.targets.clone(),
            options: job.options.clone(),
            job_id: job.job_id.clone(),
            workflow_id: job.workflow_id.clone(),
            callback_url: callback_url.into(),
            vpn_lease: job.vpn_lease.clone(),
        }
    }
}

/// Port to the external execution backend that actually runs tools.
///
/// Submission errors are per-job: the dispatcher never lets one failed
/// submission abort its siblings.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Submit a job for execution; returns the backend's opaque handle
    async fn dispatch(&self, payload: &DispatchPayload) -> DomainResult<String>;

    /// Ask the backend to terminate and forget a handle
    async fn delete(&self, execution_handle: &str) -> DomainResult<()>;
}
