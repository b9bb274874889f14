//! Scan job (sub-job) domain model.
//!
//! A scan job is one unit of dispatchable work: one tool against one or
//! more targets, possibly one shard of a larger step. Jobs are created by
//! the decomposer, mutated by the dispatcher on submission and by the
//! reconciler on callback or cancel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::vpn::VpnLease;

/// Status of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Persisted, not yet accepted by the execution backend.
    Submitted,
    /// Accepted by the backend; a handle is recorded.
    Running,
    /// Callback reported success.
    Completed,
    /// Dispatch failed or callback reported failure.
    Failed,
    /// Explicitly cancelled. Terminal; late callbacks are ignored.
    Cancelled,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Submitted
    }
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "submitted" | "pending" => Some(Self::Submitted),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<JobStatus> {
        match self {
            Self::Submitted => vec![Self::Running, Self::Failed, Self::Cancelled],
            Self::Running => vec![Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Request for a standalone scan job, outside any workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJobRequest {
    pub tool: String,
    pub targets: Vec<String>,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    #[serde(default)]
    pub vpn_profile: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// A dispatchable unit of scan work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJob {
    pub job_id: String,
    /// Owning workflow, if any. A job may exist standalone.
    pub workflow_id: Option<String>,
    pub tool: String,
    pub targets: Vec<String>,
    pub options: serde_json::Value,
    /// Position of the logical step within the workflow. Shards of the
    /// same logical step share a step_order.
    pub step_order: u32,
    pub status: JobStatus,
    pub vpn_lease: Option<VpnLease>,
    /// Opaque execution-backend reference, set on successful dispatch.
    pub execution_handle: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScanJob {
    pub fn new(tool: impl Into<String>, targets: Vec<String>) -> Self {
        let tool = tool.into();
        let now = Utc::now();
        Self {
            job_id: generate_job_id(&tool),
            workflow_id: None,
            tool,
            targets,
            options: serde_json::Value::Object(serde_json::Map::new()),
            step_order: 0,
            status: JobStatus::Submitted,
            vpn_lease: None,
            execution_handle: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_workflow(mut self, workflow_id: impl Into<String>, step_order: u32) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self.step_order = step_order;
        self
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }

    pub fn with_lease(mut self, lease: Option<VpnLease>) -> Self {
        self.vpn_lease = lease;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the backend ever accepted this job. Used when deriving
    /// workflow status: cancelled jobs that held a handle still count.
    pub fn ever_started(&self) -> bool {
        self.execution_handle.is_some()
    }

    /// Transition to a new status, enforcing the transition table.
    pub fn transition_to(&mut self, new_status: JobStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(new_status) {
            return Err(DomainError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a successful dispatch: handle + `Running`.
    pub fn mark_dispatched(&mut self, handle: impl Into<String>) -> DomainResult<()> {
        self.execution_handle = Some(handle.into());
        self.transition_to(JobStatus::Running)
    }

    /// Record a dispatch or execution failure.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> DomainResult<()> {
        self.error = Some(error.into());
        self.transition_to(JobStatus::Failed)
    }
}

fn generate_job_id(tool: &str) -> String {
    format!("scan-{tool}-{}", &Uuid::new_v4().simple().to_string()[..6])
}
