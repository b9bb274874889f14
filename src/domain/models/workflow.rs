//! Workflow domain model.
//!
//! A workflow is the root aggregate of a scan request: one or more targets,
//! an ordered list of tool steps, and a fan-out strategy. The decomposer
//! turns it into sub-jobs; the reconciler rolls sub-job state back up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::vpn::VpnLease;

/// Fan-out strategy for decomposing a workflow into sub-jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One sub-job per step; the tool iterates all targets itself.
    Wide,
    /// One sub-job per (target, step) pair.
    Deep,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Wide
    }
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wide => "wide",
            Self::Deep => "deep",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "wide" => Some(Self::Wide),
            "deep" => Some(Self::Deep),
            _ => None,
        }
    }
}

/// Status of a workflow.
///
/// Apart from `Cancelled`, which is an explicit external action, workflow
/// status is never assigned directly: it is always recomputed via
/// [`WorkflowStatus::derive`] from persisted sub-job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    PartiallyFailed,
    Failed,
    Cancelled,
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::PartiallyFailed => "partially_failed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partially_failed" => Some(Self::PartiallyFailed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::PartiallyFailed | Self::Failed | Self::Cancelled
        )
    }

    /// Derive workflow status from sub-job counts.
    ///
    /// `any_started` is true when at least one sub-job was ever accepted by
    /// the execution backend. A workflow where nothing ever started is a
    /// submission-time failure, distinct from execution failure.
    ///
    /// The function is pure and idempotent, so recomputing it on every
    /// callback is correct under out-of-order and duplicate delivery.
    pub fn derive(completed: u32, failed: u32, total: u32, any_started: bool) -> Self {
        if completed + failed < total {
            if completed + failed == 0 && !any_started {
                Self::Pending
            } else {
                Self::Running
            }
        } else if !any_started {
            Self::Failed
        } else if failed == 0 {
            Self::Completed
        } else {
            Self::PartiallyFailed
        }
    }
}

/// One step of a workflow request: a tool and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub tool_id: String,
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl WorkflowStep {
    pub fn new(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            params: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Requested parallel scanner count for this step, if any.
    pub fn scanner_count(&self) -> usize {
        self.params
            .get("scanner_count")
            .and_then(serde_json::Value::as_u64)
            .map_or(1, |n| usize::try_from(n).unwrap_or(1))
    }
}

/// Incoming workflow request. Not persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub targets: Vec<String>,
    #[serde(default)]
    pub strategy: Strategy,
    pub steps: Vec<WorkflowStep>,
    /// Requested VPN profile filename, if the caller wants a specific one.
    #[serde(default)]
    pub vpn_profile: Option<String>,
    /// Country filter for VPN selection.
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Persisted workflow aggregate.
///
/// Invariant: `completed_steps + failed_steps <= total_steps`, and
/// `total_steps` is fixed once sub-jobs are created — it is never
/// recomputed from the sub-job count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: String,
    pub targets: Vec<String>,
    pub strategy: Strategy,
    pub status: WorkflowStatus,
    pub total_steps: u32,
    pub completed_steps: u32,
    pub failed_steps: u32,
    /// Requested profile filename, as given in the request.
    pub vpn_profile: Option<String>,
    /// Requested or resolved country code.
    pub vpn_country: Option<String>,
    /// Shared lease used by every sub-job unless a shard overrides it.
    pub vpn_lease: Option<VpnLease>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new workflow from a request, with a fresh id.
    pub fn from_request(req: &WorkflowRequest) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: generate_workflow_id(),
            targets: req.targets.clone(),
            strategy: req.strategy,
            status: WorkflowStatus::Pending,
            total_steps: 0,
            completed_steps: 0,
            failed_steps: 0,
            vpn_profile: req.vpn_profile.clone(),
            vpn_country: req.country.clone(),
            vpn_lease: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Completion percentage, using `total_steps` as the fixed denominator.
    pub fn progress_percentage(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        f64::from(self.completed_steps + self.failed_steps) / f64::from(self.total_steps) * 100.0
    }
}

fn generate_workflow_id() -> String {
    format!("workflow-{}", &Uuid::new_v4().simple().to_string()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_pending_before_any_dispatch() {
        assert_eq!(
            WorkflowStatus::derive(0, 0, 4, false),
            WorkflowStatus::Pending
        );
    }

    #[test]
    fn test_derive_running_while_incomplete() {
        assert_eq!(
            WorkflowStatus::derive(1, 0, 4, true),
            WorkflowStatus::Running
        );
        assert_eq!(
            WorkflowStatus::derive(1, 2, 4, true),
            WorkflowStatus::Running
        );
    }

    #[test]
    fn test_derive_completed() {
        assert_eq!(
            WorkflowStatus::derive(4, 0, 4, true),
            WorkflowStatus::Completed
        );
    }

    #[test]
    fn test_derive_partial_failure() {
        assert_eq!(
            WorkflowStatus::derive(1, 1, 2, true),
            WorkflowStatus::PartiallyFailed
        );
    }

    #[test]
    fn test_derive_submission_failure_is_failed_not_partial() {
        // Every dispatch failed before the backend accepted anything.
        assert_eq!(
            WorkflowStatus::derive(0, 2, 2, false),
            WorkflowStatus::Failed
        );
    }

    #[test]
    fn test_derive_is_idempotent() {
        let first = WorkflowStatus::derive(2, 1, 3, true);
        let second = WorkflowStatus::derive(2, 1, 3, true);
        assert_eq!(first, second);
        assert_eq!(first, WorkflowStatus::PartiallyFailed);
    }

    #[test]
    fn test_scanner_count_defaults_to_one() {
        let step = WorkflowStep::new("port-scan");
        assert_eq!(step.scanner_count(), 1);

        let step = WorkflowStep::new("port-scan")
            .with_params(serde_json::json!({"scanner_count": 4, "ports": "1-1000"}));
        assert_eq!(step.scanner_count(), 4);
    }

    #[test]
    fn test_progress_percentage_uses_total_steps() {
        let req = WorkflowRequest {
            targets: vec!["a.example".into()],
            strategy: Strategy::Wide,
            steps: vec![WorkflowStep::new("port-scan")],
            vpn_profile: None,
            country: None,
            description: None,
        };
        let mut wf = Workflow::from_request(&req);
        wf.total_steps = 4;
        wf.completed_steps = 1;
        wf.failed_steps = 1;
        let pct = wf.progress_percentage();
        assert!((pct - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_workflow_id_format() {
        let req = WorkflowRequest {
            targets: vec!["a".into()],
            strategy: Strategy::Deep,
            steps: vec![],
            vpn_profile: None,
            country: None,
            description: None,
        };
        let wf = Workflow::from_request(&req);
        assert!(wf.workflow_id.starts_with("workflow-"));
        assert_eq!(wf.workflow_id.len(), "workflow-".len() + 8);
    }
}
