//! Status reconciliation: result ingestion and workflow roll-up.
//!
//! Callbacks arrive asynchronously, out of order, and possibly more than
//! once. The reconciler therefore never increments counters: it recomputes
//! workflow state from persisted sub-job rows on every event, which makes
//! ingestion idempotent under arbitrary interleaving.

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{JobStatus, ScanResult, ScanResultPayload, Workflow, WorkflowStatus};
use crate::domain::ports::{JobRepository, ResultRepository, WorkflowRepository};
use crate::services::vpn_pool::VpnPoolService;

/// What an ingested callback did, for the HTTP layer and auto-chaining.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub result_id: Option<i64>,
    pub job_id: Option<String>,
    pub workflow_id: Option<String>,
    /// True when this callback moved the job into `Completed`.
    pub job_completed: bool,
}

/// Recompute one workflow's counters and derived status from its sub-jobs.
///
/// `Cancelled` is terminal and never overwritten. Returns the refreshed
/// workflow, or `None` when the id is unknown (tolerated: results may
/// outlive their workflow).
pub async fn recompute_workflow_status(
    workflows: &dyn WorkflowRepository,
    jobs: &dyn JobRepository,
    workflow_id: &str,
) -> DomainResult<Option<Workflow>> {
    let Some(mut workflow) = workflows.get(workflow_id).await? else {
        return Ok(None);
    };
    if workflow.status == WorkflowStatus::Cancelled {
        return Ok(Some(workflow));
    }

    let sub_jobs = jobs.list_by_workflow(workflow_id).await?;
    let completed = sub_jobs
        .iter()
        .filter(|j| j.status == JobStatus::Completed)
        .count() as u32;
    let failed = sub_jobs
        .iter()
        .filter(|j| j.status == JobStatus::Failed)
        .count() as u32;
    let any_started = sub_jobs.iter().any(crate::domain::models::ScanJob::ever_started);

    workflow.completed_steps = completed;
    workflow.failed_steps = failed;
    workflow.status =
        WorkflowStatus::derive(completed, failed, workflow.total_steps, any_started);
    workflow.updated_at = chrono::Utc::now();
    workflows.update(&workflow).await?;
    Ok(Some(workflow))
}

/// Consumes result-ingestion events and reconciles job/workflow state.
pub struct ResultReconciler {
    workflows: Arc<dyn WorkflowRepository>,
    jobs: Arc<dyn JobRepository>,
    results: Arc<dyn ResultRepository>,
    pool: Arc<VpnPoolService>,
}

impl ResultReconciler {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        jobs: Arc<dyn JobRepository>,
        results: Arc<dyn ResultRepository>,
        pool: Arc<VpnPoolService>,
    ) -> Self {
        Self {
            workflows,
            jobs,
            results,
            pool,
        }
    }

    /// Ingest one callback payload.
    ///
    /// Malformed payloads error with `Ingestion` — the caller logs and
    /// drops them without touching job state. A callback for an unknown
    /// or already-terminal job stores the result and otherwise does
    /// nothing: duplicates and post-cancel stragglers are expected.
    pub async fn ingest(&self, payload: &ScanResultPayload) -> DomainResult<IngestOutcome> {
        if payload.target.trim().is_empty() {
            return Err(DomainError::Ingestion("missing target".into()));
        }
        if !payload.scan_metadata.is_object() {
            return Err(DomainError::Ingestion("scan_metadata must be an object".into()));
        }

        let row = ScanResult::from_payload(payload);
        let result_id = self.results.create(&row).await?;

        let mut outcome = IngestOutcome {
            result_id: Some(result_id),
            job_id: row.job_id.clone(),
            workflow_id: row.workflow_id.clone(),
            job_completed: false,
        };

        let Some(job_id) = row.job_id.as_deref() else {
            return Ok(outcome);
        };
        let Some(mut job) = self.jobs.get(job_id).await? else {
            tracing::warn!(%job_id, "result callback for unknown job");
            return Ok(outcome);
        };

        if job.is_terminal() {
            // Late or duplicate callback; cancelled stays cancelled.
            tracing::debug!(%job_id, status = job.status.as_str(), "ignoring callback for terminal job");
            outcome.workflow_id = job.workflow_id.clone();
            return Ok(outcome);
        }

        match payload.reported_failure() {
            Some(error) => {
                job.error = Some(error);
                job.transition_to(JobStatus::Failed)?;
            }
            None => {
                job.transition_to(JobStatus::Completed)?;
                outcome.job_completed = true;
            }
        }
        self.jobs.update(&job).await?;
        self.release_lease(&job).await;

        outcome.workflow_id = job.workflow_id.clone();
        if let Some(workflow_id) = &job.workflow_id {
            recompute_workflow_status(self.workflows.as_ref(), self.jobs.as_ref(), workflow_id)
                .await?;
        }

        Ok(outcome)
    }

    /// Drop the job's holder entry once it is terminal.
    async fn release_lease(&self, job: &crate::domain::models::ScanJob) {
        if let Some(lease) = &job.vpn_lease {
            if let Err(e) = self.pool.release(&lease.filename, &job.job_id).await {
                tracing::warn!(job_id = %job.job_id, profile = %lease.filename, error = %e,
                    "lease release failed");
            }
        }
    }
}
