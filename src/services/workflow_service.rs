//! Workflow orchestration: create/dispatch, status, cancel, delete.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    JobStatus, ScanJob, ScanJobRequest, Workflow, WorkflowRequest, WorkflowStatus,
};
use crate::domain::ports::{JobRepository, ResultRepository, WorkflowRepository};
use crate::services::decomposer::{shard_axis, WorkflowDecomposer, KNOWN_TOOLS};
use crate::services::dispatcher::{DispatchOutcome, JobDispatcher};
use crate::services::reconciler::recompute_workflow_status;
use crate::services::vpn_pool::VpnPoolService;

/// Creation summary returned to the caller.
#[derive(Debug, Serialize)]
pub struct WorkflowCreation {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub total_steps: u32,
    pub sub_jobs: Vec<ScanJob>,
    pub outcome: DispatchOutcome,
    pub vpn_lease: Option<crate::domain::models::VpnLease>,
}

/// Live progress view over a workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowProgress {
    pub completed: u32,
    pub failed: u32,
    pub total: u32,
    pub percentage: f64,
}

/// Workflow detail: the aggregate plus its sub-jobs and progress.
#[derive(Debug, Serialize)]
pub struct WorkflowDetail {
    pub workflow: Workflow,
    pub sub_jobs: Vec<ScanJob>,
    pub progress: WorkflowProgress,
}

/// Orchestrates the full workflow lifecycle.
pub struct WorkflowService {
    workflows: Arc<dyn WorkflowRepository>,
    jobs: Arc<dyn JobRepository>,
    results: Arc<dyn ResultRepository>,
    pool: Arc<VpnPoolService>,
    dispatcher: Arc<JobDispatcher>,
}

impl WorkflowService {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        jobs: Arc<dyn JobRepository>,
        results: Arc<dyn ResultRepository>,
        pool: Arc<VpnPoolService>,
        dispatcher: Arc<JobDispatcher>,
    ) -> Self {
        Self {
            workflows,
            jobs,
            results,
            pool,
            dispatcher,
        }
    }

    /// Create, persist, lease, and dispatch a workflow.
    ///
    /// VPN assignment is best-effort: an unreachable or empty catalog
    /// degrades to leaseless dispatch. Dispatch failures are isolated per
    /// sub-job; the workflow's status reflects whatever mix survives.
    pub async fn create_and_dispatch(&self, req: &WorkflowRequest) -> DomainResult<WorkflowCreation> {
        WorkflowDecomposer::validate(req)?;
        tracing::info!(targets = ?req.targets, strategy = req.strategy.as_str(), "creating workflow");

        let mut workflow = Workflow::from_request(req);

        let lease = self
            .pool
            .assign_for_request(req.vpn_profile.as_deref(), req.country.as_deref())
            .await;
        if let Some(lease) = &lease {
            tracing::info!(workflow_id = %workflow.workflow_id,
                profile = %lease.filename, "assigned VPN lease to workflow");
            if workflow.vpn_country.is_none() {
                workflow.vpn_country = lease.country.clone();
            }
        }
        workflow.vpn_lease = lease.clone();

        // A catalog snapshot is only needed when some step actually shards.
        let wants_shards = req
            .steps
            .iter()
            .any(|s| s.scanner_count() > 1 && shard_axis(&s.tool_id).is_some());
        let shard_pool = if wants_shards {
            self.pool.fetch_catalog().await.unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut sub_jobs = WorkflowDecomposer::decompose(&workflow, req, &shard_pool);
        workflow.total_steps = u32::try_from(sub_jobs.len()).unwrap_or(u32::MAX);

        self.workflows.create(&workflow).await?;
        self.jobs.create_batch(&sub_jobs).await?;

        // Register every job as a holder of its lease. Failures here are
        // bookkeeping-only and must not block dispatch.
        for job in &sub_jobs {
            if let Some(lease) = &job.vpn_lease {
                if let Err(e) = self.pool.ensure_known(lease).await {
                    tracing::warn!(job_id = %job.job_id, error = %e, "lease registration failed");
                    continue;
                }
                if let Err(e) = self.pool.acquire(&lease.filename, &job.job_id).await {
                    tracing::warn!(job_id = %job.job_id, error = %e, "lease acquisition failed");
                }
            }
        }

        let outcome = self.dispatcher.dispatch_batch(&mut sub_jobs).await?;

        let workflow = recompute_workflow_status(
            self.workflows.as_ref(),
            self.jobs.as_ref(),
            &workflow.workflow_id,
        )
        .await?
        .ok_or_else(|| DomainError::WorkflowNotFound(workflow.workflow_id.clone()))?;

        Ok(WorkflowCreation {
            workflow_id: workflow.workflow_id.clone(),
            status: workflow.status,
            total_steps: workflow.total_steps,
            sub_jobs,
            outcome,
            vpn_lease: workflow.vpn_lease,
        })
    }

    /// Detailed status, with progress computed from live sub-job state
    /// and `total_steps` as the fixed denominator.
    pub async fn get_detail(&self, workflow_id: &str) -> DomainResult<WorkflowDetail> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or_else(|| DomainError::WorkflowNotFound(workflow_id.to_string()))?;
        let sub_jobs = self.jobs.list_by_workflow(workflow_id).await?;

        let completed = sub_jobs
            .iter()
            .filter(|j| j.status == JobStatus::Completed)
            .count() as u32;
        let failed = sub_jobs
            .iter()
            .filter(|j| j.status == JobStatus::Failed)
            .count() as u32;
        let total = workflow.total_steps;
        let percentage = if total == 0 {
            0.0
        } else {
            f64::from(completed + failed) / f64::from(total) * 100.0
        };

        Ok(WorkflowDetail {
            workflow,
            sub_jobs,
            progress: WorkflowProgress {
                completed,
                failed,
                total,
                percentage,
            },
        })
    }

    /// Page through workflows, newest first. Returns the page and the
    /// overall count.
    pub async fn list(&self, page: u32, page_size: u32) -> DomainResult<(Vec<Workflow>, i64)> {
        let workflows = self.workflows.list(page, page_size).await?;
        let total = self.workflows.count().await?;
        Ok((workflows, total))
    }

    /// Cooperative cancellation: every non-terminal sub-job goes to
    /// `Cancelled`, its backend handle is asked to terminate, and its
    /// lease holder entry is dropped. The backend may keep running for a
    /// while; late callbacks are ignored by the reconciler.
    pub async fn cancel(&self, workflow_id: &str) -> DomainResult<Workflow> {
        let mut workflow = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or_else(|| DomainError::WorkflowNotFound(workflow_id.to_string()))?;

        if workflow.status == WorkflowStatus::Cancelled {
            return Ok(workflow);
        }

        let sub_jobs = self.jobs.list_by_workflow(workflow_id).await?;
        for mut job in sub_jobs {
            if job.is_terminal() {
                continue;
            }
            self.dispatcher.forget_handle(&job).await;
            job.transition_to(JobStatus::Cancelled)?;
            self.jobs.update(&job).await?;
            if let Some(lease) = &job.vpn_lease {
                if let Err(e) = self.pool.release(&lease.filename, &job.job_id).await {
                    tracing::warn!(job_id = %job.job_id, error = %e, "lease release failed on cancel");
                }
            }
        }

        workflow.status = WorkflowStatus::Cancelled;
        workflow.updated_at = chrono::Utc::now();
        self.workflows.update(&workflow).await?;
        tracing::info!(%workflow_id, "workflow cancelled");
        Ok(workflow)
    }

    /// Create and dispatch one standalone scan job, outside any workflow.
    ///
    /// A VPN lease is only assigned when the caller names a profile;
    /// otherwise the worker picks its own egress. Unlike workflow
    /// dispatch, a failed submission surfaces to the caller after being
    /// recorded on the job.
    pub async fn create_and_dispatch_job(&self, req: &ScanJobRequest) -> DomainResult<ScanJob> {
        if req.targets.is_empty() {
            return Err(DomainError::Validation("targets must not be empty".into()));
        }
        if !KNOWN_TOOLS.contains(&req.tool.as_str()) {
            return Err(DomainError::Validation(format!("unknown tool id: {}", req.tool)));
        }

        let mut job = ScanJob::new(req.tool.clone(), req.targets.clone());
        if let Some(options) = &req.options {
            job = job.with_options(options.clone());
        }

        if req.vpn_profile.is_some() {
            let lease = self
                .pool
                .assign_for_request(req.vpn_profile.as_deref(), req.country.as_deref())
                .await;
            job = job.with_lease(lease);
        }

        self.jobs.create(&job).await?;

        if let Some(lease) = &job.vpn_lease {
            if let Err(e) = self.pool.ensure_known(lease).await {
                tracing::warn!(job_id = %job.job_id, error = %e, "lease registration failed");
            } else if let Err(e) = self.pool.acquire(&lease.filename, &job.job_id).await {
                tracing::warn!(job_id = %job.job_id, error = %e, "lease acquisition failed");
            }
        }

        if !self.dispatcher.dispatch_one(&mut job).await? {
            return Err(DomainError::Dispatch {
                job_id: job.job_id.clone(),
                reason: job.error.clone().unwrap_or_default(),
            });
        }
        Ok(job)
    }

    /// Look up one scan job.
    pub async fn get_job(&self, job_id: &str) -> DomainResult<ScanJob> {
        self.jobs
            .get(job_id)
            .await?
            .ok_or_else(|| DomainError::JobNotFound(job_id.to_string()))
    }

    /// Delete one scan job: backend handle, lease holder entry, and
    /// correlated results go with it.
    pub async fn delete_job(&self, job_id: &str) -> DomainResult<()> {
        let job = self.get_job(job_id).await?;
        self.dispatcher.forget_handle(&job).await;
        if let Some(lease) = &job.vpn_lease {
            if let Err(e) = self.pool.release(&lease.filename, &job.job_id).await {
                tracing::warn!(%job_id, error = %e, "lease release failed on job delete");
            }
        }
        self.results.delete_by_job(job_id).await?;
        self.jobs.delete(job_id).await?;
        tracing::info!(%job_id, "scan job deleted with related results");
        Ok(())
    }

    /// Delete a workflow and everything it owns: backend handles,
    /// sub-jobs, correlated results, lease holder entries.
    pub async fn delete(&self, workflow_id: &str) -> DomainResult<u32> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or_else(|| DomainError::WorkflowNotFound(workflow_id.to_string()))?;

        let sub_jobs = self.jobs.list_by_workflow(workflow_id).await?;
        let mut deleted = 0u32;
        for job in &sub_jobs {
            self.dispatcher.forget_handle(job).await;
            if let Some(lease) = &job.vpn_lease {
                if let Err(e) = self.pool.release(&lease.filename, &job.job_id).await {
                    tracing::warn!(job_id = %job.job_id, error = %e, "lease release failed on delete");
                }
            }
            self.results.delete_by_job(&job.job_id).await?;
            self.jobs.delete(&job.job_id).await?;
            deleted += 1;
        }

        self.workflows.delete(&workflow.workflow_id).await?;
        tracing::info!(%workflow_id, sub_jobs = deleted, "workflow deleted with all resources");
        Ok(deleted)
    }
}
