//! Job dispatcher: hands persisted scan jobs to the execution backend.
//!
//! Each submission is isolated: a failed dispatch marks that one job
//! failed and moves on, so a workflow can end up with any mix of running
//! and dead-on-arrival sub-jobs.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::errors::DomainResult;
use crate::domain::models::ScanJob;
use crate::domain::ports::{DispatchPayload, ExecutionBackend, JobRepository};

/// A submission that never made it to the backend.
#[derive(Debug, Clone, Serialize)]
pub struct FailedSubmission {
    pub job_id: String,
    pub error: String,
}

/// Result of dispatching one batch of sub-jobs.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DispatchOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<FailedSubmission>,
}

impl DispatchOutcome {
    pub fn any_succeeded(&self) -> bool {
        !self.successful.is_empty()
    }
}

/// Submits jobs to the execution backend and records the outcome.
pub struct JobDispatcher {
    backend: Arc<dyn ExecutionBackend>,
    jobs: Arc<dyn JobRepository>,
    callback_url: String,
}

impl JobDispatcher {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        jobs: Arc<dyn JobRepository>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            jobs,
            callback_url: callback_url.into(),
        }
    }

    /// Submit one job. The job row is updated with either the backend
    /// handle (running) or the error text (failed); the returned result
    /// only reports persistence problems, never dispatch failure.
    pub async fn dispatch_one(&self, job: &mut ScanJob) -> DomainResult<bool> {
        let payload = DispatchPayload::from_job(job, self.callback_url.clone());

        match self.backend.dispatch(&payload).await {
            Ok(handle) => {
                tracing::info!(job_id = %job.job_id, %handle, tool = %job.tool, "job dispatched");
                job.mark_dispatched(handle)?;
                self.jobs.update(job).await?;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(job_id = %job.job_id, error = %e, "job dispatch failed");
                job.mark_failed(e.to_string())?;
                self.jobs.update(job).await?;
                Ok(false)
            }
        }
    }

    /// Submit a batch. Ordering between sub-jobs is not guaranteed to
    /// matter; failures are collected, not propagated.
    pub async fn dispatch_batch(&self, jobs: &mut [ScanJob]) -> DomainResult<DispatchOutcome> {
        let mut outcome = DispatchOutcome::default();
        for job in jobs.iter_mut() {
            if self.dispatch_one(job).await? {
                outcome.successful.push(job.job_id.clone());
            } else {
                outcome.failed.push(FailedSubmission {
                    job_id: job.job_id.clone(),
                    error: job.error.clone().unwrap_or_default(),
                });
            }
        }
        Ok(outcome)
    }

    /// Best-effort backend handle deletion, used by cancel and delete
    /// paths. Backend errors are logged and swallowed.
    pub async fn forget_handle(&self, job: &ScanJob) {
        if let Some(handle) = &job.execution_handle {
            if let Err(e) = self.backend.delete(handle).await {
                tracing::warn!(job_id = %job.job_id, %handle, error = %e, "backend handle deletion failed");
            }
        }
    }
}
