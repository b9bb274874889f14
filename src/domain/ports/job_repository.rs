use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::ScanJob;

/// Repository port for scan job persistence.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn create(&self, job: &ScanJob) -> DomainResult<()>;

    /// Insert a batch of jobs (one decomposed workflow)
    async fn create_batch(&self, jobs: &[ScanJob]) -> DomainResult<()>;

    /// Get a job by its public id
    async fn get(&self, job_id: &str) -> DomainResult<Option<ScanJob>>;

    /// Update an existing job
    async fn update(&self, job: &ScanJob) -> DomainResult<()>;

    /// Delete a job row (correlated results are cascaded by the service)
    async fn delete(&self, job_id: &str) -> DomainResult<()>;

    /// All jobs of a workflow, ordered by step_order then creation
    async fn list_by_workflow(&self, workflow_id: &str) -> DomainResult<Vec<ScanJob>>;

    /// Number of jobs attached to a workflow
    async fn count_by_workflow(&self, workflow_id: &str) -> DomainResult<i64>;
}
