use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Workflow;

/// Repository port for workflow persistence.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Insert a new workflow
    async fn create(&self, workflow: &Workflow) -> DomainResult<()>;

    /// Get a workflow by its public id
    async fn get(&self, workflow_id: &str) -> DomainResult<Option<Workflow>>;

    /// Update an existing workflow
    async fn update(&self, workflow: &Workflow) -> DomainResult<()>;

    /// Delete a workflow row (sub-jobs and results are cascaded by the service)
    async fn delete(&self, workflow_id: &str) -> DomainResult<()>;

    /// Page through workflows, newest first
    async fn list(&self, page: u32, page_size: u32) -> DomainResult<Vec<Workflow>>;

    /// Total workflow count
    async fn count(&self) -> DomainResult<i64>;
}
