use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::ScanResult;

/// Filters for paging through scan results.
#[derive(Debug, Clone, Default)]
pub struct ResultFilters {
    pub workflow_id: Option<String>,
    pub job_id: Option<String>,
}

/// Repository port for the append-only scan result store.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Append a result row, returning its row id
    async fn create(&self, result: &ScanResult) -> DomainResult<i64>;

    /// All results correlated to one job
    async fn list_by_job(&self, job_id: &str) -> DomainResult<Vec<ScanResult>>;

    /// All results correlated to one workflow
    async fn list_by_workflow(&self, workflow_id: &str) -> DomainResult<Vec<ScanResult>>;

    /// Page through results, newest first, with optional filters
    async fn list(
        &self,
        filters: ResultFilters,
        page: u32,
        page_size: u32,
    ) -> DomainResult<Vec<ScanResult>>;

    /// Count results matching filters
    async fn count(&self, filters: ResultFilters) -> DomainResult<i64>;

    /// Cascade deletion for a job's correlated results
    async fn delete_by_job(&self, job_id: &str) -> DomainResult<u64>;
}
