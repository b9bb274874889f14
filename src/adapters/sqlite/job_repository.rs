//! SQLite implementation of the JobRepository.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

use crate::adapters::sqlite::workflow_repository::parse_timestamp;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{JobStatus, ScanJob, VpnLease};
use crate::domain::ports::JobRepository;

#[derive(Clone)]
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert(&self, job: &ScanJob) -> DomainResult<()> {
        let targets_json = serde_json::to_string(&job.targets)?;
        let options_json = serde_json::to_string(&job.options)?;
        let lease_json = job.vpn_lease.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"INSERT INTO scan_jobs (job_id, workflow_id, tool, targets, options, step_order,
               status, execution_handle, error_message, vpn_lease, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&job.job_id)
        .bind(&job.workflow_id)
        .bind(&job.tool)
        .bind(&targets_json)
        .bind(&options_json)
        .bind(i64::from(job.step_order))
        .bind(job.status.as_str())
        .bind(&job.execution_handle)
        .bind(&job.error)
        .bind(&lease_json)
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(FromRow)]
struct JobRow {
    job_id: String,
    workflow_id: Option<String>,
    tool: String,
    targets: String,
    options: String,
    step_order: i64,
    status: String,
    execution_handle: Option<String>,
    error_message: Option<String>,
    vpn_lease: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<JobRow> for ScanJob {
    type Error = DomainError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let vpn_lease: Option<VpnLease> = row
            .vpn_lease
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(ScanJob {
            job_id: row.job_id,
            workflow_id: row.workflow_id,
            tool: row.tool,
            targets: serde_json::from_str(&row.targets)?,
            options: serde_json::from_str(&row.options)?,
            step_order: u32::try_from(row.step_order).unwrap_or(0),
            status: JobStatus::from_str(&row.status)
                .ok_or_else(|| DomainError::Database(format!("bad status: {}", row.status)))?,
            vpn_lease,
            execution_handle: row.execution_handle,
            error: row.error_message,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn create(&self, job: &ScanJob) -> DomainResult<()> {
        self.insert(job).await
    }

    async fn create_batch(&self, jobs: &[ScanJob]) -> DomainResult<()> {
        for job in jobs {
            self.insert(job).await?;
        }
        Ok(())
    }

    async fn get(&self, job_id: &str) -> DomainResult<Option<ScanJob>> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM scan_jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, job: &ScanJob) -> DomainResult<()> {
        let targets_json = serde_json::to_string(&job.targets)?;
        let options_json = serde_json::to_string(&job.options)?;
        let lease_json = job.vpn_lease.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"UPDATE scan_jobs SET workflow_id = ?, tool = ?, targets = ?, options = ?,
               step_order = ?, status = ?, execution_handle = ?, error_message = ?,
               vpn_lease = ?, updated_at = ?
               WHERE job_id = ?"#,
        )
        .bind(&job.workflow_id)
        .bind(&job.tool)
        .bind(&targets_json)
        .bind(&options_json)
        .bind(i64::from(job.step_order))
        .bind(job.status.as_str())
        .bind(&job.execution_handle)
        .bind(&job.error)
        .bind(&lease_json)
        .bind(job.updated_at.to_rfc3339())
        .bind(&job.job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::JobNotFound(job.job_id.clone()));
        }
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM scan_jobs WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::JobNotFound(job_id.to_string()));
        }
        Ok(())
    }

    async fn list_by_workflow(&self, workflow_id: &str) -> DomainResult<Vec<ScanJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT * FROM scan_jobs WHERE workflow_id = ? ORDER BY step_order, created_at",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_by_workflow(&self, workflow_id: &str) -> DomainResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM scan_jobs WHERE workflow_id = ?")
                .bind(workflow_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
