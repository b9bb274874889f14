//! SQLite implementation of the append-only ResultRepository.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

use crate::adapters::sqlite::workflow_repository::parse_timestamp;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ScanResult;
use crate::domain::ports::{ResultFilters, ResultRepository};

#[derive(Clone)]
pub struct SqliteResultRepository {
    pool: SqlitePool,
}

impl SqliteResultRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ResultRow {
    id: i64,
    target: String,
    resolved_ips: String,
    open_ports: String,
    metadata: String,
    job_id: Option<String>,
    workflow_id: Option<String>,
    created_at: String,
}

impl TryFrom<ResultRow> for ScanResult {
    type Error = DomainError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        Ok(ScanResult {
            id: row.id,
            target: row.target,
            resolved_ips: serde_json::from_str(&row.resolved_ips)?,
            open_ports: serde_json::from_str(&row.open_ports)?,
            metadata: serde_json::from_str(&row.metadata)?,
            job_id: row.job_id,
            workflow_id: row.workflow_id,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

fn filter_clause(filters: &ResultFilters) -> (String, Vec<String>) {
    let mut clause = String::from(" WHERE 1=1");
    let mut bindings = Vec::new();
    if let Some(workflow_id) = &filters.workflow_id {
        clause.push_str(" AND workflow_id = ?");
        bindings.push(workflow_id.clone());
    }
    if let Some(job_id) = &filters.job_id {
        clause.push_str(" AND job_id = ?");
        bindings.push(job_id.clone());
    }
    (clause, bindings)
}

#[async_trait]
impl ResultRepository for SqliteResultRepository {
    async fn create(&self, result: &ScanResult) -> DomainResult<i64> {
        let ips_json = serde_json::to_string(&result.resolved_ips)?;
        let ports_json = serde_json::to_string(&result.open_ports)?;
        let metadata_json = serde_json::to_string(&result.metadata)?;

        let inserted = sqlx::query(
            r#"INSERT INTO scan_results (target, resolved_ips, open_ports, metadata,
               job_id, workflow_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&result.target)
        .bind(&ips_json)
        .bind(&ports_json)
        .bind(&metadata_json)
        .bind(&result.job_id)
        .bind(&result.workflow_id)
        .bind(result.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(inserted.last_insert_rowid())
    }

    async fn list_by_job(&self, job_id: &str) -> DomainResult<Vec<ScanResult>> {
        let rows: Vec<ResultRow> =
            sqlx::query_as("SELECT * FROM scan_results WHERE job_id = ? ORDER BY id")
                .bind(job_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_workflow(&self, workflow_id: &str) -> DomainResult<Vec<ScanResult>> {
        let rows: Vec<ResultRow> =
            sqlx::query_as("SELECT * FROM scan_results WHERE workflow_id = ? ORDER BY id")
                .bind(workflow_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list(
        &self,
        filters: ResultFilters,
        page: u32,
        page_size: u32,
    ) -> DomainResult<Vec<ScanResult>> {
        let (clause, bindings) = filter_clause(&filters);
        let query = format!("SELECT * FROM scan_results{clause} ORDER BY id DESC LIMIT ? OFFSET ?");
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);

        let mut q = sqlx::query_as::<_, ResultRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }
        let rows = q
            .bind(i64::from(page_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self, filters: ResultFilters) -> DomainResult<i64> {
        let (clause, bindings) = filter_clause(&filters);
        let query = format!("SELECT COUNT(*) FROM scan_results{clause}");

        let mut q = sqlx::query_as::<_, (i64,)>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }
        let (count,) = q.fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn delete_by_job(&self, job_id: &str) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM scan_results WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
