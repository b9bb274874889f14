//! SQLite implementation of the WorkflowRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Strategy, VpnLease, Workflow, WorkflowStatus};
use crate::domain::ports::WorkflowRepository;

#[derive(Clone)]
pub struct SqliteWorkflowRepository {
    pool: SqlitePool,
}

impl SqliteWorkflowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct WorkflowRow {
    workflow_id: String,
    targets: String,
    strategy: String,
    status: String,
    total_steps: i64,
    completed_steps: i64,
    failed_steps: i64,
    vpn_profile: Option<String>,
    vpn_country: Option<String>,
    vpn_lease: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<WorkflowRow> for Workflow {
    type Error = DomainError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        let vpn_lease: Option<VpnLease> = row
            .vpn_lease
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(Workflow {
            workflow_id: row.workflow_id,
            targets: serde_json::from_str(&row.targets)?,
            strategy: Strategy::from_str(&row.strategy)
                .ok_or_else(|| DomainError::Database(format!("bad strategy: {}", row.strategy)))?,
            status: WorkflowStatus::from_str(&row.status)
                .ok_or_else(|| DomainError::Database(format!("bad status: {}", row.status)))?,
            total_steps: u32::try_from(row.total_steps).unwrap_or(0),
            completed_steps: u32::try_from(row.completed_steps).unwrap_or(0),
            failed_steps: u32::try_from(row.failed_steps).unwrap_or(0),
            vpn_profile: row.vpn_profile,
            vpn_country: row.vpn_country,
            vpn_lease,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

pub(crate) fn parse_timestamp(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::Database(format!("bad timestamp {s}: {e}")))
}

#[async_trait]
impl WorkflowRepository for SqliteWorkflowRepository {
    async fn create(&self, workflow: &Workflow) -> DomainResult<()> {
        let targets_json = serde_json::to_string(&workflow.targets)?;
        let lease_json = workflow
            .vpn_lease
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"INSERT INTO workflows (workflow_id, targets, strategy, status, total_steps,
               completed_steps, failed_steps, vpn_profile, vpn_country, vpn_lease,
               created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&workflow.workflow_id)
        .bind(&targets_json)
        .bind(workflow.strategy.as_str())
        .bind(workflow.status.as_str())
        .bind(i64::from(workflow.total_steps))
        .bind(i64::from(workflow.completed_steps))
        .bind(i64::from(workflow.failed_steps))
        .bind(&workflow.vpn_profile)
        .bind(&workflow.vpn_country)
        .bind(&lease_json)
        .bind(workflow.created_at.to_rfc3339())
        .bind(workflow.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, workflow_id: &str) -> DomainResult<Option<Workflow>> {
        let row: Option<WorkflowRow> =
            sqlx::query_as("SELECT * FROM workflows WHERE workflow_id = ?")
                .bind(workflow_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, workflow: &Workflow) -> DomainResult<()> {
        let targets_json = serde_json::to_string(&workflow.targets)?;
        let lease_json = workflow
            .vpn_lease
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"UPDATE workflows SET targets = ?, strategy = ?, status = ?, total_steps = ?,
               completed_steps = ?, failed_steps = ?, vpn_profile = ?, vpn_country = ?,
               vpn_lease = ?, updated_at = ?
               WHERE workflow_id = ?"#,
        )
        .bind(&targets_json)
        .bind(workflow.strategy.as_str())
        .bind(workflow.status.as_str())
        .bind(i64::from(workflow.total_steps))
        .bind(i64::from(workflow.completed_steps))
        .bind(i64::from(workflow.failed_steps))
        .bind(&workflow.vpn_profile)
        .bind(&workflow.vpn_country)
        .bind(&lease_json)
        .bind(workflow.updated_at.to_rfc3339())
        .bind(&workflow.workflow_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::WorkflowNotFound(workflow.workflow_id.clone()));
        }
        Ok(())
    }

    async fn delete(&self, workflow_id: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM workflows WHERE workflow_id = ?")
            .bind(workflow_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::WorkflowNotFound(workflow_id.to_string()));
        }
        Ok(())
    }

    async fn list(&self, page: u32, page_size: u32) -> DomainResult<Vec<Workflow>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let rows: Vec<WorkflowRow> = sqlx::query_as(
            "SELECT * FROM workflows ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self) -> DomainResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workflows")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
