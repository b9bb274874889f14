//! Embedded schema migrations.

use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};

/// A versioned, embedded migration.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

pub fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema",
        sql: include_str!("../../../migrations/001_initial_schema.sql"),
    }]
}

/// Apply any pending migrations. Returns how many ran.
pub async fn run_migrations(pool: &SqlitePool) -> DomainResult<usize> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now')),
            description TEXT
        )",
    )
    .execute(pool)
    .await?;

    let current: Option<(i64,)> =
        sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_optional(pool)
            .await?;
    let current = current.map_or(0, |(v,)| v);

    let pending: Vec<Migration> = all_migrations()
        .into_iter()
        .filter(|m| m.version > current)
        .collect();

    for migration in &pending {
        sqlx::raw_sql(migration.sql).execute(pool).await.map_err(|e| {
            DomainError::Database(format!("migration {} failed: {e}", migration.version))
        })?;
        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(pool)
            .await?;
        tracing::info!(version = migration.version, description = migration.description,
            "applied migration");
    }

    Ok(pending.len())
}
