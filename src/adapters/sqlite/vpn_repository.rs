//! SQLite implementation of the VpnProfileRepository.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

use crate::adapters::sqlite::workflow_repository::parse_timestamp;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{VpnProfile, VpnStatus};
use crate::domain::ports::VpnProfileRepository;

#[derive(Clone)]
pub struct SqliteVpnRepository {
    pool: SqlitePool,
}

impl SqliteVpnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ProfileRow {
    filename: String,
    hostname: Option<String>,
    ip: Option<String>,
    country: Option<String>,
    status: String,
    holders: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProfileRow> for VpnProfile {
    type Error = DomainError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(VpnProfile {
            filename: row.filename,
            hostname: row.hostname,
            ip: row.ip,
            country: row.country,
            status: VpnStatus::from_str(&row.status)
                .ok_or_else(|| DomainError::Database(format!("bad status: {}", row.status)))?,
            holders: serde_json::from_str(&row.holders)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl VpnProfileRepository for SqliteVpnRepository {
    async fn upsert_identity(&self, profile: &VpnProfile) -> DomainResult<()> {
        // Catalog identity only; holder state of existing rows survives.
        sqlx::query(
            r#"INSERT INTO vpn_profiles (filename, hostname, ip, country, status, holders,
               created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(filename) DO UPDATE SET
                   hostname = excluded.hostname,
                   ip = excluded.ip,
                   country = excluded.country,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&profile.filename)
        .bind(&profile.hostname)
        .bind(&profile.ip)
        .bind(&profile.country)
        .bind(profile.status.as_str())
        .bind(serde_json::to_string(&profile.holders)?)
        .bind(profile.created_at.to_rfc3339())
        .bind(profile.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, filename: &str) -> DomainResult<Option<VpnProfile>> {
        let row: Option<ProfileRow> =
            sqlx::query_as("SELECT * FROM vpn_profiles WHERE filename = ?")
                .bind(filename)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, profile: &VpnProfile) -> DomainResult<()> {
        let holders_json = serde_json::to_string(&profile.holders)?;
        let result = sqlx::query(
            r#"UPDATE vpn_profiles SET hostname = ?, ip = ?, country = ?, status = ?,
               holders = ?, updated_at = ?
               WHERE filename = ?"#,
        )
        .bind(&profile.hostname)
        .bind(&profile.ip)
        .bind(&profile.country)
        .bind(profile.status.as_str())
        .bind(&holders_json)
        .bind(profile.updated_at.to_rfc3339())
        .bind(&profile.filename)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ProfileNotFound(profile.filename.clone()));
        }
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<VpnProfile>> {
        let rows: Vec<ProfileRow> =
            sqlx::query_as("SELECT * FROM vpn_profiles ORDER BY filename")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
