use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::VpnProfile;

/// Repository port for VPN profile lease state.
///
/// Callers must not read-modify-write profiles directly; the pool service
/// serializes holder mutations per profile on top of these operations.
#[async_trait]
pub trait VpnProfileRepository: Send + Sync {
    /// Insert or update a profile's catalog identity, preserving holder
    /// state for profiles that already exist
    async fn upsert_identity(&self, profile: &VpnProfile) -> DomainResult<()>;

    /// Get a profile by filename
    async fn get(&self, filename: &str) -> DomainResult<Option<VpnProfile>>;

    /// Persist a profile's full state (status + holders)
    async fn update(&self, profile: &VpnProfile) -> DomainResult<()>;

    /// All known profiles
    async fn list(&self) -> DomainResult<Vec<VpnProfile>>;
}
