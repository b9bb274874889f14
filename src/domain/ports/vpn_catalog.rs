use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::VpnProfile;

/// Port to the external identity source that publishes VPN profiles.
///
/// Failures surface as `ResourceUnavailable`; callers treat the pool as
/// empty rather than blocking.
#[async_trait]
pub trait VpnCatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> DomainResult<Vec<VpnProfile>>;
}
