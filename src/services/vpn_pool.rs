//! VPN resource pool: catalog brokering and lease tracking.
//!
//! Profiles are shared-identity leases, not mutual exclusion: several jobs
//! may hold one profile at once. The only truly shared mutable state in
//! the controller is the per-profile holder set, so `acquire` / `release`
//! are serialized through a per-profile async lock around the
//! read-modify-write on the stored row.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use rand::seq::SliceRandom;
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{VpnLease, VpnProfile};
use crate::domain::ports::{VpnCatalogSource, VpnProfileRepository};

/// Lifecycle action reported by a scanner worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyAction {
    Connect,
    Disconnect,
}

impl NotifyAction {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "connect" => Some(Self::Connect),
            "disconnect" => Some(Self::Disconnect),
            _ => None,
        }
    }
}

/// Pool service brokering VPN profiles between the catalog source, the
/// persistent lease store, and the dispatch path.
pub struct VpnPoolService {
    repo: Arc<dyn VpnProfileRepository>,
    catalog: Arc<dyn VpnCatalogSource>,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VpnPoolService {
    pub fn new(repo: Arc<dyn VpnProfileRepository>, catalog: Arc<dyn VpnCatalogSource>) -> Self {
        Self {
            repo,
            catalog,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// The lock guarding one profile's holder set.
    fn profile_lock(&self, filename: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("profile lock registry poisoned");
        locks
            .entry(filename.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Fetch the live catalog. Failures map to `ResourceUnavailable`;
    /// callers degrade to leaseless dispatch instead of blocking.
    pub async fn fetch_catalog(&self) -> DomainResult<Vec<VpnProfile>> {
        self.catalog.fetch_catalog().await
    }

    /// Bootstrap: sync the catalog into the lease store, preserving
    /// holder state for profiles that already exist.
    pub async fn sync_catalog(&self) -> DomainResult<usize> {
        let profiles = self.catalog.fetch_catalog().await?;
        for profile in &profiles {
            self.repo.upsert_identity(profile).await?;
        }
        tracing::info!(count = profiles.len(), "synced VPN catalog into pool");
        Ok(profiles.len())
    }

    /// All known pool entries with their lease state.
    pub async fn list(&self) -> DomainResult<Vec<VpnProfile>> {
        self.repo.list().await
    }

    pub fn select_by_name<'a>(pool: &'a [VpnProfile], name: &str) -> Option<&'a VpnProfile> {
        pool.iter().find(|p| p.filename == name)
    }

    pub fn select_by_country<'a>(pool: &'a [VpnProfile], code: &str) -> Vec<&'a VpnProfile> {
        let code = code.to_uppercase();
        pool.iter()
            .filter(|p| p.country.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(&code)))
            .collect()
    }

    pub fn select_random(pool: &[VpnProfile]) -> Option<&VpnProfile> {
        pool.choose(&mut rand::thread_rng())
    }

    /// Resolve the lease for a workflow request: an explicitly requested
    /// profile wins, then a random profile in the requested country, then
    /// any random profile. `None` when the catalog is unreachable or the
    /// request cannot be satisfied — the workflow proceeds without a
    /// lease rather than failing.
    pub async fn assign_for_request(
        &self,
        requested_profile: Option<&str>,
        country: Option<&str>,
    ) -> Option<VpnLease> {
        let pool = match self.fetch_catalog().await {
            Ok(pool) if !pool.is_empty() => pool,
            Ok(_) => {
                tracing::warn!("VPN catalog is empty; dispatching without a lease");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "VPN catalog unavailable; dispatching without a lease");
                return None;
            }
        };

        if let Some(name) = requested_profile {
            let mut lease = Self::select_by_name(&pool, name)?.to_lease();
            if let Some(country) = country {
                lease.country = Some(country.to_string());
            }
            return Some(lease);
        }

        if let Some(code) = country {
            let in_country = Self::select_by_country(&pool, code);
            let picked = in_country.choose(&mut rand::thread_rng())?;
            return Some(picked.to_lease());
        }

        Self::select_random(&pool).map(VpnProfile::to_lease)
    }

    /// Round-robin leases for `k` shards: shard `i` gets
    /// `pool[i % pool.len()]`, spreading load even when the shard count
    /// exceeds the catalog size. Empty pool yields no leases.
    pub fn round_robin(pool: &[VpnProfile], k: usize) -> Vec<VpnLease> {
        if pool.is_empty() {
            return Vec::new();
        }
        (0..k).map(|i| pool[i % pool.len()].to_lease()).collect()
    }

    /// Make sure a catalog identity exists in the store before leasing it.
    pub async fn ensure_known(&self, lease: &VpnLease) -> DomainResult<()> {
        if self.repo.get(&lease.filename).await?.is_some() {
            return Ok(());
        }
        let mut profile = VpnProfile::new(lease.filename.clone());
        profile.hostname = lease.hostname.clone();
        profile.ip = lease.ip.clone();
        profile.country = lease.country.clone();
        self.repo.upsert_identity(&profile).await
    }

    /// Add `job_id` to the profile's holders. Idempotent; serialized per
    /// profile so concurrent shard submissions cannot lose an update.
    pub async fn acquire(&self, filename: &str, job_id: &str) -> DomainResult<VpnProfile> {
        let lock = self.profile_lock(filename);
        let _guard = lock.lock().await;

        let mut profile = self
            .repo
            .get(filename)
            .await?
            .ok_or_else(|| DomainError::ProfileNotFound(filename.to_string()))?;
        if profile.acquire(job_id) {
            tracing::debug!(%filename, %job_id, holders = profile.holders.len(), "lease acquired");
        }
        self.repo.update(&profile).await?;
        Ok(profile)
    }

    /// Drop `job_id` from the profile's holders; idle when empty.
    /// Releasing an absent holder is a no-op, not an error.
    pub async fn release(&self, filename: &str, job_id: &str) -> DomainResult<VpnProfile> {
        let lock = self.profile_lock(filename);
        let _guard = lock.lock().await;

        let mut profile = self
            .repo
            .get(filename)
            .await?
            .ok_or_else(|| DomainError::ProfileNotFound(filename.to_string()))?;
        if profile.release(job_id) {
            tracing::debug!(%filename, %job_id, holders = profile.holders.len(), "lease released");
        }
        self.repo.update(&profile).await?;
        Ok(profile)
    }

    /// Worker lifecycle bookkeeping: scanner nodes report their own
    /// connect/disconnect back into the holder set.
    pub async fn notify(
        &self,
        filename: &str,
        action: NotifyAction,
        holder_id: &str,
    ) -> DomainResult<VpnProfile> {
        match action {
            NotifyAction::Connect => self.acquire(filename, holder_id).await,
            NotifyAction::Disconnect => self.release(filename, holder_id).await,
        }
    }
}
