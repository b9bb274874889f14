//! VPN profile and lease models.
//!
//! A profile is a shared egress identity: several scan jobs may hold it
//! concurrently. The pool tracks holders per profile; a profile is idle
//! exactly when nothing holds it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection status of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VpnStatus {
    Idle,
    Connected,
}

impl Default for VpnStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl VpnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connected => "connected",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "connected" => Some(Self::Connected),
            _ => None,
        }
    }
}

/// Immutable assignment snapshot handed to workflows and jobs.
///
/// The lease carries everything the scanner node needs to bring the
/// egress identity up; it never changes after assignment even if the
/// catalog entry does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnLease {
    pub filename: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// A pool entry: catalog identity plus lease-tracking state.
///
/// Invariants: `holders` contains no duplicate job ids, and
/// `status == Idle` iff `holders` is empty. Mutation goes through
/// [`VpnProfile::acquire`] / [`VpnProfile::release`], which the pool
/// service serializes per profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnProfile {
    pub filename: String,
    pub hostname: Option<String>,
    pub ip: Option<String>,
    pub country: Option<String>,
    pub status: VpnStatus,
    pub holders: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VpnProfile {
    pub fn new(filename: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            filename: filename.into(),
            hostname: None,
            ip: None,
            country: None,
            status: VpnStatus::Idle,
            holders: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Add a holder. Idempotent: re-acquiring with the same job id is a
    /// no-op. Returns whether the holder set changed.
    pub fn acquire(&mut self, job_id: &str) -> bool {
        let changed = if self.holders.iter().any(|h| h == job_id) {
            false
        } else {
            self.holders.push(job_id.to_string());
            true
        };
        self.status = VpnStatus::Connected;
        self.updated_at = Utc::now();
        changed
    }

    /// Remove a holder. Releasing an absent job id is a no-op. The
    /// profile goes back to idle exactly when the last holder leaves.
    pub fn release(&mut self, job_id: &str) -> bool {
        let before = self.holders.len();
        self.holders.retain(|h| h != job_id);
        let changed = self.holders.len() != before;
        if self.holders.is_empty() {
            self.status = VpnStatus::Idle;
        }
        self.updated_at = Utc::now();
        changed
    }

    /// Snapshot this profile into an assignment lease.
    pub fn to_lease(&self) -> VpnLease {
        VpnLease {
            filename: self.filename.clone(),
            hostname: self.hostname.clone(),
            ip: self.ip.clone(),
            country: self.country.clone(),
        }
    }
}
