//! VPN catalog client.
//!
//! The catalog (proxy node) publishes available profiles. Older
//! deployments return a bare list of `.ovpn` filenames; newer ones return
//! profile objects. Both are accepted, and a server IP embedded in the
//! filename is extracted to enrich the entry.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{VpnCatalogConfig, VpnProfile};
use crate::domain::ports::VpnCatalogSource;

/// HTTP client for the catalog source.
pub struct CatalogClient {
    config: VpnCatalogConfig,
    client: reqwest::Client,
    ip_pattern: Regex,
}

/// Catalog entries arrive as filenames or as objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogEntry {
    Filename(String),
    Profile {
        filename: String,
        #[serde(default)]
        hostname: Option<String>,
        #[serde(default)]
        ip: Option<String>,
        #[serde(default)]
        country: Option<String>,
    },
}

impl CatalogClient {
    pub fn new(config: VpnCatalogConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            ip_pattern: Regex::new(r"(\d+\.\d+\.\d+\.\d+)").expect("static pattern"),
        }
    }

    fn to_profile(&self, entry: CatalogEntry) -> VpnProfile {
        match entry {
            CatalogEntry::Filename(filename) => {
                let hostname = filename.trim_end_matches(".ovpn").to_string();
                let ip = self
                    .ip_pattern
                    .find(&filename)
                    .map(|m| m.as_str().to_string());
                let mut profile = VpnProfile::new(filename).with_hostname(hostname);
                profile.ip = ip;
                profile
            }
            CatalogEntry::Profile {
                filename,
                hostname,
                ip,
                country,
            } => {
                let mut profile = VpnProfile::new(&filename);
                profile.hostname =
                    hostname.or_else(|| Some(filename.trim_end_matches(".ovpn").to_string()));
                profile.ip = ip.or_else(|| {
                    self.ip_pattern
                        .find(&filename)
                        .map(|m| m.as_str().to_string())
                });
                profile.country = country;
                profile
            }
        }
    }
}

#[async_trait]
impl VpnCatalogSource for CatalogClient {
    async fn fetch_catalog(&self) -> DomainResult<Vec<VpnProfile>> {
        let url = format!("{}/vpns", self.config.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            DomainError::ResourceUnavailable(format!("VPN catalog unreachable: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(DomainError::ResourceUnavailable(format!(
                "VPN catalog returned {}",
                response.status()
            )));
        }

        let entries: Vec<CatalogEntry> = response.json().await.map_err(|e| {
            DomainError::ResourceUnavailable(format!("unparseable catalog payload: {e}"))
        })?;

        let profiles: Vec<VpnProfile> =
            entries.into_iter().map(|e| self.to_profile(e)).collect();
        tracing::debug!(count = profiles.len(), "fetched VPN catalog");
        Ok(profiles)
    }
}
