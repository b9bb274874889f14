use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::Finding;

/// One follow-up action proposed by the advisory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub tool: String,
    pub confidence: f64,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Advisory returned for one (target, completed tool) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advisory {
    pub summary: String,
    pub analysis: String,
    pub confidence: f64,
    pub suggested_actions: Vec<SuggestedAction>,
}

/// Port to the external AI advisory service.
///
/// Only the input/output contract lives here; the advisory content itself
/// is out of scope. Errors are logged and swallowed by the auto-chain
/// service — advice must never fail a scan.
#[async_trait]
pub trait ScanAdvisor: Send + Sync {
    async fn analyze(
        &self,
        findings: &[Finding],
        tool: &str,
        target: &str,
    ) -> DomainResult<Advisory>;
}
