//! Test doubles for the external collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use scanforge::domain::errors::{DomainError, DomainResult};
use scanforge::domain::models::{Finding, VpnProfile};
use scanforge::domain::ports::{
    Advisory, DispatchPayload, ExecutionBackend, ScanAdvisor, SuggestedAction, VpnCatalogSource,
};

/// Execution backend that accepts everything unless a tool is on the
/// rejection list. Records every payload it sees.
#[derive(Default)]
pub struct MockBackend {
    counter: AtomicUsize,
    pub reject_tools: Vec<String>,
    pub dispatched: Mutex<Vec<DispatchPayload>>,
    pub deleted_handles: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(tools: &[&str]) -> Self {
        Self {
            reject_tools: tools.iter().map(|t| (*t).to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatched.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    async fn dispatch(&self, payload: &DispatchPayload) -> DomainResult<String> {
        if self.reject_tools.contains(&payload.tool) {
            return Err(DomainError::Dispatch {
                job_id: payload.job_id.clone(),
                reason: "backend rejected tool".into(),
            });
        }
        self.dispatched.lock().unwrap().push(payload.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("pod-{n}"))
    }

    async fn delete(&self, execution_handle: &str) -> DomainResult<()> {
        self.deleted_handles
            .lock()
            .unwrap()
            .push(execution_handle.to_string());
        Ok(())
    }
}

/// Catalog source returning a fixed profile list, or failing.
pub struct MockCatalog {
    pub profiles: Vec<VpnProfile>,
    pub unavailable: bool,
}

impl MockCatalog {
    pub fn with_profiles(profiles: Vec<VpnProfile>) -> Self {
        Self {
            profiles,
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            profiles: Vec::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl VpnCatalogSource for MockCatalog {
    async fn fetch_catalog(&self) -> DomainResult<Vec<VpnProfile>> {
        if self.unavailable {
            return Err(DomainError::ResourceUnavailable("catalog down".into()));
        }
        Ok(self.profiles.clone())
    }
}

/// Advisor returning a canned set of suggestions.
pub struct MockAdvisor {
    pub actions: Vec<SuggestedAction>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl MockAdvisor {
    pub fn suggesting(actions: Vec<SuggestedAction>) -> Self {
        Self {
            actions,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ScanAdvisor for MockAdvisor {
    async fn analyze(
        &self,
        _findings: &[Finding],
        tool: &str,
        target: &str,
    ) -> DomainResult<Advisory> {
        self.calls
            .lock()
            .unwrap()
            .push((tool.to_string(), target.to_string()));
        Ok(Advisory {
            summary: "canned summary".into(),
            analysis: "canned analysis".into(),
            confidence: 0.8,
            suggested_actions: self.actions.clone(),
        })
    }
}
