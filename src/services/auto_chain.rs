//! Auto-chaining: propose and launch follow-up workflows from completed
//! scan results.
//!
//! This is strictly a consumer of the core's outputs. The advisory
//! service is external; its failures, low-confidence suggestions, and
//! disabled state all result in doing nothing. Nothing on this path may
//! ever fail a scan.

use std::sync::Arc;

use crate::domain::models::{AdvisorConfig, Strategy, WorkflowRequest, WorkflowStep};
use crate::domain::ports::{JobRepository, ResultRepository, ScanAdvisor};
use crate::services::results::NormalizerRegistry;
use crate::services::workflow_service::WorkflowService;

/// Watches completed jobs and enqueues advisor-suggested follow-ups.
pub struct AutoChainService {
    advisor: Arc<dyn ScanAdvisor>,
    jobs: Arc<dyn JobRepository>,
    results: Arc<dyn ResultRepository>,
    workflow_service: Arc<WorkflowService>,
    registry: NormalizerRegistry,
    config: AdvisorConfig,
}

impl AutoChainService {
    pub fn new(
        advisor: Arc<dyn ScanAdvisor>,
        jobs: Arc<dyn JobRepository>,
        results: Arc<dyn ResultRepository>,
        workflow_service: Arc<WorkflowService>,
        config: AdvisorConfig,
    ) -> Self {
        Self {
            advisor,
            jobs,
            results,
            workflow_service,
            registry: NormalizerRegistry::new(),
            config,
        }
    }

    /// Analyze a completed job and maybe create follow-up workflows, one
    /// per target with actionable suggestions. Never errors: every
    /// failure is logged and swallowed.
    pub async fn on_job_completed(&self, job_id: &str) {
        if !self.config.enabled {
            return;
        }
        if let Err(e) = self.analyze_job(job_id).await {
            tracing::warn!(%job_id, error = %e, "auto-chain analysis failed");
        }
    }

    async fn analyze_job(&self, job_id: &str) -> crate::domain::errors::DomainResult<()> {
        let Some(job) = self.jobs.get(job_id).await? else {
            tracing::warn!(%job_id, "auto-chain: job not found");
            return Ok(());
        };

        // Cap runaway chains per workflow.
        if let Some(workflow_id) = &job.workflow_id {
            let count = self.jobs.count_by_workflow(workflow_id).await?;
            if count >= i64::from(self.config.max_jobs_per_workflow) {
                tracing::warn!(%workflow_id, count, "auto-chain: workflow reached job cap");
                return Ok(());
            }
        }

        let rows = self.results.list_by_job(job_id).await?;
        if rows.is_empty() {
            tracing::debug!(%job_id, "auto-chain: no results to analyze");
            return Ok(());
        }

        for target in &job.targets {
            let findings: Vec<_> = rows
                .iter()
                .filter(|r| &r.target == target)
                .flat_map(|r| self.registry.normalize(&job.tool, r))
                .collect();
            if findings.is_empty() {
                continue;
            }

            let advisory = match self.advisor.analyze(&findings, &job.tool, target).await {
                Ok(advisory) => advisory,
                Err(e) => {
                    tracing::warn!(%target, error = %e, "advisory request failed");
                    continue;
                }
            };
            tracing::info!(%target, summary = %advisory.summary, "advisory received");

            let steps: Vec<WorkflowStep> = advisory
                .suggested_actions
                .iter()
                .filter(|a| a.confidence >= self.config.min_confidence)
                .map(|a| {
                    WorkflowStep::new(a.tool.clone())
                        .with_params(merge_params(default_params(&a.tool), &a.params))
                })
                .collect();
            if steps.is_empty() {
                tracing::debug!(%target, "no suggestions above confidence threshold");
                continue;
            }

            let request = WorkflowRequest {
                targets: vec![target.clone()],
                strategy: Strategy::Wide,
                steps,
                vpn_profile: job.vpn_lease.as_ref().map(|l| l.filename.clone()),
                country: job.vpn_lease.as_ref().and_then(|l| l.country.clone()),
                description: Some(format!("auto follow-up for {} scan", job.tool)),
            };

            match self.workflow_service.create_and_dispatch(&request).await {
                Ok(creation) => {
                    tracing::info!(workflow_id = %creation.workflow_id, %target,
                        steps = creation.total_steps, "created follow-up workflow");
                }
                Err(e) => {
                    tracing::warn!(%target, error = %e, "follow-up workflow creation failed");
                }
            }
        }

        Ok(())
    }
}

/// Sensible per-tool defaults for advisor-launched steps.
fn default_params(tool: &str) -> serde_json::Value {
    match tool {
        "sqlmap-scan" => serde_json::json!({"batch": true, "level": 1, "risk": 1, "smart": true}),
        "wpscan-scan" => serde_json::json!({"enumerate": ["p", "t", "u"], "detection_mode": "mixed"}),
        "dirsearch-scan" => serde_json::json!({
            "extensions": "php,asp,aspx,jsp,html",
            "threads": 10,
            "exclude_status": "404,403"
        }),
        "nuclei-scan" => serde_json::json!({
            "severity": "medium,high,critical",
            "rate_limit": 150,
            "bulk_size": 25
        }),
        "httpx-scan" => serde_json::json!({"status_code": true, "title": true, "tech_detect": false}),
        _ => serde_json::json!({}),
    }
}

/// Overlay advisor-supplied params on the tool defaults.
fn merge_params(mut base: serde_json::Value, overlay: &serde_json::Value) -> serde_json::Value {
    if let (Some(base_map), Some(overlay_map)) = (base.as_object_mut(), overlay.as_object()) {
        for (k, v) in overlay_map {
            base_map.insert(k.clone(), v.clone());
        }
    }
    base
}
