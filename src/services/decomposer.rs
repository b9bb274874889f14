//! Workflow decomposition: one request in, an ordered batch of scan jobs out.
//!
//! Strategy picks the fan-out shape (wide: one job per step; deep: one job
//! per target x step). A step that requests `scanner_count > 1` for a tool
//! with a known shard axis is replaced by its shards, each carrying one
//! planner partition and one round-robin lease; shards share a step_order.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ScanJob, Strategy, VpnProfile, Workflow, WorkflowRequest, WorkflowStep};
use crate::services::shard_planner;
use crate::services::vpn_pool::VpnPoolService;

/// Tools the scanner nodes know how to run. Requests naming anything else
/// are rejected before any persistence happens.
pub const KNOWN_TOOLS: &[&str] = &[
    "port-scan",
    "dns-lookup",
    "httpx-scan",
    "nuclei-scan",
    "dirsearch-scan",
    "sqlmap-scan",
    "wpscan-scan",
    "bruteforce",
    "ffuf-entry",
];

/// Which workload dimension a tool can be sharded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardAxis {
    /// Balanced chunks of an explicit port list.
    Ports,
    /// Balanced line ranges over a wordlist file.
    WordlistLines,
    /// One shard per (template, severity) pair.
    TemplateMatrix,
}

/// Shard axis for a tool, if it supports sharding at all.
pub fn shard_axis(tool: &str) -> Option<ShardAxis> {
    match tool {
        "port-scan" => Some(ShardAxis::Ports),
        "dirsearch-scan" | "bruteforce" | "ffuf-entry" => Some(ShardAxis::WordlistLines),
        "nuclei-scan" => Some(ShardAxis::TemplateMatrix),
        _ => None,
    }
}

/// Turns one workflow request into its dispatchable sub-jobs.
pub struct WorkflowDecomposer;

impl WorkflowDecomposer {
    /// Reject malformed requests before anything is persisted.
    pub fn validate(req: &WorkflowRequest) -> DomainResult<()> {
        if req.targets.is_empty() {
            return Err(DomainError::Validation("targets must not be empty".into()));
        }
        if req.steps.is_empty() {
            return Err(DomainError::Validation("steps must not be empty".into()));
        }
        for step in &req.steps {
            if !KNOWN_TOOLS.contains(&step.tool_id.as_str()) {
                return Err(DomainError::Validation(format!(
                    "unknown tool id: {}",
                    step.tool_id
                )));
            }
        }
        Ok(())
    }

    /// Decompose a validated request into scan jobs.
    ///
    /// `shard_pool` is the catalog snapshot used for round-robin lease
    /// assignment on sharded steps; when empty, shards inherit the
    /// workflow's shared lease like everything else.
    pub fn decompose(
        workflow: &Workflow,
        req: &WorkflowRequest,
        shard_pool: &[VpnProfile],
    ) -> Vec<ScanJob> {
        let mut jobs = Vec::new();
        let mut step_order = 0u32;

        match req.strategy {
            Strategy::Wide => {
                for step in &req.steps {
                    step_order += 1;
                    Self::emit_step(
                        &mut jobs,
                        workflow,
                        step,
                        workflow.targets.clone(),
                        step_order,
                        shard_pool,
                    );
                }
            }
            Strategy::Deep => {
                for target in &workflow.targets {
                    for step in &req.steps {
                        step_order += 1;
                        Self::emit_step(
                            &mut jobs,
                            workflow,
                            step,
                            vec![target.clone()],
                            step_order,
                            shard_pool,
                        );
                    }
                }
            }
        }

        jobs
    }

    /// Emit one logical step: either a single job or its shards.
    fn emit_step(
        jobs: &mut Vec<ScanJob>,
        workflow: &Workflow,
        step: &WorkflowStep,
        targets: Vec<String>,
        step_order: u32,
        shard_pool: &[VpnProfile],
    ) {
        let scanner_count = step.scanner_count();
        let sharded = scanner_count > 1;

        if sharded {
            if let Some(axis) = shard_axis(&step.tool_id) {
                let shard_options = Self::plan_shards(axis, &step.params, scanner_count);
                if shard_options.len() > 1 {
                    let leases = VpnPoolService::round_robin(shard_pool, shard_options.len());
                    for (i, options) in shard_options.into_iter().enumerate() {
                        let lease = leases
                            .get(i)
                            .cloned()
                            .or_else(|| workflow.vpn_lease.clone());
                        jobs.push(
                            ScanJob::new(step.tool_id.clone(), targets.clone())
                                .with_workflow(workflow.workflow_id.clone(), step_order)
                                .with_options(options)
                                .with_lease(lease),
                        );
                    }
                    return;
                }
            }
        }

        jobs.push(
            ScanJob::new(step.tool_id.clone(), targets)
                .with_workflow(workflow.workflow_id.clone(), step_order)
                .with_options(step.params.clone())
                .with_lease(workflow.vpn_lease.clone()),
        );
    }

    /// Per-shard option sets for one step. Returns a single element when
    /// the parameters don't actually support sharding (no port list, no
    /// wordlist size), so the caller falls back to one job.
    fn plan_shards(
        axis: ShardAxis,
        params: &serde_json::Value,
        scanner_count: usize,
    ) -> Vec<serde_json::Value> {
        match axis {
            ShardAxis::Ports => {
                let Some(spec) = params.get("ports").and_then(|v| v.as_str()) else {
                    return vec![Self::strip_shard_keys(params)];
                };
                let ports = shard_planner::parse_port_spec(spec);
                if ports.is_empty() {
                    return vec![Self::strip_shard_keys(params)];
                }
                shard_planner::split_ports(&ports, scanner_count)
                    .into_iter()
                    .map(|chunk| {
                        let mut options = Self::strip_shard_keys(params);
                        options["ports"] =
                            serde_json::Value::String(shard_planner::render_port_spec(&chunk));
                        options
                    })
                    .collect()
            }
            ShardAxis::WordlistLines => {
                let Some(total) = params
                    .get("wordlist_lines")
                    .and_then(serde_json::Value::as_u64)
                else {
                    return vec![Self::strip_shard_keys(params)];
                };
                let total = usize::try_from(total).unwrap_or(0);
                shard_planner::split_line_range(total, scanner_count)
                    .into_iter()
                    .map(|(start, end)| {
                        let mut options = Self::strip_shard_keys(params);
                        options["line_start"] = serde_json::json!(start);
                        options["line_end"] = serde_json::json!(end);
                        options
                    })
                    .collect()
            }
            ShardAxis::TemplateMatrix => {
                let templates = Self::string_array(params, "templates");
                let severities = Self::string_array(params, "severities");
                if templates.is_empty() || severities.is_empty() {
                    return vec![Self::strip_shard_keys(params)];
                }
                shard_planner::cross_product(&templates, &severities)
                    .into_iter()
                    .map(|(template, severity)| {
                        let mut options = Self::strip_shard_keys(params);
                        options["templates"] = serde_json::json!([template]);
                        options["severity"] = serde_json::Value::String(severity);
                        options
                    })
                    .collect()
            }
        }
    }

    /// Copy params minus the decomposition-only keys the tool never sees.
    fn strip_shard_keys(params: &serde_json::Value) -> serde_json::Value {
        let mut options = params.clone();
        if let Some(map) = options.as_object_mut() {
            map.remove("scanner_count");
            map.remove("severities");
        }
        options
    }

    fn string_array(params: &serde_json::Value, key: &str) -> Vec<String> {
        params
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
