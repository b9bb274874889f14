//! Result normalization, shard merging, and query views.
//!
//! Each tool has exactly one normalizer mapping its raw payload to stable
//! finding shapes. Normalizers live in a closed registry keyed by tool
//! id; an unknown tool falls back to raw passthrough rather than erroring.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Finding, ScanResult};
use crate::domain::ports::{JobRepository, ResultFilters, ResultRepository, WorkflowRepository};

/// Maps one tool's raw result payload to normalized findings.
pub trait ResultNormalizer: Send + Sync {
    fn tool_id(&self) -> &'static str;
    fn normalize(&self, result: &ScanResult) -> Vec<Finding>;
}

/// Port scanners report `open_ports` entries per target.
struct PortScanNormalizer;

impl ResultNormalizer for PortScanNormalizer {
    fn tool_id(&self) -> &'static str {
        "port-scan"
    }

    fn normalize(&self, result: &ScanResult) -> Vec<Finding> {
        let Some(entries) = result.open_ports.as_array() else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| {
                let port = entry.get("port")?.as_u64()?;
                Some(Finding::Port {
                    host: result.target.clone(),
                    port: u16::try_from(port).ok()?,
                    protocol: entry
                        .get("protocol")
                        .and_then(|v| v.as_str())
                        .unwrap_or("tcp")
                        .to_string(),
                    service: entry
                        .get("service")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                })
            })
            .collect()
    }
}

/// Web probers report endpoint lists under `httpx_results`.
struct HttpxNormalizer;

impl ResultNormalizer for HttpxNormalizer {
    fn tool_id(&self) -> &'static str {
        "httpx-scan"
    }

    fn normalize(&self, result: &ScanResult) -> Vec<Finding> {
        endpoints_from(&result.metadata, "httpx_results")
    }
}

/// Directory brute-forcers report discovered paths under `dirsearch_results`.
struct DirsearchNormalizer;

impl ResultNormalizer for DirsearchNormalizer {
    fn tool_id(&self) -> &'static str {
        "dirsearch-scan"
    }

    fn normalize(&self, result: &ScanResult) -> Vec<Finding> {
        endpoints_from(&result.metadata, "dirsearch_results")
    }
}

/// Template scanners report findings under `nuclei_results`; older
/// payloads nest name/severity under `info`.
struct NucleiNormalizer;

impl ResultNormalizer for NucleiNormalizer {
    fn tool_id(&self) -> &'static str {
        "nuclei-scan"
    }

    fn normalize(&self, result: &ScanResult) -> Vec<Finding> {
        let Some(entries) = result.metadata.get("nuclei_results").and_then(|v| v.as_array())
        else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| {
                let info = entry.get("info");
                let name = entry
                    .get("name")
                    .or_else(|| info?.get("name"))
                    .and_then(|v| v.as_str())?;
                let severity = entry
                    .get("severity")
                    .or_else(|| info?.get("severity"))
                    .and_then(|v| v.as_str())?;
                Some(Finding::Vulnerability {
                    name: name.to_string(),
                    severity: severity.to_string(),
                    host: entry
                        .get("host")
                        .and_then(|v| v.as_str())
                        .unwrap_or(&result.target)
                        .to_string(),
                    evidence: entry
                        .get("matched_at")
                        .or_else(|| entry.get("evidence"))
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                })
            })
            .collect()
    }
}

fn endpoints_from(metadata: &serde_json::Value, key: &str) -> Vec<Finding> {
    let Some(entries) = metadata.get(key).and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let url = entry.get("url").and_then(|v| v.as_str())?;
            let status = entry
                .get("status_code")
                .or_else(|| entry.get("status"))
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0);
            Some(Finding::Endpoint {
                url: url.to_string(),
                status: u16::try_from(status).unwrap_or(0),
                webserver: entry
                    .get("webserver")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            })
        })
        .collect()
}

/// Closed registry of tool normalizers.
pub struct NormalizerRegistry {
    normalizers: HashMap<&'static str, Box<dyn ResultNormalizer>>,
}

impl Default for NormalizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NormalizerRegistry {
    pub fn new() -> Self {
        let mut normalizers: HashMap<&'static str, Box<dyn ResultNormalizer>> = HashMap::new();
        for normalizer in [
            Box::new(PortScanNormalizer) as Box<dyn ResultNormalizer>,
            Box::new(HttpxNormalizer),
            Box::new(DirsearchNormalizer),
            Box::new(NucleiNormalizer),
        ] {
            normalizers.insert(normalizer.tool_id(), normalizer);
        }
        Self { normalizers }
    }

    /// Normalize one result row for a given tool. Unknown tools pass the
    /// raw metadata through unchanged — a fallback, not an error.
    pub fn normalize(&self, tool: &str, result: &ScanResult) -> Vec<Finding> {
        match self.normalizers.get(tool) {
            Some(normalizer) => normalizer.normalize(result),
            None => vec![Finding::Raw {
                data: result.metadata.clone(),
            }],
        }
    }
}

/// Union shard siblings' findings, deduplicating by identity key.
///
/// Idempotent and commutative over the resulting set: merged size is at
/// most the sum of shard sizes, with equality iff no key repeats.
pub fn merge_findings(shards: Vec<Vec<Finding>>) -> Vec<Finding> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for shard in shards {
        for finding in shard {
            if seen.insert(finding.identity_key()) {
                merged.push(finding);
            }
        }
    }
    merged
}

/// Merged, normalized view over one sub-job (and its shard siblings).
#[derive(Debug, Serialize)]
pub struct SubJobResults {
    pub job_id: String,
    pub tool: String,
    /// Sub-jobs contributing to this view; 1 unless the step was sharded.
    pub shard_count: usize,
    pub findings: Vec<Finding>,
}

/// Per-target roll-up over a whole workflow.
#[derive(Debug, Default, Serialize)]
pub struct TargetSummary {
    pub target: String,
    pub dns_records: Vec<String>,
    pub open_ports: Vec<Finding>,
    pub web_technologies: Vec<String>,
    pub vulnerabilities: Vec<Finding>,
}

/// Query-side service over the append-only result store.
pub struct ResultQueryService {
    workflows: Arc<dyn WorkflowRepository>,
    jobs: Arc<dyn JobRepository>,
    results: Arc<dyn ResultRepository>,
    registry: NormalizerRegistry,
}

impl ResultQueryService {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        jobs: Arc<dyn JobRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            workflows,
            jobs,
            results,
            registry: NormalizerRegistry::new(),
        }
    }

    pub fn registry(&self) -> &NormalizerRegistry {
        &self.registry
    }

    /// Paginated raw results with optional workflow/job filters.
    pub async fn paginated(
        &self,
        filters: ResultFilters,
        page: u32,
        page_size: u32,
    ) -> DomainResult<(Vec<ScanResult>, i64)> {
        let total = self.results.count(filters.clone()).await?;
        let rows = self.results.list(filters, page, page_size).await?;
        Ok((rows, total))
    }

    /// Normalized findings for one sub-job, unioned across its shard
    /// siblings (same workflow and step_order) and deduplicated.
    pub async fn sub_job_results(&self, job_id: &str) -> DomainResult<SubJobResults> {
        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or_else(|| DomainError::JobNotFound(job_id.to_string()))?;

        let siblings = match &job.workflow_id {
            Some(workflow_id) => {
                let all = self.jobs.list_by_workflow(workflow_id).await?;
                all.into_iter()
                    .filter(|j| j.step_order == job.step_order && j.tool == job.tool)
                    .collect()
            }
            None => vec![job.clone()],
        };

        let mut shards = Vec::with_capacity(siblings.len());
        for sibling in &siblings {
            let rows = self.results.list_by_job(&sibling.job_id).await?;
            let findings = rows
                .iter()
                .flat_map(|row| self.registry.normalize(&sibling.tool, row))
                .collect();
            shards.push(findings);
        }

        Ok(SubJobResults {
            job_id: job.job_id,
            tool: job.tool,
            shard_count: siblings.len(),
            findings: merge_findings(shards),
        })
    }

    /// Per-target summary over every result in a workflow.
    pub async fn workflow_summary(&self, workflow_id: &str) -> DomainResult<Vec<TargetSummary>> {
        let _ = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or_else(|| DomainError::WorkflowNotFound(workflow_id.to_string()))?;

        let sub_jobs = self.jobs.list_by_workflow(workflow_id).await?;
        let tool_by_job: HashMap<&str, &str> = sub_jobs
            .iter()
            .map(|j| (j.job_id.as_str(), j.tool.as_str()))
            .collect();

        let rows = self.results.list_by_workflow(workflow_id).await?;
        let mut summaries: HashMap<String, TargetSummary> = HashMap::new();

        for row in &rows {
            let summary = summaries
                .entry(row.target.clone())
                .or_insert_with(|| TargetSummary {
                    target: row.target.clone(),
                    ..TargetSummary::default()
                });

            for ip in &row.resolved_ips {
                if !summary.dns_records.contains(ip) {
                    summary.dns_records.push(ip.clone());
                }
            }

            let Some(tool) = row.job_id.as_deref().and_then(|id| tool_by_job.get(id)) else {
                continue;
            };
            for finding in self.registry.normalize(tool, row) {
                match &finding {
                    Finding::Port { .. } => summary.open_ports.push(finding),
                    Finding::Endpoint { webserver, .. } => {
                        if let Some(ws) = webserver {
                            if !summary.web_technologies.contains(ws) {
                                summary.web_technologies.push(ws.clone());
                            }
                        }
                    }
                    Finding::Vulnerability { .. } => summary.vulnerabilities.push(finding),
                    Finding::Raw { .. } => {}
                }
            }
        }

        for summary in summaries.values_mut() {
            summary.open_ports = merge_findings(vec![std::mem::take(&mut summary.open_ports)]);
            summary.vulnerabilities =
                merge_findings(vec![std::mem::take(&mut summary.vulnerabilities)]);
        }

        let mut out: Vec<TargetSummary> = summaries.into_values().collect();
        out.sort_by(|a, b| a.target.cmp(&b.target));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn result_row(target: &str, open_ports: serde_json::Value, metadata: serde_json::Value) -> ScanResult {
        ScanResult {
            id: 0,
            target: target.into(),
            resolved_ips: vec![],
            open_ports,
            metadata,
            job_id: None,
            workflow_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_port_scan_normalization() {
        let registry = NormalizerRegistry::new();
        let row = result_row(
            "a.example",
            json!([
                {"port": 22, "protocol": "tcp", "service": "ssh"},
                {"port": 80, "protocol": "tcp"}
            ]),
            json!({}),
        );
        let findings = registry.normalize("port-scan", &row);
        assert_eq!(findings.len(), 2);
        assert_eq!(
            findings[0],
            Finding::Port {
                host: "a.example".into(),
                port: 22,
                protocol: "tcp".into(),
                service: Some("ssh".into()),
            }
        );
    }

    #[test]
    fn test_nuclei_normalization_handles_nested_info() {
        let registry = NormalizerRegistry::new();
        let row = result_row(
            "a.example",
            json!([]),
            json!({"nuclei_results": [
                {"name": "CVE-2024-0001", "severity": "high", "host": "a.example"},
                {"info": {"name": "exposed-panel", "severity": "medium"}}
            ]}),
        );
        let findings = registry.normalize("nuclei-scan", &row);
        assert_eq!(findings.len(), 2);
        assert!(matches!(
            &findings[1],
            Finding::Vulnerability { name, severity, host, .. }
                if name == "exposed-panel" && severity == "medium" && host == "a.example"
        ));
    }

    #[test]
    fn test_unknown_tool_passes_raw_through() {
        let registry = NormalizerRegistry::new();
        let metadata = json!({"weird": true});
        let row = result_row("a.example", json!([]), metadata.clone());
        let findings = registry.normalize("mystery-tool", &row);
        assert_eq!(findings, vec![Finding::Raw { data: metadata }]);
    }

    #[test]
    fn test_merge_dedups_across_shards() {
        let port = |p: u16| Finding::Port {
            host: "h".into(),
            port: p,
            protocol: "tcp".into(),
            service: None,
        };
        let merged = merge_findings(vec![
            vec![port(22), port(80)],
            vec![port(80), port(443)],
        ]);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_size_equals_sum_when_keys_distinct() {
        let port = |p: u16| Finding::Port {
            host: "h".into(),
            port: p,
            protocol: "tcp".into(),
            service: None,
        };
        let shards = vec![vec![port(1), port(2)], vec![port(3)]];
        let sum: usize = shards.iter().map(Vec::len).sum();
        assert_eq!(merge_findings(shards).len(), sum);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let endpoint = Finding::Endpoint {
            url: "http://a/x".into(),
            status: 200,
            webserver: None,
        };
        let once = merge_findings(vec![vec![endpoint.clone()]]);
        let twice = merge_findings(vec![once.clone(), vec![endpoint]]);
        assert_eq!(once, twice);
    }
}
