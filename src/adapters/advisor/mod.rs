//! RAG advisory client.
//!
//! Posts a findings summary to the external RAG service and turns the
//! free-text answer into structured follow-up suggestions. Only the
//! request/response contract lives here; the advisory content itself is
//! an external concern.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AdvisorConfig, Finding};
use crate::domain::ports::{Advisory, ScanAdvisor, SuggestedAction};

/// HTTP client for the RAG advisory service.
pub struct RagAdvisorClient {
    config: AdvisorConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct RagQuery {
    query: String,
}

#[derive(Debug, Deserialize)]
struct RagAnswer {
    #[serde(default)]
    answer: String,
}

impl RagAdvisorClient {
    pub fn new(config: AdvisorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }
}

#[async_trait]
impl ScanAdvisor for RagAdvisorClient {
    async fn analyze(
        &self,
        findings: &[Finding],
        tool: &str,
        target: &str,
    ) -> DomainResult<Advisory> {
        let summary = summarize_findings(findings, tool, target);
        let query = build_query(&summary, tool, target);
        let url = format!("{}/rag_query", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .json(&RagQuery { query })
            .send()
            .await
            .map_err(|e| DomainError::ResourceUnavailable(format!("advisor unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(DomainError::ResourceUnavailable(format!(
                "advisor returned {}",
                response.status()
            )));
        }

        let parsed: RagAnswer = response.json().await.map_err(|e| {
            DomainError::ResourceUnavailable(format!("unparseable advisor response: {e}"))
        })?;

        let suggested_actions = parse_suggested_actions(&parsed.answer, tool);
        let confidence = overall_confidence(&parsed.answer, findings.len());

        Ok(Advisory {
            summary,
            analysis: parsed.answer,
            confidence,
            suggested_actions,
        })
    }
}

/// Compress findings into the short text the advisory prompt embeds.
fn summarize_findings(findings: &[Finding], tool: &str, target: &str) -> String {
    if findings.is_empty() {
        return format!("No findings from {tool} scan of {target}");
    }
    let mut parts = Vec::new();
    for finding in findings.iter().take(15) {
        match finding {
            Finding::Port { port, protocol, service, .. } => {
                let service = service.as_deref().unwrap_or("unknown");
                parts.push(format!("port {port}/{protocol} ({service})"));
            }
            Finding::Endpoint { url, status, .. } => parts.push(format!("{url} [{status}]")),
            Finding::Vulnerability { name, severity, .. } => {
                parts.push(format!("{name} ({severity})"));
            }
            Finding::Raw { .. } => {}
        }
    }
    let suffix = if findings.len() > 15 { ", ..." } else { "" };
    format!(
        "{} findings from {tool} scan of {target}: {}{suffix}",
        findings.len(),
        parts.join(", ")
    )
}

fn build_query(summary: &str, tool: &str, target: &str) -> String {
    format!(
        "I am running a security assessment of {target} and just finished a {tool} scan.\n\
         Results: {summary}\n\
         Based on the OWASP Web Security Testing Guide, which of the following tools should run \
         next, and why: nuclei-scan, httpx-scan, dirsearch-scan, sqlmap-scan, wpscan-scan?"
    )
}

/// Follow-up candidates and the chain bonus they get after a given tool.
const CHAIN_BONUS: &[(&str, &str, f64)] = &[
    ("port-scan", "httpx-scan", 0.4),
    ("port-scan", "nuclei-scan", 0.3),
    ("httpx-scan", "nuclei-scan", 0.4),
    ("httpx-scan", "dirsearch-scan", 0.3),
    ("httpx-scan", "sqlmap-scan", 0.2),
    ("nuclei-scan", "sqlmap-scan", 0.3),
    ("nuclei-scan", "dirsearch-scan", 0.2),
    ("dirsearch-scan", "nuclei-scan", 0.3),
];

const CANDIDATE_TOOLS: &[&str] = &[
    "nuclei-scan",
    "httpx-scan",
    "dirsearch-scan",
    "sqlmap-scan",
    "wpscan-scan",
];

/// Score each candidate tool against the answer text. A tool is suggested
/// when its combined mention + chain score clears 0.3.
fn parse_suggested_actions(answer: &str, current_tool: &str) -> Vec<SuggestedAction> {
    let lower = answer.to_lowercase();
    let mut suggestions = Vec::new();

    for candidate in CANDIDATE_TOOLS {
        if *candidate == current_tool {
            continue;
        }
        let mut confidence = 0.0;
        let short_name = candidate.trim_end_matches("-scan");
        if lower.contains(candidate) || lower.contains(short_name) {
            confidence += 0.2;
        }
        for (from, to, bonus) in CHAIN_BONUS {
            if *from == current_tool && to == candidate {
                confidence += bonus;
            }
        }
        if *candidate == "wpscan-scan" && (lower.contains("wordpress") || lower.contains("wp-")) {
            confidence += 0.4;
        }

        if confidence >= 0.3 {
            suggestions.push(SuggestedAction {
                tool: (*candidate).to_string(),
                confidence: confidence.min(1.0),
                params: serde_json::json!({}),
            });
        }
    }

    suggestions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    suggestions
}

fn overall_confidence(answer: &str, finding_count: usize) -> f64 {
    let mut confidence: f64 = 0.5;
    let lower = answer.to_lowercase();
    if CANDIDATE_TOOLS
        .iter()
        .any(|t| lower.contains(t.trim_end_matches("-scan")))
    {
        confidence += 0.1;
    }
    confidence += (finding_count as f64 * 0.02).min(0.2);
    confidence.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_bonus_suggests_httpx_after_port_scan() {
        let actions = parse_suggested_actions("open web ports found", "port-scan");
        assert!(actions.iter().any(|a| a.tool == "httpx-scan"));
        // Never suggests the tool that just ran
        assert!(actions.iter().all(|a| a.tool != "port-scan"));
    }

    #[test]
    fn test_mention_alone_is_below_threshold() {
        // sqlmap is mentioned after a port scan: 0.2 mention, no chain bonus
        let actions = parse_suggested_actions("maybe try sqlmap", "port-scan");
        assert!(actions.iter().all(|a| a.tool != "sqlmap-scan"));
    }

    #[test]
    fn test_wordpress_mention_boosts_wpscan() {
        let actions = parse_suggested_actions("this is a WordPress site", "httpx-scan");
        let wpscan = actions.iter().find(|a| a.tool == "wpscan-scan").unwrap();
        assert!(wpscan.confidence >= 0.4);
    }

    #[test]
    fn test_suggestions_sorted_by_confidence() {
        let actions =
            parse_suggested_actions("run nuclei and dirsearch against it", "httpx-scan");
        for window in actions.windows(2) {
            assert!(window[0].confidence >= window[1].confidence);
        }
    }

    #[test]
    fn test_summarize_findings_truncates() {
        let findings: Vec<Finding> = (1..=20)
            .map(|p| Finding::Port {
                host: "h".into(),
                port: p,
                protocol: "tcp".into(),
                service: None,
            })
            .collect();
        let summary = summarize_findings(&findings, "port-scan", "a.example");
        assert!(summary.starts_with("20 findings"));
        assert!(summary.ends_with(", ..."));
    }

    #[tokio::test]
    async fn test_analyze_round_trip() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rag_query")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"answer": "Probe the web services with httpx next."}"#)
            .create_async()
            .await;

        let client = RagAdvisorClient::new(AdvisorConfig {
            enabled: true,
            base_url: server.url(),
            timeout_secs: 5,
            min_confidence: 0.5,
            max_jobs_per_workflow: 20,
        });

        let findings = vec![Finding::Port {
            host: "a.example".into(),
            port: 80,
            protocol: "tcp".into(),
            service: Some("http".into()),
        }];
        let advisory = client.analyze(&findings, "port-scan", "a.example").await.unwrap();
        assert!(advisory.suggested_actions.iter().any(|a| a.tool == "httpx-scan"));
        assert!(advisory.confidence > 0.5);
    }
}
