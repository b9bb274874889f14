mod helpers;

use std::sync::Arc;

use scanforge::adapters::sqlite::{
    SqliteJobRepository, SqliteResultRepository, SqliteWorkflowRepository,
};
use scanforge::domain::models::{
    Finding, ScanJob, ScanResult, ScanResultPayload, Strategy, Workflow, WorkflowRequest,
};
use scanforge::domain::ports::{JobRepository, ResultRepository, WorkflowRepository};
use scanforge::services::results::ResultQueryService;
use serde_json::json;

use helpers::database::setup_test_db;

struct QueryFixture {
    workflows: Arc<dyn WorkflowRepository>,
    jobs: Arc<dyn JobRepository>,
    results: Arc<dyn ResultRepository>,
    query: ResultQueryService,
}

async fn fixture() -> QueryFixture {
    let pool = setup_test_db().await;
    let workflows: Arc<dyn WorkflowRepository> =
        Arc::new(SqliteWorkflowRepository::new(pool.clone()));
    let jobs: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(pool.clone()));
    let results: Arc<dyn ResultRepository> = Arc::new(SqliteResultRepository::new(pool));
    let query = ResultQueryService::new(workflows.clone(), jobs.clone(), results.clone());
    QueryFixture {
        workflows,
        jobs,
        results,
        query,
    }
}

async fn seed_workflow(fx: &QueryFixture, targets: Vec<String>) -> Workflow {
    let req = WorkflowRequest {
        targets,
        strategy: Strategy::Wide,
        steps: vec![],
        vpn_profile: None,
        country: None,
        description: None,
    };
    let workflow = Workflow::from_request(&req);
    fx.workflows.create(&workflow).await.unwrap();
    workflow
}

async fn seed_result(
    fx: &QueryFixture,
    job_id: &str,
    workflow_id: &str,
    target: &str,
    open_ports: serde_json::Value,
    extra_metadata: serde_json::Value,
) {
    let mut metadata = extra_metadata;
    metadata["job_id"] = json!(job_id);
    let payload = ScanResultPayload {
        target: target.into(),
        resolved_ips: vec!["10.0.0.1".into()],
        open_ports,
        scan_metadata: metadata,
        workflow_id: Some(workflow_id.into()),
    };
    fx.results.create(&ScanResult::from_payload(&payload)).await.unwrap();
}

#[tokio::test]
async fn test_shard_siblings_are_merged_and_deduplicated() {
    let fx = fixture().await;
    let workflow = seed_workflow(&fx, vec!["a.example".into()]).await;

    // Two port-scan shards of the same logical step.
    let shard1 = ScanJob::new("port-scan", vec!["a.example".into()])
        .with_workflow(workflow.workflow_id.clone(), 1);
    let shard2 = ScanJob::new("port-scan", vec!["a.example".into()])
        .with_workflow(workflow.workflow_id.clone(), 1);
    fx.jobs.create(&shard1).await.unwrap();
    fx.jobs.create(&shard2).await.unwrap();

    // Port 80 appears in both shards; the merged view keeps it once.
    seed_result(
        &fx,
        &shard1.job_id,
        &workflow.workflow_id,
        "a.example",
        json!([{"port": 22, "protocol": "tcp"}, {"port": 80, "protocol": "tcp"}]),
        json!({}),
    )
    .await;
    seed_result(
        &fx,
        &shard2.job_id,
        &workflow.workflow_id,
        "a.example",
        json!([{"port": 80, "protocol": "tcp"}, {"port": 443, "protocol": "tcp"}]),
        json!({}),
    )
    .await;

    let merged = fx.query.sub_job_results(&shard1.job_id).await.unwrap();
    assert_eq!(merged.shard_count, 2);
    assert_eq!(merged.findings.len(), 3);

    // Querying through either sibling gives the same set.
    let via_other = fx.query.sub_job_results(&shard2.job_id).await.unwrap();
    assert_eq!(via_other.findings.len(), 3);
}

#[tokio::test]
async fn test_merged_size_equals_sum_when_disjoint() {
    let fx = fixture().await;
    let workflow = seed_workflow(&fx, vec!["a.example".into()]).await;

    let shard1 = ScanJob::new("port-scan", vec!["a.example".into()])
        .with_workflow(workflow.workflow_id.clone(), 1);
    let shard2 = ScanJob::new("port-scan", vec!["a.example".into()])
        .with_workflow(workflow.workflow_id.clone(), 1);
    fx.jobs.create(&shard1).await.unwrap();
    fx.jobs.create(&shard2).await.unwrap();

    seed_result(
        &fx,
        &shard1.job_id,
        &workflow.workflow_id,
        "a.example",
        json!([{"port": 22, "protocol": "tcp"}]),
        json!({}),
    )
    .await;
    seed_result(
        &fx,
        &shard2.job_id,
        &workflow.workflow_id,
        "a.example",
        json!([{"port": 443, "protocol": "tcp"}]),
        json!({}),
    )
    .await;

    let merged = fx.query.sub_job_results(&shard1.job_id).await.unwrap();
    assert_eq!(merged.findings.len(), 2);
}

#[tokio::test]
async fn test_standalone_job_results_are_not_merged_with_anyone() {
    let fx = fixture().await;

    let job = ScanJob::new("port-scan", vec!["solo.example".into()]);
    fx.jobs.create(&job).await.unwrap();

    let payload = ScanResultPayload {
        target: "solo.example".into(),
        resolved_ips: vec![],
        open_ports: json!([{"port": 8080, "protocol": "tcp"}]),
        scan_metadata: json!({"job_id": job.job_id}),
        workflow_id: None,
    };
    fx.results.create(&ScanResult::from_payload(&payload)).await.unwrap();

    let merged = fx.query.sub_job_results(&job.job_id).await.unwrap();
    assert_eq!(merged.shard_count, 1);
    assert_eq!(merged.findings.len(), 1);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let fx = fixture().await;
    let err = fx.query.sub_job_results("scan-ghost-000000").await.unwrap_err();
    assert!(matches!(err, scanforge::DomainError::JobNotFound(_)));
}

#[tokio::test]
async fn test_workflow_summary_rolls_up_per_target() {
    let fx = fixture().await;
    let workflow = seed_workflow(&fx, vec!["a.example".into(), "b.example".into()]).await;

    let port_job = ScanJob::new("port-scan", vec!["a.example".into(), "b.example".into()])
        .with_workflow(workflow.workflow_id.clone(), 1);
    let httpx_job = ScanJob::new("httpx-scan", vec!["a.example".into(), "b.example".into()])
        .with_workflow(workflow.workflow_id.clone(), 2);
    let nuclei_job = ScanJob::new("nuclei-scan", vec!["a.example".into()])
        .with_workflow(workflow.workflow_id.clone(), 3);
    for job in [&port_job, &httpx_job, &nuclei_job] {
        fx.jobs.create(job).await.unwrap();
    }

    seed_result(
        &fx,
        &port_job.job_id,
        &workflow.workflow_id,
        "a.example",
        json!([{"port": 80, "protocol": "tcp", "service": "http"}]),
        json!({}),
    )
    .await;
    seed_result(
        &fx,
        &httpx_job.job_id,
        &workflow.workflow_id,
        "a.example",
        json!([]),
        json!({"httpx_results": [{"url": "http://a.example", "status_code": 200, "webserver": "nginx"}]}),
    )
    .await;
    seed_result(
        &fx,
        &nuclei_job.job_id,
        &workflow.workflow_id,
        "a.example",
        json!([]),
        json!({"nuclei_results": [{"name": "CVE-2024-0001", "severity": "high", "host": "a.example"}]}),
    )
    .await;
    seed_result(
        &fx,
        &port_job.job_id,
        &workflow.workflow_id,
        "b.example",
        json!([{"port": 22, "protocol": "tcp", "service": "ssh"}]),
        json!({}),
    )
    .await;

    let summary = fx.query.workflow_summary(&workflow.workflow_id).await.unwrap();
    assert_eq!(summary.len(), 2);

    let a = summary.iter().find(|s| s.target == "a.example").unwrap();
    assert_eq!(a.open_ports.len(), 1);
    assert_eq!(a.web_technologies, vec!["nginx"]);
    assert_eq!(a.vulnerabilities.len(), 1);
    assert!(matches!(
        &a.vulnerabilities[0],
        Finding::Vulnerability { name, .. } if name == "CVE-2024-0001"
    ));
    assert_eq!(a.dns_records, vec!["10.0.0.1"]);

    let b = summary.iter().find(|s| s.target == "b.example").unwrap();
    assert_eq!(b.open_ports.len(), 1);
    assert!(b.vulnerabilities.is_empty());
}
