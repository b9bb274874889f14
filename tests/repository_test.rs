mod helpers;

use scanforge::adapters::sqlite::{
    SqliteJobRepository, SqliteResultRepository, SqliteVpnRepository, SqliteWorkflowRepository,
};
use scanforge::domain::models::{
    JobStatus, ScanJob, ScanResult, ScanResultPayload, Strategy, VpnProfile, Workflow,
    WorkflowRequest, WorkflowStatus,
};
use scanforge::domain::ports::{
    JobRepository, ResultFilters, ResultRepository, VpnProfileRepository, WorkflowRepository,
};
use serde_json::json;

use helpers::database::{setup_test_db, teardown_test_db};

fn sample_workflow() -> Workflow {
    let req = WorkflowRequest {
        targets: vec!["a.example".into(), "b.example".into()],
        strategy: Strategy::Wide,
        steps: vec![],
        vpn_profile: None,
        country: Some("JP".into()),
        description: None,
    };
    Workflow::from_request(&req)
}

#[tokio::test]
async fn test_workflow_round_trip() {
    let pool = setup_test_db().await;
    let repo = SqliteWorkflowRepository::new(pool.clone());

    let mut workflow = sample_workflow();
    workflow.total_steps = 3;
    repo.create(&workflow).await.expect("create failed");

    let loaded = repo
        .get(&workflow.workflow_id)
        .await
        .expect("get failed")
        .expect("workflow missing");
    assert_eq!(loaded.targets, workflow.targets);
    assert_eq!(loaded.strategy, Strategy::Wide);
    assert_eq!(loaded.status, WorkflowStatus::Pending);
    assert_eq!(loaded.total_steps, 3);
    assert_eq!(loaded.vpn_country.as_deref(), Some("JP"));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_workflow_update_and_counts() {
    let pool = setup_test_db().await;
    let repo = SqliteWorkflowRepository::new(pool.clone());

    let mut workflow = sample_workflow();
    repo.create(&workflow).await.unwrap();

    workflow.status = WorkflowStatus::Running;
    workflow.completed_steps = 1;
    repo.update(&workflow).await.unwrap();

    let loaded = repo.get(&workflow.workflow_id).await.unwrap().unwrap();
    assert_eq!(loaded.status, WorkflowStatus::Running);
    assert_eq!(loaded.completed_steps, 1);

    assert_eq!(repo.count().await.unwrap(), 1);
    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_workflow_update_unknown_id_errors() {
    let pool = setup_test_db().await;
    let repo = SqliteWorkflowRepository::new(pool.clone());

    let workflow = sample_workflow();
    let err = repo.update(&workflow).await.unwrap_err();
    assert!(matches!(
        err,
        scanforge::DomainError::WorkflowNotFound(_)
    ));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_workflow_list_pagination() {
    let pool = setup_test_db().await;
    let repo = SqliteWorkflowRepository::new(pool.clone());

    for _ in 0..5 {
        repo.create(&sample_workflow()).await.unwrap();
    }

    let page1 = repo.list(1, 2).await.unwrap();
    let page3 = repo.list(3, 2).await.unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page3.len(), 1);
    assert_eq!(repo.count().await.unwrap(), 5);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_job_round_trip_and_workflow_listing() {
    let pool = setup_test_db().await;
    let repo = SqliteJobRepository::new(pool.clone());

    let job = ScanJob::new("port-scan", vec!["a.example".into()])
        .with_workflow("workflow-12345678", 1)
        .with_options(json!({"ports": "1-1000"}));
    repo.create(&job).await.unwrap();

    let loaded = repo.get(&job.job_id).await.unwrap().unwrap();
    assert_eq!(loaded.tool, "port-scan");
    assert_eq!(loaded.status, JobStatus::Submitted);
    assert_eq!(loaded.options["ports"], "1-1000");
    assert_eq!(loaded.step_order, 1);

    let by_workflow = repo.list_by_workflow("workflow-12345678").await.unwrap();
    assert_eq!(by_workflow.len(), 1);
    assert_eq!(repo.count_by_workflow("workflow-12345678").await.unwrap(), 1);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_job_status_persists_through_update() {
    let pool = setup_test_db().await;
    let repo = SqliteJobRepository::new(pool.clone());

    let mut job = ScanJob::new("httpx-scan", vec!["a.example".into()]);
    repo.create(&job).await.unwrap();

    job.mark_dispatched("pod-7").unwrap();
    repo.update(&job).await.unwrap();

    let loaded = repo.get(&job.job_id).await.unwrap().unwrap();
    assert_eq!(loaded.status, JobStatus::Running);
    assert_eq!(loaded.execution_handle.as_deref(), Some("pod-7"));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_result_filters_and_cascade_delete() {
    let pool = setup_test_db().await;
    let repo = SqliteResultRepository::new(pool.clone());

    for (job_id, workflow_id) in [("job-a", "wf-1"), ("job-a", "wf-1"), ("job-b", "wf-1")] {
        let payload = ScanResultPayload {
            target: "a.example".into(),
            resolved_ips: vec!["10.0.0.1".into()],
            open_ports: json!([{"port": 80, "protocol": "tcp"}]),
            scan_metadata: json!({"job_id": job_id}),
            workflow_id: Some(workflow_id.into()),
        };
        repo.create(&ScanResult::from_payload(&payload)).await.unwrap();
    }

    let by_job = repo.list_by_job("job-a").await.unwrap();
    assert_eq!(by_job.len(), 2);

    let filters = ResultFilters {
        workflow_id: Some("wf-1".into()),
        job_id: None,
    };
    assert_eq!(repo.count(filters.clone()).await.unwrap(), 3);
    let page = repo.list(filters, 1, 2).await.unwrap();
    assert_eq!(page.len(), 2);

    // Sub-job deletion cascades its correlated results
    let deleted = repo.delete_by_job("job-a").await.unwrap();
    assert_eq!(deleted, 2);
    assert!(repo.list_by_job("job-a").await.unwrap().is_empty());
    assert_eq!(repo.list_by_job("job-b").await.unwrap().len(), 1);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_vpn_upsert_preserves_holders() {
    let pool = setup_test_db().await;
    let repo = SqliteVpnRepository::new(pool.clone());

    let profile = VpnProfile::new("jp_1.2.3.4.ovpn")
        .with_hostname("jp-gw")
        .with_country("JP");
    repo.upsert_identity(&profile).await.unwrap();

    // A job takes the lease
    let mut held = repo.get("jp_1.2.3.4.ovpn").await.unwrap().unwrap();
    held.acquire("job-1");
    repo.update(&held).await.unwrap();

    // Catalog re-sync must not clobber lease state
    let refreshed = VpnProfile::new("jp_1.2.3.4.ovpn")
        .with_hostname("jp-gw-2")
        .with_country("JP");
    repo.upsert_identity(&refreshed).await.unwrap();

    let loaded = repo.get("jp_1.2.3.4.ovpn").await.unwrap().unwrap();
    assert_eq!(loaded.hostname.as_deref(), Some("jp-gw-2"));
    assert_eq!(loaded.holders, vec!["job-1"]);

    teardown_test_db(pool).await;
}
