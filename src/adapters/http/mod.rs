//! Control API: the HTTP surface operators and scanner workers talk to.
//!
//! Workers call `POST /api/scan_results` when a tool finishes; everything
//! else is the operator-facing workflow lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    HttpConfig, ScanJob, ScanJobRequest, ScanResultPayload, VpnProfile, Workflow, WorkflowRequest,
};
use crate::domain::ports::ResultFilters;
use crate::services::auto_chain::AutoChainService;
use crate::services::reconciler::ResultReconciler;
use crate::services::results::{ResultQueryService, SubJobResults, TargetSummary};
use crate::services::vpn_pool::{NotifyAction, VpnPoolService};
use crate::services::workflow_service::{WorkflowCreation, WorkflowDetail, WorkflowService};

/// Shared state behind every handler.
pub struct AppState {
    pub workflow_service: Arc<WorkflowService>,
    pub reconciler: Arc<ResultReconciler>,
    pub query: Arc<ResultQueryService>,
    pub pool: Arc<VpnPoolService>,
    pub auto_chain: Arc<AutoChainService>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn map_error(err: &DomainError) -> ApiError {
    let (status, code) = match err {
        DomainError::WorkflowNotFound(_)
        | DomainError::JobNotFound(_)
        | DomainError::ProfileNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        DomainError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
        DomainError::Ingestion(_) => (StatusCode::BAD_REQUEST, "INGESTION_ERROR"),
        DomainError::ResourceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "RESOURCE_UNAVAILABLE"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
        }),
    )
}

fn ok_or_error<T>(result: DomainResult<T>) -> Result<Json<T>, ApiError> {
    result.map(Json).map_err(|e| map_error(&e))
}

/// Pagination metadata.
#[derive(Debug, Serialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl PaginationInfo {
    fn new(page: u32, page_size: u32, total: i64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            (total + i64::from(page_size) - 1) / i64::from(page_size)
        };
        Self {
            page,
            page_size,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

const fn default_page() -> u32 {
    1
}

const fn default_page_size() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
pub struct ResultQueryParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedWorkflows {
    pub pagination: PaginationInfo,
    pub results: Vec<Workflow>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResults {
    pub pagination: PaginationInfo,
    pub results: Vec<crate::domain::models::ScanResult>,
}

/// Body for a standalone tool scan; the tool comes from the path.
#[derive(Debug, Deserialize)]
pub struct ToolScanRequest {
    pub targets: Vec<String>,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    #[serde(default)]
    pub vpn_profile: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteJobResponse {
    pub status: &'static str,
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VpnNotifyRequest {
    pub filename: String,
    pub action: String,
    pub holder_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteWorkflowResponse {
    pub status: &'static str,
    pub workflow_id: String,
    pub deleted_sub_jobs: u32,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub synced: usize,
}

/// Control API server.
pub struct ControlApiServer {
    config: HttpConfig,
    state: Arc<AppState>,
}

impl ControlApiServer {
    pub fn new(config: HttpConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    fn build_router(self) -> Router {
        let app = Router::new()
            // Workflow lifecycle
            .route("/api/scan/workflow", post(create_workflow))
            .route("/api/workflows", get(list_workflows))
            .route("/api/workflows/{workflow_id}", get(get_workflow))
            .route("/api/workflows/{workflow_id}", delete(delete_workflow))
            .route("/api/workflows/{workflow_id}/summary", get(workflow_summary))
            .route("/api/workflows/{workflow_id}/cancel", post(cancel_workflow))
            // Standalone scan jobs
            .route("/api/scan/{tool}", post(create_tool_scan))
            .route("/api/scan_jobs/{job_id}", get(get_scan_job))
            .route("/api/scan_jobs/{job_id}", delete(delete_scan_job))
            // Result ingestion and queries
            .route("/api/scan_results", post(receive_scan_result))
            .route("/api/scan_results", get(list_scan_results))
            .route("/api/sub_jobs/{job_id}/results", get(sub_job_results))
            // VPN pool
            .route("/api/vpn/profiles", get(list_vpn_profiles))
            .route("/api/vpn/notify", post(vpn_notify))
            .route("/api/vpn/sync", post(vpn_sync))
            // Health check
            .route("/health", get(health_check))
            .with_state(self.state);

        if self.config.enable_cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(TraceLayer::new_for_http())
        } else {
            app.layer(TraceLayer::new_for_http())
        }
    }

    /// Bind and serve until the process stops.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = self.build_router();

        tracing::info!("control API listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;
        Ok(())
    }
}

// Handler functions

async fn health_check() -> &'static str {
    "OK"
}

async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WorkflowRequest>,
) -> Result<(StatusCode, Json<WorkflowCreation>), ApiError> {
    match state.workflow_service.create_and_dispatch(&req).await {
        Ok(creation) => Ok((StatusCode::CREATED, Json(creation))),
        Err(e) => Err(map_error(&e)),
    }
}

async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowDetail>, ApiError> {
    ok_or_error(state.workflow_service.get_detail(&workflow_id).await)
}

async fn list_workflows(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<PaginatedWorkflows>, ApiError> {
    let page_size = params.page_size.clamp(1, 100);
    let (results, total) = state
        .workflow_service
        .list(params.page.max(1), page_size)
        .await
        .map_err(|e| map_error(&e))?;
    Ok(Json(PaginatedWorkflows {
        pagination: PaginationInfo::new(params.page.max(1), page_size, total),
        results,
    }))
}

async fn workflow_summary(
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<Vec<TargetSummary>>, ApiError> {
    ok_or_error(state.query.workflow_summary(&workflow_id).await)
}

async fn cancel_workflow(
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<Workflow>, ApiError> {
    ok_or_error(state.workflow_service.cancel(&workflow_id).await)
}

async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<DeleteWorkflowResponse>, ApiError> {
    let deleted = state
        .workflow_service
        .delete(&workflow_id)
        .await
        .map_err(|e| map_error(&e))?;
    Ok(Json(DeleteWorkflowResponse {
        status: "deleted",
        workflow_id,
        deleted_sub_jobs: deleted,
    }))
}

async fn create_tool_scan(
    State(state): State<Arc<AppState>>,
    Path(tool): Path<String>,
    Json(req): Json<ToolScanRequest>,
) -> Result<(StatusCode, Json<ScanJob>), ApiError> {
    let request = ScanJobRequest {
        tool,
        targets: req.targets,
        options: req.options,
        vpn_profile: req.vpn_profile,
        country: req.country,
    };
    match state.workflow_service.create_and_dispatch_job(&request).await {
        Ok(job) => Ok((StatusCode::CREATED, Json(job))),
        Err(e) => Err(map_error(&e)),
    }
}

async fn get_scan_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<ScanJob>, ApiError> {
    ok_or_error(state.workflow_service.get_job(&job_id).await)
}

async fn delete_scan_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<DeleteJobResponse>, ApiError> {
    state
        .workflow_service
        .delete_job(&job_id)
        .await
        .map_err(|e| map_error(&e))?;
    Ok(Json(DeleteJobResponse {
        status: "deleted",
        job_id,
    }))
}

/// Ingestion callback. Always 204: a malformed payload is logged and
/// dropped without failing the worker's request, and duplicates are
/// expected under at-least-once delivery.
async fn receive_scan_result(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ScanResultPayload>,
) -> StatusCode {
    match state.reconciler.ingest(&payload).await {
        Ok(outcome) => {
            if outcome.job_completed {
                if let Some(job_id) = outcome.job_id {
                    let auto_chain = state.auto_chain.clone();
                    tokio::spawn(async move {
                        auto_chain.on_job_completed(&job_id).await;
                    });
                }
            }
        }
        Err(DomainError::Ingestion(reason)) => {
            tracing::warn!(%reason, "dropping malformed result payload");
        }
        Err(e) => {
            tracing::error!(error = %e, "result ingestion failed");
        }
    }
    StatusCode::NO_CONTENT
}

async fn list_scan_results(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResultQueryParams>,
) -> Result<Json<PaginatedResults>, ApiError> {
    let page = params.page.max(1);
    let page_size = params.page_size.clamp(1, 100);
    let filters = ResultFilters {
        workflow_id: params.workflow_id,
        job_id: params.job_id,
    };
    let (results, total) = state
        .query
        .paginated(filters, page, page_size)
        .await
        .map_err(|e| map_error(&e))?;
    Ok(Json(PaginatedResults {
        pagination: PaginationInfo::new(page, page_size, total),
        results,
    }))
}

async fn sub_job_results(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<SubJobResults>, ApiError> {
    ok_or_error(state.query.sub_job_results(&job_id).await)
}

async fn list_vpn_profiles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<VpnProfile>>, ApiError> {
    ok_or_error(state.pool.list().await)
}

async fn vpn_notify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VpnNotifyRequest>,
) -> Result<Json<VpnProfile>, ApiError> {
    let action = NotifyAction::from_str(&req.action).ok_or_else(|| {
        map_error(&DomainError::Validation(format!(
            "unknown action: {}",
            req.action
        )))
    })?;
    ok_or_error(state.pool.notify(&req.filename, action, &req.holder_id).await)
}

async fn vpn_sync(State(state): State<Arc<AppState>>) -> Result<Json<SyncResponse>, ApiError> {
    let synced = state.pool.sync_catalog().await.map_err(|e| map_error(&e))?;
    Ok(Json(SyncResponse { synced }))
}
