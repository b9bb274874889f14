//! Command-line interface and application wiring.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use crate::adapters::advisor::RagAdvisorClient;
use crate::adapters::catalog::CatalogClient;
use crate::adapters::http::{AppState, ControlApiServer};
use crate::adapters::scanner::ScannerNodeClient;
use crate::adapters::sqlite::{
    create_pool, run_migrations, SqliteJobRepository, SqliteResultRepository, SqliteVpnRepository,
    SqliteWorkflowRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::{
    ExecutionBackend, JobRepository, ResultRepository, ScanAdvisor, VpnCatalogSource,
    VpnProfileRepository, WorkflowRepository,
};
use crate::infrastructure::config::ConfigLoader;
use crate::services::auto_chain::AutoChainService;
use crate::services::dispatcher::JobDispatcher;
use crate::services::reconciler::ResultReconciler;
use crate::services::results::ResultQueryService;
use crate::services::vpn_pool::VpnPoolService;
use crate::services::workflow_service::WorkflowService;

/// Scanforge: distributed security-scan orchestration controller.
#[derive(Debug, Parser)]
#[command(name = "scanforge", version, about)]
pub struct Cli {
    /// Path to a configuration file (defaults to .scanforge/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the controller: migrations, then the control API
    Serve,
    /// Sync the VPN catalog into the local pool and exit
    SyncVpn,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(),
        }
    }
}

/// Run the controller service.
pub async fn serve(config: Config) -> Result<()> {
    let pool = create_pool(&config.database).await?;
    let applied = run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "database migrations applied");
    }

    let workflows: Arc<dyn WorkflowRepository> =
        Arc::new(SqliteWorkflowRepository::new(pool.clone()));
    let jobs: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(pool.clone()));
    let results: Arc<dyn ResultRepository> = Arc::new(SqliteResultRepository::new(pool.clone()));
    let vpn_repo: Arc<dyn VpnProfileRepository> = Arc::new(SqliteVpnRepository::new(pool));

    let catalog: Arc<dyn VpnCatalogSource> =
        Arc::new(CatalogClient::new(config.vpn_catalog.clone()));
    let backend: Arc<dyn ExecutionBackend> =
        Arc::new(ScannerNodeClient::new(config.scanner.clone()));
    let advisor: Arc<dyn ScanAdvisor> = Arc::new(RagAdvisorClient::new(config.advisor.clone()));

    let vpn_pool = Arc::new(VpnPoolService::new(vpn_repo, catalog));
    let dispatcher = Arc::new(JobDispatcher::new(
        backend,
        jobs.clone(),
        config.scanner.callback_url.clone(),
    ));
    let workflow_service = Arc::new(WorkflowService::new(
        workflows.clone(),
        jobs.clone(),
        results.clone(),
        vpn_pool.clone(),
        dispatcher,
    ));
    let reconciler = Arc::new(ResultReconciler::new(
        workflows.clone(),
        jobs.clone(),
        results.clone(),
        vpn_pool.clone(),
    ));
    let query = Arc::new(ResultQueryService::new(workflows, jobs.clone(), results.clone()));
    let auto_chain = Arc::new(AutoChainService::new(
        advisor,
        jobs,
        results,
        workflow_service.clone(),
        config.advisor.clone(),
    ));

    let state = Arc::new(AppState {
        workflow_service,
        reconciler,
        query,
        pool: vpn_pool,
        auto_chain,
    });

    ControlApiServer::new(config.http.clone(), state)
        .serve()
        .await
        .map_err(|e| anyhow!("control API server failed: {e}"))
}

/// One-shot catalog bootstrap.
pub async fn sync_vpn(config: Config) -> Result<()> {
    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;

    let vpn_repo: Arc<dyn VpnProfileRepository> = Arc::new(SqliteVpnRepository::new(pool));
    let catalog: Arc<dyn VpnCatalogSource> = Arc::new(CatalogClient::new(config.vpn_catalog));
    let vpn_pool = VpnPoolService::new(vpn_repo, catalog);

    let synced = vpn_pool.sync_catalog().await?;
    println!("Synced {synced} VPN profiles into the pool");
    Ok(())
}
