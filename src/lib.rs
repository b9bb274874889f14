//! Scanforge - distributed security-scan orchestration controller.
//!
//! Scanforge turns a declarative scan request (targets, tools, a fan-out
//! strategy) into independently dispatchable sub-jobs, brokers shared VPN
//! egress identities across them, hands each sub-job to an external
//! scanner node, and reconciles asynchronous completion callbacks into a
//! consistent workflow status and a normalized result view.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, ports, and the error taxonomy
//! - **Service Layer** (`services`): decomposition, leasing, dispatch,
//!   reconciliation, normalization, auto-chaining
//! - **Adapters** (`adapters`): sqlite persistence, the axum control API,
//!   and reqwest clients for the scanner node, VPN catalog, and advisor
//! - **Infrastructure** (`infrastructure`): configuration and logging
//! - **CLI** (`cli`): `serve` and `sync-vpn` commands

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, Finding, JobStatus, ScanJob, ScanResult, ScanResultPayload, Strategy, VpnLease,
    VpnProfile, VpnStatus, Workflow, WorkflowRequest, WorkflowStatus, WorkflowStep,
};
pub use domain::ports::{
    ExecutionBackend, JobRepository, ResultRepository, ScanAdvisor, VpnCatalogSource,
    VpnProfileRepository, WorkflowRepository,
};
pub use services::{
    JobDispatcher, ResultReconciler, VpnPoolService, WorkflowDecomposer, WorkflowService,
};
