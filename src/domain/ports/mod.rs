//! Ports: traits the services depend on, implemented by adapters.

pub mod advisor;
pub mod execution_backend;
pub mod job_repository;
pub mod result_repository;
pub mod vpn_catalog;
pub mod vpn_repository;
pub mod workflow_repository;

pub use advisor::{Advisory, ScanAdvisor, SuggestedAction};
pub use execution_backend::{DispatchPayload, ExecutionBackend};
pub use job_repository::JobRepository;
pub use result_repository::{ResultFilters, ResultRepository};
pub use vpn_catalog::VpnCatalogSource;
pub use vpn_repository::VpnProfileRepository;
pub use workflow_repository::WorkflowRepository;
