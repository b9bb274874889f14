//! Domain models for the scanforge controller.

pub mod config;
pub mod finding;
pub mod scan_job;
pub mod scan_result;
pub mod vpn;
pub mod workflow;

pub use config::{
    AdvisorConfig, Config, DatabaseConfig, HttpConfig, LoggingConfig, ScannerConfig,
    VpnCatalogConfig,
};
pub use finding::Finding;
pub use scan_job::{JobStatus, ScanJob, ScanJobRequest};
pub use scan_result::{ScanResult, ScanResultPayload};
pub use vpn::{VpnLease, VpnProfile, VpnStatus};
pub use workflow::{Strategy, Workflow, WorkflowRequest, WorkflowStatus, WorkflowStep};
