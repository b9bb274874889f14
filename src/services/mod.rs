//! Service layer: decomposition, leasing, dispatch, reconciliation.

pub mod auto_chain;
pub mod decomposer;
pub mod dispatcher;
pub mod reconciler;
pub mod results;
pub mod shard_planner;
pub mod vpn_pool;
pub mod workflow_service;

pub use auto_chain::AutoChainService;
pub use decomposer::{shard_axis, ShardAxis, WorkflowDecomposer, KNOWN_TOOLS};
pub use dispatcher::{DispatchOutcome, FailedSubmission, JobDispatcher};
pub use reconciler::{recompute_workflow_status, IngestOutcome, ResultReconciler};
pub use results::{merge_findings, NormalizerRegistry, ResultQueryService, SubJobResults, TargetSummary};
pub use vpn_pool::{NotifyAction, VpnPoolService};
pub use workflow_service::{WorkflowCreation, WorkflowDetail, WorkflowProgress, WorkflowService};
