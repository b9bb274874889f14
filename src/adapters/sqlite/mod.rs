//! SQLite persistence adapters.

pub mod connection;
pub mod job_repository;
pub mod migrations;
pub mod result_repository;
pub mod vpn_repository;
pub mod workflow_repository;

pub use connection::{create_pool, create_test_pool};
pub use job_repository::SqliteJobRepository;
pub use migrations::run_migrations;
pub use result_repository::SqliteResultRepository;
pub use vpn_repository::SqliteVpnRepository;
pub use workflow_repository::SqliteWorkflowRepository;
