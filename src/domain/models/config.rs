//! Configuration model for the scanforge controller.

use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Control API listener
    #[serde(default)]
    pub http: HttpConfig,

    /// Scanner node (execution backend)
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// VPN catalog source
    #[serde(default)]
    pub vpn_catalog: VpnCatalogConfig,

    /// Advisory service and auto-chaining
    #[serde(default)]
    pub advisor: AdvisorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
            scanner: ScannerConfig::default(),
            vpn_catalog: VpnCatalogConfig::default(),
            advisor: AdvisorConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to the `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".scanforge/scanforge.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional directory for rotated file logs
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            directory: None,
        }
    }
}

/// Control API listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpConfig {
    #[serde(default = "default_http_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_http_port() -> u16 {
    8000
}

const fn default_true() -> bool {
    true
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            enable_cors: default_true(),
        }
    }
}

/// Scanner node (execution backend) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScannerConfig {
    /// Base URL of the scanner node API
    #[serde(default = "default_scanner_url")]
    pub base_url: String,

    /// URL workers call back with results
    #[serde(default = "default_callback_url")]
    pub callback_url: String,

    /// Submission timeout in seconds
    #[serde(default = "default_submit_timeout")]
    pub timeout_secs: u64,
}

fn default_scanner_url() -> String {
    "http://scanner-node:8080".to_string()
}

fn default_callback_url() -> String {
    "http://controller:8000/api/scan_results".to_string()
}

const fn default_submit_timeout() -> u64 {
    30
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            base_url: default_scanner_url(),
            callback_url: default_callback_url(),
            timeout_secs: default_submit_timeout(),
        }
    }
}

/// VPN catalog source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VpnCatalogConfig {
    /// Base URL of the catalog (proxy node) API
    #[serde(default = "default_catalog_url")]
    pub base_url: String,

    /// Catalog fetch timeout in seconds
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

fn default_catalog_url() -> String {
    "http://proxy-node:8000".to_string()
}

const fn default_catalog_timeout() -> u64 {
    10
}

impl Default for VpnCatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            timeout_secs: default_catalog_timeout(),
        }
    }
}

/// Advisory service and auto-chain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdvisorConfig {
    /// Whether completed jobs trigger follow-up analysis at all
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the RAG advisory service
    #[serde(default = "default_advisor_url")]
    pub base_url: String,

    /// Advisory request timeout in seconds
    #[serde(default = "default_advisor_timeout")]
    pub timeout_secs: u64,

    /// Minimum suggestion confidence worth acting on
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Cap on sub-jobs per workflow before auto-chaining stops
    #[serde(default = "default_max_auto_jobs")]
    pub max_jobs_per_workflow: u32,
}

fn default_advisor_url() -> String {
    "http://rag-server:8080".to_string()
}

const fn default_advisor_timeout() -> u64 {
    120
}

const fn default_min_confidence() -> f64 {
    0.5
}

const fn default_max_auto_jobs() -> u32 {
    20
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_advisor_url(),
            timeout_secs: default_advisor_timeout(),
            min_confidence: default_min_confidence(),
            max_jobs_per_workflow: default_max_auto_jobs(),
        }
    }
}
