//! Normalized finding records.
//!
//! Every tool's raw payload is flattened into one of these stable shapes
//! so downstream consumers never match on tool-specific field names.

use serde::{Deserialize, Serialize};

/// A normalized finding produced by a result normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// Port-style finding (port scanners, service discovery).
    Port {
        host: String,
        port: u16,
        protocol: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service: Option<String>,
    },
    /// Enumeration-style finding (web probing, directory discovery).
    Endpoint {
        url: String,
        status: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        webserver: Option<String>,
    },
    /// Vulnerability-style finding (template scanners).
    Vulnerability {
        name: String,
        severity: String,
        host: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        evidence: Option<String>,
    },
    /// Fallback for tools with no registered normalizer.
    Raw { data: serde_json::Value },
}

impl Finding {
    /// Tool-specific identity key used for shard-merge deduplication.
    pub fn identity_key(&self) -> String {
        match self {
            Self::Port { host, port, protocol, .. } => {
                format!("port:{host}:{port}:{protocol}")
            }
            Self::Endpoint { url, .. } => format!("endpoint:{url}"),
            Self::Vulnerability { name, severity, host, .. } => {
                format!("vuln:{name}:{severity}:{host}")
            }
            Self::Raw { data } => format!("raw:{data}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_identity_ignores_service() {
        let a = Finding::Port {
            host: "h".into(),
            port: 80,
            protocol: "tcp".into(),
            service: Some("http".into()),
        };
        let b = Finding::Port {
            host: "h".into(),
            port: 80,
            protocol: "tcp".into(),
            service: None,
        };
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_distinct_kinds_never_collide() {
        let port = Finding::Port {
            host: "h".into(),
            port: 80,
            protocol: "tcp".into(),
            service: None,
        };
        let endpoint = Finding::Endpoint {
            url: "h:80:tcp".into(),
            status: 200,
            webserver: None,
        };
        assert_ne!(port.identity_key(), endpoint.identity_key());
    }
}
