//! Metrics configuration

use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether the metrics endpoint is served
    pub enabled: bool,
    /// HTTP bind address for /metrics, /health and /ready
    pub bind: SocketAddr,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9464))
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_bind(),
        }
    }
}
