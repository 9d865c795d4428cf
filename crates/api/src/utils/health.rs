//! Health report types for `GET /health`

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Overall health of the service
///
/// The service is healthy only when every component is.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `"ok"` or `"unavailable"`
    pub status: &'static str,
    pub components: Vec<ComponentHealth>,
    /// Unix timestamp when the check ran
    pub timestamp: u64,
}

impl HealthReport {
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        let healthy = components.iter().all(|c| c.is_healthy);
        Self {
            status: if healthy { "ok" } else { "unavailable" },
            components,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

/// Health of an individual component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    /// Component identifier (e.g., "database")
    pub name: &'static str,
    pub is_healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: &'static str) -> Self {
        Self { name, is_healthy: true, message: None }
    }

    pub fn unhealthy(name: &'static str, message: impl Into<String>) -> Self {
        Self { name, is_healthy: false, message: Some(message.into()) }
    }
}
