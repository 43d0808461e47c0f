use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one part of the monitoring pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ComponentHealth {
    Ok,
    /// Working, but with reduced fidelity
    Degraded(String),
    Failed(String),
    /// Not configured for this run
    Disabled,
}

impl ComponentHealth {
    pub fn is_ok(&self) -> bool {
        matches!(self, ComponentHealth::Ok)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ComponentHealth::Failed(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ComponentHealth::Degraded(reason) | ComponentHealth::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentHealth::Ok => write!(f, "ok"),
            ComponentHealth::Degraded(reason) => write!(f, "degraded ({})", reason),
            ComponentHealth::Failed(reason) => write!(f, "failed ({})", reason),
            ComponentHealth::Disabled => write!(f, "disabled"),
        }
    }
}

/// Health of the collection and persistence sides, published with every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub collection: ComponentHealth,
    pub persistence: ComponentHealth,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            collection: ComponentHealth::Ok,
            persistence: ComponentHealth::Disabled,
        }
    }
}

impl HealthStatus {
    /// Nothing degraded or failed
    pub fn is_healthy(&self) -> bool {
        let healthy = |c: &ComponentHealth| matches!(c, ComponentHealth::Ok | ComponentHealth::Disabled);
        healthy(&self.collection) && healthy(&self.persistence)
    }
}
