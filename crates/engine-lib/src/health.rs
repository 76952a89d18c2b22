//! Component health for the engine host
//!
//! Tracks the profiler, planner and monitor, and folds monitoring session
//! state into the monitor's health so paused runs show up as degraded.

use crate::monitor::{SessionRegistry, SessionStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }

    /// Monitor health from live sessions: any paused session degrades it.
    pub fn from_sessions(sessions: &SessionRegistry) -> Self {
        match sessions.count_with_status(SessionStatus::Paused) {
            0 => Self::healthy(),
            paused => Self::degraded(format!(
                "{paused} of {} monitoring sessions paused",
                sessions.len()
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status among components; healthy when there are none
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub mod components {
    pub const PROFILER: &str = "profiler";
    pub const PLANNER: &str = "planner";
    pub const MONITOR: &str = "monitor";
}

#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register the engine's three components as healthy
    pub async fn register_engine(&self) {
        for name in [components::PROFILER, components::PLANNER, components::MONITOR] {
            self.update(name, ComponentHealth::healthy()).await;
        }
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components.write().await.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn report_sessions(&self, sessions: &SessionRegistry) {
        self.update(components::MONITOR, ComponentHealth::from_sessions(sessions))
            .await;
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        HealthResponse {
            status: HealthResponse::compute_status(&components),
            components,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let reason = if !*self.ready.read().await {
            Some("Startup planning pass has not completed")
        } else if self.health().await.status == ComponentStatus::Unhealthy {
            Some("Engine component unhealthy")
        } else {
            None
        };
        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{ExecutionMonitor, MetricsUpdate};

    #[tokio::test]
    async fn test_empty_registry_is_healthy_but_not_ready() {
        let registry = HealthRegistry::new();
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_worst_component_wins() {
        let registry = HealthRegistry::new();
        registry.register_engine().await;
        assert_eq!(registry.health().await.components.len(), 3);

        registry.set_degraded(components::PROFILER, "probe timeouts").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry.set_unhealthy(components::PLANNER, "config invalid").await;
        registry.set_ready(true).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
        assert!(!registry.readiness().await.ready);

        registry.set_healthy(components::PLANNER).await;
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_paused_session_degrades_monitor() {
        let registry = HealthRegistry::new();
        let mut monitor = ExecutionMonitor::default();
        let id = monitor.start_monitoring("run");

        registry.report_sessions(monitor.sessions()).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);

        monitor
            .update_metrics(
                id,
                MetricsUpdate {
                    response_time_ms: Some(20_000.0),
                    ..Default::default()
                },
            )
            .unwrap();
        registry.report_sessions(monitor.sessions()).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.components[components::MONITOR].message.is_some());
    }
}
