//! Monitoring sessions and their registry

use super::recovery::RecoveryPlan;
use super::{MonitorConfig, Threshold};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ResponseTime,
    SuccessRate,
    Memory,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::ResponseTime => "response_time",
            AlertKind::SuccessRate => "success_rate",
            AlertKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Error,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    /// Unix millis
    pub raised_at: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    #[serde(default)]
    pub memory_mb: f64,
    #[serde(default)]
    pub cpu_percent: f64,
    #[serde(default)]
    pub network_requests: u64,
}

/// Partial metrics pushed by the orchestrator. Absent fields keep their
/// previous value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsUpdate {
    #[serde(default)]
    pub response_time_ms: Option<f64>,
    /// Percent
    #[serde(default)]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub resource_usage: Option<ResourceSample>,
    #[serde(default)]
    pub data_quality: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub response_time_ms: Option<f64>,
    pub success_rate: Option<f64>,
    pub resource_usage: Option<ResourceSample>,
    pub data_quality: Option<f64>,
}

impl SessionMetrics {
    pub fn merge(&mut self, update: &MetricsUpdate) {
        if update.response_time_ms.is_some() {
            self.response_time_ms = update.response_time_ms;
        }
        if update.success_rate.is_some() {
            self.success_rate = update.success_rate;
        }
        if update.resource_usage.is_some() {
            self.resource_usage = update.resource_usage;
        }
        if update.data_quality.is_some() {
            self.data_quality = update.data_quality;
        }
    }

    /// One alert per metric at warning level or worse
    pub(super) fn check_thresholds(&self, config: &MonitorConfig, now_ms: i64) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if let Some(ms) = self.response_time_ms {
            if let Some(alert) = above(AlertKind::ResponseTime, ms, &config.response_time_ms, now_ms) {
                alerts.push(alert);
            }
        }
        if let Some(rate) = self.success_rate {
            if let Some(alert) = below(AlertKind::SuccessRate, rate, &config.success_rate, now_ms) {
                alerts.push(alert);
            }
        }
        if let Some(usage) = self.resource_usage {
            if let Some(alert) = above(AlertKind::Memory, usage.memory_mb, &config.memory_mb, now_ms) {
                alerts.push(alert);
            }
        }
        alerts
    }
}

fn alert(kind: AlertKind, level: AlertLevel, value: f64, threshold: f64, now_ms: i64) -> Alert {
    Alert {
        kind,
        level,
        value,
        threshold,
        message: format!("{} {} {value:.1} crossed {threshold:.1}", kind.as_str(), level.as_str()),
        raised_at: now_ms,
    }
}

fn above(kind: AlertKind, value: f64, t: &Threshold, now_ms: i64) -> Option<Alert> {
    if value >= t.error {
        Some(alert(kind, AlertLevel::Error, value, t.error, now_ms))
    } else if value >= t.warning {
        Some(alert(kind, AlertLevel::Warning, value, t.warning, now_ms))
    } else {
        None
    }
}

fn below(kind: AlertKind, value: f64, t: &Threshold, now_ms: i64) -> Option<Alert> {
    if value < t.error {
        Some(alert(kind, AlertLevel::Error, value, t.error, now_ms))
    } else if value < t.warning {
        Some(alert(kind, AlertLevel::Warning, value, t.warning, now_ms))
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSession {
    pub id: u64,
    pub execution_ref: String,
    pub metrics: SessionMetrics,
    pub alerts: Vec<Alert>,
    pub status: SessionStatus,
    pub started_at: i64,
    pub paused_at: Option<i64>,
    pub pause_reason: Option<String>,
    pub updates: u64,
    pub last_recovery: Option<RecoveryPlan>,
}

impl MonitoringSession {
    fn new(id: u64, execution_ref: String, started_at: i64) -> Self {
        Self {
            id,
            execution_ref,
            metrics: SessionMetrics::default(),
            alerts: Vec::new(),
            status: SessionStatus::Active,
            started_at,
            paused_at: None,
            pause_reason: None,
            updates: 0,
            last_recovery: None,
        }
    }

    pub fn alerts_since(&self, since_ms: i64) -> usize {
        self.alerts.iter().filter(|a| a.raised_at >= since_ms).count()
    }

    /// Active to paused. A session pauses at most once.
    pub(super) fn pause(&mut self, reason: &str, at: i64) -> bool {
        if self.status != SessionStatus::Active || self.paused_at.is_some() {
            return false;
        }
        self.status = SessionStatus::Paused;
        self.paused_at = Some(at);
        self.pause_reason = Some(reason.to_string());
        true
    }
}

/// Final report handed back by `stop_monitoring`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: u64,
    pub execution_ref: String,
    pub final_status: SessionStatus,
    pub total_alerts: usize,
    pub warning_alerts: usize,
    pub error_alerts: usize,
    pub was_paused: bool,
    pub pause_reason: Option<String>,
    pub duration_ms: u64,
    pub updates: u64,
    pub metrics: SessionMetrics,
    pub alerts: Vec<Alert>,
}

impl SessionSummary {
    pub(super) fn from_session(session: MonitoringSession, ended_at: i64) -> Self {
        let error_alerts = session
            .alerts
            .iter()
            .filter(|a| a.level == AlertLevel::Error)
            .count();
        Self {
            session_id: session.id,
            execution_ref: session.execution_ref,
            final_status: session.status,
            total_alerts: session.alerts.len(),
            warning_alerts: session.alerts.len() - error_alerts,
            error_alerts,
            was_paused: session.paused_at.is_some(),
            pause_reason: session.pause_reason,
            duration_ms: ended_at.saturating_sub(session.started_at).max(0) as u64,
            updates: session.updates,
            metrics: session.metrics,
            alerts: session.alerts,
        }
    }
}

/// Arena of live sessions with an id index. Freed slots are reused; ids are not.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: Vec<Option<MonitoringSession>>,
    free: Vec<usize>,
    index: HashMap<u64, usize>,
    next_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    pub(super) fn insert(&mut self, execution_ref: String, started_at: i64) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        let session = MonitoringSession::new(id, execution_ref, started_at);
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(session);
                slot
            }
            None => {
                self.slots.push(Some(session));
                self.slots.len() - 1
            }
        };
        self.index.insert(id, slot);
        id
    }

    pub fn get(&self, id: u64) -> Option<&MonitoringSession> {
        let slot = *self.index.get(&id)?;
        self.slots.get(slot)?.as_ref()
    }

    pub(super) fn get_mut(&mut self, id: u64) -> Option<&mut MonitoringSession> {
        let slot = *self.index.get(&id)?;
        self.slots.get_mut(slot)?.as_mut()
    }

    pub(super) fn remove(&mut self, id: u64) -> Option<MonitoringSession> {
        let slot = self.index.remove(&id)?;
        let session = self.slots.get_mut(slot)?.take();
        self.free.push(slot);
        session
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonitoringSession> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn count_with_status(&self, status: SessionStatus) -> usize {
        self.iter().filter(|s| s.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_reuses_slots_not_ids() {
        let mut registry = SessionRegistry::new();
        let a = registry.insert("a".into(), 0);
        let b = registry.insert("b".into(), 0);
        assert_eq!((a, b), (1, 2));

        assert!(registry.remove(a).is_some());
        assert!(registry.get(a).is_none());
        assert!(registry.remove(a).is_none());

        let c = registry.insert("c".into(), 0);
        assert_eq!(c, 3);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.slots.len(), 2);
        assert_eq!(registry.get(c).map(|s| s.execution_ref.as_str()), Some("c"));
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut metrics = SessionMetrics::default();
        metrics.merge(&MetricsUpdate {
            response_time_ms: Some(900.0),
            success_rate: Some(95.0),
            ..Default::default()
        });
        metrics.merge(&MetricsUpdate {
            data_quality: Some(80.0),
            ..Default::default()
        });
        assert_eq!(metrics.response_time_ms, Some(900.0));
        assert_eq!(metrics.success_rate, Some(95.0));
        assert_eq!(metrics.data_quality, Some(80.0));
    }

    #[test]
    fn test_threshold_directions() {
        let config = MonitorConfig::default();
        let metrics = SessionMetrics {
            success_rate: Some(60.0),
            resource_usage: Some(ResourceSample {
                memory_mb: 96.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let alerts = metrics.check_thresholds(&config, 0);
        assert_eq!(alerts.len(), 2);
        assert_eq!((alerts[0].kind, alerts[0].level), (AlertKind::SuccessRate, AlertLevel::Warning));
        assert_eq!((alerts[1].kind, alerts[1].level), (AlertKind::Memory, AlertLevel::Error));
    }

    #[test]
    fn test_pause_happens_once() {
        let mut session = MonitoringSession::new(1, "run".into(), 0);
        assert!(session.pause("burst", 10));
        assert!(!session.pause("burst", 20));
        assert_eq!(session.paused_at, Some(10));
    }
}
