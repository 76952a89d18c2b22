//! Execution monitoring
//!
//! Monitoring sessions receive metric updates from the orchestrator, raise
//! threshold alerts, pause themselves when alerts pile up and hand back a
//! graduated recovery plan when an error threshold is crossed.

mod adaptive;
mod bottleneck;
mod recovery;
mod session;

pub use adaptive::{
    AdaptiveManager, BestPractice, ExecutionSignature, FailurePattern, PerformanceRecord,
    PracticeEvolver, SiteType, StaticPractices, TimeRange,
};
pub use bottleneck::{calculate_severity, Bottleneck, BottleneckKind};
pub use recovery::{ErrorState, FallbackDescriptor, RecoveryAction, RecoveryPlan, Severity};
pub use session::{
    Alert, AlertKind, AlertLevel, MetricsUpdate, MonitoringSession, ResourceSample,
    SessionMetrics, SessionRegistry, SessionStatus, SessionSummary,
};

use crate::error::{EngineError, EngineResult};
use crate::observability::{EngineMetrics, StructuredLogger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Warning and error levels for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: f64,
    pub error: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Response time, higher is worse
    pub response_time_ms: Threshold,
    /// Success rate in percent, lower is worse
    pub success_rate: Threshold,
    /// Memory in MB, higher is worse
    pub memory_mb: Threshold,
    /// CPU percent, higher is worse
    pub cpu_percent: Threshold,
    /// Alerts inside the window that pause a session
    pub alert_burst: usize,
    pub alert_window_ms: i64,
    /// Interval at which the orchestrator is expected to call `evaluate_session`
    pub check_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            response_time_ms: Threshold {
                warning: 5_000.0,
                error: 10_000.0,
            },
            success_rate: Threshold {
                warning: 70.0,
                error: 50.0,
            },
            memory_mb: Threshold {
                warning: 80.0,
                error: 95.0,
            },
            cpu_percent: Threshold {
                warning: 70.0,
                error: 90.0,
            },
            alert_burst: 5,
            alert_window_ms: 30_000,
            check_interval_ms: 5_000,
        }
    }
}

/// What a single `update_metrics` call produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub new_alerts: Vec<Alert>,
    /// True only on the update that paused the session
    pub paused: bool,
    pub recovery: Option<RecoveryPlan>,
}

/// Read-only view of a session for periodic checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvaluation {
    pub session_id: u64,
    pub status: SessionStatus,
    pub alerts_in_window: usize,
    pub total_alerts: usize,
    pub bottlenecks: Vec<Bottleneck>,
}

impl SessionEvaluation {
    /// Worst bottleneck severity, 0 when nothing is at warning level
    pub fn peak_severity(&self) -> f64 {
        self.bottlenecks.iter().map(|b| b.severity).fold(0.0, f64::max)
    }
}

#[derive(Debug)]
pub struct ExecutionMonitor {
    config: MonitorConfig,
    sessions: SessionRegistry,
    logger: StructuredLogger,
    metrics: EngineMetrics,
}

impl Default for ExecutionMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl ExecutionMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            sessions: SessionRegistry::new(),
            logger: StructuredLogger::new("monitor"),
            metrics: EngineMetrics::new(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn session(&self, id: u64) -> EngineResult<&MonitoringSession> {
        self.sessions.get(id).ok_or(EngineError::UnknownSession(id))
    }

    pub fn start_monitoring(&mut self, execution_ref: impl Into<String>) -> u64 {
        self.start_monitoring_at(execution_ref, Utc::now())
    }

    pub fn start_monitoring_at(&mut self, execution_ref: impl Into<String>, now: DateTime<Utc>) -> u64 {
        let execution_ref = execution_ref.into();
        let id = self.sessions.insert(execution_ref.clone(), now.timestamp_millis());
        self.metrics.set_active_sessions(self.sessions.len() as i64);
        tracing::info!(
            event = "monitoring_started",
            session_id = id,
            execution_ref = %execution_ref,
            "Monitoring session started"
        );
        id
    }

    pub fn update_metrics(&mut self, session_id: u64, update: MetricsUpdate) -> EngineResult<UpdateOutcome> {
        self.update_metrics_at(session_id, update, Utc::now())
    }

    /// Merge `update` into the session, re-check thresholds and apply the
    /// pause and recovery rules.
    pub fn update_metrics_at(
        &mut self,
        session_id: u64,
        update: MetricsUpdate,
        now: DateTime<Utc>,
    ) -> EngineResult<UpdateOutcome> {
        let now_ms = now.timestamp_millis();
        let config = self.config.clone();
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or(EngineError::UnknownSession(session_id))?;

        session.metrics.merge(&update);
        session.updates += 1;

        let new_alerts = session.metrics.check_thresholds(&config, now_ms);
        for alert in &new_alerts {
            self.logger.log_alert(
                session_id,
                alert.kind.as_str(),
                alert.level.as_str(),
                alert.value,
                alert.threshold,
            );
            self.metrics.inc_alert(alert.level.as_str());
        }
        session.alerts.extend(new_alerts.iter().cloned());

        let error_alerts = new_alerts
            .iter()
            .filter(|a| a.level == AlertLevel::Error)
            .count();
        let in_window = session.alerts_since(now_ms - config.alert_window_ms);

        let mut outcome = UpdateOutcome {
            new_alerts,
            ..Default::default()
        };

        if session.status == SessionStatus::Active {
            let reason = if error_alerts > 0 {
                Some("error threshold crossed")
            } else if in_window >= config.alert_burst {
                Some("alert burst")
            } else {
                None
            };
            if let Some(reason) = reason {
                if session.pause(reason, now_ms) {
                    outcome.paused = true;
                    self.logger
                        .log_session_paused(session_id, reason, session.alerts.len());
                }
            }
        }

        if error_alerts > 0 {
            let severity = if error_alerts >= 2 {
                Severity::Critical
            } else {
                Severity::High
            };
            let state = ErrorState {
                severity,
                error: format!("{error_alerts} error threshold(s) crossed"),
                affected_tasks: Vec::new(),
                session_id: Some(session_id),
            };
            let plan = self.emergency_recovery(&state);
            if let Some(session) = self.sessions.get_mut(session_id) {
                session.last_recovery = Some(plan.clone());
            }
            outcome.recovery = Some(plan);
        }

        Ok(outcome)
    }

    /// Stateless check an orchestrator timer runs every few seconds.
    pub fn evaluate_session(&self, session_id: u64, now: DateTime<Utc>) -> EngineResult<SessionEvaluation> {
        let session = self.session(session_id)?;
        let since = now.timestamp_millis() - self.config.alert_window_ms;
        Ok(SessionEvaluation {
            session_id,
            status: session.status,
            alerts_in_window: session.alerts_since(since),
            total_alerts: session.alerts.len(),
            bottlenecks: self.detect_bottlenecks(&session.metrics),
        })
    }

    pub fn stop_monitoring(&mut self, session_id: u64) -> EngineResult<SessionSummary> {
        self.stop_monitoring_at(session_id, Utc::now())
    }

    pub fn stop_monitoring_at(&mut self, session_id: u64, now: DateTime<Utc>) -> EngineResult<SessionSummary> {
        let mut session = self
            .sessions
            .remove(session_id)
            .ok_or(EngineError::UnknownSession(session_id))?;
        session.status = SessionStatus::Completed;
        self.metrics.set_active_sessions(self.sessions.len() as i64);

        let summary = SessionSummary::from_session(session, now.timestamp_millis());
        tracing::info!(
            event = "monitoring_stopped",
            session_id,
            total_alerts = summary.total_alerts,
            was_paused = summary.was_paused,
            duration_ms = summary.duration_ms,
            "Monitoring session completed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap()
    }

    fn response(ms: f64) -> MetricsUpdate {
        MetricsUpdate {
            response_time_ms: Some(ms),
            ..Default::default()
        }
    }

    #[test]
    fn test_response_time_alert_levels() {
        let mut monitor = ExecutionMonitor::default();

        let id = monitor.start_monitoring_at("run-1", t0());
        let out = monitor.update_metrics_at(id, response(12_000.0), t0()).unwrap();
        assert_eq!(out.new_alerts.len(), 1);
        assert_eq!(out.new_alerts[0].level, AlertLevel::Error);
        assert_eq!(out.new_alerts[0].kind, AlertKind::ResponseTime);

        let id = monitor.start_monitoring_at("run-2", t0());
        let out = monitor.update_metrics_at(id, response(6_000.0), t0()).unwrap();
        assert_eq!(out.new_alerts.len(), 1);
        assert_eq!(out.new_alerts[0].level, AlertLevel::Warning);
        assert!(!out.paused);
        assert!(out.recovery.is_none());

        let id = monitor.start_monitoring_at("run-3", t0());
        let out = monitor.update_metrics_at(id, response(1_000.0), t0()).unwrap();
        assert!(out.new_alerts.is_empty());
    }

    #[test]
    fn test_alert_burst_pauses_exactly_once() {
        let mut monitor = ExecutionMonitor::default();
        let id = monitor.start_monitoring_at("run", t0());

        let mut pauses = 0;
        for i in 0..6 {
            let out = monitor
                .update_metrics_at(id, response(6_000.0), t0() + Duration::seconds(i * 2))
                .unwrap();
            if out.paused {
                pauses += 1;
            }
        }

        let session = monitor.session(id).unwrap();
        assert_eq!(pauses, 1);
        assert_eq!(session.status, SessionStatus::Paused);
        assert_eq!(session.alerts.len(), 6);
        assert!(session.paused_at.is_some());
    }

    #[test]
    fn test_spread_out_warnings_do_not_pause() {
        let mut monitor = ExecutionMonitor::default();
        let id = monitor.start_monitoring_at("run", t0());
        for i in 0..6 {
            monitor
                .update_metrics_at(id, response(6_000.0), t0() + Duration::seconds(i * 10))
                .unwrap();
        }
        assert_eq!(monitor.session(id).unwrap().status, SessionStatus::Active);
    }

    #[test]
    fn test_error_alert_pauses_and_recovers() {
        let mut monitor = ExecutionMonitor::default();
        let id = monitor.start_monitoring_at("run", t0());

        let out = monitor.update_metrics_at(id, response(15_000.0), t0()).unwrap();
        assert!(out.paused);
        let plan = out.recovery.unwrap();
        assert_eq!(plan.severity, Severity::High);

        let both = MetricsUpdate {
            response_time_ms: Some(15_000.0),
            success_rate: Some(20.0),
            ..Default::default()
        };
        let out = monitor.update_metrics_at(id, both, t0()).unwrap();
        assert!(!out.paused);
        assert_eq!(out.recovery.unwrap().severity, Severity::Critical);
    }

    #[test]
    fn test_stop_returns_summary_and_forgets_session() {
        let mut monitor = ExecutionMonitor::default();
        let id = monitor.start_monitoring_at("run", t0());
        monitor.update_metrics_at(id, response(6_000.0), t0()).unwrap();

        let summary = monitor
            .stop_monitoring_at(id, t0() + Duration::seconds(90))
            .unwrap();
        assert_eq!(summary.final_status, SessionStatus::Completed);
        assert_eq!(summary.total_alerts, 1);
        assert_eq!(summary.warning_alerts, 1);
        assert_eq!(summary.duration_ms, 90_000);

        assert_eq!(monitor.stop_monitoring(id), Err(EngineError::UnknownSession(id)));
        assert!(monitor.update_metrics(id, response(1.0)).is_err());
    }

    #[test]
    fn test_evaluate_session_reports_bottlenecks() {
        let mut monitor = ExecutionMonitor::default();
        let id = monitor.start_monitoring_at("run", t0());
        let update = MetricsUpdate {
            response_time_ms: Some(7_500.0),
            resource_usage: Some(ResourceSample {
                memory_mb: 40.0,
                cpu_percent: 95.0,
                network_requests: 12,
            }),
            ..Default::default()
        };
        monitor.update_metrics_at(id, update, t0()).unwrap();

        let eval = monitor.evaluate_session(id, t0() + Duration::seconds(5)).unwrap();
        assert_eq!(eval.total_alerts, 1);
        assert_eq!(eval.alerts_in_window, 1);
        assert_eq!(eval.bottlenecks.len(), 2);
        assert_eq!(eval.peak_severity(), 90.0);

        let later = monitor.evaluate_session(id, t0() + Duration::seconds(60)).unwrap();
        assert_eq!(later.alerts_in_window, 0);
    }
}
