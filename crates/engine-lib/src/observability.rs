//! Observability infrastructure for the collection engine
//!
//! Provides:
//! - Prometheus metrics (profile latency, method selections, alerts, recoveries, sessions)
//! - Structured JSON-friendly logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

/// Histogram buckets for probe latency (in seconds). Profiles span several
/// network round trips plus sample spacing, so the range is wide.
const PROFILE_LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    profile_latency_seconds: Histogram,
    profile_fallbacks: IntCounter,
    method_selections: IntCounterVec,
    alerts_raised: IntCounterVec,
    recoveries_planned: IntCounterVec,
    reallocations: IntCounter,
    active_sessions: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            profile_latency_seconds: register_histogram!(
                "collection_engine_profile_latency_seconds",
                "Time spent probing a source to build its site profile",
                PROFILE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register profile_latency_seconds"),

            profile_fallbacks: register_int_counter!(
                "collection_engine_profile_fallbacks_total",
                "Profiles that fell back to the conservative default after a probe failure"
            )
            .expect("Failed to register profile_fallbacks"),

            method_selections: register_int_counter_vec!(
                "collection_engine_method_selections_total",
                "Primary collection methods chosen by the selector",
                &["method"]
            )
            .expect("Failed to register method_selections"),

            alerts_raised: register_int_counter_vec!(
                "collection_engine_alerts_total",
                "Threshold alerts raised by monitoring sessions",
                &["level"]
            )
            .expect("Failed to register alerts_raised"),

            recoveries_planned: register_int_counter_vec!(
                "collection_engine_recoveries_total",
                "Emergency recovery plans produced, by severity",
                &["severity"]
            )
            .expect("Failed to register recoveries_planned"),

            reallocations: register_int_counter!(
                "collection_engine_reallocations_total",
                "Mid-run resource reallocations that changed at least one task"
            )
            .expect("Failed to register reallocations"),

            active_sessions: register_int_gauge!(
                "collection_engine_active_sessions",
                "Monitoring sessions currently registered"
            )
            .expect("Failed to register active_sessions"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying collectors.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics").finish()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_profile_latency(&self, duration_secs: f64) {
        self.inner().profile_latency_seconds.observe(duration_secs);
    }

    pub fn inc_profile_fallbacks(&self) {
        self.inner().profile_fallbacks.inc();
    }

    pub fn inc_method_selected(&self, method: &str) {
        self.inner()
            .method_selections
            .with_label_values(&[method])
            .inc();
    }

    pub fn inc_alert(&self, level: &str) {
        self.inner().alerts_raised.with_label_values(&[level]).inc();
    }

    pub fn inc_recovery(&self, severity: &str) {
        self.inner()
            .recoveries_planned
            .with_label_values(&[severity])
            .inc();
    }

    pub fn inc_reallocations(&self) {
        self.inner().reallocations.inc();
    }

    pub fn set_active_sessions(&self, count: i64) {
        self.inner().active_sessions.set(count);
    }
}

/// Structured logger for engine events
///
/// Every event carries an `event` field so a telemetry sink can route on it.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn log_profile(
        &self,
        url: &str,
        method: &str,
        requires_js: bool,
        has_anti_bot: bool,
        content_quality: f64,
        relevance: f64,
        avg_response_ms: f64,
    ) {
        info!(
            event = "site_profiled",
            component = %self.component,
            url = %url,
            optimal_method = %method,
            requires_js = requires_js,
            has_anti_bot = has_anti_bot,
            content_quality = content_quality,
            relevance = relevance,
            avg_response_ms = avg_response_ms,
            "Site profile generated"
        );
    }

    pub fn log_profile_fallback(&self, url: &str, reason: &str) {
        warn!(
            event = "site_profile_fallback",
            component = %self.component,
            url = %url,
            reason = %reason,
            "Probe failed, using conservative fallback profile"
        );
    }

    pub fn log_method_selected(&self, url: &str, method: &str, fallbacks: usize, confidence: f64) {
        debug!(
            event = "method_selected",
            component = %self.component,
            url = %url,
            method = %method,
            fallbacks = fallbacks,
            confidence = confidence,
            "Collection method selected"
        );
    }

    pub fn log_alert(&self, session_id: u64, kind: &str, level: &str, value: f64, threshold: f64) {
        match level {
            "error" => {
                error!(
                    event = "threshold_alert",
                    component = %self.component,
                    session_id = session_id,
                    kind = %kind,
                    level = %level,
                    value = value,
                    threshold = threshold,
                    "Error threshold crossed"
                );
            }
            _ => {
                warn!(
                    event = "threshold_alert",
                    component = %self.component,
                    session_id = session_id,
                    kind = %kind,
                    level = %level,
                    value = value,
                    threshold = threshold,
                    "Warning threshold crossed"
                );
            }
        }
    }

    pub fn log_session_paused(&self, session_id: u64, reason: &str, alert_count: usize) {
        warn!(
            event = "session_paused",
            component = %self.component,
            session_id = session_id,
            reason = %reason,
            alert_count = alert_count,
            "Monitoring session paused"
        );
    }

    pub fn log_bottleneck(&self, kind: &str, value: f64, severity: f64) {
        info!(
            event = "bottleneck_detected",
            component = %self.component,
            kind = %kind,
            value = value,
            severity = severity,
            "Bottleneck detected"
        );
    }

    pub fn log_recovery(&self, severity: &str, actions: &[&str], estimated_recovery_ms: u64) {
        let actions = actions.join(",");
        warn!(
            event = "recovery_planned",
            component = %self.component,
            severity = %severity,
            actions = %actions,
            estimated_recovery_ms = estimated_recovery_ms,
            "Emergency recovery plan produced"
        );
    }

    pub fn log_reallocation(
        &self,
        time_efficiency: f64,
        quality_performance: f64,
        success_rate: f64,
        actions: usize,
    ) {
        info!(
            event = "resources_reallocated",
            component = %self.component,
            time_efficiency = time_efficiency,
            quality_performance = quality_performance,
            success_rate = success_rate,
            actions = actions,
            "Resources reallocated mid-run"
        );
    }

    pub fn log_plan(&self, tasks: usize, parallel: usize, sequential: usize, estimated_total_ms: u64) {
        info!(
            event = "run_planned",
            component = %self.component,
            tasks = tasks,
            parallel = parallel,
            sequential = sequential,
            estimated_total_ms = estimated_total_ms,
            "Collection run planned"
        );
    }

    pub fn log_startup(&self, version: &str, sources: usize) {
        info!(
            event = "agent_started",
            component = %self.component,
            agent_version = %version,
            sources = sources,
            "Collection agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            component = %self.component,
            reason = %reason,
            "Collection agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_metrics_handles_share_registry() {
        let metrics = EngineMetrics::new();
        let clone = metrics.clone();

        metrics.observe_profile_latency(0.3);
        metrics.inc_profile_fallbacks();
        metrics.inc_method_selected("hybrid");
        clone.inc_alert("warning");
        clone.inc_recovery("high");
        clone.inc_reallocations();
        clone.set_active_sessions(2);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "collection_engine_method_selections_total"));
    }

    #[test]
    fn test_structured_logger_component() {
        let logger = StructuredLogger::new("monitor");
        assert_eq!(logger.component(), "monitor");
    }
}
