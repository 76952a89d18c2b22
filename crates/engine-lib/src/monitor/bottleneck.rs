//! Bottleneck detection over session metrics

use super::{ExecutionMonitor, SessionMetrics};
use serde::{Deserialize, Serialize};

pub const SEVERITY_FLOOR: f64 = 10.0;
pub const SEVERITY_SPAN: f64 = 40.0;
pub const SEVERITY_AT_ERROR: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BottleneckKind {
    Network,
    Memory,
    Cpu,
}

impl BottleneckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BottleneckKind::Network => "network",
            BottleneckKind::Memory => "memory",
            BottleneckKind::Cpu => "cpu",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub kind: BottleneckKind,
    pub value: f64,
    /// 10-90
    pub severity: f64,
}

/// 10 below `warning`, 90 at or above `error`, linear from 10 to 50 between.
pub fn calculate_severity(value: f64, warning: f64, error: f64) -> f64 {
    if value >= error {
        SEVERITY_AT_ERROR
    } else if value >= warning && error > warning {
        SEVERITY_FLOOR + SEVERITY_SPAN * (value - warning) / (error - warning)
    } else {
        SEVERITY_FLOOR
    }
}

impl ExecutionMonitor {
    /// Dimensions at or above their warning level, worst first.
    pub fn detect_bottlenecks(&self, metrics: &SessionMetrics) -> Vec<Bottleneck> {
        let config = self.config();
        let mut samples = Vec::new();
        if let Some(ms) = metrics.response_time_ms {
            samples.push((BottleneckKind::Network, ms, config.response_time_ms));
        }
        if let Some(usage) = metrics.resource_usage {
            samples.push((BottleneckKind::Memory, usage.memory_mb, config.memory_mb));
            samples.push((BottleneckKind::Cpu, usage.cpu_percent, config.cpu_percent));
        }

        let mut found: Vec<Bottleneck> = samples
            .into_iter()
            .filter(|(_, value, t)| *value >= t.warning)
            .map(|(kind, value, t)| Bottleneck {
                kind,
                value,
                severity: calculate_severity(value, t.warning, t.error),
            })
            .collect();
        found.sort_by(|a, b| b.severity.total_cmp(&a.severity));

        for b in &found {
            self.logger.log_bottleneck(b.kind.as_str(), b.value, b.severity);
        }
        found
    }
}
