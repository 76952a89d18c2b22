//! Engine configuration

use crate::allocator::AllocatorConfig;
use crate::monitor::MonitorConfig;
use crate::optimizer::OptimizerConfig;
use crate::profiler::ProfilerConfig;
use crate::quality::QualityConfig;
use crate::selector::SelectorConfig;
use serde::{Deserialize, Serialize};

/// Per-component settings. Every section may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub profiler: ProfilerConfig,
    pub selector: SelectorConfig,
    pub allocator: AllocatorConfig,
    pub optimizer: OptimizerConfig,
    pub monitor: MonitorConfig,
    pub quality: QualityConfig,
}

impl EngineConfig {
    /// Apply one memory budget to every component that reasons about memory
    pub fn with_memory_budget(mut self, memory_budget_mb: f64) -> Self {
        self.selector.memory_budget_mb = memory_budget_mb;
        self.allocator.memory_budget_mb = memory_budget_mb;
        self.quality.memory_budget_mb = memory_budget_mb;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"allocator": {"max_concurrency": 8}, "monitor": {"alert_burst": 3}}"#,
        )
        .unwrap();
        assert_eq!(config.allocator.max_concurrency, 8);
        assert_eq!(config.allocator.buffer_ratio, 0.15);
        assert_eq!(config.monitor.alert_burst, 3);
        assert_eq!(config.monitor.response_time_ms.error, 10_000.0);
        assert_eq!(config.profiler.sample_count, 3);
    }

    #[test]
    fn test_memory_budget_fans_out() {
        let config = EngineConfig::default().with_memory_budget(2048.0);
        assert_eq!(config.selector.memory_budget_mb, 2048.0);
        assert_eq!(config.allocator.memory_budget_mb, 2048.0);
        assert_eq!(config.quality.memory_budget_mb, 2048.0);
    }
}
