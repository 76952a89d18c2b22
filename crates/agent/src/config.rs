//! Agent configuration

use anyhow::{Context, Result};
use engine_lib::selector::Urgency;
use engine_lib::{EngineConfig, RunRequest};
use serde::Deserialize;

/// File read from the working directory when present
pub const CONFIG_FILE: &str = "collection-agent";

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Sources planned on startup
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,

    #[serde(default)]
    pub urgency: Urgency,

    /// Minimum acceptable quality, 0-100
    #[serde(default = "default_quality_requirement")]
    pub quality_requirement: f64,

    /// Skip probing and plan from url estimates only
    #[serde(default)]
    pub skip_profiling: bool,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_api_port() -> u16 {
    8080
}

fn default_time_budget_ms() -> u64 {
    300_000
}

fn default_quality_requirement() -> f64 {
    70.0
}

impl AgentConfig {
    /// Load from an optional `collection-agent.toml` and `AGENT__*` variables.
    /// `AGENT__SOURCES` takes a comma separated list.
    pub fn load() -> Result<Self> {
        Self::from_builder(
            config::Config::builder()
                .add_source(config::File::with_name(CONFIG_FILE).required(false))
                .add_source(
                    config::Environment::with_prefix("AGENT")
                        .prefix_separator("__")
                        .separator("__")
                        .list_separator(",")
                        .with_list_parse_key("sources")
                        .try_parsing(true),
                ),
        )
    }

    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        builder
            .build()
            .context("failed to read agent configuration")?
            .try_deserialize()
            .context("invalid agent configuration")
    }

    pub fn run_request(&self) -> RunRequest {
        RunRequest {
            sources: self.sources.clone(),
            urgency: self.urgency,
            quality_requirement: self.quality_requirement,
            time_budget_ms: self.time_budget_ms,
            dependencies: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn from_toml(toml: &str) -> Result<AgentConfig> {
        AgentConfig::from_builder(
            config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = from_toml("").unwrap();
        assert_eq!(config.api_port, 8080);
        assert!(config.sources.is_empty());
        assert_eq!(config.time_budget_ms, 300_000);
        assert_eq!(config.urgency, Urgency::Normal);
        assert_eq!(config.engine.allocator.max_concurrency, 5);
    }

    #[test]
    fn test_nested_engine_sections() {
        let config = from_toml(
            r#"
            api_port = 9100
            sources = ["https://www.reuters.com/markets", "https://www.fxstreet.com"]
            urgency = "high"
            quality_requirement = 85.0

            [engine.allocator]
            max_concurrency = 3

            [engine.monitor.response_time_ms]
            warning = 4000.0
            error = 8000.0
            "#,
        )
        .unwrap();

        assert_eq!(config.api_port, 9100);
        assert_eq!(config.engine.allocator.max_concurrency, 3);
        assert_eq!(config.engine.monitor.response_time_ms.error, 8000.0);
        assert_eq!(config.engine.monitor.success_rate.warning, 70.0);

        let request = config.run_request();
        assert_eq!(request.sources.len(), 2);
        assert_eq!(request.urgency, Urgency::High);
        assert_eq!(request.quality_requirement, 85.0);
    }

    #[test]
    fn test_bad_value_is_an_error() {
        assert!(from_toml(r#"api_port = "not a port""#).is_err());
    }
}
