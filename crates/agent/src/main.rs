//! Collection Agent - host process for the adaptive collection engine
//!
//! Serves health, metrics and the startup plan, and runs one planning pass
//! over the configured sources at startup.

use anyhow::Result;
use collection_agent::{api, config::AgentConfig, planning};
use engine_lib::profiler::HttpProbe;
use engine_lib::{CollectionEngine, EngineMetrics, HealthRegistry, StructuredLogger};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting collection-agent");

    let config = AgentConfig::load()?;
    info!(
        sources = config.sources.len(),
        api_port = config.api_port,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_engine().await;

    let metrics = EngineMetrics::new();
    let logger = StructuredLogger::new("agent");
    logger.log_startup(AGENT_VERSION, config.sources.len());

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state.clone()));

    let probe = HttpProbe::new(Duration::from_millis(
        config.engine.profiler.accessibility_timeout_ms,
    ))?;
    let mut engine = CollectionEngine::new(Arc::new(probe), config.engine.clone());

    match planning::startup_pass(&mut engine, &config, &health_registry).await {
        Ok(plan) => app_state.publish_plan(plan).await,
        Err(e) => error!(error = %format!("{e:#}"), "Startup planning pass failed"),
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server stopped"),
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    logger.log_shutdown("API server failed");
                }
                Err(e) => {
                    error!(error = %e, "API server task panicked");
                    logger.log_shutdown("API server task panicked");
                }
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
