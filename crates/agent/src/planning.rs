//! Startup planning pass

use crate::config::AgentConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use engine_lib::health::components;
use engine_lib::{CollectionEngine, HealthRegistry, RunPlan};
use tracing::{info, warn};

/// Profile and plan the configured sources once, reporting the outcome to
/// the health registry. The agent turns ready only after a plan exists.
pub async fn startup_pass(
    engine: &mut CollectionEngine,
    config: &AgentConfig,
    health: &HealthRegistry,
) -> Result<RunPlan> {
    if !config.skip_profiling && !config.sources.is_empty() {
        let profiles = engine.profile_sources(&config.sources).await;
        let fallbacks = profiles.iter().filter(|p| p.fallback).count();
        if fallbacks > 0 {
            warn!(
                event = "profile_fallbacks",
                fallbacks,
                sources = profiles.len(),
                "Some sources could not be profiled"
            );
            health
                .set_degraded(
                    components::PROFILER,
                    format!("{fallbacks} of {} sources fell back to conservative profiles", profiles.len()),
                )
                .await;
        }
    }

    let plan = match engine.plan_run(&config.run_request(), Utc::now()) {
        Ok(plan) => plan,
        Err(e) => {
            health.set_unhealthy(components::PLANNER, e.to_string()).await;
            return Err(e).context("startup planning failed");
        }
    };

    info!(
        event = "startup_plan",
        approved = plan.screening.approved.len(),
        conditional = plan.screening.conditional.len(),
        rejected = plan.screening.rejected.len(),
        parallel = plan.execution.parallel_tasks.len(),
        sequential = plan.execution.sequential_tasks.len(),
        buffer_ms = plan.time_budget.buffer_ms,
        "Startup planning pass complete"
    );

    health.report_sessions(engine.monitor().sessions()).await;
    health.set_ready(true).await;
    Ok(plan)
}
