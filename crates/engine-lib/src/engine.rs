//! Engine coordinator
//!
//! Owns one instance of every component together with the per-source
//! history and the monitoring sessions, and exposes the steps of the
//! profile, plan, execute, monitor loop. All mutation goes through
//! `&mut self`, so one owner drives the engine at a time.

use crate::allocator::{ExecutionPlan, ReallocationReport, ResourceAllocator, TimeBudget};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::executor::{CollectionExecutor, ExecutionOutcome};
use crate::health::ComponentHealth;
use crate::models::{CollectionMethod, ExecutionState, SiteProfile};
use crate::monitor::{
    AdaptiveManager, ExecutionMonitor, ExecutionSignature, MetricsUpdate, SessionEvaluation,
    SessionSummary, UpdateOutcome,
};
use crate::optimizer::{Candidate, EfficiencyOptimizer, OptimizationPlan, PriorityChange, ResourceBudget, ScoredCandidate};
use crate::profiler::{FailureKind, SiteProbe, SiteProfiler};
use crate::quality::{QualityMaximizer, SourceFilterResult};
use crate::selector::{
    estimate_cost, estimate_quality, selection_confidence, MethodSelection, MethodSelector,
    PrioritizationContext, PrioritizedTasks, SourceRequest, StrategyAdjustment, Urgency,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// What the orchestrator wants collected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub sources: Vec<String>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub quality_requirement: f64,
    pub time_budget_ms: u64,
    /// (source, depends on source) pairs
    #[serde(default)]
    pub dependencies: Vec<(String, String)>,
}

/// Everything decided before a run starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPlan {
    pub screening: SourceFilterResult,
    pub tasks: PrioritizedTasks,
    pub time_budget: TimeBudget,
    pub execution: ExecutionPlan,
    pub optimization: OptimizationPlan,
}

impl RunPlan {
    /// Starting state: every planned task in flight, the full budget ahead
    pub fn initial_state(&self) -> ExecutionState {
        let mut current_tasks = self.execution.parallel_tasks.clone();
        current_tasks.extend(self.execution.sequential_tasks.iter().cloned());
        ExecutionState {
            current_tasks,
            time_remaining_ms: Some(self.time_budget.total_ms),
            ..Default::default()
        }
    }
}

/// Corrections applied to a run in one pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub strategy: StrategyAdjustment,
    pub reallocation: ReallocationReport,
    pub priority_changes: Vec<PriorityChange>,
}

pub struct CollectionEngine {
    profiler: SiteProfiler,
    selector: MethodSelector,
    allocator: ResourceAllocator,
    optimizer: EfficiencyOptimizer,
    monitor: ExecutionMonitor,
    quality: QualityMaximizer,
    adaptive: AdaptiveManager,
    profiles: HashMap<String, SiteProfile>,
}

impl CollectionEngine {
    pub fn new(probe: Arc<dyn SiteProbe>, config: EngineConfig) -> Self {
        Self {
            profiler: SiteProfiler::new(probe, config.profiler),
            selector: MethodSelector::new(config.selector),
            allocator: ResourceAllocator::new(config.allocator),
            optimizer: EfficiencyOptimizer::new(config.optimizer),
            monitor: ExecutionMonitor::new(config.monitor),
            quality: QualityMaximizer::new(config.quality),
            adaptive: AdaptiveManager::new(),
            profiles: HashMap::new(),
        }
    }

    pub fn with_adaptive(mut self, adaptive: AdaptiveManager) -> Self {
        self.adaptive = adaptive;
        self
    }

    pub fn profiler(&self) -> &SiteProfiler {
        &self.profiler
    }

    pub fn profiler_mut(&mut self) -> &mut SiteProfiler {
        &mut self.profiler
    }

    pub fn selector(&self) -> &MethodSelector {
        &self.selector
    }

    pub fn allocator(&self) -> &ResourceAllocator {
        &self.allocator
    }

    pub fn optimizer(&self) -> &EfficiencyOptimizer {
        &self.optimizer
    }

    pub fn monitor(&self) -> &ExecutionMonitor {
        &self.monitor
    }

    pub fn quality(&self) -> &QualityMaximizer {
        &self.quality
    }

    pub fn adaptive(&self) -> &AdaptiveManager {
        &self.adaptive
    }

    pub fn profile(&self, url: &str) -> Option<&SiteProfile> {
        self.profiles.get(url)
    }

    /// Profile each source in turn under the configured deadline and cache
    /// the results for planning.
    pub async fn profile_sources(&mut self, urls: &[String]) -> Vec<SiteProfile> {
        let deadline = Duration::from_millis(self.profiler.config().profile_deadline_ms);
        let mut out = Vec::with_capacity(urls.len());
        for url in urls {
            let profile = self.profiler.generate_profile_within(url, deadline).await;
            self.profiles.insert(url.clone(), profile.clone());
            out.push(profile);
        }
        out
    }

    pub fn select_method(&self, profile: &SiteProfile) -> MethodSelection {
        self.selector.analyze_and_select_method(profile)
    }

    /// The primary method and its fallbacks as optimizer candidates, Pareto
    /// filtered and ranked by efficiency.
    pub fn rank_methods(&self, profile: &SiteProfile) -> Vec<ScoredCandidate> {
        let selection = self.selector.analyze_and_select_method(profile);
        let candidates: Vec<Candidate> = std::iter::once(selection.primary_method)
            .chain(selection.fallback_methods.iter().copied())
            .map(|method: CollectionMethod| {
                let cost = estimate_cost(method, profile);
                Candidate::new(
                    method.as_str(),
                    estimate_quality(method, profile).overall,
                    cost.time_ms,
                    cost.memory_mb,
                    selection_confidence(method, profile) / 100.0,
                )
            })
            .collect();
        self.optimizer.rank_candidates(&candidates)
    }

    /// Screen, prioritize, budget and order a run. A url listed more than
    /// once yields a single task.
    pub fn plan_run(&self, request: &RunRequest, now: DateTime<Utc>) -> EngineResult<RunPlan> {
        let mut seen = HashSet::new();
        let sources: Vec<String> = request
            .sources
            .iter()
            .filter(|url| seen.insert(url.as_str()))
            .cloned()
            .collect();
        if sources.len() < request.sources.len() {
            tracing::warn!(
                event = "duplicate_sources",
                requested = request.sources.len(),
                unique = sources.len(),
                "Duplicate source urls collapsed"
            );
        }

        let screening = self
            .quality
            .filter_low_quality_sources(&sources, self.profiler.history(), now);

        let kept: Vec<&String> = sources
            .iter()
            .filter(|url| {
                screening
                    .approved
                    .iter()
                    .chain(&screening.conditional)
                    .any(|a| &a.url == *url)
            })
            .collect();

        let context = PrioritizationContext {
            sources: kept
                .iter()
                .map(|url| match self.profiles.get(*url) {
                    Some(profile) => SourceRequest::with_profile(profile.clone()),
                    None => SourceRequest::new(url.as_str()),
                })
                .collect(),
            urgency: request.urgency,
            quality_requirement: request.quality_requirement,
        };
        let mut tasks = self.selector.prioritize_collection_methods(&context);
        self.attach_dependencies(&mut tasks, request)?;

        let ordered = tasks.ordered_tasks();
        let time_budget = self.allocator.allocate_time_budget(request.time_budget_ms, &ordered);
        let execution = self.allocator.optimize_execution_plan(&ordered)?;

        let budget = ResourceBudget {
            time_ms: time_budget.total_ms.saturating_sub(time_budget.buffer_ms),
            memory_mb: self.allocator.config().memory_budget_mb,
            max_concurrency: self.allocator.config().max_concurrency,
        };
        let optimization =
            self.quality
                .maximize_value_under_constraints(&ordered, request.quality_requirement, &budget);

        tracing::info!(
            event = "run_plan_ready",
            requested = request.sources.len(),
            rejected = screening.rejected.len(),
            tasks = ordered.len(),
            concurrency = execution.concurrency_limit,
            estimated_total_ms = execution.estimated_total_ms,
            "Collection run plan ready"
        );

        Ok(RunPlan {
            screening,
            tasks,
            time_budget,
            execution,
            optimization,
        })
    }

    /// Translate url-level dependencies into task ids. Dependencies on
    /// screened-out sources are dropped; urls outside the request are an error.
    fn attach_dependencies(&self, tasks: &mut PrioritizedTasks, request: &RunRequest) -> EngineResult<()> {
        if request.dependencies.is_empty() {
            return Ok(());
        }
        let ids: HashMap<String, String> = tasks
            .ordered_tasks()
            .into_iter()
            .map(|t| (t.source_url, t.id))
            .collect();

        for (source, dependency) in &request.dependencies {
            for url in [source, dependency] {
                if !request.sources.contains(url) {
                    return Err(EngineError::UnknownDependency {
                        task: source.clone(),
                        dependency: url.clone(),
                    });
                }
            }
            let (Some(task_id), Some(dep_id)) = (ids.get(source), ids.get(dependency)) else {
                continue;
            };
            for task in tasks
                .high_priority
                .iter_mut()
                .chain(tasks.medium_priority.iter_mut())
                .chain(tasks.low_priority.iter_mut())
                .filter(|t| &t.id == task_id)
            {
                if !task.dependencies.contains(dep_id) {
                    task.dependencies.push(dep_id.clone());
                }
            }
        }
        Ok(())
    }

    /// Fold one task outcome back into the run state, the history store and
    /// the adaptive manager. Returns false if the task was not in flight.
    pub fn record_outcome(
        &mut self,
        state: &mut ExecutionState,
        task_id: &str,
        outcome: &ExecutionOutcome,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(task) = state.current_tasks.iter().find(|t| t.id == task_id).cloned() else {
            return false;
        };
        state.settle_task(task_id, outcome.success);

        let at = now.timestamp();
        let history = self.profiler.history_mut();
        let signature = ExecutionSignature::new(task.method, &task.source_url, now);

        if outcome.success {
            history.record_success(&task.source_url, outcome.elapsed_ms, at);
            if let Some(q) = outcome.quality {
                history.record_quality(&task.source_url, q, task.method, at);
                state.quality_samples += 1;
                let n = state.quality_samples as f64;
                state.quality_achieved = Some(match state.quality_achieved {
                    Some(prev) if state.quality_samples > 1 => prev + (q - prev) / n,
                    _ => q,
                });
            }
        } else {
            let kind = outcome.failure.unwrap_or(FailureKind::HttpError);
            history.record_failure(&task.source_url, kind, None, at);
            self.adaptive.record_failure(kind);
        }
        self.adaptive
            .record_execution(signature, outcome.quality.unwrap_or(0.0), outcome.success);

        tracing::debug!(
            event = "outcome_recorded",
            task_id = %task_id,
            url = %task.source_url,
            success = outcome.success,
            data_items = outcome.data_items,
            "Task outcome recorded"
        );
        true
    }

    /// Run one in-flight task through `executor` and record the result.
    pub async fn execute_task(
        &mut self,
        executor: &dyn CollectionExecutor,
        state: &mut ExecutionState,
        task_id: &str,
    ) -> Option<ExecutionOutcome> {
        let task = state.current_tasks.iter().find(|t| t.id == task_id).cloned()?;
        let outcome = match executor.execute(&task).await {
            Ok(outcome) => outcome,
            Err(e) => ExecutionOutcome::failed(FailureKind::Unreachable, format!("{e:#}")),
        };
        self.record_outcome(state, task_id, &outcome, Utc::now());
        Some(outcome)
    }

    /// One corrective pass over a running collection.
    pub fn rebalance(
        &self,
        state: &mut ExecutionState,
        observed_quality: &HashMap<String, f64>,
    ) -> RebalanceReport {
        let strategy = self.selector.adjust_strategy_dynamically(state);
        let reallocation = self.allocator.reallocate_resources(state);
        let priority_changes = self
            .optimizer
            .adjust_priorities_dynamically(&mut state.current_tasks, observed_quality);
        RebalanceReport {
            strategy,
            reallocation,
            priority_changes,
        }
    }

    pub fn start_monitoring(&mut self, execution_ref: impl Into<String>) -> u64 {
        self.monitor.start_monitoring(execution_ref)
    }

    pub fn update_metrics(&mut self, session_id: u64, update: MetricsUpdate) -> EngineResult<UpdateOutcome> {
        self.monitor.update_metrics(session_id, update)
    }

    pub fn evaluate_session(&self, session_id: u64, now: DateTime<Utc>) -> EngineResult<SessionEvaluation> {
        self.monitor.evaluate_session(session_id, now)
    }

    pub fn stop_monitoring(&mut self, session_id: u64) -> EngineResult<SessionSummary> {
        self.monitor.stop_monitoring(session_id)
    }

    pub fn monitor_health(&self) -> ComponentHealth {
        ComponentHealth::from_sessions(self.monitor.sessions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionTask, ResourceUsage};
    use crate::profiler::{ProbeRequest, ProbeResponse, ProfilerConfig};
    use async_trait::async_trait;
    use chrono::TimeZone;

    /// Serves the same static page for every request
    struct StaticProbe;

    const PAGE: &str = r#"<html><body><article><h1>Markets</h1><p>Stocks rose.</p></article></body></html>"#;

    #[async_trait]
    impl SiteProbe for StaticProbe {
        async fn fetch(&self, _url: &str, _request: &ProbeRequest) -> anyhow::Result<ProbeResponse> {
            Ok(ProbeResponse {
                status: 200,
                headers: Vec::new(),
                body: PAGE.to_string(),
                elapsed_ms: 200,
            })
        }
    }

    struct ScriptedExecutor;

    #[async_trait]
    impl CollectionExecutor for ScriptedExecutor {
        async fn execute(&self, task: &CollectionTask) -> anyhow::Result<ExecutionOutcome> {
            if task.source_url.contains("broken") {
                anyhow::bail!("connection refused");
            }
            Ok(ExecutionOutcome::succeeded(12, 80.0, 900))
        }
    }

    fn engine() -> CollectionEngine {
        let config = EngineConfig {
            profiler: ProfilerConfig {
                sample_spacing_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        CollectionEngine::new(Arc::new(StaticProbe), config)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap()
    }

    fn request(sources: &[&str]) -> RunRequest {
        RunRequest {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            urgency: Urgency::Normal,
            quality_requirement: 85.0,
            time_budget_ms: 120_000,
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn test_plan_drops_rejected_sources() {
        let engine = engine();
        let req = request(&[
            "https://www.reuters.com/markets",
            "https://example.org/forex",
            "https://example.org/about",
        ]);
        let plan = engine.plan_run(&req, now()).unwrap();

        // about scores 50 with no history
        assert_eq!(plan.screening.rejected.len(), 1);
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.execution.task_count(), 2);
        assert!(plan.time_budget.allocated_ms() + plan.time_budget.buffer_ms <= 120_000);
        assert_eq!(plan.optimization.quality_targets.min, 85.0);

        let state = plan.initial_state();
        assert_eq!(state.current_tasks.len(), 2);
        assert_eq!(state.time_remaining_ms, Some(120_000));
    }

    #[test]
    fn test_dependencies_become_sequential() {
        let engine = engine();
        let mut req = request(&["https://www.reuters.com/markets", "https://www.bloomberg.com/fx"]);
        req.dependencies = vec![(
            "https://www.bloomberg.com/fx".to_string(),
            "https://www.reuters.com/markets".to_string(),
        )];
        let plan = engine.plan_run(&req, now()).unwrap();
        assert_eq!(plan.execution.parallel_tasks.len(), 1);
        assert_eq!(plan.execution.sequential_tasks.len(), 1);
        assert_eq!(plan.execution.sequential_tasks[0].source_url, "https://www.bloomberg.com/fx");

        req.dependencies = vec![(
            "https://www.bloomberg.com/fx".to_string(),
            "https://nowhere.example".to_string(),
        )];
        assert!(matches!(
            engine.plan_run(&req, now()),
            Err(EngineError::UnknownDependency { .. })
        ));
    }

    #[tokio::test]
    async fn test_profiles_feed_planning() {
        let mut engine = engine();
        let urls = vec!["https://www.reuters.com/markets".to_string()];
        let profiles = engine.profile_sources(&urls).await;
        assert_eq!(profiles[0].optimal_method, CollectionMethod::SimpleHttp);
        assert!(engine.profile(&urls[0]).is_some());

        let ranked = engine.rank_methods(&profiles[0]);
        assert!(!ranked.is_empty());

        let plan = engine.plan_run(&request(&["https://www.reuters.com/markets"]), now()).unwrap();
        assert_eq!(plan.tasks.ordered_tasks()[0].method, CollectionMethod::SimpleHttp);
    }

    #[tokio::test]
    async fn test_execute_and_record_outcomes() {
        let mut engine = engine();
        let mut state = ExecutionState {
            current_tasks: vec![
                CollectionTask::new("ok", "https://ok.example.org", CollectionMethod::SimpleHttp, 50.0, 1_000),
                CollectionTask::new("bad", "https://broken.example.org", CollectionMethod::Hybrid, 50.0, 1_000),
            ],
            time_remaining_ms: Some(60_000),
            ..Default::default()
        };

        let ok = engine.execute_task(&ScriptedExecutor, &mut state, "ok").await.unwrap();
        assert!(ok.success);
        let bad = engine.execute_task(&ScriptedExecutor, &mut state, "bad").await.unwrap();
        assert!(!bad.success);
        assert!(engine.execute_task(&ScriptedExecutor, &mut state, "ok").await.is_none());

        assert_eq!(state.completed_tasks.len(), 1);
        assert_eq!(state.failed_tasks.len(), 1);
        assert_eq!(state.quality_achieved, Some(80.0));

        let history = engine.profiler().history();
        assert_eq!(history.get("https://ok.example.org").unwrap().quality_scores, vec![80.0]);
        assert_eq!(history.get("https://broken.example.org").unwrap().successes, 0);
        assert_eq!(engine.adaptive().top_failures()[0].kind, FailureKind::Unreachable);
    }

    #[test]
    fn test_quality_mean_skips_outcomes_without_score() {
        let mut engine = engine();
        let mut state = ExecutionState {
            current_tasks: vec![
                CollectionTask::new("a", "https://a.example.org", CollectionMethod::SimpleHttp, 50.0, 1_000),
                CollectionTask::new("b", "https://b.example.org", CollectionMethod::SimpleHttp, 50.0, 1_000),
                CollectionTask::new("c", "https://c.example.org", CollectionMethod::SimpleHttp, 50.0, 1_000),
            ],
            ..Default::default()
        };
        let unscored = ExecutionOutcome {
            success: true,
            data_items: 3,
            elapsed_ms: 500,
            ..Default::default()
        };

        assert!(engine.record_outcome(&mut state, "a", &unscored, now()));
        assert_eq!(state.quality_achieved, None);
        assert!(engine.record_outcome(&mut state, "b", &ExecutionOutcome::succeeded(3, 80.0, 500), now()));
        assert_eq!(state.quality_achieved, Some(80.0));
        assert!(engine.record_outcome(&mut state, "c", &ExecutionOutcome::succeeded(3, 60.0, 500), now()));
        assert_eq!(state.quality_achieved, Some(70.0));
        assert_eq!(state.quality_samples, 2);
        assert_eq!(state.completed_tasks.len(), 3);
    }

    #[test]
    fn test_duplicate_sources_plan_one_task() {
        let engine = engine();
        let mut req = request(&[
            "https://www.reuters.com/markets",
            "https://www.bloomberg.com/fx",
            "https://www.reuters.com/markets",
        ]);
        req.dependencies = vec![(
            "https://www.bloomberg.com/fx".to_string(),
            "https://www.reuters.com/markets".to_string(),
        )];
        let plan = engine.plan_run(&req, now()).unwrap();

        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.screening.approved.len() + plan.screening.conditional.len(), 2);
        assert_eq!(plan.execution.parallel_tasks.len(), 1);
        assert_eq!(plan.execution.sequential_tasks.len(), 1);
        let reuters = &plan.execution.parallel_tasks[0];
        assert_eq!(reuters.source_url, "https://www.reuters.com/markets");
        assert_eq!(plan.execution.sequential_tasks[0].dependencies, vec![reuters.id.clone()]);
    }

    #[test]
    fn test_rebalance_and_monitoring() {
        let mut engine = engine();
        let mut state = ExecutionState {
            current_tasks: vec![CollectionTask::new(
                "slow",
                "https://slow.example.org",
                CollectionMethod::SimpleHttp,
                50.0,
                9_000,
            )],
            resources_used: ResourceUsage {
                time_ms: 50_000,
                memory_mb: 100.0,
                cpu_percent: 10.0,
            },
            time_remaining_ms: Some(10_000),
            ..Default::default()
        };
        let observed = HashMap::from([("slow".to_string(), 40.0)]);
        let report = engine.rebalance(&mut state, &observed);

        // shrink, upgrade and boost all fire on an idle, late run
        assert_eq!(report.reallocation.actions.len(), 3);
        assert_eq!(state.current_tasks[0].estimated_time_ms, 6_300);
        assert_eq!(state.current_tasks[0].method, CollectionMethod::Hybrid);
        assert_eq!(report.priority_changes.len(), 1);
        assert_eq!(state.current_tasks[0].priority, 50.0);

        let id = engine.start_monitoring("run");
        let out = engine
            .update_metrics(
                id,
                MetricsUpdate {
                    success_rate: Some(30.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(out.paused);
        assert!(engine.evaluate_session(id, Utc::now()).is_ok());
        assert!(engine.monitor_health().message.is_some());

        let summary = engine.stop_monitoring(id).unwrap();
        assert_eq!(summary.error_alerts, 1);
        assert!(engine.monitor_health().message.is_none());
    }
}
