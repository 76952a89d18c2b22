//! Mid-flight reallocation

use super::ResourceAllocator;
use crate::models::{clamp_score, CollectionMethod, ExecutionState};
use crate::signals::ExecutionSignals;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReallocationSignals {
    pub time_efficiency: f64,
    pub quality_performance: f64,
    pub success_rate: f64,
    pub resource_utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReallocationAction {
    ShrinkTask {
        task_id: String,
        from_ms: u64,
        to_ms: u64,
    },
    UpgradeMethod {
        task_id: String,
        from: CollectionMethod,
        to: CollectionMethod,
    },
    BoostPriority {
        task_id: String,
        from: f64,
        to: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReallocationReport {
    pub signals: ReallocationSignals,
    pub actions: Vec<ReallocationAction>,
}

impl ResourceAllocator {
    /// Rebalance in-flight tasks of `state` and return the actions applied.
    pub fn reallocate_resources(&self, state: &mut ExecutionState) -> ReallocationReport {
        let config = self.config();
        let derived = ExecutionSignals::derive(state, config.memory_budget_mb);
        let signals = ReallocationSignals {
            time_efficiency: derived.time_efficiency,
            quality_performance: derived.quality,
            success_rate: derived.success_rate,
            resource_utilization: derived.resource_utilization,
        };
        let mut actions = Vec::new();

        if signals.time_efficiency < config.time_efficiency_threshold {
            for task in state
                .current_tasks
                .iter_mut()
                .filter(|t| t.estimated_time_ms > config.long_task_ms)
            {
                let from_ms = task.estimated_time_ms;
                let to_ms = (from_ms as f64 * (1.0 - config.shrink_ratio)).round() as u64;
                task.estimated_time_ms = to_ms;
                actions.push(ReallocationAction::ShrinkTask {
                    task_id: task.id.clone(),
                    from_ms,
                    to_ms,
                });
            }
        }

        if signals.quality_performance < config.quality_threshold {
            for task in state
                .current_tasks
                .iter_mut()
                .filter(|t| t.method == CollectionMethod::SimpleHttp)
            {
                task.method = CollectionMethod::Hybrid;
                actions.push(ReallocationAction::UpgradeMethod {
                    task_id: task.id.clone(),
                    from: CollectionMethod::SimpleHttp,
                    to: CollectionMethod::Hybrid,
                });
            }
        }

        if signals.success_rate < config.success_rate_threshold {
            let mut ranked: Vec<usize> = (0..state.current_tasks.len()).collect();
            ranked.sort_by(|&a, &b| {
                let (a, b) = (&state.current_tasks[a], &state.current_tasks[b]);
                b.priority
                    .partial_cmp(&a.priority)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
            for i in ranked.into_iter().take(config.boost_count) {
                let task = &mut state.current_tasks[i];
                let from = task.priority;
                task.priority = clamp_score(from + config.priority_boost);
                actions.push(ReallocationAction::BoostPriority {
                    task_id: task.id.clone(),
                    from,
                    to: task.priority,
                });
            }
        }

        if !actions.is_empty() {
            self.metrics.inc_reallocations();
        }
        self.logger.log_reallocation(
            signals.time_efficiency,
            signals.quality_performance,
            signals.success_rate,
            actions.len(),
        );

        ReallocationReport { signals, actions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionTask, ResourceUsage};

    fn task(id: &str, method: CollectionMethod, priority: f64, ms: u64) -> CollectionTask {
        CollectionTask::new(id, "https://example.com", method, priority, ms)
    }

    #[test]
    fn test_degraded_run_triggers_all_actions() {
        let allocator = ResourceAllocator::default();
        let mut state = ExecutionState {
            current_tasks: vec![
                task("slow", CollectionMethod::Hybrid, 40.0, 10_000),
                task("plain", CollectionMethod::SimpleHttp, 90.0, 2_000),
                task("mid", CollectionMethod::SimpleHttp, 60.0, 3_000),
                task("tail", CollectionMethod::PlaywrightStealth, 10.0, 1_000),
            ],
            completed_tasks: vec![task("ok", CollectionMethod::SimpleHttp, 50.0, 1_000)],
            failed_tasks: vec![
                task("f1", CollectionMethod::SimpleHttp, 50.0, 1_000),
                task("f2", CollectionMethod::SimpleHttp, 50.0, 1_000),
            ],
            resources_used: ResourceUsage {
                time_ms: 80_000,
                memory_mb: 200.0,
                cpu_percent: 20.0,
            },
            time_remaining_ms: Some(20_000),
            quality_achieved: Some(45.0),
            ..Default::default()
        };

        let report = allocator.reallocate_resources(&mut state);

        assert!(report.signals.time_efficiency < 60.0);
        assert_eq!(state.current_tasks[0].estimated_time_ms, 7_000);
        assert_eq!(state.current_tasks[1].method, CollectionMethod::Hybrid);
        assert_eq!(state.current_tasks[2].method, CollectionMethod::Hybrid);
        // top three by priority: plain, mid, slow
        assert_eq!(state.current_tasks[1].priority, 100.0);
        assert_eq!(state.current_tasks[2].priority, 80.0);
        assert_eq!(state.current_tasks[0].priority, 60.0);
        assert_eq!(state.current_tasks[3].priority, 10.0);
        assert_eq!(report.actions.len(), 1 + 2 + 3);
    }

    #[test]
    fn test_healthy_run_is_left_alone() {
        let allocator = ResourceAllocator::default();
        let mut state = ExecutionState {
            current_tasks: vec![task("a", CollectionMethod::SimpleHttp, 50.0, 9_000)],
            completed_tasks: vec![
                task("b", CollectionMethod::SimpleHttp, 50.0, 1_000),
                task("c", CollectionMethod::SimpleHttp, 50.0, 1_000),
            ],
            resources_used: ResourceUsage {
                time_ms: 10_000,
                memory_mb: 100.0,
                cpu_percent: 10.0,
            },
            time_remaining_ms: Some(90_000),
            quality_achieved: Some(85.0),
            ..Default::default()
        };
        let before = state.clone();
        let report = allocator.reallocate_resources(&mut state);

        assert!(report.actions.is_empty());
        assert_eq!(state, before);
    }
}
