//! Derived run signals
//!
//! Percentages computed from an `ExecutionState`, shared by the selector's
//! strategy adjustment and the allocator's reallocation. Absent inputs
//! resolve to the least favorable value.

use crate::models::{clamp_score, ExecutionState};
use serde::{Deserialize, Serialize};

/// All values are percentages in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSignals {
    /// Completed tasks over all known tasks
    pub completion_rate: f64,
    /// Completed over finished (completed + failed) tasks
    pub success_rate: f64,
    /// max(memory share of budget, cpu)
    pub resource_utilization: f64,
    pub resource_headroom: f64,
    /// Quality achieved so far
    pub quality: f64,
    /// Remaining share of the wall-clock budget
    pub time_headroom: f64,
    /// Completion relative to the share of time already spent
    pub time_efficiency: f64,
}

impl ExecutionSignals {
    pub fn derive(state: &ExecutionState, memory_budget_mb: f64) -> Self {
        let total = state.total_tasks();
        let completed = state.completed_tasks.len();
        let finished = completed + state.failed_tasks.len();

        let completion_rate = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        let success_rate = if finished == 0 {
            0.0
        } else {
            completed as f64 / finished as f64 * 100.0
        };

        let memory_pct = if memory_budget_mb > 0.0 {
            state.resources_used.memory_mb / memory_budget_mb * 100.0
        } else {
            100.0
        };
        let resource_utilization = clamp_score(memory_pct.max(state.resources_used.cpu_percent));
        let resource_headroom = 100.0 - resource_utilization;

        let quality = clamp_score(state.quality_achieved.unwrap_or(0.0));

        let time_headroom = match state.time_remaining_ms {
            Some(remaining) => {
                let budget = state.resources_used.time_ms.saturating_add(remaining);
                if budget == 0 {
                    0.0
                } else {
                    remaining as f64 / budget as f64 * 100.0
                }
            }
            None => 0.0,
        };

        let elapsed_pct = 100.0 - time_headroom;
        let time_efficiency = if elapsed_pct <= 0.0 {
            100.0
        } else {
            clamp_score(completion_rate / elapsed_pct * 100.0)
        };

        Self {
            completion_rate,
            success_rate,
            resource_utilization,
            resource_headroom,
            quality,
            time_headroom,
            time_efficiency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionMethod, CollectionTask, ResourceUsage};

    fn task(id: &str) -> CollectionTask {
        CollectionTask::new(id, "https://example.com", CollectionMethod::SimpleHttp, 50.0, 1000)
    }

    #[test]
    fn test_empty_state_is_least_favorable() {
        let signals = ExecutionSignals::derive(&ExecutionState::default(), 1024.0);
        assert_eq!(signals.completion_rate, 0.0);
        assert_eq!(signals.success_rate, 0.0);
        assert_eq!(signals.quality, 0.0);
        assert_eq!(signals.time_headroom, 0.0);
        assert_eq!(signals.time_efficiency, 0.0);
        assert_eq!(signals.resource_headroom, 100.0);
    }

    #[test]
    fn test_time_headroom_with_saturated_clock() {
        let state = ExecutionState {
            current_tasks: vec![task("a")],
            resources_used: ResourceUsage {
                time_ms: u64::MAX - 5,
                ..Default::default()
            },
            time_remaining_ms: Some(u64::MAX / 2),
            ..Default::default()
        };
        let s = ExecutionSignals::derive(&state, 1024.0);
        assert!(s.time_headroom > 49.0 && s.time_headroom <= 50.0);
        assert!(s.time_efficiency.is_finite());
    }

    #[test]
    fn test_signals_from_midrun_state() {
        let state = ExecutionState {
            current_tasks: vec![task("c")],
            completed_tasks: vec![task("a"), task("b"), task("d")],
            failed_tasks: vec![task("e")],
            resources_used: ResourceUsage {
                time_ms: 30_000,
                memory_mb: 512.0,
                cpu_percent: 30.0,
            },
            time_remaining_ms: Some(30_000),
            quality_achieved: Some(82.0),
            ..Default::default()
        };
        let s = ExecutionSignals::derive(&state, 1024.0);

        assert_eq!(s.completion_rate, 60.0);
        assert_eq!(s.success_rate, 75.0);
        assert_eq!(s.resource_utilization, 50.0);
        assert_eq!(s.resource_headroom, 50.0);
        assert_eq!(s.quality, 82.0);
        assert_eq!(s.time_headroom, 50.0);
        // 60% done with 50% of the time spent
        assert_eq!(s.time_efficiency, 100.0);
    }

    #[test]
    fn test_untouched_budget_is_fully_efficient() {
        let state = ExecutionState {
            current_tasks: vec![task("a")],
            time_remaining_ms: Some(60_000),
            ..Default::default()
        };
        let s = ExecutionSignals::derive(&state, 1024.0);
        assert_eq!(s.time_headroom, 100.0);
        assert_eq!(s.time_efficiency, 100.0);
    }
}
