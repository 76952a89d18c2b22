//! Mid-run strategy adjustment

use super::MethodSelector;
use crate::models::ExecutionState;
use crate::signals::ExecutionSignals;
use serde::{Deserialize, Serialize};

pub const PERFORMANCE_THRESHOLD: f64 = 50.0;
pub const RESOURCE_HEADROOM_THRESHOLD: f64 = 60.0;
pub const TIME_HEADROOM_THRESHOLD: f64 = 60.0;
pub const MIN_IMPROVEMENT: f64 = 5.0;
pub const MAX_IMPROVEMENT: f64 = 30.0;

/// Kind of correction, checked in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentCategory {
    /// Performance below 50: move to heavier methods
    Method,
    /// Resource headroom below 60: ease off browser work
    Resource,
    /// Time headroom below 60: trim timeouts and low-priority work
    Timing,
    /// Nothing is wrong: reorder towards high-value sources
    Priority,
}

/// Percentages (0-100) read off a running collection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategySignals {
    pub completion_rate: f64,
    pub resource_headroom: f64,
    pub quality_trend: f64,
    pub time_headroom: f64,
    /// Mean of completion rate and quality trend
    pub performance: f64,
}

impl StrategySignals {
    pub fn from_state(state: &ExecutionState, memory_budget_mb: f64) -> Self {
        let derived = ExecutionSignals::derive(state, memory_budget_mb);
        Self {
            completion_rate: derived.completion_rate,
            resource_headroom: derived.resource_headroom,
            quality_trend: derived.quality,
            time_headroom: derived.time_headroom,
            performance: (derived.completion_rate + derived.quality) / 2.0,
        }
    }
}

/// The one correction chosen for a running collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAdjustment {
    pub category: AdjustmentCategory,
    pub actions: Vec<String>,
    /// Expected gain in performance points, 5-30
    pub expected_improvement: f64,
    pub signals: StrategySignals,
}

impl MethodSelector {
    /// Pick exactly one corrective category for a running collection.
    pub fn adjust_strategy_dynamically(&self, state: &ExecutionState) -> StrategyAdjustment {
        let signals = StrategySignals::from_state(state, self.config().memory_budget_mb);

        let (category, actions, gap) = if signals.performance < PERFORMANCE_THRESHOLD {
            (
                AdjustmentCategory::Method,
                vec![
                    "upgrade remaining simple_http tasks to hybrid".to_string(),
                    "enable fallback chain on first failure".to_string(),
                ],
                PERFORMANCE_THRESHOLD - signals.performance,
            )
        } else if signals.resource_headroom < RESOURCE_HEADROOM_THRESHOLD {
            (
                AdjustmentCategory::Resource,
                vec![
                    "reduce concurrency of browser-based tasks".to_string(),
                    "defer playwright_stealth tasks until memory frees up".to_string(),
                ],
                RESOURCE_HEADROOM_THRESHOLD - signals.resource_headroom,
            )
        } else if signals.time_headroom < TIME_HEADROOM_THRESHOLD {
            (
                AdjustmentCategory::Timing,
                vec![
                    "shorten per-task timeouts".to_string(),
                    "skip low-priority sources".to_string(),
                ],
                TIME_HEADROOM_THRESHOLD - signals.time_headroom,
            )
        } else {
            (
                AdjustmentCategory::Priority,
                vec!["promote high-value sources to the front of the queue".to_string()],
                0.0,
            )
        };

        let expected_improvement = (gap / 2.0).clamp(MIN_IMPROVEMENT, MAX_IMPROVEMENT);

        tracing::info!(
            event = "strategy_adjusted",
            category = ?category,
            performance = signals.performance,
            resource_headroom = signals.resource_headroom,
            time_headroom = signals.time_headroom,
            expected_improvement,
            "Adjusted collection strategy"
        );

        StrategyAdjustment {
            category,
            actions,
            expected_improvement,
            signals,
        }
    }
}
