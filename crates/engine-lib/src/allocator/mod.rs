//! Resource allocation
//!
//! Splits a wall-clock budget across tasks, orders tasks into parallel and
//! sequential stages, and rebalances in-flight work when a run degrades.

mod plan;
mod reallocate;

pub use plan::ExecutionPlan;
pub use reallocate::{ReallocationAction, ReallocationReport, ReallocationSignals};

use crate::models::CollectionTask;
use crate::observability::{EngineMetrics, StructuredLogger};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Share of the total budget held back as a safety buffer
    pub buffer_ratio: f64,
    pub critical_path_multiplier: f64,
    pub high_priority_multiplier: f64,
    pub low_priority_multiplier: f64,
    pub high_priority_threshold: f64,
    pub low_priority_threshold: f64,
    /// Upper bound on concurrently running tasks
    pub max_concurrency: usize,
    pub memory_budget_mb: f64,
    pub time_efficiency_threshold: f64,
    pub quality_threshold: f64,
    pub success_rate_threshold: f64,
    /// In-flight tasks estimated above this are shrunk when time runs short
    pub long_task_ms: u64,
    pub shrink_ratio: f64,
    pub priority_boost: f64,
    pub boost_count: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            buffer_ratio: 0.15,
            critical_path_multiplier: 1.3,
            high_priority_multiplier: 1.2,
            low_priority_multiplier: 0.8,
            high_priority_threshold: 80.0,
            low_priority_threshold: 30.0,
            max_concurrency: 5,
            memory_budget_mb: 1024.0,
            time_efficiency_threshold: 60.0,
            quality_threshold: 60.0,
            success_rate_threshold: 70.0,
            long_task_ms: 5_000,
            shrink_ratio: 0.3,
            priority_boost: 20.0,
            boost_count: 3,
        }
    }
}

/// Time granted to each task out of a total budget
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeBudget {
    pub total_ms: u64,
    pub buffer_ms: u64,
    pub allocations: HashMap<String, u64>,
    /// Ids of the top half of tasks by priority
    pub critical_path: Vec<String>,
    /// True when estimates did not fit and grants were scaled
    pub scaled: bool,
}

impl TimeBudget {
    pub fn allocated_ms(&self) -> u64 {
        self.allocations
            .values()
            .fold(0u64, |acc, &ms| acc.saturating_add(ms))
    }

    pub fn get(&self, task_id: &str) -> Option<u64> {
        self.allocations.get(task_id).copied()
    }
}

#[derive(Debug, Clone)]
pub struct ResourceAllocator {
    config: AllocatorConfig,
    logger: StructuredLogger,
    metrics: EngineMetrics,
}

impl Default for ResourceAllocator {
    fn default() -> Self {
        Self::new(AllocatorConfig::default())
    }
}

impl ResourceAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            config,
            logger: StructuredLogger::new("allocator"),
            metrics: EngineMetrics::new(),
        }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Split `total_ms` across `tasks`.
    ///
    /// The sum of all grants plus the buffer never exceeds `total_ms`.
    pub fn allocate_time_budget(&self, total_ms: u64, tasks: &[CollectionTask]) -> TimeBudget {
        let buffer_ms = (total_ms as f64 * self.config.buffer_ratio).ceil() as u64;
        let available = total_ms.saturating_sub(buffer_ms);

        let mut by_priority: Vec<&CollectionTask> = tasks.iter().collect();
        by_priority.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        let critical_len = (tasks.len() + 1) / 2;
        let critical_path: Vec<String> = by_priority
            .iter()
            .take(critical_len)
            .map(|t| t.id.clone())
            .collect();

        let estimated = tasks
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(t.estimated_time_ms));

        let mut budget = TimeBudget {
            total_ms,
            buffer_ms,
            allocations: HashMap::with_capacity(tasks.len()),
            critical_path,
            scaled: false,
        };

        if estimated <= available {
            for task in tasks {
                budget.allocations.insert(task.id.clone(), task.estimated_time_ms);
            }
            return budget;
        }

        budget.scaled = true;
        let ratio = available as f64 / estimated as f64;
        let mut grants: Vec<(String, f64)> = tasks
            .iter()
            .map(|task| {
                let mut grant = task.estimated_time_ms as f64 * ratio;
                if budget.critical_path.contains(&task.id) {
                    grant *= self.config.critical_path_multiplier;
                }
                if task.priority > self.config.high_priority_threshold {
                    grant *= self.config.high_priority_multiplier;
                } else if task.priority < self.config.low_priority_threshold {
                    grant *= self.config.low_priority_multiplier;
                }
                (task.id.clone(), grant)
            })
            .collect();

        let granted: f64 = grants.iter().map(|(_, g)| g).sum();
        if granted > available as f64 {
            let rescale = available as f64 / granted;
            for (_, grant) in grants.iter_mut() {
                *grant *= rescale;
            }
        }

        let mut floored: Vec<(String, u64)> = grants
            .into_iter()
            .map(|(id, g)| (id, g.floor() as u64))
            .collect();

        // Float rounding can leave the floored sum a unit over
        let mut overflow = floored
            .iter()
            .fold(0u64, |acc, (_, g)| acc.saturating_add(*g))
            .saturating_sub(available);
        while overflow > 0 {
            let Some(largest) = floored.iter_mut().max_by_key(|(_, g)| *g) else {
                break;
            };
            let cut = overflow.min(largest.1);
            if cut == 0 {
                break;
            }
            largest.1 -= cut;
            overflow -= cut;
        }

        budget.allocations = floored.into_iter().collect();

        tracing::debug!(
            event = "time_budget_scaled",
            total_ms,
            buffer_ms,
            estimated_ms = estimated,
            allocated_ms = budget.allocated_ms(),
            "Estimates exceed budget, scaled grants"
        );

        budget
    }
}
