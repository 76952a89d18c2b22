//! Live priority nudges and whole-run optimization plans

use super::EfficiencyOptimizer;
use crate::models::{clamp_score, CollectionMethod, CollectionTask};
use crate::sources::domain_rank;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Priorities handed to the top high-value tasks, best domain first
pub const HIGH_VALUE_PRIORITIES: [f64; 3] = [90.0, 85.0, 75.0];

/// simple_http, hybrid, playwright_stealth
pub const TIME_SPLIT: [f64; 3] = [0.5, 0.3, 0.2];
pub const MEMORY_SPLIT: [f64; 3] = [0.2, 0.4, 0.4];
pub const CONCURRENCY_SPLIT: [f64; 3] = [0.6, 0.3, 0.1];

pub const QUALITY_CEILING: f64 = 95.0;
pub const QUALITY_TARGET_MARGIN: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityReason {
    Underperforming,
    HighValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityChange {
    pub task_id: String,
    pub from: f64,
    pub to: f64,
    pub reason: PriorityReason,
}

/// Budget the plan divides between method buckets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceBudget {
    pub time_ms: u64,
    pub memory_mb: f64,
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketAllocation {
    pub time_ms: u64,
    pub memory_mb: f64,
    pub concurrency: usize,
}

/// Position of `method` in the split tables
fn bucket_index(method: CollectionMethod) -> usize {
    match method {
        CollectionMethod::SimpleHttp | CollectionMethod::ApiPreferred => 0,
        CollectionMethod::Hybrid => 1,
        CollectionMethod::PlaywrightStealth => 2,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub simple_http: BucketAllocation,
    pub hybrid: BucketAllocation,
    pub playwright_stealth: BucketAllocation,
}

impl ResourceAllocation {
    /// Divide `budget` by the fixed ratios. A bucket that has tasks but
    /// floored to zero concurrency gets one slot, from the rounding
    /// remainder first and then from the largest bucket that can spare it.
    pub fn split(budget: &ResourceBudget, tasks: &[CollectionTask]) -> Self {
        let bucket = |i: usize| BucketAllocation {
            time_ms: (budget.time_ms as f64 * TIME_SPLIT[i]).floor() as u64,
            memory_mb: (budget.memory_mb.max(0.0) * MEMORY_SPLIT[i]).floor(),
            concurrency: (budget.max_concurrency as f64 * CONCURRENCY_SPLIT[i]).floor() as usize,
        };
        let mut allocation = Self {
            simple_http: bucket(0),
            hybrid: bucket(1),
            playwright_stealth: bucket(2),
        };

        let mut spare = budget.max_concurrency.saturating_sub(allocation.total_concurrency());
        for i in 0..3 {
            if allocation.buckets()[i].concurrency > 0
                || !tasks.iter().any(|t| bucket_index(t.method) == i)
            {
                continue;
            }
            let mut buckets = allocation.buckets_mut();
            if spare > 0 {
                spare -= 1;
            } else {
                let Some(donor) = buckets
                    .iter_mut()
                    .filter(|b| b.concurrency > 1)
                    .max_by_key(|b| b.concurrency)
                else {
                    continue;
                };
                donor.concurrency -= 1;
            }
            buckets[i].concurrency = 1;
        }
        allocation
    }

    /// Bucket that `method` draws from. API collection shares the plain
    /// HTTP bucket.
    pub fn bucket(&self, method: CollectionMethod) -> &BucketAllocation {
        self.buckets()[bucket_index(method)]
    }

    fn buckets_mut(&mut self) -> [&mut BucketAllocation; 3] {
        [&mut self.simple_http, &mut self.hybrid, &mut self.playwright_stealth]
    }

    fn buckets(&self) -> [&BucketAllocation; 3] {
        [&self.simple_http, &self.hybrid, &self.playwright_stealth]
    }

    pub fn total_time_ms(&self) -> u64 {
        self.buckets().iter().map(|b| b.time_ms).sum()
    }

    pub fn total_memory_mb(&self) -> f64 {
        self.buckets().iter().map(|b| b.memory_mb).sum()
    }

    pub fn total_concurrency(&self) -> usize {
        self.buckets().iter().map(|b| b.concurrency).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityTargets {
    pub min: f64,
    pub target: f64,
    pub max: f64,
}

impl QualityTargets {
    pub fn from_threshold(threshold: f64) -> Self {
        let min = clamp_score(threshold);
        Self {
            min,
            target: (min + QUALITY_TARGET_MARGIN).min(QUALITY_CEILING),
            max: QUALITY_CEILING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTrigger {
    QualityBelowThreshold,
    TimeoutExceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackStrategy {
    pub trigger: FallbackTrigger,
    pub actions: Vec<String>,
}

fn canned_fallbacks() -> Vec<FallbackStrategy> {
    vec![
        FallbackStrategy {
            trigger: FallbackTrigger::QualityBelowThreshold,
            actions: vec![
                "upgrade collection method one step".to_string(),
                "re-collect from the highest ranked alternative source".to_string(),
            ],
        },
        FallbackStrategy {
            trigger: FallbackTrigger::TimeoutExceeded,
            actions: vec![
                "fall back to simple_http".to_string(),
                "drop low-priority tasks".to_string(),
            ],
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationPlan {
    pub task_priorities: BTreeMap<String, f64>,
    pub resource_allocation: ResourceAllocation,
    pub quality_targets: QualityTargets,
    pub fallback_strategies: Vec<FallbackStrategy>,
}

/// Assemble a plan. The best three tasks on `domains` (by domain rank, then
/// input order) get the fixed high-value priorities; every other task keeps
/// its own.
pub fn build_optimization_plan(
    tasks: &[CollectionTask],
    quality_threshold: f64,
    budget: &ResourceBudget,
    domains: &[&str],
) -> OptimizationPlan {
    let mut task_priorities: BTreeMap<String, f64> =
        tasks.iter().map(|t| (t.id.clone(), t.priority)).collect();

    let mut ranked: Vec<(usize, usize)> = tasks
        .iter()
        .enumerate()
        .filter_map(|(i, t)| domain_rank(&t.source_url, domains).map(|rank| (rank, i)))
        .collect();
    ranked.sort();
    for ((_, i), priority) in ranked.iter().zip(HIGH_VALUE_PRIORITIES) {
        task_priorities.insert(tasks[*i].id.clone(), priority);
    }

    OptimizationPlan {
        task_priorities,
        resource_allocation: ResourceAllocation::split(budget, tasks),
        quality_targets: QualityTargets::from_threshold(quality_threshold),
        fallback_strategies: canned_fallbacks(),
    }
}

impl EfficiencyOptimizer {
    /// Demote underperforming tasks, then promote up to two high-value ones.
    ///
    /// `observed_quality` is keyed by task id. Tasks without an observation
    /// are judged on estimated time alone.
    pub fn adjust_priorities_dynamically(
        &self,
        tasks: &mut [CollectionTask],
        observed_quality: &HashMap<String, f64>,
    ) -> Vec<PriorityChange> {
        let config = self.config();
        let domains: Vec<&str> = config.high_value_domains.iter().map(String::as_str).collect();
        let mut changes = Vec::new();
        let mut promoted = 0;

        for task in tasks.iter_mut() {
            let low_quality = observed_quality
                .get(&task.id)
                .is_some_and(|q| *q < config.min_observed_quality);

            if task.estimated_time_ms > config.slow_task_ms || low_quality {
                let from = task.priority;
                let to = (from - config.demotion).max(config.demotion_floor).min(from);
                task.priority = to;
                changes.push(PriorityChange {
                    task_id: task.id.clone(),
                    from,
                    to,
                    reason: PriorityReason::Underperforming,
                });
            } else if promoted < config.max_promotions
                && domain_rank(&task.source_url, &domains).is_some()
            {
                let from = task.priority;
                task.priority = clamp_score(from + config.promotion);
                promoted += 1;
                changes.push(PriorityChange {
                    task_id: task.id.clone(),
                    from,
                    to: task.priority,
                    reason: PriorityReason::HighValue,
                });
            }
        }

        tracing::debug!(
            event = "priorities_adjusted",
            changes = changes.len(),
            promoted,
            "Adjusted task priorities"
        );

        changes
    }

    pub fn create_optimization_plan(
        &self,
        tasks: &[CollectionTask],
        quality_threshold: f64,
        budget: &ResourceBudget,
    ) -> OptimizationPlan {
        let domains: Vec<&str> = self.config().high_value_domains.iter().map(String::as_str).collect();
        build_optimization_plan(tasks, quality_threshold, budget, &domains)
    }
}
