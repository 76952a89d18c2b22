//! Quality maximization
//!
//! Outer control loop: constrained plan building with the wider domain list,
//! source screening against history, improvement suggestions and an overall
//! quality assessment of a collection.

mod filter;
mod improve;

pub use filter::{SourceAssessment, SourceCondition, SourceFilterResult, SourceVerdict};
pub use improve::{QualityMetrics, QualitySuggestion, SuggestionCategory};

use crate::models::{clamp_score, CollectionMethod, CollectionTask};
use crate::optimizer::{build_optimization_plan, OptimizationPlan, ResourceBudget};
use crate::profiler::ReliabilityCalculator;
use crate::sources::EXTENDED_HIGH_VALUE_DOMAINS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub approve_threshold: f64,
    pub reject_threshold: f64,
    /// Recent quality scores averaged per source
    pub history_window: usize,
    pub reliability_bonus_threshold: f64,
    pub reliability_bonus: f64,
    /// Threshold above which high-priority tasks are boosted
    pub boost_threshold: f64,
    pub priority_boost: f64,
    pub accuracy_target: f64,
    pub completeness_target: f64,
    pub timeliness_target: f64,
    pub consistency_target: f64,
    pub overall_upgrade_threshold: f64,
    pub cpu_pressure_percent: f64,
    pub memory_pressure_percent: f64,
    pub memory_budget_mb: f64,
    pub high_value_domains: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            approve_threshold: 90.0,
            reject_threshold: 60.0,
            history_window: 5,
            reliability_bonus_threshold: 80.0,
            reliability_bonus: 10.0,
            boost_threshold: 80.0,
            priority_boost: 10.0,
            accuracy_target: 80.0,
            completeness_target: 75.0,
            timeliness_target: 85.0,
            consistency_target: 70.0,
            overall_upgrade_threshold: 70.0,
            cpu_pressure_percent: 80.0,
            memory_pressure_percent: 80.0,
            memory_budget_mb: 1024.0,
            high_value_domains: EXTENDED_HIGH_VALUE_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Quality multiplier per method used in assessments
pub fn method_multiplier(method: CollectionMethod) -> f64 {
    match method {
        CollectionMethod::SimpleHttp => 0.8,
        CollectionMethod::Hybrid => 0.9,
        CollectionMethod::PlaywrightStealth => 1.0,
        CollectionMethod::ApiPreferred => 1.1,
    }
}

/// One collected source as seen by `assess_collection_quality`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollectedSource {
    /// 0-100
    pub url_quality: f64,
    pub method: CollectionMethod,
    /// 0-1
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct QualityMaximizer {
    config: QualityConfig,
    reliability: ReliabilityCalculator,
}

impl QualityMaximizer {
    pub fn new(config: QualityConfig) -> Self {
        Self {
            config,
            reliability: ReliabilityCalculator::default(),
        }
    }

    pub fn with_reliability(mut self, reliability: ReliabilityCalculator) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Optimization plan over the wider domain list. When the threshold is
    /// above the boost threshold, every planned priority above it gains the
    /// boost.
    pub fn maximize_value_under_constraints(
        &self,
        tasks: &[CollectionTask],
        quality_threshold: f64,
        budget: &ResourceBudget,
    ) -> OptimizationPlan {
        let domains: Vec<&str> = self.config.high_value_domains.iter().map(String::as_str).collect();
        let mut plan = build_optimization_plan(tasks, quality_threshold, budget, &domains);

        if quality_threshold > self.config.boost_threshold {
            for priority in plan.task_priorities.values_mut() {
                if *priority > self.config.boost_threshold {
                    *priority = clamp_score(*priority + self.config.priority_boost);
                }
            }
        }

        tracing::debug!(
            event = "value_maximized",
            tasks = tasks.len(),
            quality_threshold,
            "Built constrained optimization plan"
        );
        plan
    }

    /// mean(url_quality x method multiplier x confidence), 0 for no input
    pub fn assess_collection_quality(&self, sources: &[CollectedSource]) -> f64 {
        if sources.is_empty() {
            return 0.0;
        }
        let total: f64 = sources
            .iter()
            .map(|s| {
                clamp_score(s.url_quality) * method_multiplier(s.method) * s.confidence.clamp(0.0, 1.0)
            })
            .sum();
        clamp_score(total / sources.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, url: &str, priority: f64) -> CollectionTask {
        CollectionTask::new(id, url, CollectionMethod::SimpleHttp, priority, 1_000)
    }

    fn budget() -> ResourceBudget {
        ResourceBudget {
            time_ms: 60_000,
            memory_mb: 512.0,
            max_concurrency: 10,
        }
    }

    #[test]
    fn test_extended_domains_and_boost() {
        let maximizer = QualityMaximizer::default();
        let tasks = vec![
            task("wsj", "https://www.wsj.com/markets", 30.0),
            task("blog", "https://blog.example.org", 84.0),
            task("plain", "https://other.example.org", 70.0),
        ];

        let strict = maximizer.maximize_value_under_constraints(&tasks, 85.0, &budget());
        // wsj is only on the wider list; it takes the top slot then the boost
        assert_eq!(strict.task_priorities["wsj"], 100.0);
        assert_eq!(strict.task_priorities["blog"], 94.0);
        assert_eq!(strict.task_priorities["plain"], 70.0);
        assert_eq!(strict.quality_targets.target, 95.0);

        let relaxed = maximizer.maximize_value_under_constraints(&tasks, 70.0, &budget());
        assert_eq!(relaxed.task_priorities["wsj"], 90.0);
        assert_eq!(relaxed.task_priorities["blog"], 84.0);
        assert_eq!(relaxed.resource_allocation.simple_http.concurrency, 6);
    }

    #[test]
    fn test_assessment() {
        let maximizer = QualityMaximizer::default();
        assert_eq!(maximizer.assess_collection_quality(&[]), 0.0);

        let sources = [
            CollectedSource {
                url_quality: 80.0,
                method: CollectionMethod::SimpleHttp,
                confidence: 1.0,
            },
            CollectedSource {
                url_quality: 90.0,
                method: CollectionMethod::ApiPreferred,
                confidence: 0.5,
            },
        ];
        // (64 + 49.5) / 2
        assert!((maximizer.assess_collection_quality(&sources) - 56.75).abs() < 1e-9);

        let saturated = [CollectedSource {
            url_quality: 100.0,
            method: CollectionMethod::ApiPreferred,
            confidence: 1.0,
        }];
        assert_eq!(maximizer.assess_collection_quality(&saturated), 100.0);
    }
}
