//! Efficiency optimization
//!
//! Pareto filtering of candidate collection options, marginal utility of
//! extra resources, live priority nudges and whole-run optimization plans.

mod plan;
mod utility;

pub use plan::{
    build_optimization_plan, BucketAllocation, FallbackStrategy, FallbackTrigger,
    OptimizationPlan, PriorityChange, PriorityReason, QualityTargets, ResourceAllocation,
    ResourceBudget,
};
pub use utility::{AdditionalResources, MarginalUtility, UtilityBand};

use crate::sources::HIGH_VALUE_DOMAINS;
use serde::{Deserialize, Serialize};

pub const EFFICIENCY_TIME_WEIGHT: f64 = 0.6;
pub const EFFICIENCY_MEMORY_WEIGHT: f64 = 0.3;
pub const EFFICIENCY_CONFIDENCE_WEIGHT: f64 = 0.1;

/// Floors that keep per-unit ratios finite for zero-cost candidates
const MIN_TIME_SECS: f64 = 0.001;
const MIN_MEMORY_MB: f64 = 1.0;

/// One way of collecting a source, as seen by the optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub value: f64,
    pub time_ms: f64,
    pub memory_mb: f64,
    /// 0-1
    pub confidence: f64,
}

impl Candidate {
    pub fn new(id: impl Into<String>, value: f64, time_ms: f64, memory_mb: f64, confidence: f64) -> Self {
        Self {
            id: id.into(),
            value,
            time_ms,
            memory_mb,
            confidence,
        }
    }

    /// True if `self` is at least as good as `other` everywhere and strictly
    /// better somewhere.
    pub fn dominates(&self, other: &Candidate) -> bool {
        let no_worse = self.value >= other.value
            && self.confidence >= other.confidence
            && self.time_ms <= other.time_ms
            && self.memory_mb <= other.memory_mb;
        let better = self.value > other.value
            || self.confidence > other.confidence
            || self.time_ms < other.time_ms
            || self.memory_mb < other.memory_mb;
        no_worse && better
    }

    pub fn quality_score(&self) -> f64 {
        self.value * self.confidence
    }

    pub fn efficiency_score(&self) -> f64 {
        let secs = (self.time_ms / 1000.0).max(MIN_TIME_SECS);
        let memory = self.memory_mb.max(MIN_MEMORY_MB);
        EFFICIENCY_TIME_WEIGHT * (self.value / secs)
            + EFFICIENCY_MEMORY_WEIGHT * (self.value / memory)
            + EFFICIENCY_CONFIDENCE_WEIGHT * (self.confidence * 10.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub quality_score: f64,
    pub efficiency_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Tasks estimated above this are underperforming
    pub slow_task_ms: u64,
    /// Tasks observed below this quality are underperforming
    pub min_observed_quality: f64,
    pub demotion: f64,
    pub demotion_floor: f64,
    pub promotion: f64,
    pub max_promotions: usize,
    pub high_value_domains: Vec<String>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            slow_task_ms: 8_000,
            min_observed_quality: 60.0,
            demotion: 20.0,
            demotion_floor: 10.0,
            promotion: 15.0,
            max_promotions: 2,
            high_value_domains: HIGH_VALUE_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EfficiencyOptimizer {
    config: OptimizerConfig,
}

impl EfficiencyOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Candidates not dominated by any other, in input order.
    ///
    /// Filtering the result again returns it unchanged.
    pub fn find_pareto_optimal(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        candidates
            .iter()
            .enumerate()
            .filter(|(i, c)| {
                !candidates
                    .iter()
                    .enumerate()
                    .any(|(j, other)| *i != j && other.dominates(c))
            })
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Pareto front with scores, best efficiency first
    pub fn rank_candidates(&self, candidates: &[Candidate]) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = self
            .find_pareto_optimal(candidates)
            .into_iter()
            .map(|candidate| ScoredCandidate {
                quality_score: candidate.quality_score(),
                efficiency_score: candidate.efficiency_score(),
                candidate,
            })
            .collect();
        scored.sort_by(|a, b| {
            b.efficiency_score
                .partial_cmp(&a.efficiency_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominated_candidate_is_dropped() {
        let optimizer = EfficiencyOptimizer::default();
        let candidates = vec![
            Candidate::new("heavy", 10.0, 1_000.0, 10.0, 0.9),
            Candidate::new("light", 10.0, 500.0, 5.0, 0.9),
        ];
        let front = optimizer.find_pareto_optimal(&candidates);
        assert_eq!(front.len(), 1);
        assert_eq!(front[0].id, "light");
    }

    #[test]
    fn test_trade_offs_are_kept() {
        let optimizer = EfficiencyOptimizer::default();
        let candidates = vec![
            Candidate::new("fast", 60.0, 1_000.0, 50.0, 0.7),
            Candidate::new("thorough", 90.0, 12_000.0, 400.0, 0.9),
            Candidate::new("worse", 55.0, 2_000.0, 60.0, 0.6),
        ];
        let front = optimizer.find_pareto_optimal(&candidates);
        let ids: Vec<&str> = front.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["fast", "thorough"]);
    }

    #[test]
    fn test_pareto_filter_is_idempotent() {
        let optimizer = EfficiencyOptimizer::default();
        let candidates: Vec<Candidate> = (0..30)
            .map(|i| {
                let f = i as f64;
                Candidate::new(
                    format!("c{i}"),
                    (f * 37.0) % 100.0,
                    1_000.0 + (f * 911.0) % 9_000.0,
                    50.0 + (f * 53.0) % 400.0,
                    0.5 + ((f * 7.0) % 5.0) / 10.0,
                )
            })
            .chain(std::iter::once(Candidate::new("dup", 10.0, 500.0, 5.0, 0.9)))
            .chain(std::iter::once(Candidate::new("dup2", 10.0, 500.0, 5.0, 0.9)))
            .collect();

        let once = optimizer.find_pareto_optimal(&candidates);
        let twice = optimizer.find_pareto_optimal(&once);
        assert_eq!(once, twice);
        assert!(!once.is_empty());
    }

    #[test]
    fn test_scores() {
        let c = Candidate::new("a", 80.0, 2_000.0, 100.0, 0.5);
        assert_eq!(c.quality_score(), 40.0);
        // 0.6*40 + 0.3*0.8 + 0.1*5
        assert!((c.efficiency_score() - 24.74).abs() < 1e-9);

        let ranked = EfficiencyOptimizer::default().rank_candidates(&[
            c.clone(),
            Candidate::new("b", 80.0, 1_000.0, 200.0, 0.5),
        ]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].candidate.id, "b");
    }
}
