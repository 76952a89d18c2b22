//! Fixed per-method lookup tables
//!
//! Base cost, base quality and fallback chains. Kept as literal data so the
//! exact values stay assertable.

use crate::models::CollectionMethod;
use serde::{Deserialize, Serialize};

/// Expected spend of one task
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub time_ms: f64,
    pub memory_mb: f64,
    pub cpu_percent: f64,
}

/// Expected data quality, each dimension 0-100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityEstimate {
    pub accuracy: f64,
    pub completeness: f64,
    pub timeliness: f64,
    pub overall: f64,
}

pub const COST_TABLE: [(CollectionMethod, CostEstimate); 4] = [
    (
        CollectionMethod::SimpleHttp,
        CostEstimate { time_ms: 2_000.0, memory_mb: 50.0, cpu_percent: 10.0 },
    ),
    (
        CollectionMethod::Hybrid,
        CostEstimate { time_ms: 5_000.0, memory_mb: 150.0, cpu_percent: 30.0 },
    ),
    (
        CollectionMethod::PlaywrightStealth,
        CostEstimate { time_ms: 12_000.0, memory_mb: 400.0, cpu_percent: 60.0 },
    ),
    (
        CollectionMethod::ApiPreferred,
        CostEstimate { time_ms: 1_000.0, memory_mb: 30.0, cpu_percent: 5.0 },
    ),
];

/// accuracy, completeness, timeliness
pub const QUALITY_TABLE: [(CollectionMethod, [f64; 3]); 4] = [
    (CollectionMethod::SimpleHttp, [75.0, 60.0, 90.0]),
    (CollectionMethod::Hybrid, [85.0, 80.0, 80.0]),
    (CollectionMethod::PlaywrightStealth, [90.0, 90.0, 70.0]),
    (CollectionMethod::ApiPreferred, [95.0, 85.0, 95.0]),
];

/// Methods to try, in order, after the primary fails
pub const FALLBACK_TABLE: [(CollectionMethod, &[CollectionMethod]); 4] = [
    (CollectionMethod::SimpleHttp, &[CollectionMethod::Hybrid]),
    (
        CollectionMethod::Hybrid,
        &[CollectionMethod::SimpleHttp, CollectionMethod::PlaywrightStealth],
    ),
    (CollectionMethod::PlaywrightStealth, &[CollectionMethod::Hybrid]),
    (
        CollectionMethod::ApiPreferred,
        &[CollectionMethod::SimpleHttp, CollectionMethod::Hybrid],
    ),
];

pub const SLOW_TIME_MULTIPLIER: f64 = 2.0;
pub const MEDIUM_TIME_MULTIPLIER: f64 = 1.5;
pub const DYNAMIC_STRUCTURE_MULTIPLIER: f64 = 1.3;
pub const COMPLEX_STRUCTURE_MULTIPLIER: f64 = 1.15;
pub const JS_MULTIPLIER: f64 = 1.2;

pub fn base_cost(method: CollectionMethod) -> CostEstimate {
    COST_TABLE
        .iter()
        .find(|(m, _)| *m == method)
        .map(|(_, c)| *c)
        .unwrap_or(COST_TABLE[0].1)
}

pub fn base_quality(method: CollectionMethod) -> [f64; 3] {
    QUALITY_TABLE
        .iter()
        .find(|(m, _)| *m == method)
        .map(|(_, q)| *q)
        .unwrap_or(QUALITY_TABLE[0].1)
}

pub fn fallback_chain(method: CollectionMethod) -> Vec<CollectionMethod> {
    FALLBACK_TABLE
        .iter()
        .find(|(m, _)| *m == method)
        .map(|(_, chain)| chain.to_vec())
        .unwrap_or_default()
}
