//! Collection method selection
//!
//! Maps a `SiteProfile` to a primary method, a fallback chain and
//! cost/quality/confidence estimates; turns a batch of sources into
//! prioritized tasks; and picks one corrective strategy for a running
//! collection. Everything here is pure and deterministic.

mod prioritize;
mod strategy;
mod tables;

pub use prioritize::{PrioritizationContext, PrioritizedTasks, SourceRequest, Urgency};
pub use strategy::{AdjustmentCategory, StrategyAdjustment, StrategySignals};
pub use tables::{
    base_cost, base_quality, fallback_chain, CostEstimate, QualityEstimate, COST_TABLE,
    FALLBACK_TABLE, QUALITY_TABLE,
};

use crate::models::{
    clamp_score, CollectionMethod, LoadSpeed, PageStructure, SiteProfile, UpdateFrequency,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::sources::HIGH_VALUE_DOMAINS;
use serde::{Deserialize, Serialize};
use tables::{
    COMPLEX_STRUCTURE_MULTIPLIER, DYNAMIC_STRUCTURE_MULTIPLIER, JS_MULTIPLIER,
    MEDIUM_TIME_MULTIPLIER, SLOW_TIME_MULTIPLIER,
};

pub const CONFIDENCE_BASE: f64 = 70.0;
pub const CONFIDENCE_MIN: f64 = 10.0;
pub const CONFIDENCE_MAX: f64 = 95.0;

/// Result of analyzing one profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSelection {
    pub primary_method: CollectionMethod,
    pub fallback_methods: Vec<CollectionMethod>,
    pub estimated_cost: CostEstimate,
    pub expected_quality: QualityEstimate,
    /// 10-95
    pub confidence: f64,
    pub reasoning: Vec<String>,
}

/// Priority weights and domain list used by the selector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub base_priority: f64,
    pub high_value_bonus: f64,
    pub high_urgency_bonus: f64,
    pub low_urgency_penalty: f64,
    pub quality_requirement_bonus: f64,
    /// Quality requirement above which the bonus applies
    pub quality_requirement_threshold: f64,
    pub high_value_domains: Vec<String>,
    /// Memory budget used to turn absolute usage into headroom
    pub memory_budget_mb: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            base_priority: 50.0,
            high_value_bonus: 30.0,
            high_urgency_bonus: 20.0,
            low_urgency_penalty: 10.0,
            quality_requirement_bonus: 15.0,
            quality_requirement_threshold: 80.0,
            high_value_domains: HIGH_VALUE_DOMAINS.iter().map(|d| d.to_string()).collect(),
            memory_budget_mb: 1024.0,
        }
    }
}

/// Primary method decision, in fixed order:
/// anti-bot, JS on a dynamic page, simple fast page, high quality not slow,
/// then plain HTTP.
pub fn select_primary_method(profile: &SiteProfile) -> CollectionMethod {
    if profile.has_anti_bot {
        CollectionMethod::PlaywrightStealth
    } else if profile.requires_js && profile.structure == PageStructure::Dynamic {
        CollectionMethod::Hybrid
    } else if profile.structure == PageStructure::Simple && profile.load_speed == LoadSpeed::Fast {
        CollectionMethod::SimpleHttp
    } else if profile.content_quality > 75.0 && profile.load_speed != LoadSpeed::Slow {
        CollectionMethod::Hybrid
    } else {
        CollectionMethod::SimpleHttp
    }
}

/// Estimated cost of running `method` against a source with `profile`
pub fn estimate_cost(method: CollectionMethod, profile: &SiteProfile) -> CostEstimate {
    let mut cost = base_cost(method);

    cost.time_ms *= match profile.load_speed {
        LoadSpeed::Slow => SLOW_TIME_MULTIPLIER,
        LoadSpeed::Medium => MEDIUM_TIME_MULTIPLIER,
        LoadSpeed::Fast => 1.0,
    };

    let structure = match profile.structure {
        PageStructure::Dynamic => DYNAMIC_STRUCTURE_MULTIPLIER,
        PageStructure::Complex => COMPLEX_STRUCTURE_MULTIPLIER,
        PageStructure::Simple => 1.0,
    };
    cost.time_ms *= structure;
    cost.memory_mb *= structure;

    if profile.requires_js {
        cost.memory_mb *= JS_MULTIPLIER;
        cost.cpu_percent *= JS_MULTIPLIER;
    }
    cost
}

/// Expected data quality of `method` on a source with `profile`
pub fn estimate_quality(method: CollectionMethod, profile: &SiteProfile) -> QualityEstimate {
    let [mut accuracy, mut completeness, mut timeliness] = base_quality(method);

    if profile.content_quality > 80.0 {
        accuracy += 5.0;
    } else if profile.content_quality < 50.0 {
        accuracy -= 10.0;
    }

    match profile.structure {
        PageStructure::Dynamic if method == CollectionMethod::SimpleHttp => completeness -= 20.0,
        PageStructure::Complex => completeness -= 5.0,
        _ => {}
    }

    match profile.update_frequency {
        UpdateFrequency::High => match method {
            CollectionMethod::SimpleHttp | CollectionMethod::ApiPreferred => timeliness += 5.0,
            CollectionMethod::PlaywrightStealth => timeliness -= 10.0,
            CollectionMethod::Hybrid => {}
        },
        UpdateFrequency::Low => timeliness += 5.0,
        UpdateFrequency::Medium => {}
    }

    let accuracy = clamp_score(accuracy);
    let completeness = clamp_score(completeness);
    let timeliness = clamp_score(timeliness);
    QualityEstimate {
        accuracy,
        completeness,
        timeliness,
        overall: (accuracy + completeness + timeliness) / 3.0,
    }
}

/// Confidence that `method` is right for `profile`, clamped to [10, 95]
pub fn selection_confidence(method: CollectionMethod, profile: &SiteProfile) -> f64 {
    let mut confidence = CONFIDENCE_BASE;

    if profile.relevance >= 80.0 {
        confidence += 20.0;
    } else if profile.relevance >= 60.0 {
        confidence += 10.0;
    } else if profile.relevance < 40.0 {
        confidence -= 20.0;
    }

    match profile.load_speed {
        LoadSpeed::Fast => confidence += 15.0,
        LoadSpeed::Slow => confidence -= 10.0,
        LoadSpeed::Medium => {}
    }

    if profile.has_anti_bot && method == CollectionMethod::PlaywrightStealth {
        confidence += 15.0;
    }
    if profile.requires_js
        && matches!(method, CollectionMethod::Hybrid | CollectionMethod::PlaywrightStealth)
    {
        confidence += 10.0;
    }
    if profile.structure == PageStructure::Simple && method == CollectionMethod::SimpleHttp {
        confidence += 10.0;
    }

    confidence.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}

/// Picks collection methods and prioritizes tasks
#[derive(Debug, Clone)]
pub struct MethodSelector {
    config: SelectorConfig,
    logger: StructuredLogger,
    metrics: EngineMetrics,
}

impl Default for MethodSelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

impl MethodSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            logger: StructuredLogger::new("selector"),
            metrics: EngineMetrics::new(),
        }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Primary method, fallback chain, estimates and a readable rationale
    /// for one profiled source
    pub fn analyze_and_select_method(&self, profile: &SiteProfile) -> MethodSelection {
        let primary = select_primary_method(profile);
        let fallbacks = fallback_chain(primary);
        let estimated_cost = estimate_cost(primary, profile);
        let expected_quality = estimate_quality(primary, profile);
        let confidence = selection_confidence(primary, profile);

        let mut reasoning = Vec::new();
        if profile.has_anti_bot {
            reasoning.push("anti-bot protection detected".to_string());
        }
        if profile.requires_js {
            reasoning.push(format!("javascript required ({:?} structure)", profile.structure));
        }
        reasoning.push(format!(
            "{:?} load speed, content quality {:.0}",
            profile.load_speed, profile.content_quality
        ));
        reasoning.push(format!("selected {primary}"));

        self.logger
            .log_method_selected(&profile.url, primary.as_str(), fallbacks.len(), confidence);
        self.metrics.inc_method_selected(primary.as_str());

        MethodSelection {
            primary_method: primary,
            fallback_methods: fallbacks,
            estimated_cost,
            expected_quality,
            confidence,
            reasoning,
        }
    }
}
