//! Quality improvement suggestions

use super::QualityMaximizer;
use crate::models::{CollectionMethod, ResourceUsage};
use serde::{Deserialize, Serialize};

/// Observed quality of a collection, all 0-100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub accuracy: f64,
    pub completeness: f64,
    pub timeliness: f64,
    pub consistency: f64,
    pub overall: f64,
}

impl QualityMetrics {
    /// Metrics with `overall` set to the mean of the four sub-metrics
    pub fn new(accuracy: f64, completeness: f64, timeliness: f64, consistency: f64) -> Self {
        Self {
            accuracy,
            completeness,
            timeliness,
            consistency,
            overall: (accuracy + completeness + timeliness + consistency) / 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCategory {
    Accuracy,
    Completeness,
    Timeliness,
    Consistency,
    ResourceOptimization,
    MethodUpgrade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySuggestion {
    pub category: SuggestionCategory,
    pub suggestion: String,
    /// Set on method upgrades
    pub method: Option<CollectionMethod>,
}

impl QualitySuggestion {
    fn canned(category: SuggestionCategory, suggestion: &str) -> Self {
        Self {
            category,
            suggestion: suggestion.to_string(),
            method: None,
        }
    }
}

impl QualityMaximizer {
    pub fn suggest_quality_improvements(
        &self,
        metrics: &QualityMetrics,
        resources: &ResourceUsage,
        method: CollectionMethod,
    ) -> Vec<QualitySuggestion> {
        let config = self.config();
        let mut out = Vec::new();

        if metrics.accuracy < config.accuracy_target {
            out.push(QualitySuggestion::canned(
                SuggestionCategory::Accuracy,
                "cross-check extracted values against a second source",
            ));
        }
        if metrics.completeness < config.completeness_target {
            out.push(QualitySuggestion::canned(
                SuggestionCategory::Completeness,
                "render dynamic sections before extraction",
            ));
        }
        if metrics.timeliness < config.timeliness_target {
            out.push(QualitySuggestion::canned(
                SuggestionCategory::Timeliness,
                "shorten the collection interval for fast-moving sources",
            ));
        }
        if metrics.consistency < config.consistency_target {
            out.push(QualitySuggestion::canned(
                SuggestionCategory::Consistency,
                "normalize field formats across sources",
            ));
        }

        let memory_percent = if config.memory_budget_mb > 0.0 {
            resources.memory_mb / config.memory_budget_mb * 100.0
        } else {
            0.0
        };
        if resources.cpu_percent > config.cpu_pressure_percent
            || memory_percent > config.memory_pressure_percent
        {
            out.push(QualitySuggestion::canned(
                SuggestionCategory::ResourceOptimization,
                "lower concurrency of browser-based tasks to free resources",
            ));
        }

        if metrics.overall < config.overall_upgrade_threshold {
            if let Some(next) = method.upgrade() {
                out.push(QualitySuggestion {
                    category: SuggestionCategory::MethodUpgrade,
                    suggestion: format!("switch from {method} to {next}"),
                    method: Some(next),
                });
            }
        }

        out
    }
}
