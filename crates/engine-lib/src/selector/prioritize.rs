//! Batch task prioritization

use super::{base_cost, estimate_cost, MethodSelector};
use crate::models::{clamp_score, CollectionMethod, CollectionTask, SiteProfile};
use crate::sources::matches_domain;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const HIGH_PRIORITY_THRESHOLD: f64 = 80.0;
pub const MEDIUM_PRIORITY_THRESHOLD: f64 = 50.0;

/// How soon the caller needs the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Priorities drop by the low-urgency penalty
    Low,
    #[default]
    Normal,
    /// Priorities gain the high-urgency bonus
    High,
}

/// A source to schedule, with its profile when one has been generated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRequest {
    pub url: String,
    #[serde(default)]
    pub profile: Option<SiteProfile>,
}

impl SourceRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            profile: None,
        }
    }

    pub fn with_profile(profile: SiteProfile) -> Self {
        Self {
            url: profile.url.clone(),
            profile: Some(profile),
        }
    }
}

/// A batch of sources plus the caller's constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritizationContext {
    pub sources: Vec<SourceRequest>,
    #[serde(default)]
    pub urgency: Urgency,
    /// Required data quality, 0-100
    #[serde(default)]
    pub quality_requirement: f64,
}

/// Tasks bucketed by priority: high above 80, medium above 50
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrioritizedTasks {
    pub high_priority: Vec<CollectionTask>,
    pub medium_priority: Vec<CollectionTask>,
    pub low_priority: Vec<CollectionTask>,
    /// Task ids, priority descending, then estimated time ascending, then id
    pub execution_order: Vec<String>,
}

impl PrioritizedTasks {
    pub fn len(&self) -> usize {
        self.high_priority.len() + self.medium_priority.len() + self.low_priority.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All tasks in execution order
    pub fn ordered_tasks(&self) -> Vec<CollectionTask> {
        let mut all: Vec<CollectionTask> = self
            .high_priority
            .iter()
            .chain(&self.medium_priority)
            .chain(&self.low_priority)
            .cloned()
            .collect();
        all.sort_by(execution_cmp);
        all
    }
}

fn execution_cmp(a: &CollectionTask, b: &CollectionTask) -> Ordering {
    b.priority
        .partial_cmp(&a.priority)
        .unwrap_or(Ordering::Equal)
        .then(a.estimated_time_ms.cmp(&b.estimated_time_ms))
        .then_with(|| a.id.cmp(&b.id))
}

impl MethodSelector {
    /// Base priority adjusted for domain value, urgency and the quality
    /// requirement, clamped to 0-100
    pub fn source_priority(&self, url: &str, context: &PrioritizationContext) -> f64 {
        let config = self.config();
        let mut priority = config.base_priority;

        let domains: Vec<&str> = config.high_value_domains.iter().map(String::as_str).collect();
        if matches_domain(url, &domains) {
            priority += config.high_value_bonus;
        }

        match context.urgency {
            Urgency::High => priority += config.high_urgency_bonus,
            Urgency::Low => priority -= config.low_urgency_penalty,
            Urgency::Normal => {}
        }

        if context.quality_requirement > config.quality_requirement_threshold {
            priority += config.quality_requirement_bonus;
        }

        clamp_score(priority)
    }

    pub fn prioritize_collection_methods(&self, context: &PrioritizationContext) -> PrioritizedTasks {
        let mut result = PrioritizedTasks::default();
        let mut all = Vec::with_capacity(context.sources.len());

        for (index, source) in context.sources.iter().enumerate() {
            let (method, estimated_ms) = match &source.profile {
                Some(profile) => (
                    profile.optimal_method,
                    estimate_cost(profile.optimal_method, profile).time_ms,
                ),
                None => (
                    CollectionMethod::SimpleHttp,
                    base_cost(CollectionMethod::SimpleHttp).time_ms,
                ),
            };
            let priority = self.source_priority(&source.url, context);
            let task = CollectionTask::new(
                format!("task-{index:03}"),
                source.url.clone(),
                method,
                priority,
                estimated_ms.round() as u64,
            );
            all.push(task);
        }

        all.sort_by(execution_cmp);
        result.execution_order = all.iter().map(|t| t.id.clone()).collect();

        for task in all {
            if task.priority > HIGH_PRIORITY_THRESHOLD {
                result.high_priority.push(task);
            } else if task.priority > MEDIUM_PRIORITY_THRESHOLD {
                result.medium_priority.push(task);
            } else {
                result.low_priority.push(task);
            }
        }

        tracing::debug!(
            event = "tasks_prioritized",
            high = result.high_priority.len(),
            medium = result.medium_priority.len(),
            low = result.low_priority.len(),
            "Prioritized collection tasks"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LoadSpeed, PageStructure};
    use crate::selector::tests::profile;

    fn context(urls: &[&str], urgency: Urgency, quality_requirement: f64) -> PrioritizationContext {
        PrioritizationContext {
            sources: urls.iter().map(|u| SourceRequest::new(*u)).collect(),
            urgency,
            quality_requirement,
        }
    }

    #[test]
    fn test_priority_bonuses_stack() {
        let selector = MethodSelector::default();
        let ctx = context(&[], Urgency::High, 90.0);
        // 50 + 30 + 20 + 15, clamped
        assert_eq!(selector.source_priority("https://www.reuters.com/markets", &ctx), 100.0);
        assert_eq!(selector.source_priority("https://blog.example.org", &ctx), 85.0);

        let low = context(&[], Urgency::Low, 50.0);
        assert_eq!(selector.source_priority("https://blog.example.org", &low), 40.0);
    }

    #[test]
    fn test_buckets_and_order() {
        let selector = MethodSelector::default();
        let ctx = context(
            &[
                "https://blog.example.org/a",
                "https://www.reuters.com/markets",
                "https://blog.example.org/b",
            ],
            Urgency::Normal,
            50.0,
        );
        let result = selector.prioritize_collection_methods(&ctx);

        assert_eq!(result.len(), 3);
        assert_eq!(result.medium_priority.len(), 1);
        assert_eq!(result.low_priority.len(), 2);
        assert!(result.high_priority.is_empty());
        assert_eq!(result.execution_order, vec!["task-001", "task-000", "task-002"]);
    }

    #[test]
    fn test_profiled_source_uses_its_method_and_cost() {
        let selector = MethodSelector::default();
        let slow = SiteProfile {
            url: "https://slow.example.org".to_string(),
            load_speed: LoadSpeed::Slow,
            structure: PageStructure::Complex,
            optimal_method: CollectionMethod::Hybrid,
            ..profile()
        };
        let fast = SiteProfile {
            url: "https://fast.example.org".to_string(),
            ..profile()
        };
        let ctx = PrioritizationContext {
            sources: vec![SourceRequest::with_profile(slow), SourceRequest::with_profile(fast)],
            urgency: Urgency::Normal,
            quality_requirement: 0.0,
        };
        let result = selector.prioritize_collection_methods(&ctx);
        let ordered = result.ordered_tasks();

        // Equal priority; the cheaper task runs first
        assert_eq!(ordered[0].source_url, "https://fast.example.org");
        assert_eq!(ordered[0].estimated_time_ms, 2_000);
        assert_eq!(ordered[1].method, CollectionMethod::Hybrid);
        assert_eq!(ordered[1].estimated_time_ms, 11_500);
    }
}
