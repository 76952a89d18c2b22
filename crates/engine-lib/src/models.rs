//! Core data models for the collection engine

use serde::{Deserialize, Serialize};

/// Retrieval technique used to pull data from a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMethod {
    /// Plain GET and static HTML parsing
    SimpleHttp,
    /// HTTP first, a headless browser for the parts that need rendering
    Hybrid,
    /// Full browser session with anti-detection measures
    PlaywrightStealth,
    /// The source's own API, when it offers one
    ApiPreferred,
}

impl CollectionMethod {
    /// One-step upgrade towards a heavier technique.
    ///
    /// `PlaywrightStealth` and `ApiPreferred` have nowhere further to go.
    pub fn upgrade(self) -> Option<CollectionMethod> {
        match self {
            CollectionMethod::SimpleHttp => Some(CollectionMethod::Hybrid),
            CollectionMethod::Hybrid => Some(CollectionMethod::PlaywrightStealth),
            CollectionMethod::PlaywrightStealth | CollectionMethod::ApiPreferred => None,
        }
    }

    /// Wire name, as used in metric labels and serialized plans
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionMethod::SimpleHttp => "simple_http",
            CollectionMethod::Hybrid => "hybrid",
            CollectionMethod::PlaywrightStealth => "playwright_stealth",
            CollectionMethod::ApiPreferred => "api_preferred",
        }
    }
}

impl std::fmt::Display for CollectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load speed bucket derived from the average probe response time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSpeed {
    Fast,
    Medium,
    Slow,
}

impl LoadSpeed {
    /// <1000ms fast, <3000ms medium, else slow
    pub fn from_response_ms(avg_ms: f64) -> Self {
        if avg_ms < 1000.0 {
            LoadSpeed::Fast
        } else if avg_ms < 3000.0 {
            LoadSpeed::Medium
        } else {
            LoadSpeed::Slow
        }
    }
}

/// Page structure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStructure {
    /// Mostly static markup with a clear content region
    Simple,
    /// Heavy markup or many nested layout blocks
    Complex,
    /// Content assembled client-side
    Dynamic,
}

/// How often the source publishes new content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateFrequency {
    High,
    Medium,
    Low,
}

/// Preferred time window for collecting from a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionWindow {
    Anytime,
    /// While the relevant exchanges are open
    MarketHours,
    /// Outside the source's busy hours
    OffPeak,
}

/// Technical and quality assessment of one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub url: String,
    /// Meaningful content only appears after scripts run
    pub requires_js: bool,
    /// Blocking status, challenge page or protection headers were seen
    pub has_anti_bot: bool,
    pub load_speed: LoadSpeed,
    pub structure: PageStructure,
    pub update_frequency: UpdateFrequency,
    /// 0-100
    pub content_quality: f64,
    /// 0-100
    pub relevance: f64,
    pub best_window: CollectionWindow,
    /// Method the profiler recommends for this source
    pub optimal_method: CollectionMethod,
    pub avg_response_ms: f64,
    /// Fraction of performance samples that succeeded (0-1)
    pub stability: f64,
    /// Unix seconds
    pub generated_at: i64,
    /// Set when probing failed and the conservative default was returned
    #[serde(default)]
    pub fallback: bool,
}

/// One unit of collection work for a single source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionTask {
    pub id: String,
    pub source_url: String,
    pub method: CollectionMethod,
    /// 0-100
    pub priority: f64,
    pub estimated_time_ms: u64,
    /// Ids of tasks that must finish first
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl CollectionTask {
    pub fn new(
        id: impl Into<String>,
        source_url: impl Into<String>,
        method: CollectionMethod,
        priority: f64,
        estimated_time_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            method,
            priority: clamp_score(priority),
            estimated_time_ms,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// Resources consumed so far by a collection run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(default)]
    pub time_ms: u64,
    #[serde(default)]
    pub memory_mb: f64,
    #[serde(default)]
    pub cpu_percent: f64,
}

/// Live snapshot of a collection run, owned by the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    #[serde(default)]
    pub current_tasks: Vec<CollectionTask>,
    #[serde(default)]
    pub completed_tasks: Vec<CollectionTask>,
    #[serde(default)]
    pub failed_tasks: Vec<CollectionTask>,
    #[serde(default)]
    pub resources_used: ResourceUsage,
    /// None when the orchestrator has not reported a deadline
    #[serde(default)]
    pub time_remaining_ms: Option<u64>,
    /// Running mean over the outcomes that reported a quality score
    #[serde(default)]
    pub quality_achieved: Option<f64>,
    /// Outcomes folded into `quality_achieved`
    #[serde(default)]
    pub quality_samples: u64,
}

impl ExecutionState {
    /// In-flight, completed and failed tasks together
    pub fn total_tasks(&self) -> usize {
        self.current_tasks.len() + self.completed_tasks.len() + self.failed_tasks.len()
    }

    /// Move an in-flight task to the completed or failed set.
    ///
    /// Returns false when no in-flight task carries `task_id`.
    pub fn settle_task(&mut self, task_id: &str, success: bool) -> bool {
        let Some(pos) = self.current_tasks.iter().position(|t| t.id == task_id) else {
            return false;
        };
        let task = self.current_tasks.remove(pos);
        if success {
            self.completed_tasks.push(task);
        } else {
            self.failed_tasks.push(task);
        }
        true
    }
}

/// Clamp a score into the [0, 100] range. NaN collapses to 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
