//! Adaptive data-collection decision engine
//!
//! This crate decides how to collect from external information sources:
//! - Site profiling (accessibility, anti-bot, JS, performance, content)
//! - Collection method selection and task prioritization
//! - Time budgets, execution plans and mid-run reallocation
//! - Pareto efficiency, marginal utility and optimization plans
//! - Execution monitoring, bottlenecks and emergency recovery
//! - Source screening and quality maximization

pub mod allocator;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod optimizer;
pub mod profiler;
pub mod quality;
pub mod selector;
pub mod signals;
pub mod sources;

pub use config::EngineConfig;
pub use engine::{CollectionEngine, RebalanceReport, RunPlan, RunRequest};
pub use error::{EngineError, EngineResult};
pub use executor::{CollectionExecutor, ExecutionOutcome};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
