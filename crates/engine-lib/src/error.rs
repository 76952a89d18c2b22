//! Errors for malformed engine input
//!
//! Operational problems (failed probes, blown budgets, runtime failures) are
//! absorbed into degraded results. Only caller mistakes surface here.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("dependency cycle detected involving tasks: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("duplicate task id {0}")]
    DuplicateTask(String),

    #[error("unknown monitoring session {0}")]
    UnknownSession(u64),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
