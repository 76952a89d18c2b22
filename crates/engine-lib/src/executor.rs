//! Seam to the adapters that actually collect data

use crate::models::CollectionTask;
use crate::profiler::FailureKind;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub data_items: u64,
    #[serde(default)]
    pub error: Option<String>,
    /// Failure class, when the adapter knows it
    #[serde(default)]
    pub failure: Option<FailureKind>,
    /// Observed data quality, 0-100
    #[serde(default)]
    pub quality: Option<f64>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl ExecutionOutcome {
    pub fn succeeded(data_items: u64, quality: f64, elapsed_ms: u64) -> Self {
        Self {
            success: true,
            data_items,
            quality: Some(quality),
            elapsed_ms,
            ..Default::default()
        }
    }

    pub fn failed(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            failure: Some(kind),
            ..Default::default()
        }
    }
}

/// Runs one collection task with the task's method.
#[async_trait]
pub trait CollectionExecutor: Send + Sync {
    async fn execute(&self, task: &CollectionTask) -> Result<ExecutionOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CollectionMethod;

    struct Echo;

    #[async_trait]
    impl CollectionExecutor for Echo {
        async fn execute(&self, task: &CollectionTask) -> Result<ExecutionOutcome> {
            match task.method {
                CollectionMethod::ApiPreferred => Ok(ExecutionOutcome::failed(FailureKind::HttpError, "no api key")),
                _ => Ok(ExecutionOutcome::succeeded(3, 75.0, 1_200)),
            }
        }
    }

    #[test]
    fn test_executor_outcomes() {
        let ok = CollectionTask::new("a", "https://example.org", CollectionMethod::Hybrid, 50.0, 1_000);
        let api = CollectionTask::new("b", "https://example.org", CollectionMethod::ApiPreferred, 50.0, 1_000);

        let outcome = tokio_test::block_on(Echo.execute(&ok)).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.quality, Some(75.0));
        assert!(outcome.error.is_none());

        let outcome = tokio_test::block_on(Echo.execute(&api)).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(FailureKind::HttpError));
        assert_eq!(outcome.data_items, 0);
    }
}
