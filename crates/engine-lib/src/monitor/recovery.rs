//! Graduated emergency recovery

use super::ExecutionMonitor;
use crate::models::CollectionMethod;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Failure report that triggers a recovery plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorState {
    pub severity: Severity,
    pub error: String,
    #[serde(default)]
    pub affected_tasks: Vec<String>,
    #[serde(default)]
    pub session_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecoveryAction {
    Restart {
        scope: String,
    },
    FallbackMethod {
        method: CollectionMethod,
    },
    ReduceParallelism {
        factor: f64,
    },
    Retry {
        max_attempts: u32,
        backoff_multiplier: f64,
    },
    Skip {
        task_ids: Vec<String>,
    },
    Log {
        message: String,
    },
}

impl RecoveryAction {
    pub fn name(&self) -> &'static str {
        match self {
            RecoveryAction::Restart { .. } => "restart",
            RecoveryAction::FallbackMethod { .. } => "fallback_method",
            RecoveryAction::ReduceParallelism { .. } => "reduce_parallelism",
            RecoveryAction::Retry { .. } => "retry",
            RecoveryAction::Skip { .. } => "skip",
            RecoveryAction::Log { .. } => "log",
        }
    }
}

/// Most conservative configuration to run with while recovering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallbackDescriptor {
    pub method: CollectionMethod,
    pub concurrency: usize,
    pub timeout_ms: u64,
}

impl Default for FallbackDescriptor {
    fn default() -> Self {
        Self {
            method: CollectionMethod::SimpleHttp,
            concurrency: 1,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub severity: Severity,
    pub actions: Vec<RecoveryAction>,
    pub estimated_recovery_ms: u64,
    pub fallback: FallbackDescriptor,
}

impl ExecutionMonitor {
    pub fn emergency_recovery(&self, state: &ErrorState) -> RecoveryPlan {
        let (actions, estimated_recovery_ms) = match state.severity {
            Severity::Critical => (
                vec![RecoveryAction::Restart {
                    scope: "collection_run".to_string(),
                }],
                30_000,
            ),
            Severity::High => (
                vec![
                    RecoveryAction::FallbackMethod {
                        method: CollectionMethod::SimpleHttp,
                    },
                    RecoveryAction::ReduceParallelism { factor: 0.5 },
                ],
                10_000,
            ),
            Severity::Medium => (
                vec![RecoveryAction::Retry {
                    max_attempts: 2,
                    backoff_multiplier: 1.5,
                }],
                5_000,
            ),
            Severity::Low => (
                vec![
                    RecoveryAction::Skip {
                        task_ids: state.affected_tasks.clone(),
                    },
                    RecoveryAction::Log {
                        message: state.error.clone(),
                    },
                ],
                1_000,
            ),
        };

        let names: Vec<&str> = actions.iter().map(RecoveryAction::name).collect();
        self.logger
            .log_recovery(state.severity.as_str(), &names, estimated_recovery_ms);
        self.metrics.inc_recovery(state.severity.as_str());

        RecoveryPlan {
            severity: state.severity,
            actions,
            estimated_recovery_ms,
            fallback: FallbackDescriptor::default(),
        }
    }
}
