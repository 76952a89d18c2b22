//! Execution plan construction over the task dependency graph

use super::ResourceAllocator;
use crate::error::{EngineError, EngineResult};
use crate::models::CollectionTask;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Tasks with no declared dependency, run concurrently
    pub parallel_tasks: Vec<CollectionTask>,
    /// Dependent tasks in topological order
    pub sequential_tasks: Vec<CollectionTask>,
    /// Longest parallel task plus the sum of the sequential stage
    pub estimated_total_ms: u64,
    /// min(parallel task count, configured max); 0 when there is no parallel stage
    pub concurrency_limit: usize,
}

impl ExecutionPlan {
    pub fn task_count(&self) -> usize {
        self.parallel_tasks.len() + self.sequential_tasks.len()
    }
}

impl ResourceAllocator {
    pub fn optimize_execution_plan(&self, tasks: &[CollectionTask]) -> EngineResult<ExecutionPlan> {
        let order = topological_order(tasks)?;

        let mut plan = ExecutionPlan::default();
        for index in order {
            let task = &tasks[index];
            if task.dependencies.is_empty() {
                plan.parallel_tasks.push(task.clone());
            } else {
                plan.sequential_tasks.push(task.clone());
            }
        }

        let parallel_ms = plan
            .parallel_tasks
            .iter()
            .map(|t| t.estimated_time_ms)
            .max()
            .unwrap_or(0);
        let sequential_ms = plan
            .sequential_tasks
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(t.estimated_time_ms));
        plan.estimated_total_ms = parallel_ms.saturating_add(sequential_ms);
        plan.concurrency_limit = plan.parallel_tasks.len().min(self.config().max_concurrency);

        self.logger.log_plan(
            tasks.len(),
            plan.parallel_tasks.len(),
            plan.sequential_tasks.len(),
            plan.estimated_total_ms,
        );

        Ok(plan)
    }
}

/// Kahn's algorithm over task indices. Ready tasks are released in input
/// order so the result is stable for a given slice.
fn topological_order(tasks: &[CollectionTask]) -> EngineResult<Vec<usize>> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        if index.insert(task.id.as_str(), i).is_some() {
            return Err(EngineError::DuplicateTask(task.id.clone()));
        }
    }

    let mut in_degree = vec![0usize; tasks.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (i, task) in tasks.iter().enumerate() {
        let mut seen = HashSet::new();
        for dep in &task.dependencies {
            let Some(&d) = index.get(dep.as_str()) else {
                return Err(EngineError::UnknownDependency {
                    task: task.id.clone(),
                    dependency: dep.clone(),
                });
            };
            if seen.insert(d) {
                in_degree[i] += 1;
                dependents[d].push(i);
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..tasks.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(tasks.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for &next in &dependents[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() < tasks.len() {
        let cycle: Vec<String> = (0..tasks.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| tasks[i].id.clone())
            .collect();
        return Err(EngineError::CyclicDependency(cycle));
    }

    Ok(order)
}
