//! Task registration table.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::TaskFunction;
use crate::error::JobsError;

/// Catalogue entry for a registered task type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_type: String,
    pub description: String,
}

/// Maps task type names to task functions. Built once at startup.
pub struct TaskRegistry {
    tasks: DashMap<String, Arc<dyn TaskFunction>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Register a task function.
    ///
    /// Returns an error if the task type is already registered.
    pub fn register(&self, task: Arc<dyn TaskFunction>) -> Result<(), JobsError> {
        let task_type = task.task_type().to_string();

        if self.tasks.contains_key(&task_type) {
            return Err(JobsError::AlreadyRegistered(task_type));
        }

        self.tasks.insert(task_type, task);
        Ok(())
    }

    /// Look up a task function.
    pub fn get(&self, task_type: &str) -> Result<Arc<dyn TaskFunction>, JobsError> {
        self.tasks
            .get(task_type)
            .map(|task| task.clone())
            .ok_or_else(|| JobsError::UnknownTaskType(task_type.to_string()))
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.tasks.contains_key(task_type)
    }

    /// Registered task types, sorted by name.
    pub fn task_types(&self) -> Vec<TaskInfo> {
        let mut infos: Vec<TaskInfo> = self
            .tasks
            .iter()
            .map(|entry| TaskInfo {
                task_type: entry.key().clone(),
                description: entry.value().description().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.task_type.cmp(&b.task_type));
        infos
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
