//! Task registration for ShapeWarp.

use std::sync::Arc;

use tracing::info;

use shapewarp_jobs::{JobsError, TaskRegistry};

/// Registration table of every task type the service can run.
pub(crate) fn build_task_registry() -> Result<Arc<TaskRegistry>, JobsError> {
    let registry = TaskRegistry::new();
    shapewarp_tasks::register_builtin(&registry)?;

    for task in registry.task_types() {
        info!("Registered task type: {}", task.task_type);
    }

    Ok(Arc::new(registry))
}
