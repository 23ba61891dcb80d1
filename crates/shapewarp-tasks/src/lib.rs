//! Built-in ShapeWarp task functions.
//!
//! Provides reactivity analysis, structural similarity search and
//! database conversion, plus the query file parser and statistics they
//! share.

pub mod io;
pub mod query;
pub mod stats;
mod tasks;

use std::sync::Arc;

use shapewarp_jobs::{JobsError, TaskRegistry};

pub use tasks::*;

/// Register every built-in task with `registry`.
pub fn register_builtin(registry: &TaskRegistry) -> Result<(), JobsError> {
    registry.register(Arc::new(ReactivityAnalysisTask::new()))?;
    registry.register(Arc::new(ShapeSearchTask::new()))?;
    registry.register(Arc::new(DatabaseConversionTask::new()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shapewarp_jobs::{JobManager, JobStatus, ManagerConfig};
    use std::time::Duration;

    #[test]
    fn test_register_builtin() {
        let registry = TaskRegistry::new();
        register_builtin(&registry).unwrap();

        let types: Vec<String> = registry.task_types().into_iter().map(|t| t.task_type).collect();
        assert_eq!(
            types,
            vec!["database_conversion", "reactivity_analysis", "shape_search"]
        );
        assert!(register_builtin(&registry).is_err());
    }

    #[tokio::test]
    async fn test_builtin_runs_as_job() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("query.txt");
        tokio::fs::write(&input, "e1\nACGU\n0.1,0.5,0.9,NaN\n").await.unwrap();

        let registry = TaskRegistry::new();
        register_builtin(&registry).unwrap();
        let manager = JobManager::in_memory(ManagerConfig::default(), Arc::new(registry));

        let id = manager
            .submit(
                "reactivity_analysis",
                json!({"input_file": input.display().to_string(), "window_size": 2}),
            )
            .await
            .unwrap();

        for _ in 0..400 {
            if manager.status(&id).await.unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(manager.status(&id).await.unwrap().status, JobStatus::Completed);
        let result = manager.result(&id).await.unwrap();
        assert_eq!(result["metadata"]["num_entries"], 1);

        let log = manager.log(&id, None).await.unwrap();
        assert!(log.iter().any(|line| line.starts_with("Analyzed entry e1")));
    }

    #[tokio::test]
    async fn test_invalid_parameters_rejected_at_submission() {
        let registry = TaskRegistry::new();
        register_builtin(&registry).unwrap();
        let manager = JobManager::in_memory(ManagerConfig::default(), Arc::new(registry));

        let err = manager
            .submit("shape_search", json!({"query_file": "q.txt"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), shapewarp_jobs::ErrorKind::InvalidParameters);
        assert!(manager.list(&Default::default()).await.unwrap().is_empty());
    }
}
