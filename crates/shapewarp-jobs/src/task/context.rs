//! Task execution context.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::TaskError;
use crate::job::JobId;
use crate::log::LogSink;

/// Context handed to a task function for one invocation.
#[derive(Clone)]
pub struct TaskContext {
    /// Job being executed; `None` for synchronous runs.
    pub job_id: Option<JobId>,

    /// Cooperative cancellation signal.
    pub cancel: CancellationToken,

    log: Option<Arc<dyn LogSink>>,
}

impl TaskContext {
    /// Context for a synchronous run with no job record and no log.
    pub fn detached() -> Self {
        Self {
            job_id: None,
            cancel: CancellationToken::new(),
            log: None,
        }
    }

    /// Context for a tracked job.
    pub fn for_job(job_id: JobId, cancel: CancellationToken, log: Arc<dyn LogSink>) -> Self {
        Self {
            job_id: Some(job_id),
            cancel,
            log: Some(log),
        }
    }

    /// Whether cancellation has been requested.
    ///
    /// Tasks that never check this cannot be cancelled once running.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(TaskError::Cancelled)` once cancellation has been requested.
    pub fn check_cancelled(&self) -> Result<(), TaskError> {
        if self.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when cancellation is requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Write a progress line to the job log.
    ///
    /// Log failures are reported but never fail the task.
    pub async fn log(&self, line: impl AsRef<str>) {
        let (Some(job_id), Some(sink)) = (self.job_id, &self.log) else {
            return;
        };
        if let Err(e) = sink.append(&job_id, line.as_ref()).await {
            warn!("Failed to write log line for job {}: {}", job_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLogSink;
    use uuid::Uuid;

    #[test]
    fn test_detached_context() {
        let ctx = TaskContext::detached();
        assert!(ctx.job_id.is_none());
        assert!(!ctx.is_cancelled());
        assert!(ctx.check_cancelled().is_ok());
    }

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let ctx =
            TaskContext::for_job(Uuid::new_v4(), token.clone(), Arc::new(MemoryLogSink::new()));
        let cloned = ctx.clone();
        token.cancel();
        assert!(cloned.is_cancelled());
        assert!(matches!(ctx.check_cancelled(), Err(TaskError::Cancelled)));
    }

    #[tokio::test]
    async fn test_log_writes_to_job_sink() {
        let sink = Arc::new(MemoryLogSink::new());
        let id = Uuid::new_v4();
        let ctx = TaskContext::for_job(id, CancellationToken::new(), sink.clone());
        ctx.log("processing entry 1").await;
        assert_eq!(sink.read_tail(&id, 0).await.unwrap(), vec!["processing entry 1"]);
    }

    #[tokio::test]
    async fn test_detached_log_is_noop() {
        TaskContext::detached().log("ignored").await;
    }
}
