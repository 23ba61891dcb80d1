//! Job manager façade.
//!
//! The only entry point external callers use. Every operation except
//! [`JobManager::run_sync`] returns without waiting on task execution.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ManagerConfig;
use crate::error::JobsError;
use crate::job::{Job, JobError, JobId, JobStatus, JobStatusReport, JobSummary, JobTransition};
use crate::log::{FileLogSink, LogSink, MemoryLogSink};
use crate::registry::{JobRegistry, Phase};
use crate::runner::{RunnerStats, TaskRunner};
use crate::store::{FileJobStore, JobFilter, JobStore, MemoryJobStore};
use crate::task::{TaskContext, TaskError, TaskFunction, TaskInfo, TaskRegistry};

/// A submission request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub task_type: String,
    #[serde(default = "empty_parameters")]
    pub parameters: Value,
    #[serde(default)]
    pub job_name: Option<String>,
}

fn empty_parameters() -> Value {
    Value::Object(Default::default())
}

impl SubmitRequest {
    pub fn new(task_type: impl Into<String>, parameters: Value) -> Self {
        Self {
            task_type: task_type.into(),
            parameters,
            job_name: None,
        }
    }

    pub fn with_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = Some(job_name.into());
        self
    }
}

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub job_id: JobId,
    pub name: String,
    pub status: JobStatus,
}

/// Acknowledgement of a batch submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSubmission {
    pub batch_id: String,
    pub job_ids: Vec<JobId>,
}

/// Result of a cancel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The job had not started and is now `cancelled`.
    Cancelled,
    /// The job is running and has been signalled. Its final status depends
    /// on whether the task observes the signal.
    CancellationRequested,
}

/// What a restart scan found.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Pending jobs queued again.
    pub rescheduled: usize,
    /// Jobs that were running when the previous process stopped.
    pub interrupted: usize,
    /// Terminal jobs indexed as-is.
    pub finished: usize,
}

/// Job manager.
pub struct JobManager {
    config: ManagerConfig,
    store: Arc<dyn JobStore>,
    logs: Arc<dyn LogSink>,
    registry: Arc<JobRegistry>,
    tasks: Arc<TaskRegistry>,
    runner: Arc<TaskRunner>,
    accepting: AtomicBool,
}

impl JobManager {
    /// Create a manager over the given store and log sink.
    pub fn new(
        config: ManagerConfig,
        store: Arc<dyn JobStore>,
        logs: Arc<dyn LogSink>,
        tasks: Arc<TaskRegistry>,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let runner = Arc::new(TaskRunner::new(
            store.clone(),
            logs.clone(),
            registry.clone(),
            tasks.clone(),
            config.max_workers,
        ));

        Self {
            config,
            store,
            logs,
            registry,
            tasks,
            runner,
            accepting: AtomicBool::new(true),
        }
    }

    /// Open a manager persisting jobs under `jobs_dir`.
    ///
    /// Runs recovery first when `recover_on_start` is set.
    pub async fn open(
        config: ManagerConfig,
        jobs_dir: impl Into<PathBuf>,
        tasks: Arc<TaskRegistry>,
    ) -> Result<Self, JobsError> {
        let jobs_dir = jobs_dir.into();
        let store = Arc::new(FileJobStore::new(&jobs_dir).await?);
        let logs = Arc::new(FileLogSink::new(&jobs_dir).await?);

        let manager = Self::new(config, store, logs, tasks);
        if manager.config.recover_on_start {
            let report = manager.recover().await?;
            info!(
                "Recovered jobs from {:?}: {} rescheduled, {} interrupted, {} finished",
                jobs_dir, report.rescheduled, report.interrupted, report.finished
            );
        }

        Ok(manager)
    }

    /// Manager with in-memory store and logs.
    pub fn in_memory(config: ManagerConfig, tasks: Arc<TaskRegistry>) -> Self {
        Self::new(
            config,
            Arc::new(MemoryJobStore::new()),
            Arc::new(MemoryLogSink::new()),
            tasks,
        )
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Validate a submission without creating anything.
    fn precheck(
        &self,
        task_type: &str,
        params: &Value,
    ) -> Result<Arc<dyn TaskFunction>, JobsError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(JobsError::ShuttingDown);
        }

        let task = self.tasks.get(task_type)?;

        if !params.is_object() {
            return Err(JobsError::InvalidParameters(
                "parameters must be a JSON object".to_string(),
            ));
        }

        task.validate(params).map_err(|e| match e {
            TaskError::InvalidParameters(message) => JobsError::InvalidParameters(message),
            other => JobsError::InvalidParameters(other.to_string()),
        })?;

        Ok(task)
    }

    /// Persist a pending record, index it and queue it.
    async fn enqueue(
        &self,
        task_type: &str,
        params: Value,
        name: Option<String>,
        batch_id: Option<String>,
    ) -> Result<Job, JobsError> {
        let id = Uuid::new_v4();
        let name = name.unwrap_or_else(|| default_name(task_type, &id));
        let job = Job::new(id, self.registry.next_sequence(), task_type, name, params)
            .with_batch(batch_id)
            .with_log_location(self.logs.location(&id));

        self.store.create(&job).await?;
        let cancel = self.registry.register(id, self.store.location(&id), Phase::Queued);
        info!("Job {} submitted ({})", id, task_type);

        self.runner.schedule(id, cancel);
        Ok(job)
    }

    /// Submit a job and return its ID.
    pub async fn submit(&self, task_type: &str, parameters: Value) -> Result<JobId, JobsError> {
        let submission = self
            .submit_with(SubmitRequest::new(task_type, parameters))
            .await?;
        Ok(submission.job_id)
    }

    /// Submit a job with an optional name.
    pub async fn submit_with(&self, request: SubmitRequest) -> Result<Submission, JobsError> {
        self.precheck(&request.task_type, &request.parameters)?;
        let job = self
            .enqueue(&request.task_type, request.parameters, request.job_name, None)
            .await?;

        Ok(Submission {
            job_id: job.id,
            name: job.name,
            status: job.status,
        })
    }

    /// Submit one job per parameter bundle, all sharing a batch ID.
    ///
    /// Every bundle is validated before any record is created.
    pub async fn submit_batch(
        &self,
        task_type: &str,
        parameters: Vec<Value>,
        job_name: Option<String>,
    ) -> Result<BatchSubmission, JobsError> {
        if parameters.is_empty() {
            return Err(JobsError::InvalidParameters(
                "batch must contain at least one parameter set".to_string(),
            ));
        }
        for (index, params) in parameters.iter().enumerate() {
            self.precheck(task_type, params).map_err(|e| match e {
                JobsError::InvalidParameters(message) => {
                    JobsError::InvalidParameters(format!("batch item {}: {}", index, message))
                }
                other => other,
            })?;
        }

        let batch_id = Uuid::new_v4().to_string();
        let mut job_ids = Vec::with_capacity(parameters.len());
        for (index, params) in parameters.into_iter().enumerate() {
            let name = job_name.as_ref().map(|n| format!("{}_{}", n, index + 1));
            let job = self
                .enqueue(task_type, params, name, Some(batch_id.clone()))
                .await?;
            job_ids.push(job.id);
        }

        info!("Batch {} submitted with {} jobs ({})", batch_id, job_ids.len(), task_type);
        Ok(BatchSubmission { batch_id, job_ids })
    }

    /// Run a task inline, without a job record.
    pub async fn run_sync(&self, task_type: &str, parameters: Value) -> Result<Value, JobsError> {
        let task = self.precheck(task_type, &parameters)?;
        debug!("Running {} synchronously", task_type);

        let outcome = AssertUnwindSafe(task.run(parameters, TaskContext::detached()))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(JobsError::JobFailed(e.to_job_error())),
            Err(_) => Err(JobsError::JobFailed(JobError::execution(format!(
                "Task {} panicked",
                task_type
            )))),
        }
    }

    async fn lookup(&self, id: &JobId) -> Result<Job, JobsError> {
        if !self.registry.contains(id) {
            return Err(JobsError::NotFound(*id));
        }
        self.store.read(id).await
    }

    /// Current status and timestamps.
    pub async fn status(&self, id: &JobId) -> Result<JobStatusReport, JobsError> {
        Ok(self.lookup(id).await?.status_report())
    }

    /// Result payload of a completed job.
    ///
    /// Failed and cancelled jobs return their stored error.
    pub async fn result(&self, id: &JobId) -> Result<Value, JobsError> {
        let job = self.lookup(id).await?;
        match job.status {
            JobStatus::Completed => Ok(job.result.unwrap_or(Value::Null)),
            JobStatus::Failed => Err(JobsError::JobFailed(
                job.error
                    .unwrap_or_else(|| JobError::execution("job failed without an error record")),
            )),
            JobStatus::Cancelled => Err(JobsError::JobFailed(
                job.error
                    .unwrap_or_else(|| JobError::cancelled(format!("Job {} was cancelled", id))),
            )),
            status => Err(JobsError::NotReady { id: *id, status }),
        }
    }

    /// Last `tail` log lines (config default when `None`, 0 = all).
    pub async fn log(&self, id: &JobId, tail: Option<usize>) -> Result<Vec<String>, JobsError> {
        if !self.registry.contains(id) {
            return Err(JobsError::NotFound(*id));
        }
        let tail = tail.unwrap_or(self.config.default_log_tail);
        self.logs.read_tail(id, tail).await
    }

    /// Cancel a job.
    pub async fn cancel(&self, id: &JobId) -> Result<CancelOutcome, JobsError> {
        let job = self.lookup(id).await?;
        let token = self
            .registry
            .cancel_token(id)
            .ok_or(JobsError::NotFound(*id))?;

        let outcome = match job.status {
            JobStatus::Pending => match self.store.update(id, JobTransition::CancelPending).await {
                Ok(_) => {
                    self.registry.set_phase(id, Phase::Finished);
                    CancelOutcome::Cancelled
                }
                // A worker claimed it in the meantime.
                Err(JobsError::InvalidState {
                    status: JobStatus::Running,
                    ..
                }) => CancelOutcome::CancellationRequested,
                Err(e) => return Err(e),
            },
            JobStatus::Running => CancelOutcome::CancellationRequested,
            status => {
                return Err(JobsError::InvalidState {
                    id: *id,
                    status,
                    action: "cancel",
                })
            }
        };

        token.cancel();

        let line = match outcome {
            CancelOutcome::Cancelled => "Job cancelled before start",
            CancelOutcome::CancellationRequested => "Cancellation requested",
        };
        info!("Job {}: {}", id, line);
        if let Err(e) = self.logs.append(id, line).await {
            warn!("Failed to write log line for job {}: {}", id, e);
        }

        Ok(outcome)
    }

    /// Job summaries ordered by submission time.
    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<JobSummary>, JobsError> {
        let jobs = self.store.list(filter).await?;
        Ok(jobs
            .iter()
            .filter(|job| self.registry.contains(&job.id))
            .map(Job::summary)
            .collect())
    }

    /// Registered task types.
    pub fn task_types(&self) -> Vec<TaskInfo> {
        self.tasks.task_types()
    }

    pub fn stats(&self) -> RunnerStats {
        self.runner.stats()
    }

    /// Index persisted jobs after a restart.
    ///
    /// Pending jobs are queued again. Jobs found `running` were interrupted
    /// and are marked failed; they are never re-run.
    pub async fn recover(&self) -> Result<RecoveryReport, JobsError> {
        let mut report = RecoveryReport::default();

        for job in self.store.list(&JobFilter::all()).await? {
            self.registry.resume_after(job.sequence);
            if self.registry.contains(&job.id) {
                continue;
            }

            let location = self.store.location(&job.id);
            match job.status {
                JobStatus::Pending => {
                    let cancel = self.registry.register(job.id, location, Phase::Queued);
                    self.runner.schedule(job.id, cancel);
                    report.rescheduled += 1;
                }
                JobStatus::Running => {
                    let interrupted =
                        JobTransition::Fail(JobError::execution("Interrupted by restart"));
                    match self.store.update(&job.id, interrupted).await {
                        Ok(_) => {
                            report.interrupted += 1;
                            if let Err(e) = self
                                .logs
                                .append(&job.id, "Job failed: interrupted by restart")
                                .await
                            {
                                warn!("Failed to write log line for job {}: {}", job.id, e);
                            }
                        }
                        Err(e) => warn!("Could not mark interrupted job {} failed: {}", job.id, e),
                    }
                    self.registry.register(job.id, location, Phase::Finished);
                }
                _ => {
                    self.registry.register(job.id, location, Phase::Finished);
                    report.finished += 1;
                }
            }
        }

        Ok(report)
    }

    /// Stop accepting submissions and drain executing jobs.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.accepting.store(false, Ordering::SeqCst);
        info!("Job manager shutting down");
        self.runner.shutdown(grace).await
    }
}

fn default_name(task_type: &str, id: &JobId) -> String {
    let short = id.simple().to_string();
    format!("{}_{}", task_type, &short[..8])
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
