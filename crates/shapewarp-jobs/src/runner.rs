//! Task runner: executes jobs on a bounded pool of slots.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::JobsError;
use crate::job::{Job, JobError, JobId, JobStatus, JobTransition};
use crate::log::LogSink;
use crate::registry::{JobRegistry, Phase};
use crate::store::JobStore;
use crate::task::{TaskContext, TaskError, TaskRegistry};

/// Runner counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerStats {
    pub max_workers: usize,
    pub available_slots: usize,
    pub executing: usize,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Jobs that were already terminal when a slot freed up.
    pub skipped: u64,
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    skipped: AtomicU64,
}

/// Executes task functions for jobs and drives their records through the
/// state machine.
///
/// Each scheduled job waits for one of `max_workers` slots and holds it for
/// its whole execution. The runner is the only writer of a job once it is
/// `running`.
pub struct TaskRunner {
    store: Arc<dyn JobStore>,
    logs: Arc<dyn LogSink>,
    registry: Arc<JobRegistry>,
    tasks: Arc<TaskRegistry>,
    slots: Arc<Semaphore>,
    max_workers: usize,
    tracker: TaskTracker,
    counters: Counters,
}

impl TaskRunner {
    /// Create a runner with `max_workers` execution slots (at least one).
    pub fn new(
        store: Arc<dyn JobStore>,
        logs: Arc<dyn LogSink>,
        registry: Arc<JobRegistry>,
        tasks: Arc<TaskRegistry>,
        max_workers: usize,
    ) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            store,
            logs,
            registry,
            tasks,
            slots: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            tracker: TaskTracker::new(),
            counters: Counters::default(),
        }
    }

    /// Queue a job for execution. Returns immediately.
    ///
    /// If `cancel` fires before a slot is available the job is dropped from
    /// the queue without being started.
    pub fn schedule(self: &Arc<Self>, id: JobId, cancel: CancellationToken) {
        let runner = self.clone();
        self.tracker.spawn(async move {
            let permit = tokio::select! {
                permit = runner.slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        debug!("Runner closed; job {} left pending", id);
                        return;
                    }
                },
                _ = cancel.cancelled() => {
                    debug!("Job {} cancelled while queued", id);
                    return;
                }
            };

            runner.execute(id, cancel).await;
            drop(permit);
        });
    }

    async fn execute(&self, id: JobId, cancel: CancellationToken) {
        let job = match self.store.update(&id, JobTransition::Start).await {
            Ok(job) => job,
            Err(JobsError::InvalidState { status, .. }) => {
                debug!("Job {} is already {}; skipping execution", id, status);
                self.counters.skipped.fetch_add(1, Ordering::SeqCst);
                self.registry.set_phase(&id, Phase::Finished);
                return;
            }
            Err(e) => {
                error!("Failed to start job {}: {}", id, e);
                self.log_line(
                    &id,
                    &format!("Job could not be started, left pending until recovery: {}", e),
                )
                .await;
                self.registry.set_phase(&id, Phase::Finished);
                return;
            }
        };

        self.registry.set_phase(&id, Phase::Executing);
        info!("Job {} ({}) started", id, job.task_type);
        self.log_line(&id, &format!("Job started: {} ({})", job.name, job.task_type))
            .await;

        let transition = self.invoke(&job, cancel).await;
        self.finish(&id, transition).await;

        self.registry.set_phase(&id, Phase::Finished);
    }

    /// Run the task function and turn its outcome into a transition.
    async fn invoke(&self, job: &Job, cancel: CancellationToken) -> JobTransition {
        let task = match self.tasks.get(&job.task_type) {
            Ok(task) => task,
            Err(e) => return JobTransition::Fail(e.to_job_error()),
        };

        let ctx = TaskContext::for_job(job.id, cancel, self.logs.clone());
        let outcome = AssertUnwindSafe(task.run(job.parameters.clone(), ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => JobTransition::Complete(result),
            Ok(Err(TaskError::Cancelled)) => JobTransition::CancelRunning,
            Ok(Err(e)) => JobTransition::Fail(e.to_job_error()),
            Err(panic) => JobTransition::Fail(JobError::execution(format!(
                "Task panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    /// Persist the terminal transition, falling back to a storage failure
    /// record if that is not possible.
    async fn finish(&self, id: &JobId, transition: JobTransition) {
        let target = transition.target();
        let failure = match &transition {
            JobTransition::Fail(err) => Some(err.message.clone()),
            _ => None,
        };

        match self.store.update(id, transition).await {
            Ok(job) => {
                self.count(job.status);
                match failure {
                    Some(message) => {
                        info!("Job {} failed: {}", id, message);
                        self.log_line(id, &format!("Job failed: {}", message)).await;
                    }
                    None => {
                        info!("Job {} finished: {}", id, job.status);
                        self.log_line(id, &format!("Job finished: {}", job.status))
                            .await;
                    }
                }
            }
            Err(e) => {
                error!("Failed to persist {} state for job {}: {}", target, id, e);
                let fallback = JobTransition::Fail(JobError::storage(format!(
                    "Failed to persist {} state: {}",
                    target, e
                )));
                match self.store.update(id, fallback).await {
                    Ok(_) => {
                        self.count(JobStatus::Failed);
                        self.log_line(id, &format!("Job failed: {}", e)).await;
                    }
                    Err(e) => error!("Job {} left running; record not writable: {}", id, e),
                }
            }
        }
    }

    fn count(&self, status: JobStatus) {
        let counter = match status {
            JobStatus::Completed => &self.counters.completed,
            JobStatus::Failed => &self.counters.failed,
            JobStatus::Cancelled => &self.counters.cancelled,
            JobStatus::Pending | JobStatus::Running => return,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    async fn log_line(&self, id: &JobId, line: &str) {
        if let Err(e) = self.logs.append(id, line).await {
            warn!("Failed to write log line for job {}: {}", id, e);
        }
    }

    /// Number of free execution slots.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn stats(&self) -> RunnerStats {
        RunnerStats {
            max_workers: self.max_workers,
            available_slots: self.available_slots(),
            executing: self.registry.executing().len(),
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            cancelled: self.counters.cancelled.load(Ordering::SeqCst),
            skipped: self.counters.skipped.load(Ordering::SeqCst),
        }
    }

    /// Stop taking slots, signal every unfinished job and wait up to `grace`
    /// for executing jobs to return.
    ///
    /// Queued jobs stay `pending` in the store. Returns `true` when every
    /// job drained in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.slots.close();
        let signalled = self.registry.cancel_unfinished();
        self.tracker.close();
        info!("Task runner shutting down; signalled {} jobs", signalled);

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                info!("Task runner drained");
                true
            }
            Err(_) => {
                warn!(
                    "Task runner shutdown grace of {:?} expired with {} jobs executing",
                    grace,
                    self.registry.executing().len()
                );
                false
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
