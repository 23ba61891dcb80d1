//! # ShapeWarp Jobs
//!
//! Job orchestration core for long-running analysis tasks.
//!
//! ## Features
//!
//! - Crash-consistent, file-backed job records (one directory per job)
//! - Append-only per-job logs with tail reads
//! - Explicit task registration table
//! - Bounded worker pool with cooperative cancellation
//! - Restart recovery of interrupted and queued jobs
//!
//! ## Layout
//!
//! ```text
//! {jobs_dir}/
//! └── {job_id}/
//!     ├── metadata.json   # task_type, parameters, status, timestamps, result|error
//!     └── log.txt         # append-only log lines
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod log;
pub mod manager;
pub mod registry;
pub mod runner;
pub mod store;
pub mod task;

pub use config::ManagerConfig;
pub use error::{ErrorKind, JobsError};
pub use job::{Job, JobError, JobId, JobStatus, JobStatusReport, JobSummary, JobTransition};
pub use log::{FileLogSink, LogSink, MemoryLogSink};
pub use manager::{
    BatchSubmission, CancelOutcome, JobManager, RecoveryReport, SubmitRequest, Submission,
};
pub use registry::{JobRegistry, Phase};
pub use runner::{RunnerStats, TaskRunner};
pub use store::{FileJobStore, JobFilter, JobStore, MemoryJobStore};
pub use task::{FnTask, TaskContext, TaskError, TaskFunction, TaskInfo, TaskRegistry};
