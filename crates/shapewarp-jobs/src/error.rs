//! Job orchestration errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{JobError, JobId, JobStatus};

/// Machine-readable error category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Unknown job ID.
    NotFound,
    /// Operation is illegal for the job's current state.
    InvalidState,
    /// Parameters rejected before a record was created.
    InvalidParameters,
    /// No task function registered under the requested type.
    UnknownTaskType,
    /// Job has not reached a terminal state yet.
    NotReady,
    /// The task function itself failed.
    ExecutionFailure,
    /// A transition could not be persisted.
    StorageFailure,
    /// The job was cancelled.
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::InvalidParameters => "InvalidParameters",
            ErrorKind::UnknownTaskType => "UnknownTaskType",
            ErrorKind::NotReady => "NotReady",
            ErrorKind::ExecutionFailure => "ExecutionFailure",
            ErrorKind::StorageFailure => "StorageFailure",
            ErrorKind::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job orchestration error types.
#[derive(Debug, Error)]
pub enum JobsError {
    /// Job not found.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// Transition or operation not allowed in the current state.
    #[error("Job {id} is {status}; cannot {action}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        action: &'static str,
    },

    /// Parameters rejected during the submission pre-check.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Task type not present in the registration table.
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    /// Task type registered twice.
    #[error("Task type already registered: {0}")]
    AlreadyRegistered(String),

    /// Result requested before the job finished.
    #[error("Job {id} is not finished (status: {status})")]
    NotReady { id: JobId, status: JobStatus },

    /// Stored failure of a job, or failure of a synchronous run.
    #[error("{0}")]
    JobFailed(JobError),

    /// A record with this ID already exists.
    #[error("Job already exists: {0}")]
    AlreadyExists(JobId),

    /// The manager no longer accepts submissions.
    #[error("Job manager is shutting down")]
    ShuttingDown,

    /// Persistence error.
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl JobsError {
    /// Map this error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobsError::NotFound(_) => ErrorKind::NotFound,
            JobsError::InvalidState { .. } | JobsError::ShuttingDown => ErrorKind::InvalidState,
            JobsError::InvalidParameters(_) | JobsError::AlreadyRegistered(_) => {
                ErrorKind::InvalidParameters
            }
            JobsError::UnknownTaskType(_) => ErrorKind::UnknownTaskType,
            JobsError::NotReady { .. } => ErrorKind::NotReady,
            JobsError::JobFailed(err) => err.kind,
            JobsError::AlreadyExists(_) | JobsError::Storage(_) => ErrorKind::StorageFailure,
        }
    }

    /// Structured description of this error (kind + message).
    pub fn to_job_error(&self) -> JobError {
        match self {
            JobsError::JobFailed(err) => err.clone(),
            other => JobError::new(other.kind(), other.to_string()),
        }
    }
}
