//! Task function errors.

use thiserror::Error;

use crate::error::ErrorKind;
use crate::job::JobError;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Task was cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }

    /// Record form stored on a failed or cancelled job.
    pub fn to_job_error(&self) -> JobError {
        match self {
            TaskError::Cancelled => JobError::new(ErrorKind::Cancelled, self.to_string()),
            _ => JobError::new(ErrorKind::ExecutionFailure, self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_message_is_verbatim() {
        let err = TaskError::failed("bad input");
        assert_eq!(err.to_string(), "bad input");
        let job_error = err.to_job_error();
        assert_eq!(job_error.kind, ErrorKind::ExecutionFailure);
        assert_eq!(job_error.message, "bad input");
    }

    #[test]
    fn test_cancelled_maps_to_cancelled_kind() {
        assert_eq!(TaskError::Cancelled.to_job_error().kind, ErrorKind::Cancelled);
    }

    #[test]
    fn test_runtime_parameter_error_is_execution_failure() {
        let err = TaskError::InvalidParameters("window_size must be positive".into());
        assert_eq!(err.to_job_error().kind, ErrorKind::ExecutionFailure);
        assert!(err.to_string().contains("window_size"));
    }

    #[test]
    fn test_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: TaskError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }
}
