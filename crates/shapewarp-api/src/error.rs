//! API error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use shapewarp_jobs::{ErrorKind, JobsError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Error from the job manager.
    #[error(transparent)]
    Jobs(#[from] JobsError),

    /// Request body or arguments could not be decoded.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// No operation with this name.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Job ID that does not parse cannot name any job.
    #[error("Job not found: {0}")]
    UnknownJob(String),
}

impl ApiError {
    /// Taxonomy kind reported to the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Jobs(e) => e.kind(),
            ApiError::InvalidArguments(_) => ErrorKind::InvalidParameters,
            ApiError::UnknownOperation(_) | ApiError::UnknownJob(_) => ErrorKind::NotFound,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        status_for(self.kind())
    }
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState | ErrorKind::NotReady => StatusCode::CONFLICT,
        ErrorKind::InvalidParameters | ErrorKind::UnknownTaskType => StatusCode::BAD_REQUEST,
        ErrorKind::ExecutionFailure | ErrorKind::Cancelled => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = json!({
            "status": "error",
            "error_kind": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapewarp_jobs::JobStatus;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::InvalidState), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::NotReady), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::InvalidParameters), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::UnknownTaskType), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(ErrorKind::ExecutionFailure),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(ErrorKind::Cancelled), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status_for(ErrorKind::StorageFailure),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_jobs_error_kind_passes_through() {
        let id = Uuid::new_v4();
        let err = ApiError::from(JobsError::NotReady {
            id,
            status: JobStatus::Running,
        });
        assert_eq!(err.kind(), ErrorKind::NotReady);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("not finished"));
    }

    #[test]
    fn test_local_errors() {
        assert_eq!(
            ApiError::InvalidArguments("x".into()).kind(),
            ErrorKind::InvalidParameters
        );
        assert_eq!(
            ApiError::UnknownOperation("frobnicate".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::UnknownJob("abc".into()).kind(), ErrorKind::NotFound);
    }
}
