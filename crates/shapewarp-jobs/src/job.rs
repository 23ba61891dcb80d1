//! Job record, status and state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, JobsError};

/// Job identifier.
pub type JobId = Uuid;

/// Job status.
///
/// `pending -> running -> {completed | failed | cancelled}`, plus
/// `pending -> cancelled` when a job is cancelled before it starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for an execution slot.
    #[default]
    Pending,
    /// Task function is executing.
    Running,
    /// Task function returned a result.
    Completed,
    /// Task function failed.
    Failed,
    /// Cancelled by a caller.
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = JobsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| JobsError::InvalidParameters(format!("unknown job status '{}'", s)))
    }
}

/// Structured failure description stored on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExecutionFailure, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageFailure, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A state change applied to a stored job record.
#[derive(Debug, Clone)]
pub enum JobTransition {
    /// `pending -> running`.
    Start,
    /// `running -> completed`.
    Complete(serde_json::Value),
    /// `running -> failed`.
    Fail(JobError),
    /// `pending -> cancelled`, before any worker claimed the job.
    CancelPending,
    /// `running -> cancelled`, after the task observed the cancellation signal.
    CancelRunning,
}

impl JobTransition {
    /// Status the record must be in for this transition to apply.
    pub fn source(&self) -> JobStatus {
        match self {
            JobTransition::Start | JobTransition::CancelPending => JobStatus::Pending,
            JobTransition::Complete(_) | JobTransition::Fail(_) | JobTransition::CancelRunning => {
                JobStatus::Running
            }
        }
    }

    /// Status the record ends up in.
    pub fn target(&self) -> JobStatus {
        match self {
            JobTransition::Start => JobStatus::Running,
            JobTransition::Complete(_) => JobStatus::Completed,
            JobTransition::Fail(_) => JobStatus::Failed,
            JobTransition::CancelPending | JobTransition::CancelRunning => JobStatus::Cancelled,
        }
    }

    fn action(&self) -> &'static str {
        match self {
            JobTransition::Start => "start",
            JobTransition::Complete(_) => "complete",
            JobTransition::Fail(_) => "fail",
            JobTransition::CancelPending | JobTransition::CancelRunning => "cancel",
        }
    }
}

/// A tracked invocation of a task function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID.
    pub id: JobId,
    /// Submission order within this jobs directory.
    pub sequence: u64,
    /// Registered task type to invoke.
    pub task_type: String,
    /// Human-readable name.
    pub name: String,
    /// Batch this job was submitted with, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Parameters passed verbatim to the task function.
    pub parameters: serde_json::Value,
    /// Current status.
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Present only when completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Present only when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Where this job's log lines are written.
    #[serde(default)]
    pub log_location: String,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        id: JobId,
        sequence: u64,
        task_type: impl Into<String>,
        name: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            id,
            sequence,
            task_type: task_type.into(),
            name: name.into(),
            batch_id: None,
            parameters,
            status: JobStatus::Pending,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            log_location: String::new(),
        }
    }

    /// Set the batch ID.
    pub fn with_batch(mut self, batch_id: Option<String>) -> Self {
        self.batch_id = batch_id;
        self
    }

    /// Set the log location.
    pub fn with_log_location(mut self, location: impl Into<String>) -> Self {
        self.log_location = location.into();
        self
    }

    /// Apply a transition, enforcing the state machine.
    ///
    /// Timestamps are clamped so they never precede an earlier one.
    pub fn apply(
        &mut self,
        transition: JobTransition,
        now: DateTime<Utc>,
    ) -> Result<(), JobsError> {
        if self.status != transition.source() {
            return Err(JobsError::InvalidState {
                id: self.id,
                status: self.status,
                action: transition.action(),
            });
        }

        let now = now.max(self.latest_timestamp());
        self.status = transition.target();

        match transition {
            JobTransition::Start => {
                self.started_at = Some(now);
            }
            JobTransition::Complete(result) => {
                self.result = Some(result);
                self.finished_at = Some(now);
            }
            JobTransition::Fail(error) => {
                self.error = Some(error);
                self.finished_at = Some(now);
            }
            JobTransition::CancelPending | JobTransition::CancelRunning => {
                self.finished_at = Some(now);
            }
        }

        Ok(())
    }

    fn latest_timestamp(&self) -> DateTime<Utc> {
        self.finished_at
            .or(self.started_at)
            .unwrap_or(self.submitted_at)
    }

    /// Status view returned by `get_job_status`.
    pub fn status_report(&self) -> JobStatusReport {
        JobStatusReport {
            job_id: self.id,
            name: self.name.clone(),
            task_type: self.task_type.clone(),
            status: self.status,
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error.clone(),
        }
    }

    /// Listing view returned by `list_jobs`.
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id,
            name: self.name.clone(),
            task_type: self.task_type.clone(),
            batch_id: self.batch_id.clone(),
            status: self.status,
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Status of a single job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub job_id: JobId,
    pub name: String,
    pub task_type: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

/// One entry of a job listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub name: String,
    pub task_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
