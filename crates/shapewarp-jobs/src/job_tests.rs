//! Tests for the job state machine.

use super::*;
use chrono::Duration;
use serde_json::json;

fn pending_job() -> Job {
    Job::new(Uuid::new_v4(), 1, "sleep", "sleep_job", json!({"seconds": 1}))
}

#[test]
fn test_status_defaults_to_pending() {
    assert_eq!(JobStatus::default(), JobStatus::Pending);
    let status: JobStatus = serde_json::from_value(json!("pending")).unwrap();
    assert_eq!(status, JobStatus::default());
}

#[test]
fn test_job_new() {
    let job = pending_job();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.started_at.is_none());
    assert!(job.finished_at.is_none());
    assert!(job.result.is_none());
    assert!(job.error.is_none());
}

#[test]
fn test_full_success_path() {
    let mut job = pending_job();
    job.apply(JobTransition::Start, Utc::now()).unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert!(job.started_at.is_some());

    job.apply(JobTransition::Complete(json!({"score": 42})), Utc::now())
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result, Some(json!({"score": 42})));
    assert!(job.error.is_none());
    assert!(job.finished_at.unwrap() >= job.started_at.unwrap());
}

#[test]
fn test_failure_sets_error_only() {
    let mut job = pending_job();
    job.apply(JobTransition::Start, Utc::now()).unwrap();
    job.apply(JobTransition::Fail(JobError::execution("bad input")), Utc::now())
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.result.is_none());
    assert_eq!(job.error.as_ref().unwrap().message, "bad input");
}

#[test]
fn test_cancel_pending_skips_running() {
    let mut job = pending_job();
    job.apply(JobTransition::CancelPending, Utc::now()).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.started_at.is_none());
    assert!(job.finished_at.is_some());
}

#[test]
fn test_cannot_complete_pending_job() {
    let mut job = pending_job();
    let err = job
        .apply(JobTransition::Complete(json!(null)), Utc::now())
        .unwrap_err();
    assert!(matches!(
        err,
        JobsError::InvalidState {
            status: JobStatus::Pending,
            ..
        }
    ));
    assert_eq!(job.status, JobStatus::Pending);
}

#[test]
fn test_terminal_states_reject_everything() {
    let transitions = || {
        vec![
            JobTransition::Start,
            JobTransition::Complete(json!(1)),
            JobTransition::Fail(JobError::execution("x")),
            JobTransition::CancelPending,
            JobTransition::CancelRunning,
        ]
    };

    let mut completed = pending_job();
    completed.apply(JobTransition::Start, Utc::now()).unwrap();
    completed
        .apply(JobTransition::Complete(json!(1)), Utc::now())
        .unwrap();

    let mut cancelled = pending_job();
    cancelled
        .apply(JobTransition::CancelPending, Utc::now())
        .unwrap();

    for job in [completed, cancelled] {
        for transition in transitions() {
            let mut copy = job.clone();
            assert!(copy.apply(transition, Utc::now()).is_err());
            assert_eq!(copy.status, job.status);
            assert_eq!(copy.finished_at, job.finished_at);
        }
    }
}

#[test]
fn test_timestamps_never_go_backwards() {
    let mut job = pending_job();
    let earlier = job.submitted_at - Duration::seconds(10);
    job.apply(JobTransition::Start, earlier).unwrap();
    assert!(job.started_at.unwrap() >= job.submitted_at);

    job.apply(JobTransition::CancelRunning, earlier).unwrap();
    assert!(job.finished_at.unwrap() >= job.started_at.unwrap());
}

#[test]
fn test_status_parse() {
    assert_eq!("failed".parse::<JobStatus>().unwrap(), JobStatus::Failed);
    assert_eq!("Running".parse::<JobStatus>().unwrap(), JobStatus::Running);
    assert!("finished".parse::<JobStatus>().is_err());
}

#[test]
fn test_status_serialization() {
    assert_eq!(serde_json::to_value(JobStatus::Cancelled).unwrap(), "cancelled");
    assert!(JobStatus::Completed.is_terminal());
    assert!(!JobStatus::Running.is_terminal());
}

#[test]
fn test_metadata_omits_absent_result_and_error() {
    let job = pending_job();
    let json = serde_json::to_value(&job).unwrap();
    assert!(json.get("result").is_none());
    assert!(json.get("error").is_none());
    assert_eq!(json["status"], "pending");
    assert_eq!(json["task_type"], "sleep");
}
