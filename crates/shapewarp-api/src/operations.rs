//! Named operations and their dispatch onto the job manager.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shapewarp_jobs::{JobFilter, JobId, JobManager, JobStatus, SubmitRequest};

use crate::error::ApiError;

const SUBMIT_BATCH_PREFIX: &str = "submit_batch_";
const SUBMIT_PREFIX: &str = "submit_";
const RUN_PREFIX: &str = "run_";

/// Reserved key of a submit body naming the job. Every other key is a task
/// parameter.
const JOB_NAME_KEY: &str = "job_name";

/// An operation addressed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Submit(String),
    SubmitBatch(String),
    Run(String),
    GetJobStatus,
    GetJobResult,
    GetJobLog,
    CancelJob,
    ListJobs,
    ListTasks,
}

impl Operation {
    /// Job-level operations that do not depend on a task type.
    pub const FIXED: [Operation; 6] = [
        Operation::GetJobStatus,
        Operation::GetJobResult,
        Operation::GetJobLog,
        Operation::CancelJob,
        Operation::ListJobs,
        Operation::ListTasks,
    ];

    pub fn parse(name: &str) -> Option<Operation> {
        let op = match name {
            "get_job_status" => Operation::GetJobStatus,
            "get_job_result" => Operation::GetJobResult,
            "get_job_log" => Operation::GetJobLog,
            "cancel_job" => Operation::CancelJob,
            "list_jobs" => Operation::ListJobs,
            "list_tasks" => Operation::ListTasks,
            _ => {
                if let Some(task_type) = name.strip_prefix(SUBMIT_BATCH_PREFIX) {
                    Operation::SubmitBatch(task_type.to_string())
                } else if let Some(task_type) = name.strip_prefix(SUBMIT_PREFIX) {
                    Operation::Submit(task_type.to_string())
                } else if let Some(task_type) = name.strip_prefix(RUN_PREFIX) {
                    Operation::Run(task_type.to_string())
                } else {
                    return None;
                }
            }
        };

        match &op {
            Operation::Submit(t) | Operation::SubmitBatch(t) | Operation::Run(t)
                if t.is_empty() =>
            {
                None
            }
            _ => Some(op),
        }
    }

    /// Every operation name available for the given task types.
    pub fn names<'a>(task_types: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut names: Vec<String> = task_types
            .into_iter()
            .flat_map(|t| {
                [
                    Operation::Submit(t.to_string()),
                    Operation::SubmitBatch(t.to_string()),
                    Operation::Run(t.to_string()),
                ]
            })
            .chain(Operation::FIXED)
            .map(|op| op.to_string())
            .collect();
        names.sort();
        names
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Submit(t) => write!(f, "{}{}", SUBMIT_PREFIX, t),
            Operation::SubmitBatch(t) => write!(f, "{}{}", SUBMIT_BATCH_PREFIX, t),
            Operation::Run(t) => write!(f, "{}{}", RUN_PREFIX, t),
            Operation::GetJobStatus => f.write_str("get_job_status"),
            Operation::GetJobResult => f.write_str("get_job_result"),
            Operation::GetJobLog => f.write_str("get_job_log"),
            Operation::CancelJob => f.write_str("cancel_job"),
            Operation::ListJobs => f.write_str("list_jobs"),
            Operation::ListTasks => f.write_str("list_tasks"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobArgs {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct LogArgs {
    job_id: String,
    #[serde(default)]
    tail: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default)]
    status: Option<JobStatus>,
    #[serde(default)]
    batch_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchArgs {
    parameters: Vec<Value>,
    #[serde(default)]
    job_name: Option<String>,
}

fn decode<T: DeserializeOwned>(args: Map<String, Value>) -> Result<T, ApiError> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| ApiError::InvalidArguments(e.to_string()))
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::UnknownJob(raw.to_string()))
}

/// Split the reserved job name out of a submit body.
fn split_job_name(mut args: Map<String, Value>) -> Result<(Option<String>, Value), ApiError> {
    let job_name = match args.remove(JOB_NAME_KEY) {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name),
        Some(other) => {
            return Err(ApiError::InvalidArguments(format!(
                "job_name must be a string, got {}",
                other
            )));
        }
    };
    Ok((job_name, Value::Object(args)))
}

/// Execute an operation with decoded arguments.
pub async fn dispatch(
    manager: &JobManager,
    operation: &Operation,
    args: Map<String, Value>,
) -> Result<Value, ApiError> {
    debug!("Dispatching {}", operation);

    match operation {
        Operation::Submit(task_type) => {
            let (job_name, parameters) = split_job_name(args)?;
            let mut request = SubmitRequest::new(task_type.clone(), parameters);
            request.job_name = job_name;
            let submission = manager.submit_with(request).await?;
            Ok(json!({
                "status": "submitted",
                "job_id": submission.job_id,
                "job_name": submission.name,
                "job_status": submission.status,
                "message": format!(
                    "Job submitted. Use get_job_status with job_id {} to check progress",
                    submission.job_id
                ),
            }))
        }
        Operation::SubmitBatch(task_type) => {
            let args: BatchArgs = decode(args)?;
            let batch = manager
                .submit_batch(task_type, args.parameters, args.job_name)
                .await?;
            Ok(json!({
                "status": "submitted",
                "batch_id": batch.batch_id,
                "count": batch.job_ids.len(),
                "job_ids": batch.job_ids,
            }))
        }
        Operation::Run(task_type) => {
            let result = manager.run_sync(task_type, Value::Object(args)).await?;
            Ok(json!({"status": "success", "result": result}))
        }
        Operation::GetJobStatus => {
            let args: JobArgs = decode(args)?;
            let report = manager.status(&parse_job_id(&args.job_id)?).await?;
            let mut body = json!({
                "job_id": report.job_id,
                "name": report.name,
                "task_type": report.task_type,
                "status": report.status,
                "submitted_at": report.submitted_at,
                "started_at": report.started_at,
                "finished_at": report.finished_at,
            });
            if let Some(error) = report.error {
                body["error"] = json!(error);
            }
            Ok(body)
        }
        Operation::GetJobResult => {
            let args: JobArgs = decode(args)?;
            let id = parse_job_id(&args.job_id)?;
            let result = manager.result(&id).await?;
            Ok(json!({"status": "success", "job_id": id, "result": result}))
        }
        Operation::GetJobLog => {
            let args: LogArgs = decode(args)?;
            let id = parse_job_id(&args.job_id)?;
            let lines = manager.log(&id, args.tail).await?;
            Ok(json!({
                "status": "success",
                "job_id": id,
                "total_lines": lines.len(),
                "log_lines": lines,
            }))
        }
        Operation::CancelJob => {
            let args: JobArgs = decode(args)?;
            let id = parse_job_id(&args.job_id)?;
            let outcome = manager.cancel(&id).await?;
            Ok(json!({"status": "success", "job_id": id, "outcome": outcome}))
        }
        Operation::ListJobs => {
            let args: ListArgs = decode(args)?;
            let filter = JobFilter {
                status: args.status,
                batch_id: args.batch_id,
            };
            let jobs = manager.list(&filter).await?;
            Ok(json!({"status": "success", "total": jobs.len(), "jobs": jobs}))
        }
        Operation::ListTasks => {
            let tasks = manager.task_types();
            Ok(json!({"status": "success", "total": tasks.len(), "tasks": tasks}))
        }
    }
}

#[cfg(test)]
#[path = "operations_tests.rs"]
mod tests;
