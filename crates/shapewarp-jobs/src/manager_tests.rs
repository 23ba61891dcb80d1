use super::*;
use crate::error::ErrorKind;
use crate::task::FnTask;
use serde_json::json;
use tempfile::TempDir;

fn tasks() -> Arc<TaskRegistry> {
    let tasks = TaskRegistry::new();
    tasks
        .register(Arc::new(
            FnTask::new("echo", |params, _ctx| async move { Ok(params) })
                .with_description("Echo parameters")
                .with_validator(|params| {
                    if params.get("reject").is_some() {
                        return Err(TaskError::InvalidParameters("rejected".into()));
                    }
                    Ok(())
                }),
        ))
        .unwrap();
    tasks
        .register(Arc::new(FnTask::new("block", |_params, ctx| async move {
            ctx.cancelled().await;
            Err(TaskError::Cancelled)
        })))
        .unwrap();
    Arc::new(tasks)
}

fn manager() -> JobManager {
    JobManager::in_memory(ManagerConfig::default().with_max_workers(1), tasks())
}

async fn wait_terminal(manager: &JobManager, id: &JobId) -> JobStatus {
    for _ in 0..500 {
        let status = manager.status(id).await.unwrap().status;
        if status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never finished", id);
}

async fn wait_executing(manager: &JobManager, id: &JobId) {
    for _ in 0..500 {
        if manager.status(id).await.unwrap().status == JobStatus::Running {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} never started", id);
}

#[tokio::test]
async fn test_submit_unknown_task_type() {
    let manager = manager();
    let err = manager.submit("nope", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownTaskType);
    assert!(manager.list(&JobFilter::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_submit_rejects_non_object_parameters() {
    let manager = manager();
    let err = manager.submit("echo", json!([1, 2])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameters);
}

#[tokio::test]
async fn test_submit_runs_task_precheck() {
    let manager = manager();
    let err = manager.submit("echo", json!({"reject": true})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameters);
    assert!(err.to_string().contains("rejected"));
    assert!(manager.list(&JobFilter::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_submit_default_and_custom_names() {
    let manager = manager();
    let default = manager
        .submit_with(SubmitRequest::new("echo", json!({})))
        .await
        .unwrap();
    assert!(default.name.starts_with("echo_"));
    assert_eq!(default.name.len(), "echo_".len() + 8);
    assert_eq!(default.status, JobStatus::Pending);

    let named = manager
        .submit_with(SubmitRequest::new("echo", json!({})).with_name("sample_a"))
        .await
        .unwrap();
    assert_eq!(named.name, "sample_a");
}

#[tokio::test]
async fn test_result_of_completed_job() {
    let manager = manager();
    let id = manager.submit("echo", json!({"score": 42})).await.unwrap();
    assert_eq!(wait_terminal(&manager, &id).await, JobStatus::Completed);
    assert_eq!(manager.result(&id).await.unwrap(), json!({"score": 42}));
}

#[tokio::test]
async fn test_unknown_job_operations() {
    let manager = manager();
    let id = Uuid::new_v4();
    assert_eq!(manager.status(&id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(manager.result(&id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(manager.log(&id, None).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(manager.cancel(&id).await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_cancel_running_job_with_cooperative_task() {
    let manager = manager();
    let id = manager.submit("block", json!({})).await.unwrap();
    wait_executing(&manager, &id).await;

    assert_eq!(
        manager.cancel(&id).await.unwrap(),
        CancelOutcome::CancellationRequested
    );
    assert_eq!(wait_terminal(&manager, &id).await, JobStatus::Cancelled);

    let err = manager.result(&id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_cancel_queued_job_returns_cancelled() {
    let manager = manager();
    let blocker = manager.submit("block", json!({})).await.unwrap();
    wait_executing(&manager, &blocker).await;

    let queued = manager.submit("echo", json!({})).await.unwrap();
    assert_eq!(manager.cancel(&queued).await.unwrap(), CancelOutcome::Cancelled);
    assert_eq!(manager.status(&queued).await.unwrap().status, JobStatus::Cancelled);
    assert!(manager.status(&queued).await.unwrap().started_at.is_none());

    let err = manager.cancel(&queued).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    manager.cancel(&blocker).await.unwrap();
    assert_eq!(wait_terminal(&manager, &blocker).await, JobStatus::Cancelled);
}

#[tokio::test]
async fn test_log_default_tail_and_all() {
    let tasks = TaskRegistry::new();
    tasks
        .register(Arc::new(FnTask::new("chatty", |_params, ctx| async move {
            for i in 0..10 {
                ctx.log(format!("step {}", i)).await;
            }
            Ok(json!(null))
        })))
        .unwrap();
    let mut config = ManagerConfig::default();
    config.default_log_tail = 3;
    let manager = JobManager::in_memory(config, Arc::new(tasks));

    let id = manager.submit("chatty", json!({})).await.unwrap();
    wait_terminal(&manager, &id).await;

    let tail = manager.log(&id, None).await.unwrap();
    assert_eq!(tail.len(), 3);
    assert_eq!(tail.last().map(String::as_str), Some("Job finished: completed"));

    // started + 10 steps + finished
    assert_eq!(manager.log(&id, Some(0)).await.unwrap().len(), 12);
}

#[tokio::test]
async fn test_submit_batch_all_or_nothing() {
    let manager = manager();
    let err = manager
        .submit_batch(
            "echo",
            vec![json!({"file": "a"}), json!({"reject": true})],
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameters);
    assert!(err.to_string().contains("batch item 1"));
    assert!(manager.list(&JobFilter::all()).await.unwrap().is_empty());

    let empty = manager.submit_batch("echo", Vec::new(), None).await;
    assert!(matches!(empty, Err(JobsError::InvalidParameters(_))));
}

#[tokio::test]
async fn test_submit_batch_tracks_jobs_independently() {
    let manager = manager();
    let batch = manager
        .submit_batch(
            "echo",
            vec![json!({"file": "a"}), json!({"file": "b"})],
            Some("run".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(batch.job_ids.len(), 2);
    manager.submit("echo", json!({})).await.unwrap();

    for id in &batch.job_ids {
        assert_eq!(wait_terminal(&manager, id).await, JobStatus::Completed);
    }

    let listed = manager
        .list(&JobFilter::all().with_batch(batch.batch_id.clone()))
        .await
        .unwrap();
    let names: Vec<_> = listed.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["run_1", "run_2"]);
}

#[tokio::test]
async fn test_run_sync() {
    let manager = manager();
    assert_eq!(
        manager.run_sync("echo", json!({"x": 1})).await.unwrap(),
        json!({"x": 1})
    );
    assert!(manager.list(&JobFilter::all()).await.unwrap().is_empty());

    let tasks = TaskRegistry::new();
    tasks
        .register(Arc::new(FnTask::new("bad", |_params, _ctx| async move {
            Err(TaskError::failed("bad input"))
        })))
        .unwrap();
    let manager = JobManager::in_memory(ManagerConfig::default(), Arc::new(tasks));
    let err = manager.run_sync("bad", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExecutionFailure);
    assert!(err.to_string().contains("bad input"));
}

#[tokio::test]
async fn test_task_types_catalogue() {
    let manager = manager();
    let types = manager.task_types();
    assert_eq!(types.len(), 2);
    assert_eq!(types[0].task_type, "block");
    assert_eq!(types[1].description, "Echo parameters");
}

#[tokio::test]
async fn test_shutdown_stops_submissions() {
    let manager = manager();
    let id = manager.submit("block", json!({})).await.unwrap();
    wait_executing(&manager, &id).await;

    assert!(manager.shutdown(Duration::from_secs(5)).await);
    assert_eq!(manager.status(&id).await.unwrap().status, JobStatus::Cancelled);

    let err = manager.submit("echo", json!({})).await.unwrap_err();
    assert!(matches!(err, JobsError::ShuttingDown));
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_recover_after_restart() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileJobStore::new(temp_dir.path()).await.unwrap();

    // Records left behind by a previous process.
    let pending = Job::new(Uuid::new_v4(), 7, "echo", "left_pending", json!({"v": 1}));
    let running = Job::new(Uuid::new_v4(), 8, "echo", "left_running", json!({}));
    let done = Job::new(Uuid::new_v4(), 9, "echo", "done", json!({}));
    for job in [&pending, &running, &done] {
        store.create(job).await.unwrap();
    }
    store.update(&running.id, JobTransition::Start).await.unwrap();
    store.update(&done.id, JobTransition::Start).await.unwrap();
    store
        .update(&done.id, JobTransition::Complete(json!("ok")))
        .await
        .unwrap();

    let manager = JobManager::open(ManagerConfig::default(), temp_dir.path(), tasks())
        .await
        .unwrap();

    assert_eq!(wait_terminal(&manager, &pending.id).await, JobStatus::Completed);
    assert_eq!(manager.result(&pending.id).await.unwrap(), json!({"v": 1}));

    let interrupted = manager.status(&running.id).await.unwrap();
    assert_eq!(interrupted.status, JobStatus::Failed);
    assert!(interrupted.error.unwrap().message.contains("Interrupted"));

    assert_eq!(manager.result(&done.id).await.unwrap(), json!("ok"));

    // New jobs are numbered after the persisted ones.
    let id = manager.submit("echo", json!({})).await.unwrap();
    let listed = manager.list(&JobFilter::all()).await.unwrap();
    assert_eq!(listed.len(), 4);
    assert_eq!(listed.last().unwrap().job_id, id);
    let record = store.read(&id).await.unwrap();
    assert_eq!(record.sequence, 10);
}

#[tokio::test]
async fn test_recover_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let manager = JobManager::open(ManagerConfig::default(), temp_dir.path(), tasks())
        .await
        .unwrap();
    let id = manager.submit("echo", json!({})).await.unwrap();
    wait_terminal(&manager, &id).await;

    let report = manager.recover().await.unwrap();
    assert_eq!(report.rescheduled + report.interrupted + report.finished, 0);
}

#[tokio::test]
async fn test_concurrent_submits_get_distinct_ids() {
    let manager = Arc::new(manager());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager.submit("echo", json!({})).await.unwrap()
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids.len(), 16);
    assert_eq!(manager.list(&JobFilter::all()).await.unwrap().len(), 16);
}
