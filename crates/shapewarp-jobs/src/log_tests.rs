use super::*;
use tempfile::TempDir;
use uuid::Uuid;

async fn file_sink() -> (TempDir, FileLogSink) {
    let temp_dir = TempDir::new().unwrap();
    let sink = FileLogSink::new(temp_dir.path()).await.unwrap();
    (temp_dir, sink)
}

#[tokio::test]
async fn test_tail_of_unknown_job_is_empty() {
    let (_dir, sink) = file_sink().await;
    let lines = sink.read_tail(&Uuid::new_v4(), 10).await.unwrap();
    assert!(lines.is_empty());

    let memory = MemoryLogSink::new();
    assert!(memory.read_tail(&Uuid::new_v4(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tail_shorter_log_returns_everything_in_order() {
    let (_dir, sink) = file_sink().await;
    let id = Uuid::new_v4();
    for i in 0..3 {
        sink.append(&id, &format!("line {}", i)).await.unwrap();
    }

    let lines = sink.read_tail(&id, 10).await.unwrap();
    assert_eq!(lines, vec!["line 0", "line 1", "line 2"]);
}

#[tokio::test]
async fn test_tail_returns_exactly_last_n() {
    let (_dir, sink) = file_sink().await;
    let id = Uuid::new_v4();
    for i in 0..20 {
        sink.append(&id, &format!("line {}", i)).await.unwrap();
    }

    let lines = sink.read_tail(&id, 5).await.unwrap();
    assert_eq!(
        lines,
        vec!["line 15", "line 16", "line 17", "line 18", "line 19"]
    );
}

#[tokio::test]
async fn test_tail_zero_returns_all() {
    let (_dir, sink) = file_sink().await;
    let id = Uuid::new_v4();
    for i in 0..4 {
        sink.append(&id, &format!("line {}", i)).await.unwrap();
    }
    assert_eq!(sink.read_tail(&id, 0).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_tail_spanning_several_chunks() {
    let (_dir, sink) = file_sink().await;
    let id = Uuid::new_v4();
    let filler = "x".repeat(1000);
    for i in 0..40 {
        sink.append(&id, &format!("{:02} {}", i, filler)).await.unwrap();
    }

    let lines = sink.read_tail(&id, 25).await.unwrap();
    assert_eq!(lines.len(), 25);
    assert!(lines[0].starts_with("15 "));
    assert!(lines[24].starts_with("39 "));
    assert!(lines.iter().all(|l| l.len() == 1003));
}

#[tokio::test]
async fn test_multiline_append_splits_lines() {
    let (_dir, sink) = file_sink().await;
    let id = Uuid::new_v4();
    sink.append(&id, "first\nsecond").await.unwrap();
    sink.append(&id, "third").await.unwrap();

    assert_eq!(
        sink.read_tail(&id, 0).await.unwrap(),
        vec!["first", "second", "third"]
    );

    let memory = MemoryLogSink::new();
    memory.append(&id, "first\nsecond").await.unwrap();
    memory.append(&id, "third").await.unwrap();
    assert_eq!(memory.read_tail(&id, 2).await.unwrap(), vec!["second", "third"]);
}

#[tokio::test]
async fn test_concurrent_appends_keep_lines_intact() {
    let temp_dir = TempDir::new().unwrap();
    let sink = Arc::new(FileLogSink::new(temp_dir.path()).await.unwrap());
    let id = Uuid::new_v4();

    let mut handles = Vec::new();
    for writer in 0..4 {
        let sink = sink.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                sink.append(&id, &format!("writer {} entry {}", writer, i))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let lines = sink.read_tail(&id, 0).await.unwrap();
    assert_eq!(lines.len(), 100);
    assert!(lines.iter().all(|l| l.starts_with("writer ")));

    // Per-writer order is preserved.
    for writer in 0..4 {
        let prefix = format!("writer {} ", writer);
        let entries: Vec<_> = lines.iter().filter(|l| l.starts_with(&prefix)).collect();
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(**entry, format!("writer {} entry {}", writer, i));
        }
    }
}

#[tokio::test]
async fn test_location_points_at_job_directory() {
    let (dir, sink) = file_sink().await;
    let id = Uuid::new_v4();
    let location = sink.location(&id);
    assert!(location.starts_with(&dir.path().display().to_string()));
    assert!(location.ends_with("log.txt"));
}
