use super::*;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    query: String,
    database: String,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let query = dir.path().join("query.txt");
    let sequence = "ACGU".repeat(30);
    let reactivities = vec!["0.5"; 120].join(",");
    let short = "GGCAU";
    tokio::fs::write(
        &query,
        format!("q1\n{sequence}\n{reactivities}\n\nq2\n{short}\n0.1,0.2,0.3,0.4,0.5\n"),
    )
    .await
    .unwrap();
    let database = dir.path().join("db.xml");
    tokio::fs::write(&database, "<database/>").await.unwrap();

    Fixture {
        query: query.display().to_string(),
        database: database.display().to_string(),
        dir,
    }
}

#[test]
fn test_validate_params() {
    let task = ShapeSearchTask::new();
    assert!(task
        .validate(&json!({"query_file": "q", "database_file": "d"}))
        .is_ok());
    assert!(task.validate(&json!({"query_file": "q"})).is_err());
    assert!(matches!(
        task.validate(&json!({"query_file": "q", "database_file": "d", "max_align_overlap": 1.5})),
        Err(TaskError::InvalidParameters(_))
    ));
}

#[tokio::test]
async fn test_hits_per_query_is_bounded() {
    let f = fixture().await;
    let task = ShapeSearchTask::new();
    let too_many = json!({
        "query_file": f.query,
        "database_file": f.database,
        "hits_per_query": 1_000_000_000_000u64,
    });
    assert!(matches!(task.validate(&too_many), Err(TaskError::InvalidParameters(_))));
    let err = task.run(too_many, TaskContext::detached()).await.unwrap_err();
    assert!(matches!(err, TaskError::InvalidParameters(_)));

    let at_limit = json!({
        "query_file": f.query,
        "database_file": f.database,
        "hits_per_query": MAX_HITS_PER_QUERY,
    });
    assert!(task.validate(&at_limit).is_ok());
}

#[test]
fn test_seed_is_stable() {
    assert_eq!(seed_for("q1"), seed_for("q1"));
    assert_ne!(seed_for("q1"), seed_for("q2"));
}

#[tokio::test]
async fn test_hits_are_deterministic_and_in_range() {
    let f = fixture().await;
    let params = json!({"query_file": f.query, "database_file": f.database});

    let first = ShapeSearchTask::new()
        .run(params.clone(), TaskContext::detached())
        .await
        .unwrap();
    let second = ShapeSearchTask::new()
        .run(params, TaskContext::detached())
        .await
        .unwrap();
    assert_eq!(first["search_results"], second["search_results"]);

    let hits: Vec<SearchHit> = serde_json::from_value(first["search_results"].clone()).unwrap();
    assert_eq!(hits.len(), 6);
    for hit in &hits {
        assert!(hit.query_start < hit.query_end);
        assert!((700..=800).contains(&hit.db_start));
        assert!((850..=900).contains(&hit.db_end));
        assert!((80.0..150.0).contains(&hit.score));
        assert!(hit.pvalue < 1e-5);
    }
    assert!(hits.iter().filter(|h| h.query == "q1").all(|h| h.query_end <= 99));
    assert!(hits.iter().filter(|h| h.query == "q2").all(|h| h.query_end <= 5));
    assert_eq!(hits[0].status, "!");
    assert_eq!(hits[1].status, "?");
    assert_eq!(hits[2].db_entry, "16S_Bsubtilis_2");
}

#[tokio::test]
async fn test_summary() {
    let f = fixture().await;
    let result = ShapeSearchTask::new()
        .run(
            json!({"query_file": f.query, "database_file": f.database, "hits_per_query": 2}),
            TaskContext::detached(),
        )
        .await
        .unwrap();

    let summary = &result["summary"];
    assert_eq!(summary["total_hits"], 4);
    assert_eq!(summary["queries_with_hits"], 2);
    assert_eq!(summary["significant_hits"], 4);
    assert!(summary["score_stats"]["std"].is_number());
    assert_eq!(result["metadata"]["search_method"], "mock");
    assert_eq!(result["metadata"]["num_queries"], 2);
}

#[tokio::test]
async fn test_writes_tsv() {
    let f = fixture().await;
    let out = f.dir.path().join("out");
    ShapeSearchTask::new()
        .run(
            json!({
                "query_file": f.query,
                "database_file": f.database,
                "output_dir": out.display().to_string(),
            }),
            TaskContext::detached(),
        )
        .await
        .unwrap();

    let content = std::fs::read_to_string(out.join("search_results.tsv")).unwrap();
    let mut lines = content.lines();
    assert!(lines.next().unwrap().starts_with("query\tdb_entry\tquery_start"));
    assert_eq!(lines.count(), 6);
}

#[tokio::test]
async fn test_missing_database() {
    let f = fixture().await;
    let err = ShapeSearchTask::new()
        .run(
            json!({"query_file": f.query, "database_file": "/nonexistent/db.xml"}),
            TaskContext::detached(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::InputNotFound(_)));
}
