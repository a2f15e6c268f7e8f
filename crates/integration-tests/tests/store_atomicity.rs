//! Job counter atomicity under concurrent workers
//!
//! Uses a file database so several pooled connections race for real.

use std::sync::Arc;

use frameforge_core::domain::{Job, JobStatus};
use frameforge_core::port::JobRepository;
use frameforge_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};

fn temp_db(name: &str) -> String {
    let path = std::env::temp_dir().join(format!(
        "frameforge_{}_{}.db",
        name,
        std::process::id()
    ));
    let path = path.to_string_lossy().into_owned();
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path, suffix));
    }
    path
}

#[tokio::test]
async fn test_concurrent_completions_never_exceed_total() {
    let path = temp_db("atomicity");
    let pool = create_pool(&path).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let repo = Arc::new(SqliteJobRepository::new(pool.clone()));

    repo.find_or_create(&Job::new("job-race", "script", "user", 4, 1))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..12 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.record_completion("job-race", &format!("item-{}", n), 10 + n)
                .await
                .unwrap()
        }));
    }

    let mut recorded = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            recorded += 1;
        }
    }
    assert_eq!(recorded, 4);

    let job = repo.find_by_key("job-race").await.unwrap().unwrap();
    assert_eq!(job.completed_items, 4);
    assert_eq!(job.item_ids.len(), 4);
    assert!(repo.mark_completed("job-race", 99).await.unwrap());
    assert!(!repo.mark_completed("job-race", 100).await.unwrap());

    let job = repo.find_by_key("job-race").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    pool.close().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_concurrent_first_requests_create_one_job() {
    let path = temp_db("create_race");
    let pool = create_pool(&path).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let repo = Arc::new(SqliteJobRepository::new(pool.clone()));

    let mut handles = Vec::new();
    for n in 0..6 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            // Each racer claims a different total; the first insert wins
            repo.find_or_create(&Job::new("job-once", "script", "user", 2 + n, n))
                .await
                .unwrap()
        }));
    }

    let mut totals = Vec::new();
    for handle in handles {
        totals.push(handle.await.unwrap().total_items);
    }
    assert!(totals.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(repo.count_by_status(JobStatus::Processing).await.unwrap(), 1);

    pool.close().await;
    let _ = std::fs::remove_file(&path);
}
