// Concurrent completion tests
// Duplicate submissions racing each other must advance a user exactly once,
// and readers must never observe a half-applied transition

mod fixtures;

use fixtures::*;
use futures::future::join_all;
use module_progress::config::CacheConfig;
use module_progress::progress::{CompletionOutcome, ProgressService, SkipReason};
use module_progress::store::MemoryStore;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_submissions_advance_once() {
    let service = ProgressService::new(sample_catalog(), Arc::new(MemoryStore::new()));
    let u = user("learner");
    let a = module("a");

    let outcomes = join_all((0..16).map(|_| service.complete_module(&u, &a))).await;

    let advanced = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(CompletionOutcome::Advanced { .. })))
        .count();
    let already_done = outcomes
        .iter()
        .filter(|o| {
            matches!(
                o,
                Ok(CompletionOutcome::Skipped {
                    reason: SkipReason::AlreadyDone
                })
            )
        })
        .count();

    assert_eq!(advanced, 1);
    assert_eq!(already_done, 15);

    let projection = service.project(&u).await.unwrap();
    assert_eq!(projection.completed_count(), 1);
    assert!(projection.is_prefix_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_users_do_not_interfere() {
    let service = ProgressService::new(sample_catalog(), Arc::new(MemoryStore::new()));
    let users: Vec<_> = (0..20).map(|i| user(&format!("user-{i}"))).collect();
    let a = module("a");

    let outcomes = join_all(users.iter().map(|u| service.complete_module(u, &a))).await;
    assert!(outcomes.iter().all(|o| matches!(o, Ok(o) if o.is_advanced())));

    for u in &users {
        let projection = service.project(u).await.unwrap();
        assert_eq!(projection.completed_count(), 1);
        assert_eq!(projection.current().unwrap().module_id, module("b"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_transitions() {
    let service = ProgressService::new(sample_catalog(), Arc::new(MemoryStore::new()))
        .with_cache(&CacheConfig::default());
    let service = &service;
    let u = &user("learner");

    let writer = async {
        for id in ["a", "b", "c"] {
            service.complete_module(u, &module(id)).await.unwrap();
            tokio::task::yield_now().await;
        }
    };

    let readers = join_all((0..8).map(|_| async move {
        for _ in 0..25 {
            let projection = service.project(u).await.unwrap();
            assert!(projection.is_prefix_consistent());
            // Exactly one active module until the catalog is finished
            let active = projection
                .modules
                .iter()
                .filter(|v| v.status == module_progress::ProgressStatus::Active)
                .count();
            assert_eq!(active, usize::from(!projection.is_finished()));
            tokio::task::yield_now().await;
        }
    }));

    tokio::join!(writer, readers);
    assert!(service.project(u).await.unwrap().is_finished());
}
