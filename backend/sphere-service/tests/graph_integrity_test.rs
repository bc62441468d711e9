//! Integration Tests: Follow graph integrity
//!
//! Coverage:
//! - Symmetry after arbitrary follow/unfollow sequences
//! - Concurrent follows on shared users
//! - Rollback of the first step when the second fails
//! - Failed rollback surfaces IntegrityViolation and is repaired later

mod common;

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;
use uuid::Uuid;

use common::{app, create_user};
use sphere_service::jobs::run_repair_cycle;
use sphere_service::store::DocumentStore;
use sphere_service::{AppState, ServiceError};

async fn assert_symmetric(state: &AppState) {
    let users: HashMap<Uuid, _> = state
        .store
        .list_users()
        .await
        .unwrap()
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    for user in users.values() {
        for target in &user.following {
            assert!(
                users[target].is_followed_by(user.id),
                "{} follows {} but is not listed as a follower",
                user.username,
                users[target].username
            );
        }
        for source in &user.followers {
            assert!(
                users[source].is_following(user.id),
                "{} lists {} as follower without a backing edge",
                user.username,
                users[source].username
            );
        }
    }
}

#[tokio::test]
async fn test_random_sequences_stay_symmetric() {
    let (state, _) = app();
    let mut ids = Vec::new();
    for name in ["ann", "ben", "cat", "dan", "eve"] {
        ids.push(create_user(&state, name).await.id);
    }

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let source = ids[rng.gen_range(0..ids.len())];
        let target = ids[rng.gen_range(0..ids.len())];
        if rng.gen_bool(0.6) {
            let result = state.follow(source, target).await;
            if source == target {
                assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));
            } else {
                result.unwrap();
            }
        } else {
            state.unfollow(source, target).await.unwrap();
        }
    }

    assert_symmetric(&state).await;
}

#[tokio::test]
async fn test_concurrent_follows_on_shared_target() {
    let (state, _) = app();
    let target = create_user(&state, "celebrity").await;
    let mut fans = Vec::new();
    for i in 0..12 {
        fans.push(create_user(&state, &format!("fan{:02}", i)).await.id);
    }

    let mut handles = Vec::new();
    for &fan in &fans {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            state.follow(fan, target.id).await?;
            state.follow(target.id, fan).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let celebrity = state.get_user(target.id).await.unwrap();
    assert_eq!(celebrity.followers.len(), fans.len());
    assert_eq!(celebrity.following.len(), fans.len());
    assert_symmetric(&state).await;
}

#[tokio::test]
async fn test_second_step_failure_rolls_back_first() {
    let (state, store) = app();
    let a = create_user(&state, "alice").await;
    let b = create_user(&state, "bob").await;

    store.fail_next("add_edge:followers", 1);
    let err = state.follow(a.id, b.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));

    assert!(state.get_user(a.id).await.unwrap().following.is_empty());
    assert!(state.get_user(b.id).await.unwrap().followers.is_empty());

    // re-drive completes normally
    state.follow(a.id, b.id).await.unwrap();
    assert!(state.graph.is_following(a.id, b.id).await.unwrap());
    assert_symmetric(&state).await;
}

#[tokio::test]
async fn test_unfollow_second_step_failure_restores_edge() {
    let (state, store) = app();
    let a = create_user(&state, "alice").await;
    let b = create_user(&state, "bob").await;
    state.follow(a.id, b.id).await.unwrap();

    store.fail_next("remove_edge:followers", 1);
    assert!(state.unfollow(a.id, b.id).await.is_err());
    assert!(state.graph.is_following(a.id, b.id).await.unwrap());
    assert_symmetric(&state).await;
}

#[tokio::test]
async fn test_rollback_retries_before_succeeding() {
    let (state, store) = app();
    let a = create_user(&state, "alice").await;
    let b = create_user(&state, "bob").await;

    store.fail_next("add_edge:followers", 1);
    store.fail_next("remove_edge:following", 2);
    assert!(matches!(
        state.follow(a.id, b.id).await.unwrap_err(),
        ServiceError::Store(_)
    ));
    assert_eq!(store.calls("remove_edge:following"), 3);
    assert_symmetric(&state).await;
}

#[tokio::test]
async fn test_failed_rollback_is_integrity_violation_then_repaired() {
    let (state, store) = app();
    let a = create_user(&state, "alice").await;
    let b = create_user(&state, "bob").await;

    store.fail_next("add_edge:followers", 1);
    store.fail_next("remove_edge:following", 10);
    let err = state.follow(a.id, b.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::IntegrityViolation(_)));

    // following side kept, followers side missing
    assert!(state.get_user(a.id).await.unwrap().is_following(b.id));
    assert!(!state.get_user(b.id).await.unwrap().is_followed_by(a.id));

    store.fail_next("remove_edge:following", 0);
    let report = run_repair_cycle(&state).await.unwrap();
    assert_eq!(report.edges_completed, 1);
    assert_symmetric(&state).await;
}
