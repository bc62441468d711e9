//! Integration Tests: Feed assembly
//!
//! Coverage:
//! - Follow, post, delete, unfollow walkthrough for two users
//! - Feed closure over the viewer and everyone they follow
//! - Ordering and comment/author annotation
//! - Batched reads regardless of feed size

mod common;

use common::{app, create_user};
use sphere_service::domain::{EntityKind, PostContent};

#[tokio::test]
async fn test_follow_post_delete_unfollow_walkthrough() {
    let (state, _) = app();
    let a = create_user(&state, "alice").await;
    let b = create_user(&state, "bob").await;

    state.follow(a.id, b.id).await.unwrap();
    let p = state
        .create_post(b.id, PostContent::text("hello").unwrap())
        .await
        .unwrap();
    let comment_id = state.create_comment(p, a.id, "hi bob").await.unwrap();

    let feed = state.compute_feed(a.id).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].content, PostContent::Text("hello".into()));
    assert_eq!(feed[0].author.id, b.id);
    assert_eq!(feed[0].comments[0].author.username, "alice");

    state.delete_post(p).await.unwrap();
    assert!(state.compute_feed(a.id).await.unwrap().is_empty());
    assert!(state
        .content
        .get_comment(comment_id)
        .await
        .unwrap_err()
        .is_not_found());

    state.unfollow(a.id, b.id).await.unwrap();
    state
        .create_post(b.id, PostContent::text("second").unwrap())
        .await
        .unwrap();
    assert!(state.compute_feed(a.id).await.unwrap().is_empty());
    assert_eq!(state.compute_user_feed(a.id, b.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_feed_contains_exactly_the_closure() {
    let (state, _) = app();
    let viewer = create_user(&state, "viewer").await;
    let followed = create_user(&state, "followed").await;
    let stranger = create_user(&state, "stranger").await;
    let follower = create_user(&state, "follower").await;

    state.follow(viewer.id, followed.id).await.unwrap();
    state.follow(follower.id, viewer.id).await.unwrap();

    for user in [&viewer, &followed, &stranger, &follower] {
        state
            .create_post(user.id, PostContent::text(format!("from {}", user.username)).unwrap())
            .await
            .unwrap();
    }

    let feed = state.compute_feed(viewer.id).await.unwrap();
    let mut authors: Vec<_> = feed.iter().map(|p| p.author.id).collect();
    authors.sort();
    let mut expected = vec![viewer.id, followed.id];
    expected.sort();
    assert_eq!(authors, expected);
}

#[tokio::test]
async fn test_feed_is_newest_first_with_annotations() {
    let (state, store) = app();
    let a = create_user(&state, "alice").await;
    let b = create_user(&state, "bob").await;
    state.follow(a.id, b.id).await.unwrap();

    let mut ids = Vec::new();
    for i in 0..5 {
        let author = if i % 2 == 0 { a.id } else { b.id };
        ids.push(
            state
                .create_post(author, PostContent::text(format!("post {}", i)).unwrap())
                .await
                .unwrap(),
        );
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    let first = state.create_comment(ids[1], a.id, "first").await.unwrap();
    let second = state.create_comment(ids[1], b.id, "second").await.unwrap();
    state.toggle_like(EntityKind::Post, ids[1], a.id).await.unwrap();
    state.toggle_like(EntityKind::Comment, first, b.id).await.unwrap();

    let feed = state.compute_feed(a.id).await.unwrap();
    let order: Vec<_> = feed.iter().map(|p| p.id).collect();
    ids.reverse();
    assert_eq!(order, ids);
    assert!(feed
        .windows(2)
        .all(|w| w[0].created_at >= w[1].created_at));

    let annotated = feed.iter().find(|p| p.comments.len() == 2).unwrap();
    assert_eq!(annotated.like_count, 1);
    assert_eq!(annotated.comments[0].id, first);
    assert_eq!(annotated.comments[1].id, second);
    assert_eq!(annotated.comments[0].like_count, 1);
    assert_eq!(annotated.comments[1].author.username, "bob");

    // one comment multi-get and one author multi-get per feed
    let before = store.calls("get_users");
    let comments_before = store.calls("get_comments");
    state.compute_feed(a.id).await.unwrap();
    assert_eq!(store.calls("get_comments") - comments_before, 1);
    assert_eq!(store.calls("get_users") - before, 1);
}

#[tokio::test]
async fn test_single_post_and_missing_viewer() {
    let (state, _) = app();
    let a = create_user(&state, "alice").await;
    let post = state
        .create_post(a.id, PostContent::image("https://cdn.example.com/p.png").unwrap())
        .await
        .unwrap();

    let view = state.compute_single_post(post).await.unwrap();
    assert_eq!(view.author.username, "alice");
    assert!(view.comments.is_empty());

    assert!(state
        .compute_feed(uuid::Uuid::new_v4())
        .await
        .unwrap_err()
        .is_not_found());
}
