//! Fault-injecting DocumentStore
//!
//! Wraps `MemoryStore` and fails selected operations a configured number of
//! times with `StoreError::Unavailable`. Edge operations are keyed by side,
//! e.g. `add_edge:followers`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use sphere_service::domain::{Comment, EntityKind, LikeOutcome, Post, ProfileUpdate, User};
use sphere_service::store::{
    DocumentStore, EdgeSide, MemoryStore, SetMutation, StoreError, StoreResult,
};

#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls of `op`.
    pub fn fail_next(&self, op: &str, times: usize) {
        self.failures.lock().unwrap().insert(op.to_string(), times);
    }

    /// Number of calls made to `op` so far.
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    fn trip(&self, op: &str) -> StoreResult<()> {
        *self.calls.lock().unwrap().entry(op.to_string()).or_insert(0) += 1;

        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Unavailable(format!("injected failure: {}", op)))
            }
            _ => Ok(()),
        }
    }
}

fn edge_key(op: &str, side: EdgeSide) -> String {
    format!("{}:{}", op, side.as_str())
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.trip("insert_user")?;
        self.inner.insert_user(user).await
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.trip("get_user")?;
        self.inner.get_user(id).await
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        self.trip("get_users")?;
        self.inner.get_users(ids).await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.trip("list_users")?;
        self.inner.list_users().await
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        self.trip("update_profile")?;
        self.inner.update_profile(id, update).await
    }

    async fn add_edge(
        &self,
        user_id: Uuid,
        side: EdgeSide,
        member: Uuid,
    ) -> StoreResult<Option<SetMutation>> {
        self.trip(&edge_key("add_edge", side))?;
        self.inner.add_edge(user_id, side, member).await
    }

    async fn remove_edge(
        &self,
        user_id: Uuid,
        side: EdgeSide,
        member: Uuid,
    ) -> StoreResult<Option<SetMutation>> {
        self.trip(&edge_key("remove_edge", side))?;
        self.inner.remove_edge(user_id, side, member).await
    }

    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        self.trip("insert_post")?;
        self.inner.insert_post(post).await
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        self.trip("get_post")?;
        self.inner.get_post(id).await
    }

    async fn posts_by_authors(&self, author_ids: &[Uuid]) -> StoreResult<Vec<Post>> {
        self.trip("posts_by_authors")?;
        self.inner.posts_by_authors(author_ids).await
    }

    async fn delete_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        self.trip("delete_post")?;
        self.inner.delete_post(id).await
    }

    async fn push_comment_ref(&self, post_id: Uuid, comment_id: Uuid) -> StoreResult<bool> {
        self.trip("push_comment_ref")?;
        self.inner.push_comment_ref(post_id, comment_id).await
    }

    async fn pull_comment_ref(&self, post_id: Uuid, comment_id: Uuid) -> StoreResult<bool> {
        self.trip("pull_comment_ref")?;
        self.inner.pull_comment_ref(post_id, comment_id).await
    }

    async fn dangling_comment_refs(&self) -> StoreResult<Vec<(Uuid, Uuid)>> {
        self.trip("dangling_comment_refs")?;
        self.inner.dangling_comment_refs().await
    }

    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()> {
        self.trip("insert_comment")?;
        self.inner.insert_comment(comment).await
    }

    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        self.trip("get_comment")?;
        self.inner.get_comment(id).await
    }

    async fn get_comments(&self, ids: &[Uuid]) -> StoreResult<Vec<Comment>> {
        self.trip("get_comments")?;
        self.inner.get_comments(ids).await
    }

    async fn comments_for_post(&self, post_id: Uuid) -> StoreResult<Vec<Comment>> {
        self.trip("comments_for_post")?;
        self.inner.comments_for_post(post_id).await
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        self.trip("delete_comment")?;
        self.inner.delete_comment(id).await
    }

    async fn delete_comments_for_post(&self, post_id: Uuid, limit: usize) -> StoreResult<usize> {
        self.trip("delete_comments_for_post")?;
        self.inner.delete_comments_for_post(post_id, limit).await
    }

    async fn count_comments_for_post(&self, post_id: Uuid) -> StoreResult<usize> {
        self.trip("count_comments_for_post")?;
        self.inner.count_comments_for_post(post_id).await
    }

    async fn orphaned_comment_post_ids(&self) -> StoreResult<Vec<Uuid>> {
        self.trip("orphaned_comment_post_ids")?;
        self.inner.orphaned_comment_post_ids().await
    }

    async fn toggle_like(
        &self,
        kind: EntityKind,
        id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<LikeOutcome>> {
        self.trip("toggle_like")?;
        self.inner.toggle_like(kind, id, user_id).await
    }

    async fn set_like(
        &self,
        kind: EntityKind,
        id: Uuid,
        user_id: Uuid,
        liked: bool,
    ) -> StoreResult<Option<LikeOutcome>> {
        self.trip("set_like")?;
        self.inner.set_like(kind, id, user_id, liked).await
    }
}
