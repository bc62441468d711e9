//! Persistent document store seam.
//!
//! Every mutating method is a single-document atomic operation. The store
//! offers no cross-document transaction; callers that touch several
//! documents sequence the steps themselves (see `services::graph` and
//! `services::cascade`).

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Comment, EntityKind, LikeOutcome, Post, ProfileUpdate, User};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate value for unique field `{field}`")]
    Conflict { field: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt document {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which of a user's two edge sets an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeSide {
    Following,
    Followers,
}

impl EdgeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeSide::Following => "following",
            EdgeSide::Followers => "followers",
        }
    }
}

/// Outcome of an atomic set add/remove on one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMutation {
    /// False when the call was a no-op (already present / already absent).
    pub changed: bool,
    pub size: usize,
}

/// Interface of the backing document engine.
///
/// `Option::None` from a mutation means the target document does not exist.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // Users

    /// Insert a user; `Conflict` when username or email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Multi-get; ids that do not resolve are skipped.
    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<Option<User>>;

    /// Set-add `member` into one of `user_id`'s edge sets.
    async fn add_edge(
        &self,
        user_id: Uuid,
        side: EdgeSide,
        member: Uuid,
    ) -> StoreResult<Option<SetMutation>>;

    /// Set-remove `member` from one of `user_id`'s edge sets.
    async fn remove_edge(
        &self,
        user_id: Uuid,
        side: EdgeSide,
        member: Uuid,
    ) -> StoreResult<Option<SetMutation>>;

    // Posts

    async fn insert_post(&self, post: &Post) -> StoreResult<()>;

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>>;

    /// All posts whose author is in `author_ids`, unordered.
    async fn posts_by_authors(&self, author_ids: &[Uuid]) -> StoreResult<Vec<Post>>;

    /// Remove and return the post.
    async fn delete_post(&self, id: Uuid) -> StoreResult<Option<Post>>;

    /// Append to `comment_ids`; false when the post does not exist.
    async fn push_comment_ref(&self, post_id: Uuid, comment_id: Uuid) -> StoreResult<bool>;

    /// Pull from `comment_ids`; false when the post does not exist.
    async fn pull_comment_ref(&self, post_id: Uuid, comment_id: Uuid) -> StoreResult<bool>;

    /// `(post_id, comment_id)` pairs where the comment no longer exists.
    async fn dangling_comment_refs(&self) -> StoreResult<Vec<(Uuid, Uuid)>>;

    // Comments

    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()>;

    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;

    /// Multi-get; ids that do not resolve are skipped.
    async fn get_comments(&self, ids: &[Uuid]) -> StoreResult<Vec<Comment>>;

    /// Comments referencing `post_id`, oldest first.
    async fn comments_for_post(&self, post_id: Uuid) -> StoreResult<Vec<Comment>>;

    async fn delete_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;

    /// Delete up to `limit` comments referencing `post_id`; returns how many went.
    async fn delete_comments_for_post(&self, post_id: Uuid, limit: usize) -> StoreResult<usize>;

    async fn count_comments_for_post(&self, post_id: Uuid) -> StoreResult<usize>;

    /// Post ids referenced by comments whose post no longer exists.
    async fn orphaned_comment_post_ids(&self) -> StoreResult<Vec<Uuid>>;

    // Engagement

    /// Flip `user_id`'s membership in the entity's like set in one atomic step.
    async fn toggle_like(
        &self,
        kind: EntityKind,
        id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<LikeOutcome>>;

    /// Force membership to `liked`.
    async fn set_like(
        &self,
        kind: EntityKind,
        id: Uuid,
        user_id: Uuid,
        liked: bool,
    ) -> StoreResult<Option<LikeOutcome>>;

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Release backend resources at shutdown.
    async fn close(&self) {}
}
