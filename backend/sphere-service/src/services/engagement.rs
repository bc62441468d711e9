/// Engagement index - like sets on posts and comments
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{EntityKind, LikeOutcome};
use crate::error::{ServiceError, ServiceResult};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct EngagementIndex {
    store: Arc<dyn DocumentStore>,
}

impl EngagementIndex {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Flip `user_id`'s like on the entity. Two consecutive calls restore
    /// the original membership and count.
    pub async fn toggle_like(
        &self,
        kind: EntityKind,
        id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<LikeOutcome> {
        let outcome = self
            .store
            .toggle_like(kind, id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(kind.as_str(), id))?;

        debug!(
            kind = %kind,
            entity_id = %id,
            user_id = %user_id,
            liked = outcome.liked,
            count = outcome.count,
            "Like toggled"
        );
        Ok(outcome)
    }

    /// Idempotent like (`liked = true`) or unlike (`liked = false`).
    pub async fn set_like(
        &self,
        kind: EntityKind,
        id: Uuid,
        user_id: Uuid,
        liked: bool,
    ) -> ServiceResult<LikeOutcome> {
        self.store
            .set_like(kind, id, user_id, liked)
            .await?
            .ok_or_else(|| ServiceError::not_found(kind.as_str(), id))
    }

    /// Current engagement set of the entity.
    pub async fn likes(&self, kind: EntityKind, id: Uuid) -> ServiceResult<Vec<Uuid>> {
        let likes = match kind {
            EntityKind::Post => self.store.get_post(id).await?.map(|p| p.like_user_ids),
            EntityKind::Comment => self.store.get_comment(id).await?.map(|c| c.like_user_ids),
        };
        likes.ok_or_else(|| ServiceError::not_found(kind.as_str(), id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Comment, Post, PostContent};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_toggle_is_an_involution() {
        let store = Arc::new(MemoryStore::new());
        let post = Post::new(Uuid::new_v4(), PostContent::Text("hi".into()));
        store.insert_post(&post).await.unwrap();
        let index = EngagementIndex::new(store);
        let user = Uuid::new_v4();

        let first = index.toggle_like(EntityKind::Post, post.id, user).await.unwrap();
        assert_eq!(first, LikeOutcome { liked: true, count: 1 });
        let second = index.toggle_like(EntityKind::Post, post.id, user).await.unwrap();
        assert_eq!(second, LikeOutcome { liked: false, count: 0 });
    }

    #[tokio::test]
    async fn test_comment_likes_and_set_like() {
        let store = Arc::new(MemoryStore::new());
        let comment = Comment::new(Uuid::new_v4(), Uuid::new_v4(), "c");
        store.insert_comment(&comment).await.unwrap();
        let index = EngagementIndex::new(store);
        let user = Uuid::new_v4();

        index.set_like(EntityKind::Comment, comment.id, user, true).await.unwrap();
        let again = index
            .set_like(EntityKind::Comment, comment.id, user, true)
            .await
            .unwrap();
        assert_eq!(again, LikeOutcome { liked: true, count: 1 });
        assert_eq!(index.likes(EntityKind::Comment, comment.id).await.unwrap(), vec![user]);

        let cleared = index
            .set_like(EntityKind::Comment, comment.id, user, false)
            .await
            .unwrap();
        assert_eq!(cleared.count, 0);
    }

    #[tokio::test]
    async fn test_toggle_missing_entity() {
        let index = EngagementIndex::new(Arc::new(MemoryStore::new()));
        let err = index
            .toggle_like(EntityKind::Comment, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
