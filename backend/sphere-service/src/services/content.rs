/// Content store - post and comment creation, retrieval and comment removal
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Comment, NewComment, Post, PostContent};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::retry::{with_retry, RetryConfig};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct ContentStore {
    store: Arc<dyn DocumentStore>,
    retry: RetryConfig,
}

impl ContentStore {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Publish a post for `author_id`.
    pub async fn create_post(&self, author_id: Uuid, content: PostContent) -> ServiceResult<Uuid> {
        content.validate()?;
        if self.store.get_user(author_id).await?.is_none() {
            return Err(ServiceError::not_found("user", author_id));
        }

        let post = Post::new(author_id, content);
        self.store.insert_post(&post).await?;

        info!(post_id = %post.id, author_id = %author_id, kind = post.content.kind(), "Post created");
        Ok(post.id)
    }

    /// Attach a comment to `post_id`, appending it to the post's comment list.
    pub async fn create_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: &str,
    ) -> ServiceResult<Uuid> {
        let request = NewComment::normalized(text)?;
        if self.store.get_post(post_id).await?.is_none() {
            return Err(ServiceError::not_found("post", post_id));
        }
        if self.store.get_user(author_id).await?.is_none() {
            return Err(ServiceError::not_found("user", author_id));
        }

        let comment = Comment::new(post_id, author_id, request.text);
        self.store.insert_comment(&comment).await?;

        match self.store.push_comment_ref(post_id, comment.id).await {
            Ok(true) => {
                info!(comment_id = %comment.id, post_id = %post_id, "Comment created");
                Ok(comment.id)
            }
            Ok(false) => {
                // Post deleted between the existence check and the append
                warn!(comment_id = %comment.id, post_id = %post_id, "Post vanished; withdrawing comment");
                self.store.delete_comment(comment.id).await?;
                Err(ServiceError::not_found("post", post_id))
            }
            Err(e) => {
                if let Err(undo) = self.store.delete_comment(comment.id).await {
                    metrics::record_integrity_violation("create_comment");
                    error!(
                        comment_id = %comment.id,
                        post_id = %post_id,
                        error = %undo,
                        "Failed to withdraw unreferenced comment"
                    );
                    return Err(ServiceError::IntegrityViolation(format!(
                        "comment {} stored but not attached to post {}: {}",
                        comment.id, post_id, undo
                    )));
                }
                Err(e.into())
            }
        }
    }

    /// Remove a comment and detach it from its post.
    pub async fn delete_comment(&self, comment_id: Uuid) -> ServiceResult<()> {
        let comment = self
            .store
            .delete_comment(comment_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("comment", comment_id))?;

        let detached = with_retry(&self.retry, "comment_detach", || {
            self.store.pull_comment_ref(comment.post_id, comment_id)
        })
        .await;

        match detached {
            Ok(_) => {
                info!(comment_id = %comment_id, post_id = %comment.post_id, "Comment deleted");
                Ok(())
            }
            Err(e) => {
                metrics::record_integrity_violation("delete_comment");
                error!(
                    comment_id = %comment_id,
                    post_id = %comment.post_id,
                    error = %e,
                    "Comment deleted but its id is still listed on the post"
                );
                Err(ServiceError::IntegrityViolation(format!(
                    "comment {} deleted but not detached from post {}: {}",
                    comment_id, comment.post_id, e
                )))
            }
        }
    }

    /// Delete a comment on behalf of `actor_id`, who must be its author.
    pub async fn delete_comment_as(&self, actor_id: Uuid, comment_id: Uuid) -> ServiceResult<()> {
        let comment = self.get_comment(comment_id).await?;
        if comment.author_id != actor_id {
            return Err(ServiceError::Forbidden(format!(
                "user {} is not the author of comment {}",
                actor_id, comment_id
            )));
        }
        self.delete_comment(comment_id).await
    }

    pub async fn get_post(&self, post_id: Uuid) -> ServiceResult<Post> {
        self.store
            .get_post(post_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("post", post_id))
    }

    pub async fn get_comment(&self, comment_id: Uuid) -> ServiceResult<Comment> {
        self.store
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("comment", comment_id))
    }

    /// Comments on a post, oldest first.
    pub async fn comments_for_post(&self, post_id: Uuid) -> ServiceResult<Vec<Comment>> {
        self.get_post(post_id).await?;
        Ok(self.store.comments_for_post(post_id).await?)
    }
}
