//! Post deletion cascade.
//!
//! Order: the post document goes first, so new readers can no longer reach
//! it, then every comment keyed by its id is swept in batches. The sweep is
//! keyed by `post_id` and therefore idempotent; failed or incomplete sweeps
//! are retried with backoff and only escalate to `IntegrityViolation` once
//! the retry budget is spent with comments still present.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::retry::{with_retry, RetryConfig};
use crate::store::{DocumentStore, StoreError};

#[derive(Error, Debug)]
enum SweepError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{remaining} comments still reference the post")]
    Incomplete { remaining: usize },
}

#[derive(Clone)]
pub struct CascadeCoordinator {
    store: Arc<dyn DocumentStore>,
    retry: RetryConfig,
    sweep_batch: usize,
}

impl CascadeCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryConfig, sweep_batch: usize) -> Self {
        Self {
            store,
            retry,
            sweep_batch: sweep_batch.max(1),
        }
    }

    /// Delete a post and every comment attached to it.
    pub async fn delete_post(&self, post_id: Uuid) -> ServiceResult<()> {
        let started = Instant::now();

        let post = self
            .store
            .delete_post(post_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("post", post_id))?;

        info!(
            post_id = %post_id,
            author_id = %post.author_id,
            listed_comments = post.comment_ids.len(),
            "Post deleted; sweeping comments"
        );

        let result = self.sweep_comments(post_id, "delete_post").await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_cascade_duration(status, started.elapsed());

        result.map(|_| ())
    }

    /// Delete a post on behalf of `actor_id`, who must be its author.
    pub async fn delete_post_as(&self, actor_id: Uuid, post_id: Uuid) -> ServiceResult<()> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("post", post_id))?;
        if post.author_id != actor_id {
            return Err(ServiceError::Forbidden(format!(
                "user {} is not the author of post {}",
                actor_id, post_id
            )));
        }
        self.delete_post(post_id).await
    }

    /// Remove every comment keyed by `post_id`. Safe to re-drive; returns the
    /// number of comments removed by the successful pass.
    pub async fn sweep_comments(&self, post_id: Uuid, trigger: &str) -> ServiceResult<usize> {
        let outcome = with_retry(&self.retry, "comment_sweep", || {
            self.sweep_once(post_id, trigger)
        })
        .await;

        match outcome {
            Ok(deleted) => {
                info!(post_id = %post_id, deleted, trigger, "Comment sweep complete");
                Ok(deleted)
            }
            Err(e) => {
                metrics::record_integrity_violation("comment_sweep");
                error!(post_id = %post_id, trigger, error = %e, "Comment sweep exhausted retries");
                Err(ServiceError::IntegrityViolation(format!(
                    "comments of deleted post {} could not be removed: {}",
                    post_id, e
                )))
            }
        }
    }

    async fn sweep_once(&self, post_id: Uuid, trigger: &str) -> Result<usize, SweepError> {
        let mut deleted = 0;
        loop {
            let batch = self
                .store
                .delete_comments_for_post(post_id, self.sweep_batch)
                .await?;
            metrics::record_cascade_comments_deleted(trigger, batch);
            deleted += batch;
            if batch < self.sweep_batch {
                break;
            }
        }

        let remaining = self.store.count_comments_for_post(post_id).await?;
        if remaining > 0 {
            warn!(post_id = %post_id, remaining, "Comments appeared during sweep");
            return Err(SweepError::Incomplete { remaining });
        }
        Ok(deleted)
    }
}
