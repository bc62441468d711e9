//! Follow graph.
//!
//! A follow edge lives on two user documents: `source.following` and
//! `target.followers`. The store cannot update both atomically, so every
//! edge mutation is a two-step update:
//!
//! 1. mutate `source.following` (the authoritative side)
//! 2. mutate `target.followers`
//!
//! If step 2 fails, step 1 is compensated. After both steps the pair is
//! re-read and checked for symmetry. Both operations are set-based and
//! therefore safe to re-drive on a half-applied pair.

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{User, UserProfile};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::retry::{with_retry, RetryConfig};
use crate::store::{DocumentStore, EdgeSide, SetMutation, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeOp {
    Follow,
    Unfollow,
}

impl EdgeOp {
    fn as_str(&self) -> &'static str {
        match self {
            EdgeOp::Follow => "follow",
            EdgeOp::Unfollow => "unfollow",
        }
    }

    fn inverse(&self) -> Self {
        match self {
            EdgeOp::Follow => EdgeOp::Unfollow,
            EdgeOp::Unfollow => EdgeOp::Follow,
        }
    }
}

#[derive(Clone)]
pub struct GraphStore {
    store: Arc<dyn DocumentStore>,
    retry: RetryConfig,
}

impl GraphStore {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Make `source` follow `target`. Idempotent.
    pub async fn follow(&self, source: Uuid, target: Uuid) -> ServiceResult<()> {
        if source == target {
            return Err(ServiceError::InvalidArgument(
                "Users cannot follow themselves".to_string(),
            ));
        }
        self.ensure_users(source, target).await?;

        self.apply(EdgeOp::Follow, source, target).await?;
        self.verify(EdgeOp::Follow, source, target).await?;

        info!(source = %source, target = %target, "Follow edge applied");
        Ok(())
    }

    /// Remove the `source -> target` edge. No-op when it does not exist.
    pub async fn unfollow(&self, source: Uuid, target: Uuid) -> ServiceResult<()> {
        self.ensure_users(source, target).await?;
        if source == target {
            return Ok(());
        }

        self.apply(EdgeOp::Unfollow, source, target).await?;
        self.verify(EdgeOp::Unfollow, source, target).await?;

        info!(source = %source, target = %target, "Follow edge removed");
        Ok(())
    }

    pub async fn is_following(&self, source: Uuid, target: Uuid) -> ServiceResult<bool> {
        let user = self
            .store
            .get_user(source)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", source))?;
        Ok(user.is_following(target))
    }

    /// Profiles of the users following `user_id`, in edge order.
    pub async fn followers(&self, user_id: Uuid) -> ServiceResult<Vec<UserProfile>> {
        let user = self.require_user(user_id).await?;
        self.profiles(&user.followers).await
    }

    /// Profiles of the users `user_id` follows, in edge order.
    pub async fn following(&self, user_id: Uuid) -> ServiceResult<Vec<UserProfile>> {
        let user = self.require_user(user_id).await?;
        self.profiles(&user.following).await
    }

    async fn require_user(&self, user_id: Uuid) -> ServiceResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", user_id))
    }

    async fn profiles(&self, ids: &[Uuid]) -> ServiceResult<Vec<UserProfile>> {
        let users = self.store.get_users(ids).await?;
        Ok(ids
            .iter()
            .filter_map(|id| users.iter().find(|u| u.id == *id).map(User::profile))
            .collect())
    }

    async fn ensure_users(&self, source: Uuid, target: Uuid) -> ServiceResult<()> {
        let users = self.store.get_users(&[source, target]).await?;
        for id in [source, target] {
            if !users.iter().any(|u| u.id == id) {
                return Err(ServiceError::not_found("user", id));
            }
        }
        Ok(())
    }

    async fn mutate(
        &self,
        op: EdgeOp,
        user_id: Uuid,
        side: EdgeSide,
        member: Uuid,
    ) -> StoreResult<Option<SetMutation>> {
        match op {
            EdgeOp::Follow => self.store.add_edge(user_id, side, member).await,
            EdgeOp::Unfollow => self.store.remove_edge(user_id, side, member).await,
        }
    }

    async fn apply(&self, op: EdgeOp, source: Uuid, target: Uuid) -> ServiceResult<()> {
        let first = self
            .mutate(op, source, EdgeSide::Following, target)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", source))?;

        match self.mutate(op, target, EdgeSide::Followers, source).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                self.compensate(op, source, target, first.changed).await?;
                Err(ServiceError::not_found("user", target))
            }
            Err(e) => {
                warn!(
                    operation = op.as_str(),
                    source = %source,
                    target = %target,
                    error = %e,
                    "Second edge step failed"
                );
                self.compensate(op, source, target, first.changed).await?;
                Err(e.into())
            }
        }
    }

    /// Undo step 1. Skipped when step 1 was a no-op, since the edge side
    /// then predates this call.
    async fn compensate(
        &self,
        op: EdgeOp,
        source: Uuid,
        target: Uuid,
        first_changed: bool,
    ) -> ServiceResult<()> {
        if !first_changed {
            return Ok(());
        }

        let undo = op.inverse();
        let result = with_retry(&self.retry, "edge_compensation", || {
            self.mutate(undo, source, EdgeSide::Following, target)
        })
        .await;

        match result {
            Ok(_) => {
                metrics::record_edge_compensation(op.as_str(), "success");
                debug!(operation = op.as_str(), source = %source, target = %target, "Edge step rolled back");
                Ok(())
            }
            Err(e) => {
                metrics::record_edge_compensation(op.as_str(), "failed");
                metrics::record_integrity_violation(op.as_str());
                error!(
                    operation = op.as_str(),
                    source = %source,
                    target = %target,
                    error = %e,
                    "Edge rollback failed; pair left asymmetric"
                );
                Err(ServiceError::IntegrityViolation(format!(
                    "{} {} -> {} half-applied and rollback failed: {}",
                    op.as_str(),
                    source,
                    target,
                    e
                )))
            }
        }
    }

    /// Returns `(source.following has target, target.followers has source)`.
    async fn edge_state(&self, source: Uuid, target: Uuid) -> ServiceResult<(bool, bool)> {
        let users = self.store.get_users(&[source, target]).await?;
        let forward = users
            .iter()
            .find(|u| u.id == source)
            .ok_or_else(|| ServiceError::not_found("user", source))?
            .is_following(target);
        let backward = users
            .iter()
            .find(|u| u.id == target)
            .ok_or_else(|| ServiceError::not_found("user", target))?
            .is_followed_by(source);
        Ok((forward, backward))
    }

    /// Read-after-write check. A symmetric pair passes even if it does not
    /// match `op` (a concurrent opposite call landed last). An asymmetric
    /// pair gets one re-drive of `op`.
    async fn verify(&self, op: EdgeOp, source: Uuid, target: Uuid) -> ServiceResult<()> {
        let (forward, backward) = self.edge_state(source, target).await?;
        if forward == backward {
            return Ok(());
        }

        warn!(
            operation = op.as_str(),
            source = %source,
            target = %target,
            forward,
            backward,
            "Asymmetric follow edge after write; re-applying"
        );
        self.apply(op, source, target).await?;

        let (forward, backward) = self.edge_state(source, target).await?;
        if forward == backward {
            return Ok(());
        }

        metrics::record_integrity_violation(op.as_str());
        Err(ServiceError::IntegrityViolation(format!(
            "follow edge {} -> {} still asymmetric after re-drive",
            source, target
        )))
    }
}
