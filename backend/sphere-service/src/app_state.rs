//! Central application state
//!
//! Wires every component over one shared store handle and exposes the
//! operation surface used by callers.

use std::sync::Arc;
use uuid::Uuid;

use crate::config::IntegrityConfig;
use crate::domain::{
    EntityKind, LikeOutcome, NewUser, PostContent, PostView, ProfileUpdate, User, UserView,
};
use crate::error::ServiceResult;
use crate::services::{
    CascadeCoordinator, ContentStore, EngagementIndex, FeedAssembler, GraphStore, UserDirectory,
};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub users: UserDirectory,
    pub graph: GraphStore,
    pub content: ContentStore,
    pub engagement: EngagementIndex,
    pub cascade: CascadeCoordinator,
    pub feed: FeedAssembler,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, integrity: &IntegrityConfig) -> Self {
        let retry = integrity.retry_config();
        Self {
            users: UserDirectory::new(store.clone()),
            graph: GraphStore::new(store.clone(), retry.clone()),
            content: ContentStore::new(store.clone(), retry.clone()),
            engagement: EngagementIndex::new(store.clone()),
            cascade: CascadeCoordinator::new(store.clone(), retry, integrity.sweep_batch),
            feed: FeedAssembler::new(store.clone()),
            store,
        }
    }

    pub async fn create_post(&self, author_id: Uuid, content: PostContent) -> ServiceResult<Uuid> {
        self.content.create_post(author_id, content).await
    }

    pub async fn delete_post(&self, post_id: Uuid) -> ServiceResult<()> {
        self.cascade.delete_post(post_id).await
    }

    pub async fn create_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: &str,
    ) -> ServiceResult<Uuid> {
        self.content.create_comment(post_id, author_id, text).await
    }

    pub async fn delete_comment(&self, comment_id: Uuid) -> ServiceResult<()> {
        self.content.delete_comment(comment_id).await
    }

    pub async fn toggle_like(
        &self,
        kind: EntityKind,
        id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<LikeOutcome> {
        self.engagement.toggle_like(kind, id, user_id).await
    }

    pub async fn follow(&self, source: Uuid, target: Uuid) -> ServiceResult<()> {
        self.graph.follow(source, target).await
    }

    pub async fn unfollow(&self, source: Uuid, target: Uuid) -> ServiceResult<()> {
        self.graph.unfollow(source, target).await
    }

    pub async fn compute_feed(&self, user_id: Uuid) -> ServiceResult<Vec<PostView>> {
        self.feed.compute_feed(user_id).await
    }

    pub async fn compute_user_feed(
        &self,
        user_id: Uuid,
        author_id: Uuid,
    ) -> ServiceResult<Vec<PostView>> {
        self.feed.compute_user_feed(user_id, author_id).await
    }

    pub async fn compute_single_post(&self, post_id: Uuid) -> ServiceResult<PostView> {
        self.feed.compute_single_post(post_id).await
    }

    pub async fn create_user(&self, request: NewUser) -> ServiceResult<User> {
        self.users.create_user(request).await
    }

    pub async fn get_user(&self, user_id: Uuid) -> ServiceResult<User> {
        self.users.get_user(user_id).await
    }

    pub async fn get_user_view(&self, user_id: Uuid) -> ServiceResult<UserView> {
        self.users.get_user_view(user_id).await
    }

    pub async fn list_users(&self) -> ServiceResult<Vec<UserView>> {
        self.users.list_users().await
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> ServiceResult<User> {
        self.users.update_profile(user_id, update).await
    }
}
