/// Feed assembler - read-side join of graph, content and engagement state
///
/// Posts are selected first, then every comment they reference is fetched in
/// one multi-get and every distinct author (post or comment) in a second
/// one. Joining happens in memory.
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Comment, CommentView, Post, PostView, User, UserProfile};
use crate::error::{ServiceError, ServiceResult};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct FeedAssembler {
    store: Arc<dyn DocumentStore>,
}

impl FeedAssembler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Posts by `user_id` and everyone they follow, newest first.
    pub async fn compute_feed(&self, user_id: Uuid) -> ServiceResult<Vec<PostView>> {
        let viewer = self.require_user(user_id).await?;

        let mut closure = Vec::with_capacity(viewer.following.len() + 1);
        let mut seen = HashSet::new();
        for id in std::iter::once(viewer.id).chain(viewer.following.iter().copied()) {
            if seen.insert(id) {
                closure.push(id);
            }
        }

        let posts = self.store.posts_by_authors(&closure).await?;
        debug!(user_id = %user_id, authors = closure.len(), posts = posts.len(), "Assembling feed");
        self.assemble(posts).await
    }

    /// Posts by `author_id` alone, newest first.
    pub async fn compute_user_feed(
        &self,
        user_id: Uuid,
        author_id: Uuid,
    ) -> ServiceResult<Vec<PostView>> {
        self.require_user(user_id).await?;
        self.require_user(author_id).await?;

        let posts = self.store.posts_by_authors(&[author_id]).await?;
        self.assemble(posts).await
    }

    pub async fn compute_single_post(&self, post_id: Uuid) -> ServiceResult<PostView> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("post", post_id))?;

        self.assemble(vec![post])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("post", post_id))
    }

    async fn require_user(&self, user_id: Uuid) -> ServiceResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", user_id))
    }

    async fn assemble(&self, mut posts: Vec<Post>) -> ServiceResult<Vec<PostView>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        sort_feed(&mut posts);

        let comment_ids: Vec<Uuid> = posts
            .iter()
            .flat_map(|p| p.comment_ids.iter().copied())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let comments = self.store.get_comments(&comment_ids).await?;

        let author_ids: Vec<Uuid> = posts
            .iter()
            .map(|p| p.author_id)
            .chain(comments.iter().map(|c| c.author_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let authors = self.store.get_users(&author_ids).await?;

        Ok(build_views(posts, comments, authors))
    }
}

/// Newest first; equal timestamps fall back to id descending.
fn feed_order(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

fn sort_feed(posts: &mut [Post]) {
    posts.sort_by(feed_order);
}

fn build_views(posts: Vec<Post>, comments: Vec<Comment>, authors: Vec<User>) -> Vec<PostView> {
    let profiles: HashMap<Uuid, UserProfile> =
        authors.iter().map(|u| (u.id, u.profile())).collect();
    let profile_of = |id: Uuid| {
        profiles
            .get(&id)
            .cloned()
            .unwrap_or_else(|| UserProfile::missing(id))
    };
    let mut comments: HashMap<Uuid, Comment> = comments.into_iter().map(|c| (c.id, c)).collect();

    posts
        .into_iter()
        .map(|post| {
            let comment_views = post
                .comment_ids
                .iter()
                .filter_map(|id| comments.remove(id))
                .filter(|c| c.post_id == post.id)
                .map(|c| CommentView {
                    author: profile_of(c.author_id),
                    like_count: c.like_user_ids.len(),
                    id: c.id,
                    post_id: c.post_id,
                    text: c.text,
                    like_user_ids: c.like_user_ids,
                    created_at: c.created_at,
                })
                .collect();

            PostView {
                author: profile_of(post.author_id),
                like_count: post.like_user_ids.len(),
                id: post.id,
                content: post.content,
                comments: comment_views,
                like_user_ids: post.like_user_ids,
                created_at: post.created_at,
            }
        })
        .collect()
}
