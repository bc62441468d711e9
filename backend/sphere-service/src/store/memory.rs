use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use uuid::Uuid;

use super::{DocumentStore, EdgeSide, SetMutation, StoreError, StoreResult};
use crate::domain::{Comment, EntityKind, LikeOutcome, Post, ProfileUpdate, User};

/// In-process store. Each map entry is guarded by its shard lock, so every
/// method mutates exactly one document atomically.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    usernames: DashMap<String, Uuid>,
    emails: DashMap<String, Uuid>,
    posts: DashMap<Uuid, Post>,
    comments: DashMap<Uuid, Comment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn reserve(index: &DashMap<String, Uuid>, key: &str, owner: Uuid, field: &str) -> StoreResult<()> {
        match index.entry(key.to_string()) {
            Entry::Occupied(e) if *e.get() != owner => Err(StoreError::Conflict {
                field: field.to_string(),
            }),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(e) => {
                e.insert(owner);
                Ok(())
            }
        }
    }

    fn release(index: &DashMap<String, Uuid>, key: &str, owner: Uuid) {
        index.remove_if(key, |_, id| *id == owner);
    }
}

fn set_add(set: &mut Vec<Uuid>, member: Uuid) -> SetMutation {
    let changed = !set.contains(&member);
    if changed {
        set.push(member);
    }
    SetMutation {
        changed,
        size: set.len(),
    }
}

fn set_remove(set: &mut Vec<Uuid>, member: Uuid) -> SetMutation {
    let before = set.len();
    set.retain(|m| *m != member);
    SetMutation {
        changed: set.len() != before,
        size: set.len(),
    }
}

fn toggle_member(set: &mut Vec<Uuid>, member: Uuid) -> LikeOutcome {
    let liked = if set.contains(&member) {
        set_remove(set, member);
        false
    } else {
        set_add(set, member);
        true
    };
    LikeOutcome {
        liked,
        count: set.len(),
    }
}

fn force_member(set: &mut Vec<Uuid>, member: Uuid, liked: bool) -> LikeOutcome {
    if liked {
        set_add(set, member);
    } else {
        set_remove(set, member);
    }
    LikeOutcome {
        liked,
        count: set.len(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        Self::reserve(&self.usernames, &user.username, user.id, "username")?;
        if let Err(e) = Self::reserve(&self.emails, &user.email, user.id, "email") {
            Self::release(&self.usernames, &user.username, user.id);
            return Err(e);
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.clone()))
            .collect())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        let current = match self.users.get(&id).map(|u| u.clone()) {
            Some(user) => user,
            None => return Ok(None),
        };

        if let Some(username) = &update.username {
            Self::reserve(&self.usernames, username, id, "username")?;
        }
        if let Some(email) = &update.email {
            if let Err(e) = Self::reserve(&self.emails, email, id, "email") {
                if let Some(username) = &update.username {
                    if *username != current.username {
                        Self::release(&self.usernames, username, id);
                    }
                }
                return Err(e);
            }
        }

        let updated = self.users.get_mut(&id).map(|mut user| {
            if let Some(username) = &update.username {
                user.username = username.clone();
            }
            if let Some(email) = &update.email {
                user.email = email.clone();
            }
            if let Some(picture) = &update.profile_picture {
                user.profile_picture = Some(picture.clone());
            }
            user.clone()
        });

        if let Some(user) = &updated {
            if user.username != current.username {
                Self::release(&self.usernames, &current.username, id);
            }
            if user.email != current.email {
                Self::release(&self.emails, &current.email, id);
            }
        }
        Ok(updated)
    }

    async fn add_edge(
        &self,
        user_id: Uuid,
        side: EdgeSide,
        member: Uuid,
    ) -> StoreResult<Option<SetMutation>> {
        Ok(self.users.get_mut(&user_id).map(|mut user| match side {
            EdgeSide::Following => set_add(&mut user.following, member),
            EdgeSide::Followers => set_add(&mut user.followers, member),
        }))
    }

    async fn remove_edge(
        &self,
        user_id: Uuid,
        side: EdgeSide,
        member: Uuid,
    ) -> StoreResult<Option<SetMutation>> {
        Ok(self.users.get_mut(&user_id).map(|mut user| match side {
            EdgeSide::Following => set_remove(&mut user.following, member),
            EdgeSide::Followers => set_remove(&mut user.followers, member),
        }))
    }

    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        self.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        Ok(self.posts.get(&id).map(|p| p.clone()))
    }

    async fn posts_by_authors(&self, author_ids: &[Uuid]) -> StoreResult<Vec<Post>> {
        let authors: HashSet<Uuid> = author_ids.iter().copied().collect();
        Ok(self
            .posts
            .iter()
            .filter(|p| authors.contains(&p.author_id))
            .map(|p| p.clone())
            .collect())
    }

    async fn delete_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        Ok(self.posts.remove(&id).map(|(_, post)| post))
    }

    async fn push_comment_ref(&self, post_id: Uuid, comment_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .posts
            .get_mut(&post_id)
            .map(|mut post| post.comment_ids.push(comment_id))
            .is_some())
    }

    async fn pull_comment_ref(&self, post_id: Uuid, comment_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .posts
            .get_mut(&post_id)
            .map(|mut post| post.comment_ids.retain(|id| *id != comment_id))
            .is_some())
    }

    async fn dangling_comment_refs(&self) -> StoreResult<Vec<(Uuid, Uuid)>> {
        let refs: Vec<(Uuid, Uuid)> = self
            .posts
            .iter()
            .flat_map(|p| {
                let post_id = p.id;
                p.comment_ids
                    .iter()
                    .map(move |c| (post_id, *c))
                    .collect::<Vec<_>>()
            })
            .collect();
        Ok(refs
            .into_iter()
            .filter(|(_, comment_id)| !self.comments.contains_key(comment_id))
            .collect())
    }

    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()> {
        self.comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(self.comments.get(&id).map(|c| c.clone()))
    }

    async fn get_comments(&self, ids: &[Uuid]) -> StoreResult<Vec<Comment>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.comments.get(id).map(|c| c.clone()))
            .collect())
    }

    async fn comments_for_post(&self, post_id: Uuid) -> StoreResult<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| c.clone())
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(self.comments.remove(&id).map(|(_, comment)| comment))
    }

    async fn delete_comments_for_post(&self, post_id: Uuid, limit: usize) -> StoreResult<usize> {
        let targets: Vec<Uuid> = self
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| c.id)
            .take(limit)
            .collect();
        Ok(targets
            .into_iter()
            .filter(|id| self.comments.remove_if(id, |_, c| c.post_id == post_id).is_some())
            .count())
    }

    async fn count_comments_for_post(&self, post_id: Uuid) -> StoreResult<usize> {
        Ok(self.comments.iter().filter(|c| c.post_id == post_id).count())
    }

    async fn orphaned_comment_post_ids(&self) -> StoreResult<Vec<Uuid>> {
        let referenced: HashSet<Uuid> = self.comments.iter().map(|c| c.post_id).collect();
        let mut orphaned: Vec<Uuid> = referenced
            .into_iter()
            .filter(|post_id| !self.posts.contains_key(post_id))
            .collect();
        orphaned.sort();
        Ok(orphaned)
    }

    async fn toggle_like(
        &self,
        kind: EntityKind,
        id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<LikeOutcome>> {
        Ok(match kind {
            EntityKind::Post => self
                .posts
                .get_mut(&id)
                .map(|mut p| toggle_member(&mut p.like_user_ids, user_id)),
            EntityKind::Comment => self
                .comments
                .get_mut(&id)
                .map(|mut c| toggle_member(&mut c.like_user_ids, user_id)),
        })
    }

    async fn set_like(
        &self,
        kind: EntityKind,
        id: Uuid,
        user_id: Uuid,
        liked: bool,
    ) -> StoreResult<Option<LikeOutcome>> {
        Ok(match kind {
            EntityKind::Post => self
                .posts
                .get_mut(&id)
                .map(|mut p| force_member(&mut p.like_user_ids, user_id, liked)),
            EntityKind::Comment => self
                .comments
                .get_mut(&id)
                .map(|mut c| force_member(&mut c.like_user_ids, user_id, liked)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PostContent;

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let store = MemoryStore::new();
        store.insert_user(&User::new("alice", "a@example.com")).await.unwrap();

        let err = store
            .insert_user(&User::new("alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref field } if field == "username"));

        let err = store
            .insert_user(&User::new("bob", "a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref field } if field == "email"));

        // failed email reservation must not leave the username claimed
        store.insert_user(&User::new("bob", "b@example.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_edge_set_semantics() {
        let store = MemoryStore::new();
        let user = User::new("alice", "a@example.com");
        store.insert_user(&user).await.unwrap();
        let other = Uuid::new_v4();

        let first = store.add_edge(user.id, EdgeSide::Following, other).await.unwrap();
        let second = store.add_edge(user.id, EdgeSide::Following, other).await.unwrap();
        assert_eq!(first, Some(SetMutation { changed: true, size: 1 }));
        assert_eq!(second, Some(SetMutation { changed: false, size: 1 }));

        let removed = store.remove_edge(user.id, EdgeSide::Following, other).await.unwrap();
        assert_eq!(removed, Some(SetMutation { changed: true, size: 0 }));
        assert_eq!(
            store.add_edge(Uuid::new_v4(), EdgeSide::Followers, other).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_concurrent_likes_from_distinct_users() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let post = Post::new(Uuid::new_v4(), PostContent::Text("hi".into()));
        store.insert_post(&post).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let post_id = post.id;
            handles.push(tokio::spawn(async move {
                store
                    .toggle_like(EntityKind::Post, post_id, Uuid::new_v4())
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.like_user_ids.len(), 16);
    }

    #[tokio::test]
    async fn test_delete_comments_for_post_respects_limit() {
        let store = MemoryStore::new();
        let post_id = Uuid::new_v4();
        for _ in 0..5 {
            store
                .insert_comment(&Comment::new(post_id, Uuid::new_v4(), "c"))
                .await
                .unwrap();
        }
        store
            .insert_comment(&Comment::new(Uuid::new_v4(), Uuid::new_v4(), "other"))
            .await
            .unwrap();

        assert_eq!(store.delete_comments_for_post(post_id, 3).await.unwrap(), 3);
        assert_eq!(store.count_comments_for_post(post_id).await.unwrap(), 2);
        assert_eq!(store.delete_comments_for_post(post_id, 3).await.unwrap(), 2);
        assert_eq!(store.delete_comments_for_post(post_id, 3).await.unwrap(), 0);
        assert_eq!(store.comments.len(), 1);
    }

    #[tokio::test]
    async fn test_profile_update_moves_unique_keys() {
        let store = MemoryStore::new();
        let user = User::new("alice", "a@example.com");
        store.insert_user(&user).await.unwrap();

        let update = ProfileUpdate {
            username: Some("alicia".into()),
            ..Default::default()
        };
        let updated = store.update_profile(user.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.username, "alicia");

        // old name is free again
        store.insert_user(&User::new("alice", "x@example.com")).await.unwrap();
    }
}
