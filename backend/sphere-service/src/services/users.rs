/// User directory - signup records, profile edits and user lookups
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{NewUser, ProfileUpdate, User, UserProfile, UserView};
use crate::error::{ServiceError, ServiceResult};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create the user record for a signup. Username and email are unique.
    pub async fn create_user(&self, request: NewUser) -> ServiceResult<User> {
        let request = request.normalized()?;

        let mut user = User::new(request.username, request.email);
        user.profile_picture = request.profile_picture;
        self.store.insert_user(&user).await?;

        info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> ServiceResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", user_id))
    }

    /// User with followers/following expanded to profiles in one multi-get.
    pub async fn get_user_view(&self, user_id: Uuid) -> ServiceResult<UserView> {
        let user = self.get_user(user_id).await?;

        let referenced: Vec<Uuid> = user
            .followers
            .iter()
            .chain(user.following.iter())
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let profiles: HashMap<Uuid, UserProfile> = self
            .store
            .get_users(&referenced)
            .await?
            .into_iter()
            .map(|u| (u.id, u.profile()))
            .collect();

        Ok(to_view(user, &profiles))
    }

    /// Every user with expanded edge sets.
    pub async fn list_users(&self) -> ServiceResult<Vec<UserView>> {
        let users = self.store.list_users().await?;
        let profiles: HashMap<Uuid, UserProfile> =
            users.iter().map(|u| (u.id, u.profile())).collect();
        Ok(users.into_iter().map(|u| to_view(u, &profiles)).collect())
    }

    /// Apply a partial profile edit.
    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> ServiceResult<User> {
        let update = update.normalized()?;
        let user = self
            .store
            .update_profile(user_id, &update)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", user_id))?;

        info!(user_id = %user_id, "Profile updated");
        Ok(user)
    }
}

fn to_view(user: User, profiles: &HashMap<Uuid, UserProfile>) -> UserView {
    let expand = |ids: &[Uuid]| -> Vec<UserProfile> {
        ids.iter().filter_map(|id| profiles.get(id).cloned()).collect()
    };
    UserView {
        followers: expand(&user.followers),
        following: expand(&user.following),
        id: user.id,
        username: user.username,
        email: user.email,
        profile_picture: user.profile_picture,
        created_at: user.created_at,
    }
}
