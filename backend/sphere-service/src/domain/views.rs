use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{PostContent, UserProfile};

/// Comment as rendered inside a feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: UserProfile,
    pub text: String,
    pub like_user_ids: Vec<Uuid>,
    pub like_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Post joined with author and comment-author profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub id: Uuid,
    pub author: UserProfile,
    pub content: PostContent,
    pub comments: Vec<CommentView>,
    pub like_user_ids: Vec<Uuid>,
    pub like_count: usize,
    pub created_at: DateTime<Utc>,
}

/// User with followers/following expanded to public profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub profile_picture: Option<String>,
    pub followers: Vec<UserProfile>,
    pub following: Vec<UserProfile>,
    pub created_at: DateTime<Utc>,
}
