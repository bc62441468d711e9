use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::validation::FieldErrors;
use validator::ValidateUrl;

/// User document. `followers`/`following` are sets stored as id lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub profile_picture: Option<String>,
    pub followers: Vec<Uuid>,
    pub following: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            profile_picture: None,
            followers: Vec::new(),
            following: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            profile_picture: self.profile_picture.clone(),
        }
    }

    pub fn is_following(&self, other: Uuid) -> bool {
        self.following.contains(&other)
    }

    pub fn is_followed_by(&self, other: Uuid) -> bool {
        self.followers.contains(&other)
    }
}

/// Public projection of a user. Never carries the email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub profile_picture: Option<String>,
}

impl UserProfile {
    /// Placeholder used when an author id no longer resolves.
    pub fn missing(id: Uuid) -> Self {
        Self {
            id,
            username: "[unknown]".to_string(),
            profile_picture: None,
        }
    }
}

/// Post body: either text or a reference to an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PostContent {
    Text(String),
    ImageRef(String),
}

impl PostContent {
    /// Build a text body, rejecting blank input.
    pub fn text(body: impl Into<String>) -> Result<Self, FieldErrors> {
        let content = PostContent::Text(body.into());
        content.validate()?;
        Ok(content)
    }

    /// Build an image body, rejecting anything that is not a URL.
    pub fn image(url: impl Into<String>) -> Result<Self, FieldErrors> {
        let content = PostContent::ImageRef(url.into());
        content.validate()?;
        Ok(content)
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        match self {
            PostContent::Text(body) if body.trim().is_empty() => {
                Err(FieldErrors::single("content", "Post is empty"))
            }
            PostContent::ImageRef(url) if !url.validate_url() => {
                Err(FieldErrors::single("content", "Image reference is not a valid URL"))
            }
            _ => Ok(()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PostContent::Text(_) => "text",
            PostContent::ImageRef(_) => "image",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            PostContent::Text(body) => body,
            PostContent::ImageRef(url) => url,
        }
    }

    /// Rebuild from the persisted `{kind, data}` pair.
    pub fn from_parts(kind: &str, data: String) -> Option<Self> {
        match kind {
            "text" => Some(PostContent::Text(data)),
            "image" => Some(PostContent::ImageRef(data)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: PostContent,
    pub comment_ids: Vec<Uuid>,
    pub like_user_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(author_id: Uuid, content: PostContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            content,
            comment_ids: Vec::new(),
            like_user_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub like_user_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: Uuid, author_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id,
            author_id,
            text: text.into(),
            like_user_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Entities that carry an engagement set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Post,
    Comment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a like toggle: membership after the call and resulting set size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOutcome {
    pub liked: bool,
    pub count: usize,
}
