pub mod models;
pub mod validation;
pub mod views;

pub use models::{Comment, EntityKind, LikeOutcome, Post, PostContent, User, UserProfile};
pub use validation::{FieldErrors, NewComment, NewUser, ProfileUpdate};
pub use views::{CommentView, PostView, UserView};
