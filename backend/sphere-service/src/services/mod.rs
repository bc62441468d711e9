/// Business logic layer for sphere-service
///
/// - Graph: follow edges kept symmetric across two user documents
/// - Content: posts and comments
/// - Engagement: like sets on posts and comments
/// - Cascade: post deletion with comment sweep
/// - Feed: read-side join for feeds and single posts
/// - Users: signup records and profiles
pub mod cascade;
pub mod content;
pub mod engagement;
pub mod feed;
pub mod graph;
pub mod users;

pub use cascade::CascadeCoordinator;
pub use content::ContentStore;
pub use engagement::EngagementIndex;
pub use feed::FeedAssembler;
pub use graph::GraphStore;
pub use users::UserDirectory;
