/// Sphere Service Library
///
/// Social-graph and engagement consistency layer: follow edges, posts,
/// comments, likes and feeds over a document store without cross-document
/// transactions.
///
/// # Modules
///
/// - `app_state`: Component wiring and the operation surface
/// - `config`: Configuration management
/// - `domain`: Documents, validation and read views
/// - `error`: Error types
/// - `jobs`: Background integrity repair
/// - `metrics`: Prometheus metrics
/// - `retry`: Bounded retry for idempotent phases
/// - `services`: Business logic layer
/// - `store`: Document store trait and backends
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod retry;
pub mod services;
pub mod store;

pub use app_state::AppState;
pub use config::Config;
pub use error::{ServiceError, ServiceResult};
