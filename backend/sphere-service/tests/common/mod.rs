#![allow(dead_code)]

pub mod flaky_store;

use std::sync::Arc;

use sphere_service::config::IntegrityConfig;
use sphere_service::domain::{NewUser, User};
use sphere_service::AppState;

use flaky_store::FlakyStore;

/// Retry bounds with near-zero backoff so failure paths run fast.
pub fn fast_integrity() -> IntegrityConfig {
    IntegrityConfig {
        max_retries: 3,
        initial_backoff_ms: 1,
        sweep_batch: 2,
        ..IntegrityConfig::default()
    }
}

pub fn app_with(store: Arc<FlakyStore>) -> AppState {
    AppState::new(store, &fast_integrity())
}

pub fn app() -> (AppState, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::new());
    (app_with(store.clone()), store)
}

pub async fn create_user(state: &AppState, name: &str) -> User {
    state
        .create_user(NewUser::new(name, format!("{}@example.com", name)))
        .await
        .unwrap()
}
