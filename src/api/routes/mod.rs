//! API route modules.

pub mod cookies;
pub mod downloads;
pub mod health;
pub mod system;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/downloads", downloads::router())
        .nest("/api/cookies", cookies::router())
        .nest("/api/system", system::router())
        .nest("/health", health::router())
        .with_state(state)
}
