//! REST API Routes Module
//!
//! - Entity read routes under `/api`
//! - Health check endpoints under `/health`
//!
//! Every request runs inside a `tower_http` trace span.

pub mod health;
pub mod query;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use query::{get_entity, list_entities};

/// Build the full application router.
pub fn create_api_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/:tag", get(list_entities))
        .route("/:tag/:id", get(get_entity));

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
