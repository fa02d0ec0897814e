//! MESHGATE API - Read Pipeline and HTTP Boundary
//!
//! Wires the pipeline stages from the other MESHGATE crates into one
//! request path and exposes it over Axum:
//! - [`QueryPipeline`] runs cache qualification, filter compilation,
//!   expansion, rendering and redaction for one request
//! - [`routes::create_api_router`] serves `GET /api/:tag[/:id]`
//! - [`ApiError`] maps pipeline failures to HTTP status codes

pub mod config;
pub mod error;
pub mod macros;
pub mod pipeline;
pub mod routes;
pub mod seed;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{QueryConfig, ServerConfig, DEFAULT_DEPTH_ROW_LIMIT};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use pipeline::{
    has_distance_predicate, QueryPipeline, QueryThrottle, ResponseEnvelope, ResponseMeta,
    Unthrottled,
};
pub use routes::create_api_router;
pub use seed::{load_seed_file, seed_store, SeedDocument};
pub use state::{AnonymousResolver, ApiKeyResolver, AppState, IdentityResolver};
