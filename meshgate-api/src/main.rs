//! MESHGATE API Server Entry Point
//!
//! Bootstraps configuration, seeds the store and starts the Axum HTTP
//! server.

use std::path::PathBuf;
use std::sync::Arc;

use meshgate_access::{GrantTable, HandlerTable};
use meshgate_api::telemetry::{init_tracing, TelemetryConfig};
use meshgate_api::{
    create_api_router, load_seed_file, ApiError, ApiResult, AppState, QueryConfig, QueryPipeline,
    ServerConfig,
};
use meshgate_core::PEERING_REGISTRY;
use meshgate_storage::{EntityStore, InMemoryStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let registry = PEERING_REGISTRY.clone();
    let store: Arc<dyn EntityStore> = match std::env::var("MESHGATE_SEED_FILE").ok() {
        Some(path) => Arc::new(load_seed_file(&PathBuf::from(path), &registry).await?),
        None => {
            tracing::warn!("MESHGATE_SEED_FILE not set, serving an empty store");
            Arc::new(InMemoryStore::new())
        }
    };

    let query_config = QueryConfig::from_env();
    tracing::info!(
        cache_enabled = query_config.cache_enabled,
        cache_root = %query_config.cache_root.display(),
        depth_row_limit = query_config.depth_row_limit,
        "Query pipeline configured"
    );

    let pipeline = QueryPipeline::new(
        registry,
        store,
        Arc::new(HandlerTable::peering()),
        Arc::new(GrantTable::peering_defaults()),
        query_config,
    );
    let app = create_api_router(AppState::new(pipeline));

    let addr = ServerConfig::from_env().bind_addr()?;
    tracing::info!(%addr, "Starting MESHGATE API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
