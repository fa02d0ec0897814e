//! Snapshot Regeneration Binary
//!
//! Rebuilds every `<tag>-<depth>.json` listing snapshot from the seeded
//! store. Snapshots are unredacted; the server redacts on every read.
//!
//! Usage:
//!   MESHGATE_SEED_FILE=seed.json MESHGATE_API_CACHE_ROOT=api-cache \
//!     cargo run -p meshgate-api --bin regenerate-snapshots

use std::path::PathBuf;
use std::sync::Arc;

use meshgate_access::{GrantTable, HandlerTable};
use meshgate_api::telemetry::{init_tracing, TelemetryConfig};
use meshgate_api::{load_seed_file, ApiError, ApiResult, QueryConfig, QueryPipeline};
use meshgate_core::PEERING_REGISTRY;
use meshgate_storage::SnapshotWriter;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let seed = std::env::var("MESHGATE_SEED_FILE")
        .map_err(|_| ApiError::invalid_parameter("MESHGATE_SEED_FILE must be set"))?;
    let registry = PEERING_REGISTRY.clone();
    let store = load_seed_file(&PathBuf::from(seed), &registry).await?;

    let config = QueryConfig::from_env();
    let writer = SnapshotWriter::new(config.cache_config());
    let pipeline = QueryPipeline::new(
        registry,
        Arc::new(store),
        Arc::new(HandlerTable::peering()),
        Arc::new(GrantTable::peering_defaults()),
        config,
    );

    let written = pipeline.regenerate_snapshots(&writer).await?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}
