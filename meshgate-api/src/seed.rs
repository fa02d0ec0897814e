//! Seeding the in-memory store from a JSON document.
//!
//! The document maps entity-type tags to row lists:
//!
//! ```json
//! {"org": [{"id": 1, "status": "ok", "created": "...", "updated": "...",
//!           "attributes": {"name": "Acme"}}]}
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use meshgate_core::{EntityRecord, SchemaRegistry};
use meshgate_storage::InMemoryStore;

use crate::error::{ApiError, ApiResult};

pub type SeedDocument = BTreeMap<String, Vec<EntityRecord>>;

/// Insert every row of `document`. Unknown tags are rejected.
pub async fn seed_store(
    store: &InMemoryStore,
    registry: &SchemaRegistry,
    document: SeedDocument,
) -> ApiResult<usize> {
    let mut total = 0;
    for (tag, rows) in document {
        if registry.get(&tag).is_none() {
            return Err(ApiError::unknown_entity_type(&tag));
        }
        total += rows.len();
        tracing::debug!(tag = %tag, rows = rows.len(), "Seeding table");
        store.insert_all(&tag, rows).await;
    }
    Ok(total)
}

/// Read a seed document from disk and load it into a fresh store.
pub async fn load_seed_file(path: &Path, registry: &SchemaRegistry) -> ApiResult<InMemoryStore> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ApiError::internal_error(format!("Failed to read seed file {}: {}", path.display(), e))
    })?;
    let document: SeedDocument = serde_json::from_slice(&bytes)?;

    let store = InMemoryStore::new();
    let rows = seed_store(&store, registry, document).await?;
    tracing::info!(path = %path.display(), rows, "Store seeded");
    Ok(store)
}
