#![allow(dead_code)]

use std::sync::Arc;

use meshgate_access::{GrantTable, HandlerTable};
use meshgate_api::{QueryConfig, QueryPipeline};
use meshgate_core::{EntityId, QueryRequest, PEERING_REGISTRY};
use meshgate_test_utils::fixtures::peering_store;
use meshgate_test_utils::InMemoryStore;

/// Pipeline over `store` with the peering handler table.
pub fn pipeline_over(store: InMemoryStore, grants: GrantTable, config: QueryConfig) -> QueryPipeline {
    QueryPipeline::new(
        PEERING_REGISTRY.clone(),
        Arc::new(store),
        Arc::new(HandlerTable::peering()),
        Arc::new(grants),
        config,
    )
}

/// Pipeline over the peering fixtures with default grants.
pub async fn fixture_pipeline(config: QueryConfig) -> QueryPipeline {
    pipeline_over(peering_store().await, GrantTable::peering_defaults(), config)
}

/// Request as the HTTP layer would build it from a query string.
pub fn request(tag: &str, id: Option<EntityId>, pairs: &[(&str, &str)]) -> QueryRequest {
    let params: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    QueryRequest::from_params(tag, id, &params).expect("valid test request")
}
