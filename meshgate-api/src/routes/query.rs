//! Entity Read Routes
//!
//! `GET /api/:tag` lists entities of one type, `GET /api/:tag/:id` fetches
//! one. Both hand the decoded query string to the read pipeline.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use meshgate_core::{EntityId, QueryRequest};

use crate::{
    error::ApiResult,
    pipeline::{QueryPipeline, ResponseEnvelope},
    state::IdentityResolver,
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/:tag - List entities
pub async fn list_entities(
    State(pipeline): State<Arc<QueryPipeline>>,
    State(identity): State<Arc<dyn IdentityResolver>>,
    Path(tag): Path<String>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<ResponseEnvelope>> {
    let request = QueryRequest::from_params(tag, None, &params)?;
    let requester = identity.resolve(&headers);
    let envelope = pipeline.execute(&request, &requester).await?;
    Ok(Json(envelope))
}

/// GET /api/:tag/:id - Fetch one entity
pub async fn get_entity(
    State(pipeline): State<Arc<QueryPipeline>>,
    State(identity): State<Arc<dyn IdentityResolver>>,
    Path((tag, id)): Path<(String, EntityId)>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<ResponseEnvelope>> {
    let request = QueryRequest::from_params(tag, Some(id), &params)?;
    let requester = identity.resolve(&headers);
    let envelope = pipeline.execute(&request, &requester).await?;
    Ok(Json(envelope))
}
