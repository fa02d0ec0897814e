//! Read pipeline orchestration.
//!
//! One [`QueryPipeline::execute`] call per request. A plain listing that
//! qualifies for a snapshot takes the cache branch; everything else takes
//! the live branch (compile, plan, fetch, expand, render). Both branches
//! end in the redaction pass.

use std::path::PathBuf;
use std::sync::Arc;

use meshgate_access::{
    HandlerTable, PermissionEvaluator, RedactionOutcome, RedactionPass, RequesterIdentity,
};
use meshgate_core::{
    ClauseTarget, EntitySchema, FilterOperator, FilterSpecification, MeshError, QueryRequest,
    SchemaRegistry, SpecialPredicate,
};
use meshgate_query::{resolve_extensions, DepthPlanner, Executor, FilterCompiler, Resolver};
use meshgate_storage::{
    EntityStore, SnapshotCacheLoader, SnapshotWriter, StatusFilter, StoreQuery,
    MAX_SNAPSHOT_DEPTH,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;

use crate::config::QueryConfig;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// RESPONSE ENVELOPE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Why a depth > 0 listing was cut at the row ceiling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<String>,

    /// Snapshot generation time (epoch seconds). Cache hits only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<f64>,
}

/// `{"data": ..., "meta": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub data: Value,
    pub meta: ResponseMeta,
}

// ============================================================================
// THROTTLE
// ============================================================================

/// Gate for expensive filter classes. Rate accounting lives outside the
/// pipeline; a rejected request answers 429.
pub trait QueryThrottle: Send + Sync {
    fn admit(&self, identity: &RequesterIdentity, filter: &FilterSpecification) -> bool;
}

/// Admits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unthrottled;

impl QueryThrottle for Unthrottled {
    fn admit(&self, _identity: &RequesterIdentity, _filter: &FilterSpecification) -> bool {
        true
    }
}

/// Whether `filter` carries a geo-distance predicate.
pub fn has_distance_predicate(filter: &FilterSpecification) -> bool {
    filter
        .special
        .iter()
        .any(|p| matches!(p, SpecialPredicate::WithinDistance { .. }))
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Which live-branch behaviours apply.
#[derive(Debug, Clone, Copy)]
struct LiveOptions {
    row_ceiling: Option<usize>,
}

pub struct QueryPipeline {
    registry: SchemaRegistry,
    store: Arc<dyn EntityStore>,
    cache: SnapshotCacheLoader,
    handlers: Arc<HandlerTable>,
    evaluator: Arc<dyn PermissionEvaluator>,
    throttle: Arc<dyn QueryThrottle>,
    config: QueryConfig,
}

impl QueryPipeline {
    pub fn new(
        registry: SchemaRegistry,
        store: Arc<dyn EntityStore>,
        handlers: Arc<HandlerTable>,
        evaluator: Arc<dyn PermissionEvaluator>,
        config: QueryConfig,
    ) -> Self {
        let cache = SnapshotCacheLoader::new(config.cache_config(), registry.clone());
        Self {
            registry,
            store,
            cache,
            handlers,
            evaluator,
            throttle: Arc::new(Unthrottled),
            config,
        }
    }

    pub fn with_throttle(mut self, throttle: Arc<dyn QueryThrottle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Answer `request` for `identity`.
    pub async fn execute(
        &self,
        request: &QueryRequest,
        identity: &RequesterIdentity,
    ) -> ApiResult<ResponseEnvelope> {
        let span = tracing::info_span!(
            "query",
            entity_type = %request.entity_type,
            id = ?request.id,
            depth = ?request.depth,
        );
        async move {
            let schema = self
                .registry
                .require(&request.entity_type)
                .map_err(MeshError::from)?;

            let (mut data, meta) = match self.load_cached(request).await {
                Some(hit) => hit,
                None => {
                    let options = LiveOptions {
                        row_ceiling: self.config.row_ceiling(),
                    };
                    self.load_live(schema, request, Some(identity), options)
                        .await?
                }
            };

            let pass = RedactionPass::new(&self.handlers, self.evaluator.as_ref());
            if pass.apply(&mut data, identity) == RedactionOutcome::Denied {
                return Err(ApiError::forbidden(format!(
                    "Access to {} forbidden",
                    schema.tag
                )));
            }

            Ok(ResponseEnvelope { data, meta })
        }
        .instrument(span)
        .await
    }

    /// Cache branch. `None` sends the request down the live branch.
    async fn load_cached(&self, request: &QueryRequest) -> Option<(Value, ResponseMeta)> {
        if !self.cache.qualifies(request).await {
            return None;
        }
        match self.cache.load(request).await {
            Ok(payload) => Some((
                Value::Array(payload.rows),
                ResponseMeta {
                    truncated: None,
                    generated: Some(payload.generated),
                },
            )),
            Err(err) => {
                tracing::warn!(error = %err, "Snapshot unusable, querying live");
                None
            }
        }
    }

    /// Live branch: compile, fetch, expand and render. Unredacted.
    ///
    /// `identity` is `None` for snapshot regeneration, which skips the
    /// throttle.
    async fn load_live(
        &self,
        schema: &'static EntitySchema,
        request: &QueryRequest,
        identity: Option<&RequesterIdentity>,
        options: LiveOptions,
    ) -> ApiResult<(Value, ResponseMeta)> {
        let root = request.root_kind();
        let (mut filter, residual) =
            FilterCompiler::new(&self.registry).compile(schema.tag, &request.filters)?;
        filter.special = resolve_extensions(schema, &residual)?;

        if let Some(identity) = identity {
            if !self.throttle.admit(identity, &filter) {
                return Err(ApiError::too_many_requests(None));
            }
        }

        let plan = DepthPlanner::new(&self.registry).plan_with_fields(
            schema.tag,
            root,
            request.depth,
            request.fields.as_deref(),
        )?;

        let keyed_by_unique = filters_unique_key(schema, &filter);
        let mut query = StoreQuery::new(schema.tag).with_filter(filter);
        let mut ceiling = None;
        match request.id {
            Some(id) => query = query.with_id(id).with_status(StatusFilter::ActiveOrPending),
            None => {
                if let Some(since) = request.since {
                    let since = chrono::DateTime::from_timestamp(since, 0).ok_or_else(|| {
                        ApiError::invalid_parameter(format!("'since' out of range: {}", since))
                    })?;
                    query = query
                        .with_status(StatusFilter::ActiveOrDeleted)
                        .updated_after(since);
                }
                ceiling = options.row_ceiling.filter(|_| plan.depth > 0);
                query = query.slice(request.skip, fetch_limit(request.limit, ceiling));
            }
        }

        let mut rows = self.store.query(&query).await?;
        let mut meta = ResponseMeta::default();

        if let Some(ceiling) = ceiling {
            if rows.len() > ceiling {
                rows.truncate(ceiling);
                meta.truncated = Some(truncation_notice(plan.depth, ceiling));
                tracing::debug!(ceiling, depth = plan.depth, "Listing truncated");
            }
        }

        if rows.is_empty() {
            if let Some(id) = request.id {
                return Err(ApiError::entity_not_found(schema.tag, id));
            }
            if keyed_by_unique {
                return Err(ApiError::not_found(format!(
                    "No {} matches the given key",
                    schema.tag
                )));
            }
        }

        let graph = Executor::new(&self.registry, self.store.as_ref())
            .execute_rows(&plan, rows)
            .await?;
        let data = Resolver::new(&self.registry, root, request.fields.as_deref())
            .render_graph(&graph)?;

        Ok((data, meta))
    }

    /// Rebuild every `(type, depth)` snapshot from the live branch without
    /// redaction or row ceiling.
    pub async fn regenerate_snapshots(&self, writer: &SnapshotWriter) -> ApiResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        let options = LiveOptions { row_ceiling: None };

        for tag in self.registry.tags() {
            let schema = self.registry.require(tag).map_err(MeshError::from)?;
            for depth in 0..=MAX_SNAPSHOT_DEPTH {
                let request = QueryRequest::listing(tag).with_depth(depth);
                let (data, _) = self.load_live(schema, &request, None, options).await?;
                let rows = match data {
                    Value::Array(rows) => rows,
                    other => vec![other],
                };
                written.push(writer.write_atomic(tag, depth, rows).await?);
            }
        }

        tracing::info!(snapshots = written.len(), "Snapshot regeneration complete");
        Ok(written)
    }
}

/// Rows to ask the store for: one past the ceiling so an overflow is
/// detectable.
fn fetch_limit(limit: Option<usize>, ceiling: Option<usize>) -> Option<usize> {
    match (limit, ceiling) {
        (Some(limit), Some(ceiling)) => Some(limit.min(ceiling + 1)),
        (None, Some(ceiling)) => Some(ceiling + 1),
        (limit, None) => limit,
    }
}

fn truncation_notice(depth: u32, ceiling: usize) -> String {
    format!(
        "Your search query (with depth {}) returned more than {} rows and has been truncated. \
         Please be more specific in your filters, use the limit and skip parameters to page \
         through the resultset or drop the depth parameter",
        depth, ceiling
    )
}

/// An exact match on a uniquely keyed field.
fn filters_unique_key(schema: &EntitySchema, filter: &FilterSpecification) -> bool {
    filter.clauses.iter().any(|clause| {
        clause.operator == FilterOperator::Exact
            && matches!(clause.target, ClauseTarget::Field(name) if schema.is_unique_key(name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_limit() {
        assert_eq!(fetch_limit(None, None), None);
        assert_eq!(fetch_limit(Some(10), None), Some(10));
        assert_eq!(fetch_limit(None, Some(250)), Some(251));
        assert_eq!(fetch_limit(Some(10), Some(250)), Some(10));
        assert_eq!(fetch_limit(Some(1000), Some(250)), Some(251));
    }

    #[test]
    fn test_truncation_notice_names_depth_and_ceiling() {
        let notice = truncation_notice(2, 250);
        assert!(notice.starts_with("Your search query (with depth 2) returned more than 250 rows"));
        assert!(notice.ends_with("drop the depth parameter"));
    }

    #[test]
    fn test_meta_skips_absent_keys() {
        let json = serde_json::to_value(ResponseMeta::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
