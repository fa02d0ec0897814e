//! Property-Based Tests for the Read Pipeline
//!
//! **Property: Snapshot Equivalence**
//!
//! For any unfiltered listing, the rows served from a regenerated snapshot
//! SHALL equal the rows the live path renders for the same request, and no
//! response SHALL carry a namespace key past redaction.

use std::sync::OnceLock;

use meshgate_access::RequesterIdentity;
use meshgate_api::{QueryConfig, QueryPipeline};
use meshgate_core::Cardinality;
use meshgate_storage::SnapshotWriter;
use meshgate_test_utils::generators::{arb_depth, arb_entity_type, arb_plain_listing};
use meshgate_test_utils::QueryRequest;
use proptest::prelude::*;
use serde_json::Value;
use tempfile::TempDir;
use tokio::runtime::Runtime;

#[path = "support/pipeline.rs"]
mod test_pipeline_support;
use test_pipeline_support::fixture_pipeline;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

/// Snapshots of the fixture dataset, written once per test binary.
fn snapshot_dir() -> &'static TempDir {
    static DIR: OnceLock<TempDir> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = tempfile::tempdir().expect("tempdir");
        let rt = Runtime::new().expect("runtime");
        rt.block_on(async {
            let pipeline = fixture_pipeline(QueryConfig::default().with_cache(dir.path())).await;
            let writer = SnapshotWriter::new(pipeline.config().cache_config());
            pipeline
                .regenerate_snapshots(&writer)
                .await
                .expect("snapshots written");
        });
        dir
    })
}

async fn cached_pipeline() -> QueryPipeline {
    let mut config = QueryConfig::default().with_cache(snapshot_dir().path());
    config.cache_all_limits = true;
    fixture_pipeline(config).await
}

fn contains_namespace_key(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.contains_key(meshgate_core::NAMESPACE_KEY) || map.values().any(contains_namespace_key)
        }
        Value::Array(items) => items.iter().any(contains_namespace_key),
        _ => false,
    }
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Snapshot and live paths agree row for row.
    #[test]
    fn prop_snapshot_matches_live(request in arb_plain_listing(), user in any::<bool>()) {
        snapshot_dir();
        let rt = test_runtime()?;
        rt.block_on(async {
            let identity = if user {
                RequesterIdentity::user(5)
            } else {
                RequesterIdentity::anonymous()
            };
            let live = fixture_pipeline(QueryConfig::default()).await;
            let cached = cached_pipeline().await;

            let from_live = live.execute(&request, &identity).await?;
            let from_cache = cached.execute(&request, &identity).await?;

            prop_assert!(from_live.meta.generated.is_none());
            prop_assert!(from_cache.meta.generated.is_some());
            prop_assert_eq!(from_live.data, from_cache.data);
            Ok(())
        })?;
    }

    /// Redaction strips every namespace key, on either path.
    #[test]
    fn prop_no_namespace_key_survives(request in arb_plain_listing()) {
        snapshot_dir();
        let rt = test_runtime()?;
        rt.block_on(async {
            let cached = cached_pipeline().await;
            let response = cached.execute(&request, &RequesterIdentity::anonymous()).await?;
            prop_assert!(!contains_namespace_key(&response.data));
            Ok(())
        })?;
    }

    /// Single objects at any depth carry no namespace key and keep their id.
    #[test]
    fn prop_single_fetch_is_redacted(tag in arb_entity_type(), depth in arb_depth()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let pipeline = fixture_pipeline(QueryConfig::default()).await;
            let listing = pipeline
                .execute(&QueryRequest::listing(tag), &RequesterIdentity::anonymous())
                .await?;
            let Some(first) = listing.data.as_array().and_then(|rows| rows.first()) else {
                return Ok(());
            };
            let id = first["id"].as_i64().unwrap_or_default();

            let mut request = QueryRequest::single(tag, id);
            request.depth = depth;
            let single = pipeline.execute(&request, &RequesterIdentity::anonymous()).await?;
            prop_assert_eq!(single.data["id"].as_i64(), Some(id));
            prop_assert!(!contains_namespace_key(&single.data));
            Ok(())
        })?;
    }

    /// Listings never expand a single-valued relation into an object.
    #[test]
    fn prop_listing_relations_stay_flat(request in arb_plain_listing()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let pipeline = fixture_pipeline(QueryConfig::default()).await;
            let response = pipeline.execute(&request, &RequesterIdentity::anonymous()).await?;
            let schema = pipeline.registry().require(&request.entity_type)?;
            for row in response.data.as_array().into_iter().flatten() {
                for relation in schema.relations.iter().filter(|r| r.cardinality == Cardinality::One) {
                    if let Some(value) = row.get(relation.name) {
                        prop_assert!(!value.is_object(), "{} expanded in a listing", relation.name);
                    }
                }
            }
            Ok(())
        })?;
    }
}
