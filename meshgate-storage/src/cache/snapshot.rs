//! Snapshot cache loader and writer.
//!
//! Snapshots are unredacted listings stored one file per
//! `(entity type, depth)`. The loader decides up front whether a request may
//! be answered from a snapshot ([`SnapshotCacheLoader::qualifies`]); the
//! caller then takes either the cache branch or the live branch. A snapshot
//! that cannot be read never fails the request.

use meshgate_core::{
    CacheError, MeshResult, QueryRequest, RootKind, SchemaRegistry, NAMESPACE_KEY,
};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::config::CacheConfig;

/// Rows sliced and projected from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload {
    pub rows: Vec<Value>,
    /// Snapshot generation time, epoch seconds.
    pub generated: f64,
    pub depth: u32,
}

/// Serves listings from precomputed snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotCacheLoader {
    config: CacheConfig,
    registry: SchemaRegistry,
}

impl SnapshotCacheLoader {
    pub fn new(config: CacheConfig, registry: SchemaRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Listing depth the snapshot for this request was generated at.
    pub fn effective_depth(&self, request: &QueryRequest) -> Option<u32> {
        let schema = self.registry.get(&request.entity_type)?;
        Some(
            schema
                .depth
                .effective(RootKind::List, request.depth)
                .min(self.config.max_depth),
        )
    }

    /// Whether `request` may be answered from a snapshot.
    pub async fn qualifies(&self, request: &QueryRequest) -> bool {
        if !self.config.enabled
            || request.id.is_some()
            || request.since.is_some()
            || !request.filters.is_empty()
        {
            return false;
        }

        let Some(depth) = self.effective_depth(request) else {
            return false;
        };

        // Small depth-0 pages are cheaper to query than to deserialize.
        if depth == 0
            && !self.config.all_limits
            && request
                .limit
                .is_some_and(|limit| limit <= self.config.limit_threshold)
        {
            return false;
        }

        let path = self.config.snapshot_path(&request.entity_type, depth);
        match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        }
    }

    /// Read, slice and project the snapshot for `request`.
    pub async fn load(&self, request: &QueryRequest) -> MeshResult<RawPayload> {
        let depth = self.effective_depth(request).unwrap_or(0);
        let path = self.config.snapshot_path(&request.entity_type, depth);

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| unreadable(&path, e))?;
        let mut document: Value =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::Malformed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let generated = match document.get("generated").and_then(Value::as_f64) {
            Some(generated) => generated,
            None => modified_epoch(&path).await?,
        };

        let rows = match document.get_mut("data").map(Value::take) {
            Some(Value::Array(rows)) => rows,
            _ => {
                return Err(CacheError::Malformed {
                    path: path.display().to_string(),
                    reason: "missing data array".to_string(),
                }
                .into())
            }
        };

        let mut rows: Vec<Value> = match request.limit {
            Some(limit) => rows.into_iter().skip(request.skip).take(limit).collect(),
            None => rows.into_iter().skip(request.skip).collect(),
        };

        if let Some(fields) = &request.fields {
            let allow: HashSet<&str> = fields.iter().map(String::as_str).collect();
            for row in &mut rows {
                project_fields(row, &allow);
            }
        }

        tracing::debug!(
            entity_type = %request.entity_type,
            depth,
            rows = rows.len(),
            "Serving listing from snapshot"
        );

        Ok(RawPayload {
            rows,
            generated,
            depth,
        })
    }
}

fn unreadable(path: &Path, err: std::io::Error) -> CacheError {
    CacheError::Unreadable {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

async fn modified_epoch(path: &Path) -> Result<f64, CacheError> {
    let modified = tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .map_err(|e| unreadable(path, e))?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0))
}

/// Keep only allowed keys (and the namespace key) on every object level.
pub fn project_fields(value: &mut Value, allow: &HashSet<&str>) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| key == NAMESPACE_KEY || allow.contains(key.as_str()));
            for nested in map.values_mut() {
                project_fields(nested, allow);
            }
        }
        Value::Array(items) => {
            for item in items {
                project_fields(item, allow);
            }
        }
        _ => {}
    }
}

/// Writes snapshots with atomic replace.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    config: CacheConfig,
}

impl SnapshotWriter {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// Write `rows` as the `(tag, depth)` snapshot. Readers see either the
    /// old file or the complete new one.
    pub async fn write_atomic(&self, tag: &str, depth: u32, rows: Vec<Value>) -> MeshResult<PathBuf> {
        let path = self.config.snapshot_path(tag, depth);
        let tmp = self.config.root.join(format!(
            ".{}-{}.json.{}.tmp",
            tag,
            depth,
            std::process::id()
        ));

        let generated = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let mut document = Map::new();
        document.insert("data".to_string(), Value::Array(rows));
        document.insert("generated".to_string(), json!(generated));

        let bytes = serde_json::to_vec(&Value::Object(document)).map_err(|e| {
            CacheError::WriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let write_failed = |e: std::io::Error| CacheError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        tokio::fs::create_dir_all(&self.config.root)
            .await
            .map_err(write_failed)?;
        tokio::fs::write(&tmp, &bytes).await.map_err(write_failed)?;
        tokio::fs::rename(&tmp, &path).await.map_err(write_failed)?;

        tracing::info!(tag, depth, path = %path.display(), "Snapshot written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgate_core::PEERING_REGISTRY;

    fn loader(root: &Path) -> SnapshotCacheLoader {
        SnapshotCacheLoader::new(
            CacheConfig::new().with_enabled(true).with_root(root),
            PEERING_REGISTRY.clone(),
        )
    }

    async fn write_snapshot(root: &Path, tag: &str, depth: u32, document: Value) {
        tokio::fs::write(
            root.join(format!("{}-{}.json", tag, depth)),
            serde_json::to_vec(&document).unwrap(),
        )
        .await
        .unwrap();
    }

    fn rows(n: i64) -> Vec<Value> {
        (1..=n)
            .map(|id| json!({"id": id, "name": format!("net {}", id), "_grainy": format!("org.1.network.{}", id)}))
            .collect()
    }

    #[tokio::test]
    async fn test_qualifies_requires_enabled_listing_without_filters() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(dir.path(), "net", 0, json!({"data": rows(3), "generated": 1.0})).await;
        let loader = loader(dir.path());

        assert!(loader.qualifies(&QueryRequest::listing("net")).await);
        assert!(!loader.qualifies(&QueryRequest::single("net", 1)).await);
        assert!(
            !loader
                .qualifies(&QueryRequest::listing("net").with_filter("asn", "1"))
                .await
        );
        assert!(!loader.qualifies(&QueryRequest::listing("net").with_since(10)).await);
        assert!(!loader.qualifies(&QueryRequest::listing("fac")).await);
        assert!(!loader.qualifies(&QueryRequest::listing("carrier")).await);

        let disabled = SnapshotCacheLoader::new(
            CacheConfig::new().with_root(dir.path()),
            PEERING_REGISTRY.clone(),
        );
        assert!(!disabled.qualifies(&QueryRequest::listing("net")).await);
    }

    #[tokio::test]
    async fn test_small_limit_heuristic_and_override() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(dir.path(), "net", 0, json!({"data": rows(3)})).await;
        write_snapshot(dir.path(), "net", 1, json!({"data": rows(3)})).await;

        let loader = loader(dir.path());
        assert!(!loader.qualifies(&QueryRequest::listing("net").with_limit(10)).await);
        assert!(loader.qualifies(&QueryRequest::listing("net").with_limit(500)).await);
        assert!(
            loader
                .qualifies(&QueryRequest::listing("net").with_limit(10).with_depth(1))
                .await
        );

        let forced = SnapshotCacheLoader::new(
            CacheConfig::new()
                .with_enabled(true)
                .with_root(dir.path())
                .with_all_limits(true),
            PEERING_REGISTRY.clone(),
        );
        assert!(forced.qualifies(&QueryRequest::listing("net").with_limit(10)).await);
    }

    #[tokio::test]
    async fn test_depth_is_clamped_to_snapshot_max() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(dir.path(), "org", 3, json!({"data": []})).await;
        let loader = loader(dir.path());
        let request = QueryRequest::listing("org").with_depth(9);
        assert_eq!(loader.effective_depth(&request), Some(3));
        assert!(loader.qualifies(&request).await);
    }

    #[tokio::test]
    async fn test_load_slices_and_projects() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(dir.path(), "net", 0, json!({"data": rows(5), "generated": 1700000000.5})).await;
        let loader = loader(dir.path());

        let payload = loader
            .load(
                &QueryRequest::listing("net")
                    .with_skip(1)
                    .with_limit(2)
                    .with_fields(&["id"]),
            )
            .await
            .unwrap();

        assert_eq!(payload.generated, 1700000000.5);
        assert_eq!(payload.depth, 0);
        assert_eq!(
            payload.rows,
            vec![
                json!({"id": 2, "_grainy": "org.1.network.2"}),
                json!({"id": 3, "_grainy": "org.1.network.3"}),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_without_generated_uses_mtime() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(dir.path(), "net", 0, json!({"data": rows(1)})).await;
        let payload = loader(dir.path())
            .load(&QueryRequest::listing("net"))
            .await
            .unwrap();
        assert!(payload.generated > 0.0);
    }

    #[tokio::test]
    async fn test_malformed_snapshot_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("net-0.json"), b"{not json")
            .await
            .unwrap();
        let err = loader(dir.path())
            .load(&QueryRequest::listing("net"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            meshgate_core::MeshError::Cache(CacheError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_writer_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested");
        let config = CacheConfig::new().with_enabled(true).with_root(&root);

        let path = SnapshotWriter::new(config.clone())
            .write_atomic("net", 0, rows(2))
            .await
            .unwrap();
        assert_eq!(path, root.join("net-0.json"));

        let loader = SnapshotCacheLoader::new(config, PEERING_REGISTRY.clone());
        assert!(loader.qualifies(&QueryRequest::listing("net")).await);
        let payload = loader.load(&QueryRequest::listing("net")).await.unwrap();
        assert_eq!(payload.rows, rows(2));

        let mut leftovers = tokio::fs::read_dir(&root).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = leftovers.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["net-0.json".to_string()]);
    }
}
