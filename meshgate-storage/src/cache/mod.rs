//! Snapshot cache.
//!
//! Precomputed, unredacted listings stored per entity type and depth as
//! `<root>/<tag>-<depth>.json`. Serving a listing from a snapshot skips
//! filter compilation, expansion and rendering; redaction still runs on
//! whatever the loader returns.
//!
//! # Qualification
//!
//! A request is served from a snapshot only when the cache is enabled, the
//! request is a plain listing (no primary key, no filters, no `since`), a
//! snapshot exists for the effective depth, and it is not a small depth-0
//! page (see [`CacheConfig::limit_threshold`]). Anything else, including a
//! snapshot that turns out to be unreadable, goes to the live path.
//!
//! # Example
//!
//! ```ignore
//! let loader = SnapshotCacheLoader::new(config, registry);
//! if loader.qualifies(&request).await {
//!     let payload = loader.load(&request).await?;
//! }
//! ```

pub mod config;
pub mod snapshot;

pub use config::{CacheConfig, DEFAULT_LIMIT_THRESHOLD, MAX_SNAPSHOT_DEPTH};
pub use snapshot::{project_fields, RawPayload, SnapshotCacheLoader, SnapshotWriter};
