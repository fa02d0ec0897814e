//! MESHGATE Storage - Entity Store Contract and Snapshot Cache
//!
//! Defines the async entity store the expansion executor reads through, an
//! in-memory implementation of it, and the snapshot cache used to answer
//! plain listings without touching the store.

pub mod cache;
pub mod memory;
pub mod store;

pub use cache::{
    project_fields, CacheConfig, RawPayload, SnapshotCacheLoader, SnapshotWriter,
    DEFAULT_LIMIT_THRESHOLD, MAX_SNAPSHOT_DEPTH,
};
pub use memory::InMemoryStore;
pub use store::{EntityStore, RowOrdering, StatusFilter, StoreQuery};
