//! MESHGATE Core - Schema and Query Types
//!
//! Static entity schemas, request values, compiled filter types, permission
//! namespaces and the error taxonomy shared by every pipeline stage. This
//! crate holds no I/O.

pub mod error;
pub mod filter;
pub mod namespace;
pub mod permission;
pub mod record;
pub mod request;
pub mod schema;

pub use error::{CacheError, FilterError, MeshError, MeshResult, SchemaError, StorageError};
pub use filter::{
    ClauseTarget, FieldClause, FilterOperator, FilterSpecification, FilterValue, SpecialPredicate,
};
pub use namespace::{Namespace, NamespacePattern, WILDCARD};
pub use permission::Permissions;
pub use record::{format_timestamp, EntityId, EntityRecord, EntityStatus, Timestamp};
pub use request::{QueryRequest, RESERVED_PARAMS};
pub use schema::{
    Cardinality, DepthLimits, EntitySchema, ExtensionFilter, ExtensionKind, FieldDef, FieldKind,
    InstanceKey, LinkColumn, LinkPath, NamespaceParent, NamespaceRule, RelationDef, RootKind,
    SchemaRegistry, Through, PEERING_REGISTRY, PEERING_SCHEMAS,
};

/// Reserved key carrying a rendered object's permission namespace.
pub const NAMESPACE_KEY: &str = "_grainy";
