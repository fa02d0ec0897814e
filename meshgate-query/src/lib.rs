//! MESHGATE Query - Filter Compilation, Depth Expansion and Representation
//!
//! The request-time core of the read path:
//! - [`FilterCompiler`] turns raw query parameters into a typed
//!   [`FilterSpecification`](meshgate_core::FilterSpecification), handing
//!   leftovers to [`resolve_extensions`]
//! - [`DepthPlanner`] decides what to load at every level
//! - [`Executor`] loads the [`ObjectGraph`] through an entity store
//! - [`Resolver`] renders the graph as JSON

pub mod compiler;
pub mod extensions;
pub mod graph;
pub mod planner;
pub mod resolver;

pub use compiler::{canonical_name, split_operator, FilterCompiler, ResidualParams};
pub use extensions::{
    resolve_extensions, ASN_OVERLAP_MAX, ASN_OVERLAP_MIN, DEFAULT_DISTANCE_KM,
};
pub use graph::{
    Executor, GraphNode, LoadedRelation, NamespaceIndex, ObjectGraph, UNKEYED_INSTANCE,
};
pub use planner::{
    relation_visible, DepthPlanner, ExpansionPlan, LoadMode, NodePlan, RelationPlan,
};
pub use resolver::{FieldVisibility, Resolver};
