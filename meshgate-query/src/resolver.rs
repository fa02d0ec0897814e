//! Representation Depth Resolver
//!
//! Walks a loaded [`ObjectGraph`] and renders every node as JSON, deciding
//! per relation field between a nested object, a bare id and omission.
//! Which fields a node renders at all is decided up front by
//! [`FieldVisibility`], so rendering never mutates shared state.

use meshgate_core::{
    Cardinality, EntitySchema, EntityStatus, MeshResult, RelationDef, RootKind, SchemaRegistry,
    NAMESPACE_KEY,
};
use serde_json::{Map, Value};

use crate::graph::{GraphNode, LoadedRelation, ObjectGraph};

/// The fields one node renders, in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldVisibility {
    pub fields: Vec<&'static str>,
}

impl FieldVisibility {
    /// Declared render order minus list-mode exclusions, back-references
    /// excluded by the parent collection, and anything outside the
    /// request's allow-list.
    pub fn decide(
        schema: &EntitySchema,
        root: RootKind,
        inherited_exclude: &[&'static str],
        allow: Option<&[String]>,
    ) -> Self {
        let fields = schema
            .render_order()
            .into_iter()
            .filter(|name| !(root.is_list() && schema.list_exclude.contains(name)))
            .filter(|name| !inherited_exclude.contains(name))
            .filter(|name| allow.map_or(true, |a| a.iter().any(|f| f == name)))
            .collect();
        Self { fields }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| *f == name)
    }
}

/// Renders object graphs for one request.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'r> {
    registry: &'r SchemaRegistry,
    root: RootKind,
    fields: Option<&'r [String]>,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r SchemaRegistry, root: RootKind, fields: Option<&'r [String]>) -> Self {
        Self {
            registry,
            root,
            fields,
        }
    }

    /// Listing roots render to an array, single-object roots to the object
    /// itself (or `null` when nothing was loaded).
    pub fn render_graph(&self, graph: &ObjectGraph) -> MeshResult<Value> {
        let depth = i64::from(graph.depth);
        match graph.root {
            RootKind::List => graph
                .nodes
                .iter()
                .map(|node| self.render(node, depth, true, &[]))
                .collect::<MeshResult<Vec<_>>>()
                .map(Value::Array),
            RootKind::Single => match graph.nodes.first() {
                Some(node) => self.render(node, depth, true, &[]),
                None => Ok(Value::Null),
            },
        }
    }

    /// Render one node at `relative_depth`.
    pub fn render(
        &self,
        node: &GraphNode,
        relative_depth: i64,
        is_root: bool,
        inherited_exclude: &[&'static str],
    ) -> MeshResult<Value> {
        let schema = self.registry.require(node.entity_type)?;
        let visibility = FieldVisibility::decide(schema, self.root, inherited_exclude, self.fields);
        let record = &node.record;
        let mut out = Map::new();

        for name in &visibility.fields {
            if let Some(relation) = schema.relation(name) {
                if let Some(value) = self.render_relation(node, relation, relative_depth)? {
                    out.insert((*name).to_string(), value);
                }
                continue;
            }

            let blank = record.status == EntityStatus::Deleted
                && schema.blank_when_deleted.contains(name);
            let value = if blank {
                Value::String(String::new())
            } else {
                record.field_value(name).unwrap_or(Value::Null)
            };
            out.insert((*name).to_string(), value);
        }

        out.insert(
            NAMESPACE_KEY.to_string(),
            Value::String(node.namespace.to_string()),
        );

        if is_root {
            tracing::trace!(
                entity_type = schema.tag,
                id = record.id,
                fields = out.len(),
                "Rendered root node"
            );
        }
        Ok(Value::Object(out))
    }

    /// `None` omits the field.
    fn render_relation(
        &self,
        node: &GraphNode,
        relation: &RelationDef,
        rel: i64,
    ) -> MeshResult<Option<Value>> {
        match relation.cardinality {
            Cardinality::One => {
                let bare = || {
                    node.record
                        .foreign_key(relation.fk)
                        .map_or(Value::Null, Value::from)
                };
                if self.root.is_list() || rel < 1 {
                    return Ok(Some(bare()));
                }
                match node.relation(relation.name) {
                    Some(LoadedRelation::One(Some(target))) => {
                        self.render(target, rel - 1, false, &[]).map(Some)
                    }
                    Some(LoadedRelation::One(None)) => Ok(Some(Value::Null)),
                    _ => Ok(Some(bare())),
                }
            }
            Cardinality::Many => {
                if rel <= 0 {
                    return Ok(None);
                }
                let Some(loaded) = node.relation(relation.name) else {
                    return Ok(None);
                };
                let ids = |nodes: &[GraphNode]| {
                    Value::Array(nodes.iter().map(|n| Value::from(n.record.id)).collect())
                };
                match loaded {
                    LoadedRelation::ManyIds(list) => Ok(Some(Value::Array(
                        list.iter().copied().map(Value::from).collect(),
                    ))),
                    LoadedRelation::Many(children) if rel == 1 => Ok(Some(ids(children))),
                    LoadedRelation::Many(children) => children
                        .iter()
                        .map(|child| self.render(child, rel - 2, false, relation.child_exclude))
                        .collect::<MeshResult<Vec<_>>>()
                        .map(|items| Some(Value::Array(items))),
                    LoadedRelation::One(_) => Ok(None),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Executor;
    use crate::planner::DepthPlanner;
    use meshgate_core::{EntityId, EntityRecord, PEERING_REGISTRY};
    use meshgate_storage::{EntityStore, InMemoryStore, StatusFilter, StoreQuery};
    use meshgate_test_utils::fixtures::*;
    use serde_json::json;

    async fn render(
        store: &dyn EntityStore,
        tag: &'static str,
        id: Option<EntityId>,
        depth: u32,
        fields: Option<&[String]>,
    ) -> Value {
        let root = if id.is_some() { RootKind::Single } else { RootKind::List };
        let plan = DepthPlanner::new(&PEERING_REGISTRY)
            .plan_with_fields(tag, root, Some(depth), fields)
            .unwrap();
        let mut query = StoreQuery::new(tag);
        if let Some(id) = id {
            query = query.with_id(id).with_status(StatusFilter::ActiveOrPending);
        }
        let graph = Executor::new(&PEERING_REGISTRY, store)
            .execute(&plan, &query)
            .await
            .unwrap();
        Resolver::new(&PEERING_REGISTRY, root, fields)
            .render_graph(&graph)
            .unwrap()
    }

    #[test]
    fn test_visibility_is_a_set_difference() {
        let net = PEERING_REGISTRY.get("net").unwrap();
        let single = FieldVisibility::decide(net, RootKind::Single, &[], None);
        assert!(single.contains("org"));
        assert!(single.contains("org_id"));

        let list = FieldVisibility::decide(net, RootKind::List, &[], None);
        assert!(!list.contains("org"));
        assert!(list.contains("org_id"));

        let nested = FieldVisibility::decide(net, RootKind::Single, &["org_id", "org"], None);
        assert!(!nested.contains("org_id"));
        assert_eq!(nested.fields[0], "id");

        let allow = vec!["name".to_string(), "asn".to_string()];
        let picked = FieldVisibility::decide(net, RootKind::Single, &[], Some(&allow));
        assert_eq!(picked.fields, vec!["name", "asn"]);
    }

    #[tokio::test]
    async fn test_single_org_depth_one_renders_ids() {
        let store = peering_store().await;
        let org = render(&store, "org", Some(ORG_ACME), 1, None).await;
        assert_eq!(org["net_set"], json!([10, 11, 12]));
        assert_eq!(org["fac_set"], json!([30]));
        assert_eq!(org["_grainy"], json!("org.1"));
    }

    #[tokio::test]
    async fn test_single_org_depth_three_renders_nested_ids() {
        let store = peering_store().await;
        let org = render(&store, "org", Some(ORG_ACME), 3, None).await;
        let first = &org["net_set"][0];
        assert_eq!(first["id"], json!(NET_TRANSIT));
        assert_eq!(first["netfac_set"], json!([60, 61]));
        assert!(first.get("org_id").is_none());
        assert!(first.get("org").is_none());
        assert_eq!(first["_grainy"], json!("org.1.network.10"));
    }

    #[tokio::test]
    async fn test_listing_never_expands_single_relations() {
        let store = peering_store().await;
        let rows = render(&store, "net", None, 3, None).await;
        for row in rows.as_array().unwrap() {
            assert!(row.get("org").is_none());
            assert!(row["org_id"].is_i64());
        }
        let first = &rows[0];
        assert!(first["poc_set"][0].is_object());
        assert!(first["poc_set"][0].get("net").is_none());
    }

    #[tokio::test]
    async fn test_listing_depth_zero_omits_collections() {
        let store = peering_store().await;
        let rows = render(&store, "org", None, 0, None).await;
        assert_eq!(rows.as_array().unwrap().len(), 2);
        assert!(rows[0].get("net_set").is_none());
        assert_eq!(rows[0]["name"], json!("Acme Holdings"));
    }

    #[tokio::test]
    async fn test_single_relation_expands_then_bottoms_out_as_id() {
        let store = peering_store().await;
        let netfac = render(&store, "netfac", Some(60), 1, None).await;
        assert_eq!(netfac["net_id"], json!(NET_TRANSIT));
        assert_eq!(netfac["net"]["id"], json!(NET_TRANSIT));
        // net rendered at relative depth 0: its org stays a bare id
        assert_eq!(netfac["net"]["org"], json!(ORG_ACME));
        assert!(netfac["net"].get("poc_set").is_none());

        let shallow = render(&store, "netfac", Some(60), 0, None).await;
        assert_eq!(shallow["net"], json!(NET_TRANSIT));
    }

    #[tokio::test]
    async fn test_missing_target_renders_null() {
        let store = peering_store().await;
        store
            .insert(
                "netfac",
                EntityRecord::new(99, day(12)).with("net_id", NET_CDN).with("fac_id", 404),
            )
            .await;
        let netfac = render(&store, "netfac", Some(99), 2, None).await;
        assert_eq!(netfac["fac"], Value::Null);
        assert_eq!(netfac["fac_id"], json!(404));
    }

    #[tokio::test]
    async fn test_fields_allow_list_applies_at_every_level() {
        let store = peering_store().await;
        let fields = vec!["id".to_string(), "name".to_string(), "net_set".to_string()];
        let org = render(&store, "org", Some(ORG_ACME), 2, Some(&fields)).await;
        let keys: Vec<&String> = org.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "name", "net_set", "_grainy"]);
        let net_keys: Vec<&String> = org["net_set"][0].as_object().unwrap().keys().collect();
        assert_eq!(net_keys, vec!["id", "name", "_grainy"]);
    }

    #[tokio::test]
    async fn test_deleted_rows_blank_sensitive_fields() {
        let store = InMemoryStore::new();
        store
            .insert(
                "poc",
                EntityRecord::new(7, day(1))
                    .with("net_id", 1)
                    .with("name", "Gone")
                    .with("role", "NOC")
                    .with_status(EntityStatus::Deleted),
            )
            .await;
        let plan = DepthPlanner::new(&PEERING_REGISTRY)
            .plan("poc", RootKind::List, None)
            .unwrap();
        let graph = Executor::new(&PEERING_REGISTRY, &store)
            .execute(&plan, &StoreQuery::new("poc").with_status(StatusFilter::ActiveOrDeleted))
            .await
            .unwrap();
        let rows = Resolver::new(&PEERING_REGISTRY, RootKind::List, None)
            .render_graph(&graph)
            .unwrap();
        assert_eq!(rows[0]["name"], json!(""));
        assert_eq!(rows[0]["role"], json!("NOC"));
        assert_eq!(rows[0]["status"], json!("deleted"));
    }
}
