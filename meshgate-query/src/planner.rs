//! Depth Expansion Planner
//!
//! Decides, once per request, which relations are loaded at every level of
//! the object graph and whether a has-many collection needs full child
//! objects or only their ids. The resolver applies the same arithmetic at
//! render time, so everything it may render is already loaded.
//!
//! Budget rules, with `rel` the relative depth left at a node:
//!
//! | relation    | rel     | load                          |
//! |-------------|---------|-------------------------------|
//! | has-many    | `<= 0`  | omitted                       |
//! | has-many    | `== 1`  | ids                           |
//! | has-many    | `>= 2`  | full objects at `rel - 2`     |
//! | belongs-to  | `>= 1`  | full object at `rel - 1` (single-object roots only) |
//!
//! Requested depths above the type's maximum are clamped, never rejected.

use meshgate_core::{
    EntitySchema, MeshResult, RelationDef, RootKind, SchemaRegistry,
};

/// How a planned relation is loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadMode {
    /// Fetch the child rows, render their ids only.
    Ids,
    /// Fetch and expand the child rows.
    Full(Box<NodePlan>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationPlan {
    pub relation: &'static RelationDef,
    pub load: LoadMode,
}

/// Plan for every node of one entity type at one relative depth.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePlan {
    pub entity_type: &'static str,
    pub relative_depth: i64,
    pub relations: Vec<RelationPlan>,
}

impl NodePlan {
    pub fn relation(&self, name: &str) -> Option<&RelationPlan> {
        self.relations.iter().find(|r| r.relation.name == name)
    }
}

/// Full expansion plan for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionPlan {
    pub entity_type: &'static str,
    pub root: RootKind,
    /// Effective (clamped) depth.
    pub depth: u32,
    pub node: NodePlan,
}

/// Builds [`ExpansionPlan`]s from the schema registry.
#[derive(Debug, Clone, Copy)]
pub struct DepthPlanner<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> DepthPlanner<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Effective depth for a request against `entity_type`.
    pub fn effective_depth(
        &self,
        entity_type: &str,
        root: RootKind,
        requested: Option<u32>,
    ) -> MeshResult<u32> {
        let schema = self.registry.require(entity_type)?;
        Ok(schema.depth.effective(root, requested))
    }

    pub fn plan(
        &self,
        entity_type: &str,
        root: RootKind,
        requested_depth: Option<u32>,
    ) -> MeshResult<ExpansionPlan> {
        self.plan_with_fields(entity_type, root, requested_depth, None)
    }

    /// Plan honouring a `fields` allow-list; relations outside it are
    /// never loaded.
    pub fn plan_with_fields(
        &self,
        entity_type: &str,
        root: RootKind,
        requested_depth: Option<u32>,
        fields: Option<&[String]>,
    ) -> MeshResult<ExpansionPlan> {
        let schema = self.registry.require(entity_type)?;
        let depth = schema.depth.effective(root, requested_depth);
        let node = self.node(schema, i64::from(depth), root, &[], fields)?;

        tracing::trace!(
            entity_type = schema.tag,
            ?root,
            depth,
            relations = node.relations.len(),
            "Planned expansion"
        );

        Ok(ExpansionPlan {
            entity_type: schema.tag,
            root,
            depth,
            node,
        })
    }

    fn node(
        &self,
        schema: &'static EntitySchema,
        rel: i64,
        root: RootKind,
        inherited_exclude: &[&'static str],
        fields: Option<&[String]>,
    ) -> MeshResult<NodePlan> {
        let mut relations = Vec::new();

        for relation in schema.relations {
            if !relation_visible(schema, relation, root, inherited_exclude, fields) {
                continue;
            }
            let target = self.registry.target(relation)?;

            let load = if relation.is_many() {
                match rel {
                    r if r <= 0 => continue,
                    1 => LoadMode::Ids,
                    r => LoadMode::Full(Box::new(self.node(
                        target,
                        r - 2,
                        root,
                        relation.child_exclude,
                        fields,
                    )?)),
                }
            } else {
                if root.is_list() || rel < 1 {
                    continue;
                }
                LoadMode::Full(Box::new(self.node(target, rel - 1, root, &[], fields)?))
            };

            relations.push(RelationPlan { relation, load });
        }

        Ok(NodePlan {
            entity_type: schema.tag,
            relative_depth: rel,
            relations,
        })
    }
}

/// Shared visibility test for relation fields: list-mode exclusions,
/// back-reference exclusions inherited from the parent collection, and the
/// request's field allow-list.
pub fn relation_visible(
    schema: &EntitySchema,
    relation: &RelationDef,
    root: RootKind,
    inherited_exclude: &[&'static str],
    fields: Option<&[String]>,
) -> bool {
    if root.is_list() && schema.list_exclude.contains(&relation.name) {
        return false;
    }
    if inherited_exclude.contains(&relation.name) {
        return false;
    }
    fields.map_or(true, |allowed| allowed.iter().any(|f| f == relation.name))
}
