//! Object graph construction.
//!
//! The [`Executor`] runs an [`ExpansionPlan`] against an [`EntityStore`]:
//! one query for the root rows, then one batched lookup per planned
//! relation per level. Every node carries the permission namespace derived
//! from its owning-parent chain.

use meshgate_core::{
    EntityId, EntityRecord, EntitySchema, InstanceKey, MeshResult, Namespace, RootKind,
    SchemaRegistry,
};
use meshgate_storage::{EntityStore, StatusFilter, StoreQuery};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use crate::planner::{ExpansionPlan, LoadMode, NodePlan, RelationPlan};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Instance key used when a keyed-by field is missing.
pub const UNKEYED_INSTANCE: &str = "private";

/// A loaded relation attached to a [`GraphNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedRelation {
    Many(Vec<GraphNode>),
    ManyIds(Vec<EntityId>),
    /// `None` when the referenced row is missing or inactive.
    One(Option<Box<GraphNode>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub entity_type: &'static str,
    pub record: EntityRecord,
    pub namespace: Namespace,
    pub relations: HashMap<&'static str, LoadedRelation>,
}

impl GraphNode {
    pub fn relation(&self, name: &str) -> Option<&LoadedRelation> {
        self.relations.get(name)
    }
}

/// Per-request object graph, discarded after rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGraph {
    pub entity_type: &'static str,
    pub root: RootKind,
    pub depth: u32,
    pub nodes: Vec<GraphNode>,
}

// ============================================================================
// NAMESPACES
// ============================================================================

/// Memoised namespaces keyed by `(tag, id)`.
///
/// Parents that are not part of the graph are fetched in batches, whatever
/// their status, so every node can be placed under its owner.
pub struct NamespaceIndex<'r> {
    registry: &'r SchemaRegistry,
    memo: HashMap<(&'static str, EntityId), Namespace>,
}

impl<'r> NamespaceIndex<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            memo: HashMap::new(),
        }
    }

    /// Make sure every parent of `records` is resolvable.
    pub fn prime<'a>(
        &'a mut self,
        store: &'a dyn EntityStore,
        schema: &'static EntitySchema,
        records: &'a [EntityRecord],
    ) -> BoxFuture<'a, MeshResult<()>> {
        Box::pin(async move {
            let Some(parent) = schema.namespace.parent else {
                return Ok(());
            };
            let parent_schema = self.registry.require(parent.tag)?;

            let missing: Vec<EntityId> = records
                .iter()
                .filter_map(|r| r.foreign_key(parent.fk))
                .filter(|fk| !self.memo.contains_key(&(parent_schema.tag, *fk)))
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            if missing.is_empty() {
                return Ok(());
            }

            let rule = parent_schema.namespace;
            if rule.parent.is_none() && rule.instance == InstanceKey::Id {
                for id in missing {
                    self.memo
                        .insert((parent_schema.tag, id), Namespace::root(rule.segment, id));
                }
                return Ok(());
            }

            let parents = store
                .fetch_by_ids(parent_schema.tag, &missing, StatusFilter::Any)
                .await?;
            self.prime(store, parent_schema, &parents).await?;
            for row in &parents {
                let ns = self.derive(parent_schema, row);
                self.memo.insert((parent_schema.tag, row.id), ns);
            }
            Ok(())
        })
    }

    /// Namespace of `record`; its parents must have been primed.
    pub fn derive(&self, schema: &EntitySchema, record: &EntityRecord) -> Namespace {
        let rule = schema.namespace;
        let instance = match rule.instance {
            InstanceKey::Id => record.id.to_string(),
            InstanceKey::Field(field) => record
                .str_attr(field)
                .filter(|v| !v.is_empty())
                .map_or_else(|| UNKEYED_INSTANCE.to_string(), str::to_lowercase),
        };

        let Some(parent) = rule.parent else {
            return Namespace::root(rule.segment, instance);
        };
        match record.foreign_key(parent.fk) {
            Some(fk) => match self.memo.get(&(parent.tag, fk)) {
                Some(ns) => ns.child(rule.segment, instance),
                None => {
                    // orphan: rooted outside the org tree
                    let segment = self
                        .registry
                        .get(parent.tag)
                        .map_or(parent.tag, |s| s.namespace.segment);
                    Namespace::root(segment, fk).child(rule.segment, instance)
                }
            },
            None => Namespace::root(rule.segment, instance),
        }
    }

    /// Record a node's namespace so its children can hang off it.
    fn remember(&mut self, tag: &'static str, id: EntityId, ns: &Namespace) {
        self.memo.entry((tag, id)).or_insert_with(|| ns.clone());
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Loads object graphs through an [`EntityStore`].
pub struct Executor<'r> {
    registry: &'r SchemaRegistry,
    store: &'r dyn EntityStore,
}

impl<'r> Executor<'r> {
    pub fn new(registry: &'r SchemaRegistry, store: &'r dyn EntityStore) -> Self {
        Self { registry, store }
    }

    /// Query the root rows with `base_query` and expand them per `plan`.
    pub async fn execute(
        &self,
        plan: &ExpansionPlan,
        base_query: &StoreQuery,
    ) -> MeshResult<ObjectGraph> {
        let rows = self.store.query(base_query).await?;
        tracing::debug!(
            entity_type = plan.entity_type,
            rows = rows.len(),
            depth = plan.depth,
            "Fetched root rows"
        );
        self.execute_rows(plan, rows).await
    }

    /// Expand already-fetched root rows per `plan`.
    pub async fn execute_rows(
        &self,
        plan: &ExpansionPlan,
        rows: Vec<EntityRecord>,
    ) -> MeshResult<ObjectGraph> {
        let mut index = NamespaceIndex::new(self.registry);
        let nodes = self.load_level(&mut index, &plan.node, rows).await?;
        Ok(ObjectGraph {
            entity_type: plan.entity_type,
            root: plan.root,
            depth: plan.depth,
            nodes,
        })
    }

    fn load_level<'a>(
        &'a self,
        index: &'a mut NamespaceIndex<'r>,
        plan: &'a NodePlan,
        records: Vec<EntityRecord>,
    ) -> BoxFuture<'a, MeshResult<Vec<GraphNode>>> {
        Box::pin(async move {
            let schema = self.registry.require(plan.entity_type)?;
            index.prime(self.store, schema, &records).await?;

            let mut nodes: Vec<GraphNode> = records
                .into_iter()
                .map(|record| {
                    let namespace = index.derive(schema, &record);
                    GraphNode {
                        entity_type: schema.tag,
                        record,
                        namespace,
                        relations: HashMap::new(),
                    }
                })
                .collect();
            for node in &nodes {
                index.remember(schema.tag, node.record.id, &node.namespace);
            }
            if nodes.is_empty() {
                return Ok(nodes);
            }

            for relation_plan in &plan.relations {
                let mut loaded = self.load_relation(index, relation_plan, &nodes).await?;
                for node in &mut nodes {
                    if let Some(rel) = loaded.remove(&node.record.id) {
                        node.relations.insert(relation_plan.relation.name, rel);
                    }
                }
            }
            Ok(nodes)
        })
    }

    /// Load one relation for every parent at this level.
    async fn load_relation(
        &self,
        index: &mut NamespaceIndex<'r>,
        plan: &RelationPlan,
        parents: &[GraphNode],
    ) -> MeshResult<HashMap<EntityId, LoadedRelation>> {
        let relation = plan.relation;
        let parent_ids: Vec<EntityId> = parents.iter().map(|p| p.record.id).collect();

        if !relation.is_many() {
            let fks: Vec<EntityId> = parents
                .iter()
                .filter_map(|p| p.record.foreign_key(relation.fk))
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            let targets = self.fetch_targets(index, &plan.load, relation.target, &fks).await?;
            return Ok(parents
                .iter()
                .map(|p| {
                    let node = p
                        .record
                        .foreign_key(relation.fk)
                        .and_then(|fk| targets.get(&fk))
                        .and_then(Option::as_ref)
                        .map(|n| Box::new(n.clone()));
                    (p.record.id, LoadedRelation::One(node))
                })
                .collect());
        }

        // (parent id, child id) pairs in child natural order
        let (pairs, children) = match relation.through {
            Some(through) => {
                let joins = self
                    .store
                    .fetch_by_column(through.join, relation.fk, &parent_ids, StatusFilter::Active)
                    .await?;
                let pairs: Vec<(EntityId, EntityId)> = joins
                    .iter()
                    .filter_map(|j| Some((j.foreign_key(relation.fk)?, j.foreign_key(through.target_fk)?)))
                    .collect();
                let target_ids: Vec<EntityId> = pairs
                    .iter()
                    .map(|(_, t)| *t)
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .collect();
                let children = self
                    .fetch_targets(index, &plan.load, relation.target, &target_ids)
                    .await?;
                (pairs, children)
            }
            None => {
                let rows = self
                    .store
                    .fetch_by_column(relation.target, relation.fk, &parent_ids, StatusFilter::Active)
                    .await?;
                let pairs: Vec<(EntityId, EntityId)> = rows
                    .iter()
                    .filter_map(|r| Some((r.foreign_key(relation.fk)?, r.id)))
                    .collect();
                let children = self.expand(index, &plan.load, rows).await?;
                (pairs, children)
            }
        };

        let mut grouped: HashMap<EntityId, LoadedRelation> = parent_ids
            .iter()
            .map(|id| {
                let empty = match plan.load {
                    LoadMode::Ids => LoadedRelation::ManyIds(Vec::new()),
                    LoadMode::Full(_) => LoadedRelation::Many(Vec::new()),
                };
                (*id, empty)
            })
            .collect();
        for (parent_id, child_id) in pairs {
            let Some(child) = children.get(&child_id) else {
                continue;
            };
            match (grouped.get_mut(&parent_id), child) {
                (Some(LoadedRelation::ManyIds(ids)), _) => ids.push(child_id),
                (Some(LoadedRelation::Many(nodes)), Some(node)) => nodes.push(node.clone()),
                _ => {}
            }
        }
        Ok(grouped)
    }

    /// Active rows of `tag` by id, expanded per `load`.
    async fn fetch_targets(
        &self,
        index: &mut NamespaceIndex<'r>,
        load: &LoadMode,
        tag: &'static str,
        ids: &[EntityId],
    ) -> MeshResult<Children> {
        if ids.is_empty() {
            return Ok(Children::new());
        }
        let rows = self.store.fetch_by_ids(tag, ids, StatusFilter::Active).await?;
        self.expand(index, load, rows).await
    }

    /// Expand fetched children. In ids mode only their presence is kept.
    async fn expand(
        &self,
        index: &mut NamespaceIndex<'r>,
        load: &LoadMode,
        rows: Vec<EntityRecord>,
    ) -> MeshResult<Children> {
        Ok(match load {
            LoadMode::Full(child_plan) => self
                .load_level(index, child_plan, rows)
                .await?
                .into_iter()
                .map(|n| (n.record.id, Some(n)))
                .collect(),
            LoadMode::Ids => rows.into_iter().map(|r| (r.id, None)).collect(),
        })
    }
}

/// Loaded children by id; `None` when only the id was needed.
type Children = HashMap<EntityId, Option<GraphNode>>;
