//! Lookup table of entity schemas keyed by tag.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::{EntitySchema, RelationDef, PEERING_SCHEMAS};
use crate::error::SchemaError;

/// Process-wide registry of the peering schemas. Read-only after first use.
pub static PEERING_REGISTRY: LazyLock<SchemaRegistry> =
    LazyLock::new(|| SchemaRegistry::from_schemas(PEERING_SCHEMAS));

/// Entity schemas keyed by tag.
///
/// Relations name their target by tag only; callers resolve the target
/// schema through [`SchemaRegistry::target`] at the moment they descend.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<&'static str, &'static EntitySchema>,
    order: Vec<&'static str>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_schemas(schemas: &'static [EntitySchema]) -> Self {
        let mut registry = Self::new();
        for schema in schemas {
            registry.register(schema);
        }
        registry
    }

    /// Register a schema. A later registration for the same tag replaces it.
    pub fn register(&mut self, schema: &'static EntitySchema) {
        if self.schemas.insert(schema.tag, schema).is_none() {
            self.order.push(schema.tag);
        }
    }

    pub fn get(&self, tag: &str) -> Option<&'static EntitySchema> {
        self.schemas.get(tag).copied()
    }

    pub fn require(&self, tag: &str) -> Result<&'static EntitySchema, SchemaError> {
        self.get(tag).ok_or_else(|| SchemaError::UnknownEntityType {
            tag: tag.to_string(),
        })
    }

    /// Schema a relation points at.
    pub fn target(&self, relation: &RelationDef) -> Result<&'static EntitySchema, SchemaError> {
        self.require(relation.target)
    }

    /// Tags in registration order.
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cardinality, InstanceKey};

    #[test]
    fn test_peering_registry_contents() {
        let registry = &*PEERING_REGISTRY;
        assert_eq!(registry.len(), 10);
        let tags: Vec<_> = registry.tags().collect();
        assert_eq!(tags[0], "org");
        assert!(tags.contains(&"poc"));
        assert!(registry.get("carrier").is_none());
        assert!(matches!(
            registry.require("carrier"),
            Err(SchemaError::UnknownEntityType { .. })
        ));
    }

    #[test]
    fn test_every_relation_target_resolves() {
        let registry = &*PEERING_REGISTRY;
        for tag in registry.tags() {
            let schema = registry.require(tag).unwrap();
            for rel in schema.relations {
                let target = registry.target(rel).unwrap();
                if let Some(through) = rel.through {
                    assert!(registry.get(through.join).is_some());
                }
                if rel.cardinality == Cardinality::One {
                    assert!(rel.fk.ends_with("_id"), "{}.{}", tag, rel.name);
                }
                assert_eq!(target.tag, rel.target);
            }
        }
    }

    #[test]
    fn test_namespace_parents_are_registered() {
        let registry = &*PEERING_REGISTRY;
        for tag in registry.tags() {
            let schema = registry.require(tag).unwrap();
            if let Some(parent) = schema.namespace.parent {
                assert!(registry.get(parent.tag).is_some());
            }
        }
        let poc = registry.require("poc").unwrap();
        assert_eq!(poc.namespace.instance, InstanceKey::Field("visible"));
    }

    #[test]
    fn test_render_order_for_network() {
        let net = PEERING_REGISTRY.require("net").unwrap();
        let order = net.render_order();
        assert_eq!(&order[..3], &["id", "org_id", "org"]);
        assert_eq!(&order[order.len() - 3..], &["created", "updated", "status"]);
        let sets = order.iter().position(|f| *f == "netfac_set").unwrap();
        let asn = order.iter().position(|f| *f == "asn").unwrap();
        assert!(asn < sets);
    }
}
