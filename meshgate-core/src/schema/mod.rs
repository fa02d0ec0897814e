//! Schema Registry
//!
//! Static description of every entity type the read pipeline serves:
//! scalar fields, relations, depth limits, list-mode exclusions, namespace
//! rules and extension filter hooks. Definitions are `const` data; the
//! [`SchemaRegistry`] is the lookup table keyed by entity-type tag that
//! every other stage resolves relations through, so schemas never refer to
//! each other directly.

mod peering;
mod registry;

pub use peering::PEERING_SCHEMAS;
pub use registry::{SchemaRegistry, PEERING_REGISTRY};

use serde::{Deserialize, Serialize};

// ============================================================================
// FIELDS
// ============================================================================

/// Semantic type of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    Float,
    String,
    Boolean,
    Date,
    DateTime,
}

impl FieldKind {
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Float => "number",
            FieldKind::String => "string",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::DateTime => "datetime",
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldKind::Date | FieldKind::DateTime)
    }
}

/// A scalar field declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

pub const fn field(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef { name, kind }
}

/// Fields every entity type carries.
pub const COMMON_FIELDS: &[FieldDef] = &[
    field("id", FieldKind::Integer),
    field("created", FieldKind::DateTime),
    field("updated", FieldKind::DateTime),
    field("status", FieldKind::String),
];

// ============================================================================
// RELATIONS
// ============================================================================

/// Relation cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Belongs-to: the owning row carries the foreign key.
    One,
    /// Has-many: child rows (or join rows) carry a key pointing back.
    Many,
}

/// Join type sitting between a parent and the rows a has-many yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Through {
    /// Join entity type tag (`ixfac`, `netixlan`).
    pub join: &'static str,
    /// Column on the join row naming the target row.
    pub target_fk: &'static str,
}

/// A relation declaration.
///
/// For `Cardinality::One`, `fk` is the column on this row. For
/// `Cardinality::Many`, `fk` is the column on the child (or join) row that
/// points back at this row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDef {
    /// Rendered field name (`org`, `net_set`, `fac`).
    pub name: &'static str,
    /// Canonical name used in filters (`org`, `network`, `facility`).
    pub query_name: &'static str,
    pub target: &'static str,
    pub cardinality: Cardinality,
    pub fk: &'static str,
    pub through: Option<Through>,
    /// Fields removed from rows rendered inside this relation.
    pub child_exclude: &'static [&'static str],
}

impl RelationDef {
    pub const fn belongs_to(
        name: &'static str,
        query_name: &'static str,
        target: &'static str,
        fk: &'static str,
    ) -> Self {
        Self {
            name,
            query_name,
            target,
            cardinality: Cardinality::One,
            fk,
            through: None,
            child_exclude: &[],
        }
    }

    pub const fn has_many(name: &'static str, target: &'static str, fk: &'static str) -> Self {
        Self {
            name,
            query_name: name,
            target,
            cardinality: Cardinality::Many,
            fk,
            through: None,
            child_exclude: &[],
        }
    }

    pub const fn via(mut self, join: &'static str, target_fk: &'static str) -> Self {
        self.through = Some(Through { join, target_fk });
        self
    }

    pub const fn excluding(mut self, fields: &'static [&'static str]) -> Self {
        self.child_exclude = fields;
        self
    }

    pub fn is_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }
}

// ============================================================================
// DEPTH
// ============================================================================

/// Whether the overall query root is a listing or a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    List,
    Single,
}

impl RootKind {
    pub fn is_list(&self) -> bool {
        matches!(self, RootKind::List)
    }
}

/// Default and maximum expansion depth per root kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthLimits {
    pub list_default: u32,
    pub list_max: u32,
    pub single_default: u32,
    pub single_max: u32,
}

impl DepthLimits {
    pub const STANDARD: DepthLimits = DepthLimits {
        list_default: 0,
        list_max: 3,
        single_default: 2,
        single_max: 4,
    };

    pub fn default_for(&self, root: RootKind) -> u32 {
        match root {
            RootKind::List => self.list_default,
            RootKind::Single => self.single_default,
        }
    }

    pub fn max_for(&self, root: RootKind) -> u32 {
        match root {
            RootKind::List => self.list_max,
            RootKind::Single => self.single_max,
        }
    }

    /// Clamp a requested depth; `None` selects the default.
    pub fn effective(&self, root: RootKind, requested: Option<u32>) -> u32 {
        match requested {
            Some(depth) => depth.min(self.max_for(root)),
            None => self.default_for(root),
        }
    }
}

// ============================================================================
// NAMESPACES
// ============================================================================

/// How a row's instance key is rendered in its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKey {
    Id,
    /// Lowercased value of a field (`poc_set.private`).
    Field(&'static str),
}

/// Owning parent a namespace hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceParent {
    pub fk: &'static str,
    pub tag: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceRule {
    pub segment: &'static str,
    pub parent: Option<NamespaceParent>,
    pub instance: InstanceKey,
}

impl NamespaceRule {
    pub const fn root(segment: &'static str) -> Self {
        Self {
            segment,
            parent: None,
            instance: InstanceKey::Id,
        }
    }

    pub const fn under(segment: &'static str, fk: &'static str, tag: &'static str) -> Self {
        Self {
            segment,
            parent: Some(NamespaceParent { fk, tag }),
            instance: InstanceKey::Id,
        }
    }

    pub const fn keyed_by(mut self, field: &'static str) -> Self {
        self.instance = InstanceKey::Field(field);
        self
    }
}

// ============================================================================
// EXTENSION FILTER HOOKS
// ============================================================================

/// Column resolved on a join row, optionally through one more lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkColumn {
    Direct(&'static str),
    /// Follow `fk` to a `tag` row and read `column` there.
    Via {
        fk: &'static str,
        tag: &'static str,
        column: &'static str,
    },
}

/// Indirect relation between two entity types through join rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkPath {
    pub join: &'static str,
    pub self_col: LinkColumn,
    pub other_col: LinkColumn,
}

impl LinkPath {
    pub const fn direct(join: &'static str, self_fk: &'static str, other_fk: &'static str) -> Self {
        Self {
            join,
            self_col: LinkColumn::Direct(self_fk),
            other_col: LinkColumn::Direct(other_fk),
        }
    }
}

/// Behaviour of an extension filter parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    /// Rows linked to any of the given ids.
    LinkedTo(LinkPath),
    /// Rows linked to none of the given ids.
    NotLinkedTo(LinkPath),
    /// Rows linked to every one of the given ids.
    LinkedToAll(LinkPath),
    /// Rows linked to every network carrying one of the given ASNs.
    AsnOverlap(LinkPath),
    /// Rows linked to any of the given ids through at least one path.
    LinkedToAny(&'static [LinkPath]),
    /// Rows linked to none of the given ids through any path.
    NotLinkedToAny(&'static [LinkPath]),
    /// Rows with an active `join` row whose `field` starts with the value.
    LinkedPrefix {
        join: &'static str,
        self_col: LinkColumn,
        field: &'static str,
    },
    /// Rows whose active `join` rows sum `field` to a value satisfying the
    /// comparison. Rows without join rows never match.
    LinkedSum {
        join: &'static str,
        self_col: LinkColumn,
        field: &'static str,
    },
    /// Rows with an active child whose `field` equals one of the values.
    ChildMatches {
        child: &'static str,
        fk: &'static str,
        field: &'static str,
    },
    /// Case-insensitive substring over the name fields.
    NameSearch,
    /// `near=<lat>,<lon>` with optional `distance=<km>`.
    GeoDistance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionFilter {
    pub param: &'static str,
    pub kind: ExtensionKind,
}

pub const fn extension(param: &'static str, kind: ExtensionKind) -> ExtensionFilter {
    ExtensionFilter { param, kind }
}

// ============================================================================
// ENTITY SCHEMA
// ============================================================================

/// Full static description of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    pub tag: &'static str,
    pub fields: &'static [FieldDef],
    pub relations: &'static [RelationDef],
    pub depth: DepthLimits,
    /// Dropped whenever the serialization base is a listing, bare-id form
    /// included. The `<name>_id` column is kept.
    pub list_exclude: &'static [&'static str],
    /// A listing filtered by one of these that comes back empty is a 404.
    pub unique_keys: &'static [&'static str],
    /// Blanked when a deleted row is surfaced.
    pub blank_when_deleted: &'static [&'static str],
    pub namespace: NamespaceRule,
    pub extensions: &'static [ExtensionFilter],
}

impl EntitySchema {
    /// Scalar field by name, common fields included.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .chain(COMMON_FIELDS.iter())
            .find(|f| f.name == name)
    }

    /// Relation by rendered name.
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Belongs-to relation by canonical query name or rendered name.
    pub fn single_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations
            .iter()
            .filter(|r| r.cardinality == Cardinality::One)
            .find(|r| r.query_name == name || r.name == name)
    }

    pub fn extension(&self, param: &str) -> Option<&ExtensionFilter> {
        self.extensions.iter().find(|e| e.param == param)
    }

    pub fn is_unique_key(&self, name: &str) -> bool {
        self.unique_keys.contains(&name)
    }

    /// Declared output order: id, each belongs-to as `<name>_id` + `<name>`,
    /// scalars, has-many collections, then bookkeeping.
    pub fn render_order(&self) -> Vec<&'static str> {
        let mut order = vec!["id"];
        for rel in self.relations.iter().filter(|r| !r.is_many()) {
            order.push(rel.fk);
            order.push(rel.name);
        }
        order.extend(self.fields.iter().map(|f| f.name));
        order.extend(self.relations.iter().filter(|r| r.is_many()).map(|r| r.name));
        order.extend(["created", "updated", "status"]);
        order
    }
}
