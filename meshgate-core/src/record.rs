//! Entity rows as returned by the entity store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Integer primary key shared by every entity type.
pub type EntityId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Row lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Ok,
    Pending,
    Deleted,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Ok => "ok",
            EntityStatus::Pending => "pending",
            EntityStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ok" => Ok(EntityStatus::Ok),
            "pending" => Ok(EntityStatus::Pending),
            "deleted" => Ok(EntityStatus::Deleted),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// One entity row.
///
/// `attributes` holds scalar fields and foreign-key columns (`org_id`,
/// `net_id`, ...). The common bookkeeping fields live on the struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub status: EntityStatus,
    pub created: Timestamp,
    pub updated: Timestamp,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityRecord {
    /// New active row with `updated == created`.
    pub fn new(id: EntityId, created: Timestamp) -> Self {
        Self {
            id,
            status: EntityStatus::Ok,
            created,
            updated: created,
            attributes: Map::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.to_string(), value.into());
        self
    }

    pub fn with_status(mut self, status: EntityStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_updated(mut self, updated: Timestamp) -> Self {
        self.updated = updated;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == EntityStatus::Ok
    }

    /// JSON value of any field, bookkeeping fields included.
    pub fn field_value(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id)),
            "status" => Some(Value::from(self.status.as_str())),
            "created" => Some(Value::from(format_timestamp(&self.created))),
            "updated" => Some(Value::from(format_timestamp(&self.updated))),
            other => self.attributes.get(other).cloned(),
        }
    }

    /// Integer value of a foreign-key column.
    pub fn foreign_key(&self, column: &str) -> Option<EntityId> {
        self.attributes.get(column).and_then(Value::as_i64)
    }

    /// String attribute, if present and a string.
    pub fn str_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// Render a timestamp the way every payload carries it.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}
