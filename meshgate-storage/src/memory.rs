//! In-memory entity store.
//!
//! Reference implementation of [`EntityStore`] used by tests and local
//! development. Rows are kept per entity type in id order, so natural order
//! is ascending id.

use ::async_trait::async_trait;
use meshgate_core::{
    ClauseTarget, EntityId, EntityRecord, FieldClause, LinkColumn, LinkPath, MeshResult,
    SpecialPredicate,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use crate::store::{EntityStore, RowOrdering, StatusFilter, StoreQuery};

type Table = BTreeMap<EntityId, EntityRecord>;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Fields searched by `name_search`.
const NAME_FIELDS: &[&str] = &["name", "aka", "name_long"];

/// In-memory store keyed by entity-type tag.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row.
    pub async fn insert(&self, tag: &str, record: EntityRecord) {
        let mut tables = self.tables.write().await;
        tables
            .entry(tag.to_string())
            .or_default()
            .insert(record.id, record);
    }

    pub async fn insert_all(&self, tag: &str, records: impl IntoIterator<Item = EntityRecord>) {
        let mut tables = self.tables.write().await;
        let table = tables.entry(tag.to_string()).or_default();
        for record in records {
            table.insert(record.id, record);
        }
    }

    pub async fn get(&self, tag: &str, id: EntityId) -> Option<EntityRecord> {
        let tables = self.tables.read().await;
        tables.get(tag).and_then(|t| t.get(&id)).cloned()
    }

    pub async fn count(&self, tag: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(tag).map_or(0, |t| t.len())
    }
}

/// Read-locked view used while evaluating one query.
struct Snapshot<'a> {
    tables: &'a HashMap<String, Table>,
}

impl<'a> Snapshot<'a> {
    fn row(&self, tag: &str, id: EntityId) -> Option<&'a EntityRecord> {
        self.tables.get(tag).and_then(|t| t.get(&id))
    }

    fn rows(&self, tag: &str) -> impl Iterator<Item = &'a EntityRecord> {
        self.tables.get(tag).into_iter().flat_map(|t| t.values())
    }

    fn clause_matches(&self, record: &EntityRecord, clause: &FieldClause) -> bool {
        match &clause.target {
            ClauseTarget::Field(name) => clause.matches(record.field_value(name).as_ref()),
            ClauseTarget::Relation { fk, .. } => clause.matches(record.attributes.get(*fk)),
            ClauseTarget::Related {
                fk, target, field, ..
            } => {
                let related = record.foreign_key(fk).and_then(|id| self.row(target, id));
                clause.matches(related.and_then(|r| r.field_value(field)).as_ref())
            }
        }
    }

    fn resolve_column(&self, join_row: &EntityRecord, column: &LinkColumn) -> Option<EntityId> {
        match column {
            LinkColumn::Direct(fk) => join_row.foreign_key(fk),
            LinkColumn::Via { fk, tag, column } => join_row
                .foreign_key(fk)
                .and_then(|id| self.row(tag, id))
                .and_then(|row| row.foreign_key(column)),
        }
    }

    /// Active rows of `join` whose `self_col` resolves to `self_id`.
    fn join_rows<'s>(
        &'s self,
        join: &str,
        self_col: &'s LinkColumn,
        self_id: EntityId,
    ) -> impl Iterator<Item = &'a EntityRecord> + 's {
        self.rows(join)
            .filter(|j| j.is_active())
            .filter(move |j| self.resolve_column(j, self_col) == Some(self_id))
    }

    /// Ids reachable from `self_id` through active join rows.
    fn linked_ids(&self, link: &LinkPath, self_id: EntityId) -> HashSet<EntityId> {
        self.rows(link.join)
            .filter(|j| j.is_active())
            .filter(|j| self.resolve_column(j, &link.self_col) == Some(self_id))
            .filter_map(|j| self.resolve_column(j, &link.other_col))
            .collect()
    }

    fn special_matches(&self, record: &EntityRecord, predicate: &SpecialPredicate) -> bool {
        match predicate {
            SpecialPredicate::LinkedTo { link, ids } => {
                let linked = self.linked_ids(link, record.id);
                ids.iter().any(|id| linked.contains(id))
            }
            SpecialPredicate::NotLinkedTo { link, ids } => {
                let linked = self.linked_ids(link, record.id);
                !ids.iter().any(|id| linked.contains(id))
            }
            SpecialPredicate::LinkedToAll { link, ids } => {
                let linked = self.linked_ids(link, record.id);
                ids.iter().all(|id| linked.contains(id))
            }
            SpecialPredicate::AsnOverlap { link, asns } => {
                let linked = self.linked_ids(link, record.id);
                asns.iter().all(|asn| {
                    self.rows("net")
                        .filter(|n| n.is_active())
                        .filter(|n| n.attributes.get("asn").and_then(Value::as_i64) == Some(*asn))
                        .any(|n| linked.contains(&n.id))
                })
            }
            SpecialPredicate::LinkedToAny { links, ids } => links.iter().any(|link| {
                let linked = self.linked_ids(link, record.id);
                ids.iter().any(|id| linked.contains(id))
            }),
            SpecialPredicate::NotLinkedToAny { links, ids } => !links.iter().any(|link| {
                let linked = self.linked_ids(link, record.id);
                ids.iter().any(|id| linked.contains(id))
            }),
            SpecialPredicate::LinkedPrefix {
                join,
                self_col,
                field,
                prefix,
            } => self
                .join_rows(join, self_col, record.id)
                .filter_map(|j| j.str_attr(field))
                .any(|v| v.to_lowercase().starts_with(prefix.as_str())),
            SpecialPredicate::LinkedSum {
                join,
                self_col,
                field,
                operator,
                value,
            } => {
                let mut rows = self.join_rows(join, self_col, record.id).peekable();
                if rows.peek().is_none() {
                    return false;
                }
                let sum: i64 = rows
                    .filter_map(|j| j.attributes.get(*field).and_then(Value::as_i64))
                    .sum();
                operator.accepts(sum.cmp(value))
            }
            SpecialPredicate::ChildMatches {
                child,
                fk,
                field,
                values,
            } => self
                .rows(child)
                .filter(|c| c.is_active() && c.foreign_key(fk) == Some(record.id))
                .any(|c| match c.field_value(field) {
                    Some(stored) => values.iter().any(|v| v.equals(&stored)),
                    None => false,
                }),
            SpecialPredicate::NameContains(needle) => {
                let needle = needle.to_lowercase();
                NAME_FIELDS.iter().any(|f| {
                    record
                        .str_attr(f)
                        .is_some_and(|v| v.to_lowercase().contains(&needle))
                })
            }
            SpecialPredicate::WithinDistance {
                latitude,
                longitude,
                km,
            } => {
                let lat = record.attributes.get("latitude").and_then(Value::as_f64);
                let lon = record.attributes.get("longitude").and_then(Value::as_f64);
                match (lat, lon) {
                    (Some(lat), Some(lon)) => haversine_km(*latitude, *longitude, lat, lon) <= *km,
                    _ => false,
                }
            }
        }
    }
}

/// Great-circle distance in kilometres.
fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn query(&self, query: &StoreQuery) -> MeshResult<Vec<EntityRecord>> {
        let tables = self.tables.read().await;
        let view = Snapshot { tables: &tables };

        let mut rows: Vec<&EntityRecord> = view
            .rows(query.entity_type)
            .filter(|r| query.id.map_or(true, |id| r.id == id))
            .filter(|r| query.status.admits(r.status))
            .filter(|r| query.updated_after.map_or(true, |since| r.updated > since))
            .filter(|r| query.filter.clauses.iter().all(|c| view.clause_matches(r, c)))
            .filter(|r| query.filter.special.iter().all(|p| view.special_matches(r, p)))
            .collect();

        if query.ordering == RowOrdering::UpdatedAscending {
            rows.sort_by(|a, b| a.updated.cmp(&b.updated).then(a.id.cmp(&b.id)));
        }

        let sliced = rows.into_iter().skip(query.skip);
        Ok(match query.limit {
            Some(limit) => sliced.take(limit).cloned().collect(),
            None => sliced.cloned().collect(),
        })
    }

    async fn fetch_by_column(
        &self,
        tag: &'static str,
        column: &'static str,
        keys: &[EntityId],
        status: StatusFilter,
    ) -> MeshResult<Vec<EntityRecord>> {
        let tables = self.tables.read().await;
        let view = Snapshot { tables: &tables };
        let keys: HashSet<EntityId> = keys.iter().copied().collect();

        Ok(view
            .rows(tag)
            .filter(|r| status.admits(r.status))
            .filter(|r| match r.field_value(column) {
                Some(value) => value.as_i64().is_some_and(|k| keys.contains(&k)),
                None => false,
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use meshgate_core::{EntityStatus, FieldKind, FilterOperator, FilterSpecification, FilterValue};

    fn ts(day: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_all(
                "net",
                vec![
                    EntityRecord::new(1, ts(1)).with("name", "Alpha").with("asn", 100).with("org_id", 1),
                    EntityRecord::new(2, ts(2)).with("name", "Beta").with("asn", 200).with("org_id", 1),
                    EntityRecord::new(3, ts(3))
                        .with("name", "Gamma")
                        .with("asn", 300)
                        .with("org_id", 2)
                        .with_status(EntityStatus::Deleted)
                        .with_updated(ts(4)),
                ],
            )
            .await;
        store
            .insert_all(
                "netfac",
                vec![
                    EntityRecord::new(10, ts(1)).with("net_id", 1).with("fac_id", 7),
                    EntityRecord::new(11, ts(1)).with("net_id", 2).with("fac_id", 8),
                    EntityRecord::new(12, ts(1)).with("net_id", 1).with("fac_id", 8),
                ],
            )
            .await;
        store
    }

    #[tokio::test]
    async fn test_query_filters_status_and_clauses() {
        let store = seeded().await;
        let mut filter = FilterSpecification::new();
        filter.push_clause(FieldClause {
            target: ClauseTarget::Field("asn"),
            kind: FieldKind::Integer,
            operator: FilterOperator::Gte,
            value: FilterValue::Integer(200),
        });

        let rows = store
            .query(&StoreQuery::new("net").with_filter(filter))
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn test_updated_after_orders_and_admits_deleted() {
        let store = seeded().await;
        let query = StoreQuery::new("net")
            .with_status(StatusFilter::ActiveOrDeleted)
            .updated_after(ts(1) + Duration::hours(1));
        let rows = store.query(&query).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_slicing_applies_after_filtering() {
        let store = seeded().await;
        let rows = store
            .query(&StoreQuery::new("net").slice(1, Some(5)))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 2);
    }

    #[tokio::test]
    async fn test_link_predicates() {
        let store = seeded().await;
        let link = LinkPath::direct("netfac", "net_id", "fac_id");

        let mut filter = FilterSpecification::new();
        filter.special.push(SpecialPredicate::LinkedToAll {
            link,
            ids: vec![7, 8],
        });
        let rows = store
            .query(&StoreQuery::new("net").with_filter(filter))
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);

        let mut filter = FilterSpecification::new();
        filter.special.push(SpecialPredicate::NotLinkedTo { link, ids: vec![7] });
        let rows = store
            .query(&StoreQuery::new("net").with_filter(filter))
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
    }

    async fn seeded_exchange() -> InMemoryStore {
        let store = seeded().await;
        store
            .insert_all(
                "ixlan",
                vec![
                    EntityRecord::new(50, ts(1)).with("ix_id", 40),
                    EntityRecord::new(51, ts(1)).with("ix_id", 41),
                ],
            )
            .await;
        store
            .insert_all(
                "ix",
                vec![EntityRecord::new(40, ts(1)), EntityRecord::new(41, ts(1)), EntityRecord::new(42, ts(1))],
            )
            .await;
        store
            .insert_all(
                "netixlan",
                vec![
                    EntityRecord::new(70, ts(1)).with("ixlan_id", 50).with("net_id", 1).with("speed", 10000),
                    EntityRecord::new(71, ts(1)).with("ixlan_id", 50).with("net_id", 2).with("speed", 100000),
                    EntityRecord::new(72, ts(1))
                        .with("ixlan_id", 51)
                        .with("net_id", 3)
                        .with("speed", 400000)
                        .with_status(EntityStatus::Deleted),
                ],
            )
            .await;
        store
            .insert_all(
                "ixpfx",
                vec![EntityRecord::new(55, ts(1)).with("ixlan_id", 51).with("prefix", "2001:DB8::/64")],
            )
            .await;
        store
    }

    fn ix_ids(rows: Vec<EntityRecord>) -> Vec<EntityId> {
        rows.iter().map(|r| r.id).collect()
    }

    const VIA_IXLAN: LinkColumn = LinkColumn::Via {
        fk: "ixlan_id",
        tag: "ixlan",
        column: "ix_id",
    };

    #[tokio::test]
    async fn test_owner_presence_over_several_links() {
        static OWNERS: &[LinkPath] = &[
            LinkPath {
                join: "netixlan",
                self_col: VIA_IXLAN,
                other_col: LinkColumn::Via {
                    fk: "net_id",
                    tag: "net",
                    column: "org_id",
                },
            },
            LinkPath {
                join: "ixfac",
                self_col: LinkColumn::Direct("ix_id"),
                other_col: LinkColumn::Via {
                    fk: "fac_id",
                    tag: "fac",
                    column: "org_id",
                },
            },
        ];
        let store = seeded_exchange().await;
        store.insert("fac", EntityRecord::new(8, ts(1)).with("org_id", 1)).await;
        store
            .insert("ixfac", EntityRecord::new(45, ts(1)).with("ix_id", 41).with("fac_id", 8))
            .await;

        let mut filter = FilterSpecification::new();
        filter.special.push(SpecialPredicate::LinkedToAny { links: OWNERS, ids: vec![1] });
        let rows = store.query(&StoreQuery::new("ix").with_filter(filter)).await.unwrap();
        assert_eq!(ix_ids(rows), vec![40, 41]);

        let mut filter = FilterSpecification::new();
        filter.special.push(SpecialPredicate::NotLinkedToAny { links: OWNERS, ids: vec![1] });
        let rows = store.query(&StoreQuery::new("ix").with_filter(filter)).await.unwrap();
        assert_eq!(ix_ids(rows), vec![42]);
    }

    #[tokio::test]
    async fn test_prefix_and_sum_over_join_rows() {
        let store = seeded_exchange().await;

        let mut filter = FilterSpecification::new();
        filter.special.push(SpecialPredicate::LinkedPrefix {
            join: "ixpfx",
            self_col: VIA_IXLAN,
            field: "prefix",
            prefix: "2001:db8".into(),
        });
        let rows = store.query(&StoreQuery::new("ix").with_filter(filter)).await.unwrap();
        assert_eq!(ix_ids(rows), vec![41]);

        let capacity = |operator: FilterOperator, value: i64| {
            let mut filter = FilterSpecification::new();
            filter.special.push(SpecialPredicate::LinkedSum {
                join: "netixlan",
                self_col: VIA_IXLAN,
                field: "speed",
                operator,
                value,
            });
            StoreQuery::new("ix").with_filter(filter)
        };
        let rows = store.query(&capacity(FilterOperator::Exact, 110000)).await.unwrap();
        assert_eq!(ix_ids(rows), vec![40]);
        // Deleted ports never count, and an exchange without ports never matches.
        let rows = store.query(&capacity(FilterOperator::Lt, 1_000_000)).await.unwrap();
        assert_eq!(ix_ids(rows), vec![40]);
        let rows = store.query(&capacity(FilterOperator::Gt, 110000)).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_by_column_batches_parents() {
        let store = seeded().await;
        let rows = store
            .fetch_by_column("netfac", "net_id", &[1, 2], StatusFilter::Active)
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![10, 11, 12]);

        let nets = store
            .fetch_by_ids("net", &[3, 1], StatusFilter::Active)
            .await
            .unwrap();
        assert_eq!(nets.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Frankfurt to Amsterdam is roughly 365 km.
        let d = haversine_km(50.1109, 8.6821, 52.3676, 4.9041);
        assert!((d - 365.0).abs() < 10.0, "{}", d);
    }
}
