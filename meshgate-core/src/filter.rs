//! Compiled filter specifications
//!
//! A [`FilterSpecification`] is the normalized form of a request's filter
//! parameters: an ordered list of typed field clauses plus the special
//! predicates that cannot be expressed as a single field comparison.
//! Matching helpers live here so every entity store evaluates clauses the
//! same way.

use crate::record::EntityId;
use crate::schema::{FieldKind, LinkColumn, LinkPath};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Filter operator for field comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Exact match (case-insensitive for strings)
    Exact,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Case-insensitive substring
    Contains,
    /// Case-insensitive prefix
    StartsWith,
    /// Set membership
    In,
}

impl FilterOperator {
    /// Query-string suffix, `None` for exact match.
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            FilterOperator::Exact => None,
            FilterOperator::Lt => Some("lt"),
            FilterOperator::Lte => Some("lte"),
            FilterOperator::Gt => Some("gt"),
            FilterOperator::Gte => Some("gte"),
            FilterOperator::Contains => Some("contains"),
            FilterOperator::StartsWith => Some("startswith"),
            FilterOperator::In => Some("in"),
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "lt" => Some(FilterOperator::Lt),
            "lte" => Some(FilterOperator::Lte),
            "gt" => Some(FilterOperator::Gt),
            "gte" => Some(FilterOperator::Gte),
            "contains" => Some(FilterOperator::Contains),
            "startswith" => Some(FilterOperator::StartsWith),
            "in" => Some(FilterOperator::In),
            _ => None,
        }
    }

    /// Whether a candidate ordered `ord` relative to the operand passes.
    /// Only exact match and the range operators compare by order.
    pub fn accepts(&self, ord: Ordering) -> bool {
        match self {
            FilterOperator::Exact => ord == Ordering::Equal,
            FilterOperator::Lt => ord == Ordering::Less,
            FilterOperator::Lte => ord != Ordering::Greater,
            FilterOperator::Gt => ord == Ordering::Greater,
            FilterOperator::Gte => ord != Ordering::Less,
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::In => false,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FilterOperator::Lt | FilterOperator::Lte | FilterOperator::Gt | FilterOperator::Gte
        )
    }
}

/// Typed filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    /// A calendar day.
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Query-string form. Compiling it again yields the same value.
    pub fn canonical(&self) -> String {
        match self {
            FilterValue::Integer(v) => v.to_string(),
            FilterValue::Float(v) => v.to_string(),
            FilterValue::Text(v) => v.clone(),
            FilterValue::Boolean(v) => v.to_string(),
            FilterValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FilterValue::DateTime(t) => t.to_rfc3339_opts(SecondsFormat::Millis, true),
            FilterValue::List(items) => items
                .iter()
                .map(FilterValue::canonical)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Stored value equals this operand under exact-match rules.
    pub fn equals(&self, candidate: &Value) -> bool {
        self.compare(candidate) == Some(Ordering::Equal)
    }

    /// Order a stored JSON value relative to this operand.
    /// `None` when the two are not comparable.
    fn compare(&self, candidate: &Value) -> Option<Ordering> {
        match self {
            FilterValue::Integer(v) => match candidate.as_i64() {
                Some(c) => Some(c.cmp(v)),
                None => candidate.as_f64()?.partial_cmp(&(*v as f64)),
            },
            FilterValue::Float(v) => candidate.as_f64()?.partial_cmp(v),
            FilterValue::Text(v) => Some(candidate.as_str()?.to_lowercase().cmp(&v.to_lowercase())),
            FilterValue::Boolean(v) => Some(candidate.as_bool()?.cmp(v)),
            FilterValue::Date(d) => Some(parse_stored_date(candidate)?.cmp(d)),
            FilterValue::DateTime(t) => Some(parse_stored_datetime(candidate)?.cmp(t)),
            FilterValue::List(_) => None,
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            FilterValue::Text(v) => Some(v.to_lowercase()),
            other => Some(other.canonical().to_lowercase()),
        }
    }
}

fn parse_stored_datetime(candidate: &Value) -> Option<DateTime<Utc>> {
    let raw = candidate.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_stored_date(candidate: &Value) -> Option<NaiveDate> {
    let raw = candidate.as_str()?;
    parse_stored_datetime(candidate)
        .map(|t| t.date_naive())
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}

/// What a clause compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseTarget {
    /// Scalar field on the row itself.
    Field(&'static str),
    /// Foreign-key column of a belongs-to relation (`org_id`).
    Relation {
        relation: &'static str,
        fk: &'static str,
    },
    /// Scalar field on the row a belongs-to relation points at.
    Related {
        relation: &'static str,
        fk: &'static str,
        target: &'static str,
        field: &'static str,
    },
}

/// One `(target_field, operator, value)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldClause {
    pub target: ClauseTarget,
    pub kind: FieldKind,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FieldClause {
    /// Parameter name that compiles back to this clause.
    pub fn canonical_key(&self) -> String {
        let base = match &self.target {
            ClauseTarget::Field(name) => (*name).to_string(),
            ClauseTarget::Relation { fk, .. } => (*fk).to_string(),
            ClauseTarget::Related {
                relation, field, ..
            } => format!("{}__{}", relation, field),
        };
        match self.operator.suffix() {
            Some(suffix) => format!("{}__{}", base, suffix),
            None => base,
        }
    }

    /// Evaluate against the stored value. Missing and null never match.
    pub fn matches(&self, candidate: Option<&Value>) -> bool {
        let candidate = match candidate {
            Some(Value::Null) | None => return false,
            Some(value) => value,
        };

        match self.operator {
            FilterOperator::Exact => self.value.compare(candidate) == Some(Ordering::Equal),
            FilterOperator::Lt => self.value.compare(candidate) == Some(Ordering::Less),
            FilterOperator::Lte => matches!(
                self.value.compare(candidate),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::Gt => self.value.compare(candidate) == Some(Ordering::Greater),
            FilterOperator::Gte => matches!(
                self.value.compare(candidate),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::Contains => match (candidate.as_str(), self.value.text()) {
                (Some(c), Some(needle)) => c.to_lowercase().contains(&needle),
                _ => false,
            },
            FilterOperator::StartsWith => match (candidate.as_str(), self.value.text()) {
                (Some(c), Some(prefix)) => c.to_lowercase().starts_with(&prefix),
                _ => false,
            },
            FilterOperator::In => match &self.value {
                FilterValue::List(items) => items
                    .iter()
                    .any(|item| item.compare(candidate) == Some(Ordering::Equal)),
                single => single.compare(candidate) == Some(Ordering::Equal),
            },
        }
    }
}

/// Predicates produced by entity-specific extension hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecialPredicate {
    LinkedTo { link: LinkPath, ids: Vec<EntityId> },
    NotLinkedTo { link: LinkPath, ids: Vec<EntityId> },
    LinkedToAll { link: LinkPath, ids: Vec<EntityId> },
    /// Linked to every network carrying one of these ASNs.
    AsnOverlap { link: LinkPath, asns: Vec<i64> },
    LinkedToAny {
        links: &'static [LinkPath],
        ids: Vec<EntityId>,
    },
    NotLinkedToAny {
        links: &'static [LinkPath],
        ids: Vec<EntityId>,
    },
    /// An active join row's `field` starts with `prefix`.
    LinkedPrefix {
        join: &'static str,
        self_col: LinkColumn,
        field: &'static str,
        prefix: String,
    },
    /// Sum of `field` over active join rows compared against `value`.
    LinkedSum {
        join: &'static str,
        self_col: LinkColumn,
        field: &'static str,
        operator: FilterOperator,
        value: i64,
    },
    ChildMatches {
        child: &'static str,
        fk: &'static str,
        field: &'static str,
        values: Vec<FilterValue>,
    },
    NameContains(String),
    WithinDistance {
        latitude: f64,
        longitude: f64,
        km: f64,
    },
}

/// Compiled filter for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpecification {
    pub clauses: Vec<FieldClause>,
    pub special: Vec<SpecialPredicate>,
}

impl FilterSpecification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty() && self.special.is_empty()
    }

    /// Insert or replace a clause, keyed by its canonical parameter name.
    pub fn push_clause(&mut self, clause: FieldClause) {
        let key = clause.canonical_key();
        match self.clauses.iter_mut().find(|c| c.canonical_key() == key) {
            Some(existing) => *existing = clause,
            None => self.clauses.push(clause),
        }
    }

    /// Canonical key/value form of the field clauses.
    pub fn to_params(&self) -> Vec<(String, String)> {
        self.clauses
            .iter()
            .map(|c| (c.canonical_key(), c.value.canonical()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn clause(op: FilterOperator, value: FilterValue) -> FieldClause {
        FieldClause {
            target: ClauseTarget::Field("name"),
            kind: FieldKind::String,
            operator: op,
            value,
        }
    }

    #[test]
    fn test_exact_text_is_case_insensitive() {
        let c = clause(FilterOperator::Exact, FilterValue::Text("ACME".into()));
        assert!(c.matches(Some(&json!("acme"))));
        assert!(!c.matches(Some(&json!("acme2"))));
        assert!(!c.matches(None));
        assert!(!c.matches(Some(&Value::Null)));
    }

    #[test]
    fn test_contains_and_startswith() {
        let c = clause(FilterOperator::Contains, FilterValue::Text("Ix".into()));
        assert!(c.matches(Some(&json!("Big IX Berlin"))));
        let s = clause(FilterOperator::StartsWith, FilterValue::Text("big".into()));
        assert!(s.matches(Some(&json!("Big IX Berlin"))));
        assert!(!s.matches(Some(&json!("The Big IX"))));
    }

    #[test]
    fn test_integer_range_and_membership() {
        let gt = FieldClause {
            target: ClauseTarget::Field("asn"),
            kind: FieldKind::Integer,
            operator: FilterOperator::Gt,
            value: FilterValue::Integer(100),
        };
        assert!(gt.matches(Some(&json!(101))));
        assert!(!gt.matches(Some(&json!(100))));

        let within = FieldClause {
            operator: FilterOperator::In,
            value: FilterValue::List(vec![FilterValue::Integer(1), FilterValue::Integer(3)]),
            ..gt
        };
        assert!(within.matches(Some(&json!(3))));
        assert!(!within.matches(Some(&json!(2))));
    }

    #[test]
    fn test_datetime_comparison() {
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap()
            .and_utc();
        let c = FieldClause {
            target: ClauseTarget::Field("created"),
            kind: FieldKind::DateTime,
            operator: FilterOperator::Gt,
            value: FilterValue::DateTime(cutoff),
        };
        assert!(!c.matches(Some(&json!("2024-01-01T23:00:00Z"))));
        assert!(c.matches(Some(&json!("2024-01-02T00:00:00Z"))));
    }

    #[test]
    fn test_same_day_match() {
        let c = FieldClause {
            target: ClauseTarget::Field("updated"),
            kind: FieldKind::DateTime,
            operator: FilterOperator::Exact,
            value: FilterValue::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
        };
        assert!(c.matches(Some(&json!("2024-03-05T17:30:00Z"))));
        assert!(!c.matches(Some(&json!("2024-03-06T00:00:00Z"))));
    }

    #[test]
    fn test_canonical_forms() {
        let c = FieldClause {
            target: ClauseTarget::Relation {
                relation: "org",
                fk: "org_id",
            },
            kind: FieldKind::Integer,
            operator: FilterOperator::In,
            value: FilterValue::List(vec![FilterValue::Integer(1), FilterValue::Integer(2)]),
        };
        assert_eq!(c.canonical_key(), "org_id__in");
        assert_eq!(c.value.canonical(), "1,2");

        let t = FilterValue::DateTime(
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_milli_opt(23, 59, 59, 999)
                .unwrap()
                .and_utc(),
        );
        assert_eq!(t.canonical(), "2024-01-01T23:59:59.999Z");
    }

    #[test]
    fn test_push_clause_replaces_same_key() {
        let mut spec = FilterSpecification::new();
        spec.push_clause(clause(FilterOperator::Exact, FilterValue::Text("a".into())));
        spec.push_clause(clause(FilterOperator::Contains, FilterValue::Text("b".into())));
        spec.push_clause(clause(FilterOperator::Exact, FilterValue::Text("c".into())));
        assert_eq!(
            spec.to_params(),
            vec![
                ("name".to_string(), "c".to_string()),
                ("name__contains".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_operator_accepts_ordering() {
        assert!(FilterOperator::Exact.accepts(Ordering::Equal));
        assert!(FilterOperator::Lte.accepts(Ordering::Equal));
        assert!(!FilterOperator::Lt.accepts(Ordering::Equal));
        assert!(FilterOperator::Gte.accepts(Ordering::Greater));
        assert!(!FilterOperator::Gt.accepts(Ordering::Less));
        assert!(!FilterOperator::In.accepts(Ordering::Equal));
    }

    fn asn_clause(operator: FilterOperator, value: i64) -> FieldClause {
        FieldClause {
            target: ClauseTarget::Field("asn"),
            kind: FieldKind::Integer,
            operator,
            value: FilterValue::Integer(value),
        }
    }

    fn any_comparison() -> impl Strategy<Value = FilterOperator> {
        prop_oneof![
            Just(FilterOperator::Exact),
            Just(FilterOperator::Lt),
            Just(FilterOperator::Lte),
            Just(FilterOperator::Gt),
            Just(FilterOperator::Gte),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_to_params_rebuilds_the_same_specification(
            pushes in proptest::collection::vec((any_comparison(), -1000i64..1000), 0..12),
        ) {
            let mut spec = FilterSpecification::new();
            for (operator, value) in &pushes {
                spec.push_clause(asn_clause(*operator, *value));
            }

            let params = spec.to_params();
            let mut rebuilt = FilterSpecification::new();
            for (key, value) in &params {
                let operator = match key.strip_prefix("asn__") {
                    Some(suffix) => FilterOperator::from_suffix(suffix).unwrap(),
                    None => FilterOperator::Exact,
                };
                rebuilt.push_clause(asn_clause(operator, value.parse().unwrap()));
            }

            prop_assert_eq!(&rebuilt, &spec);
            prop_assert_eq!(rebuilt.to_params(), params);
            prop_assert!(spec.clauses.len() <= 5);
        }
    }
}
