//! Filter Compiler
//!
//! Turns raw `<field>[__<op>]=<value>` pairs into a typed
//! [`FilterSpecification`]. Keys that do not name a field, a belongs-to
//! relation or a `relation__field` path are handed back untouched as
//! residual parameters for the entity's extension hooks.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use meshgate_core::{
    ClauseTarget, EntitySchema, FieldClause, FieldKind, FilterError, FilterOperator,
    FilterSpecification, FilterValue, MeshResult, SchemaRegistry, RESERVED_PARAMS,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// `<base>__<op>` for the supported operator suffixes.
static OPERATOR_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)__(lt|lte|gt|gte|contains|startswith|in)$")
        .expect("Invalid operator suffix regex")
});

/// Keys ending in `_id` (but not `__id`) may be foreign-key shortcuts.
static ID_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.+[^_]_id$").expect("Invalid id suffix regex"));

/// Short relation names accepted in filters.
const ALIASES: &[(&str, &str)] = &[("fac", "facility"), ("net", "network")];

/// Raw parameters that did not compile to field clauses.
pub type ResidualParams = Vec<(String, String)>;

/// Resolve a short alias to its canonical relation name.
pub fn canonical_name(name: &str) -> String {
    ALIASES
        .iter()
        .find(|(short, _)| *short == name)
        .map_or(name, |(_, long)| *long)
        .to_string()
}

/// Compiles filter parameters against the schema registry.
#[derive(Debug, Clone, Copy)]
pub struct FilterCompiler<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> FilterCompiler<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Compile `raw` for `entity_type`.
    ///
    /// Fails on the first value that cannot be parsed for its field's type;
    /// no partial specification is returned.
    pub fn compile(
        &self,
        entity_type: &str,
        raw: &[(String, String)],
    ) -> MeshResult<(FilterSpecification, ResidualParams)> {
        let schema = self.registry.require(entity_type)?;
        let mut spec = FilterSpecification::new();
        let mut residual = ResidualParams::new();

        for (key, value) in raw {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }

            let (base, operator) = split_operator(key);
            match self.resolve_target(schema, base) {
                Some((target, kind)) => {
                    let value = parse_operand(key, kind, operator, value)?;
                    spec.push_clause(FieldClause {
                        target,
                        kind,
                        operator,
                        value,
                    });
                }
                None => residual.push((key.clone(), value.clone())),
            }
        }

        tracing::trace!(
            entity_type,
            clauses = spec.clauses.len(),
            residual = residual.len(),
            "Compiled filter"
        );
        Ok((spec, residual))
    }

    fn resolve_target(
        &self,
        schema: &'static EntitySchema,
        base: &str,
    ) -> Option<(ClauseTarget, FieldKind)> {
        if let Some(def) = schema.field(base) {
            return Some((ClauseTarget::Field(def.name), def.kind));
        }

        if let Some((relation, field)) = base.split_once("__") {
            let rel = schema
                .single_relation(&canonical_name(relation))
                .or_else(|| schema.single_relation(relation))?;
            let target = self.registry.get(rel.target)?;
            let def = target.field(field)?;
            return Some((
                ClauseTarget::Related {
                    relation: rel.name,
                    fk: rel.fk,
                    target: rel.target,
                    field: def.name,
                },
                def.kind,
            ));
        }

        let stripped = if ID_SUFFIX.is_match(base) {
            &base[..base.len() - 3]
        } else {
            base
        };
        let rel = schema
            .single_relation(&canonical_name(stripped))
            .or_else(|| schema.single_relation(stripped))?;
        Some((
            ClauseTarget::Relation {
                relation: rel.name,
                fk: rel.fk,
            },
            FieldKind::Integer,
        ))
    }
}

/// Split `<base>__<op>`; no recognised suffix means exact match.
pub fn split_operator(key: &str) -> (&str, FilterOperator) {
    if let Some(caps) = OPERATOR_SUFFIX.captures(key) {
        if let (Some(base), Some(op)) = (caps.get(1), caps.get(2)) {
            if let Some(operator) = FilterOperator::from_suffix(op.as_str()) {
                return (base.as_str(), operator);
            }
        }
    }
    (key, FilterOperator::Exact)
}

fn invalid(key: &str, value: &str, kind: FieldKind) -> FilterError {
    FilterError::InvalidValue {
        field: key.to_string(),
        value: value.to_string(),
        expected: kind.label().to_string(),
    }
}

fn parse_operand(
    key: &str,
    kind: FieldKind,
    operator: FilterOperator,
    raw: &str,
) -> Result<FilterValue, FilterError> {
    let text_only = matches!(operator, FilterOperator::Contains | FilterOperator::StartsWith);
    let unsupported = match kind {
        FieldKind::String => false,
        FieldKind::Date | FieldKind::DateTime => false,
        FieldKind::Boolean => text_only || operator.is_range(),
        FieldKind::Integer | FieldKind::Float => text_only,
    };
    if unsupported {
        return Err(FilterError::UnsupportedOperator {
            field: key.to_string(),
            operator: operator.suffix().unwrap_or("exact").to_string(),
        });
    }

    match operator {
        FilterOperator::In => raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| parse_scalar(key, kind, FilterOperator::Exact, item))
            .collect::<Result<Vec<_>, _>>()
            .map(FilterValue::List),
        FilterOperator::Contains | FilterOperator::StartsWith => {
            Ok(FilterValue::Text(raw.to_string()))
        }
        _ => parse_scalar(key, kind, operator, raw),
    }
}

fn parse_scalar(
    key: &str,
    kind: FieldKind,
    operator: FilterOperator,
    raw: &str,
) -> Result<FilterValue, FilterError> {
    match kind {
        FieldKind::String => Ok(FilterValue::Text(raw.to_string())),
        FieldKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(FilterValue::Integer)
            .map_err(|_| invalid(key, raw, kind)),
        FieldKind::Float => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(FilterValue::Float(v)),
            _ => Err(invalid(key, raw, kind)),
        },
        FieldKind::Boolean => match raw.trim().to_lowercase().as_str() {
            "1" | "true" => Ok(FilterValue::Boolean(true)),
            "0" | "false" => Ok(FilterValue::Boolean(false)),
            _ => Err(invalid(key, raw, kind)),
        },
        FieldKind::Date => parse_day(raw)
            .map(FilterValue::Date)
            .ok_or_else(|| invalid(key, raw, kind)),
        FieldKind::DateTime => parse_datetime_operand(operator, raw.trim())
            .ok_or_else(|| invalid(key, raw, kind)),
    }
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// A bare day against a datetime field widens to the whole day: `gt`/`lte`
/// compare against its last millisecond, `lt`/`gte` against its first, and
/// exact match means "on that day".
fn parse_datetime_operand(operator: FilterOperator, raw: &str) -> Option<FilterValue> {
    if let Some(day) = parse_day(raw) {
        let value = match operator {
            FilterOperator::Gt | FilterOperator::Lte => {
                FilterValue::DateTime(at(day, NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?))
            }
            FilterOperator::Lt | FilterOperator::Gte => {
                FilterValue::DateTime(at(day, NaiveTime::MIN))
            }
            _ => FilterValue::Date(day),
        };
        return Some(value);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(FilterValue::DateTime(parsed.with_timezone(&Utc)));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| FilterValue::DateTime(naive.and_utc()))
}

fn at(day: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    day.and_time(time).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgate_core::{MeshError, PEERING_REGISTRY};
    use proptest::prelude::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn compile(tag: &str, pairs: &[(&str, &str)]) -> (FilterSpecification, ResidualParams) {
        FilterCompiler::new(&PEERING_REGISTRY)
            .compile(tag, &params(pairs))
            .unwrap()
    }

    #[test]
    fn test_split_operator() {
        assert_eq!(split_operator("name__contains"), ("name", FilterOperator::Contains));
        assert_eq!(split_operator("asn__in"), ("asn", FilterOperator::In));
        assert_eq!(split_operator("org__name"), ("org__name", FilterOperator::Exact));
        assert_eq!(split_operator("name"), ("name", FilterOperator::Exact));
    }

    #[test]
    fn test_canonical_name_aliases() {
        assert_eq!(canonical_name("fac"), "facility");
        assert_eq!(canonical_name("net"), "network");
        assert_eq!(canonical_name("net_count"), "net_count");
        assert_eq!(canonical_name("fac_count"), "fac_count");
        assert_eq!(canonical_name("netfac"), "netfac");
        assert_eq!(canonical_name("org"), "org");
    }

    #[test]
    fn test_count_fields_keep_their_names() {
        let (spec, residual) = compile("ix", &[("net_count__gte", "3"), ("fac_count", "2")]);
        assert!(residual.is_empty());
        let targets: Vec<_> = spec.clauses.iter().map(|c| c.target.clone()).collect();
        assert_eq!(
            targets,
            vec![ClauseTarget::Field("net_count"), ClauseTarget::Field("fac_count")]
        );
    }

    #[test]
    fn test_scalar_and_operator_clauses() {
        let (spec, residual) = compile(
            "net",
            &[("asn", "65000"), ("name__startswith", "Ex"), ("info_ipv6", "True")],
        );
        assert!(residual.is_empty());
        assert_eq!(spec.clauses.len(), 3);
        assert_eq!(spec.clauses[0].target, ClauseTarget::Field("asn"));
        assert_eq!(spec.clauses[0].value, FilterValue::Integer(65000));
        assert_eq!(spec.clauses[1].operator, FilterOperator::StartsWith);
        assert_eq!(spec.clauses[2].value, FilterValue::Boolean(true));
    }

    #[test]
    fn test_foreign_key_shortcut_and_alias_agree() {
        let (by_id, _) = compile("netfac", &[("net_id", "9")]);
        let (by_alias, _) = compile("netfac", &[("net", "9")]);
        let (by_name, _) = compile("netfac", &[("network", "9")]);
        assert_eq!(by_id, by_alias);
        assert_eq!(by_id, by_name);
        assert_eq!(
            by_id.clauses[0].target,
            ClauseTarget::Relation {
                relation: "net",
                fk: "net_id"
            }
        );
        assert_eq!(by_id.clauses[0].canonical_key(), "net_id");
    }

    #[test]
    fn test_related_field_path() {
        let (spec, _) = compile("fac", &[("org__name__contains", "acme")]);
        assert_eq!(
            spec.clauses[0].target,
            ClauseTarget::Related {
                relation: "org",
                fk: "org_id",
                target: "org",
                field: "name"
            }
        );
        assert_eq!(spec.clauses[0].canonical_key(), "org__name__contains");
    }

    #[test]
    fn test_in_splits_on_commas() {
        let (spec, _) = compile("net", &[("asn__in", "1, 2,,3")]);
        assert_eq!(
            spec.clauses[0].value,
            FilterValue::List(vec![
                FilterValue::Integer(1),
                FilterValue::Integer(2),
                FilterValue::Integer(3)
            ])
        );
    }

    #[test]
    fn test_bare_date_widens_to_end_of_day() {
        let (spec, _) = compile("net", &[("created__gt", "2024-01-01")]);
        assert_eq!(
            spec.clauses[0].value.canonical(),
            "2024-01-01T23:59:59.999Z"
        );
        let (spec, _) = compile("net", &[("created__lte", "2024-01-01")]);
        assert_eq!(
            spec.clauses[0].value.canonical(),
            "2024-01-01T23:59:59.999Z"
        );
        let (spec, _) = compile("net", &[("created__gte", "2024-01-01")]);
        assert_eq!(
            spec.clauses[0].value.canonical(),
            "2024-01-01T00:00:00.000Z"
        );
        let (spec, _) = compile("net", &[("updated", "2024-01-01")]);
        assert_eq!(
            spec.clauses[0].value,
            FilterValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_unknown_keys_become_residual() {
        let (spec, residual) = compile("fac", &[("net_id", "20"), ("name_search", "equinix")]);
        assert!(spec.is_empty());
        assert_eq!(
            residual,
            params(&[("net_id", "20"), ("name_search", "equinix")])
        );
    }

    #[test]
    fn test_reserved_keys_are_skipped() {
        let (spec, residual) = compile("net", &[("depth", "2"), ("limit", "5")]);
        assert!(spec.is_empty());
        assert!(residual.is_empty());
    }

    #[test]
    fn test_bad_values_fail_the_whole_compile() {
        let compiler = FilterCompiler::new(&PEERING_REGISTRY);
        let err = compiler
            .compile("net", &params(&[("name", "ok"), ("asn", "AS65000")]))
            .unwrap_err();
        assert!(matches!(
            err,
            MeshError::Filter(FilterError::InvalidValue { .. })
        ));

        let err = compiler
            .compile("net", &params(&[("created__gt", "last tuesday")]))
            .unwrap_err();
        assert!(matches!(err, MeshError::Filter(_)));

        let err = compiler
            .compile("net", &params(&[("asn__contains", "65")]))
            .unwrap_err();
        assert!(matches!(
            err,
            MeshError::Filter(FilterError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn test_unknown_entity_type() {
        let err = FilterCompiler::new(&PEERING_REGISTRY)
            .compile("carrier", &[])
            .unwrap_err();
        assert!(matches!(err, MeshError::Schema(_)));
    }

    #[test]
    fn test_recompiling_canonical_form_is_stable() {
        let (spec, _) = compile(
            "netixlan",
            &[
                ("net", "4"),
                ("speed__gte", "10000"),
                ("created__gt", "2024-01-01"),
                ("ipaddr4__startswith", "192.0.2."),
                ("operational", "1"),
            ],
        );
        let (again, residual) = FilterCompiler::new(&PEERING_REGISTRY)
            .compile("netixlan", &spec.to_params())
            .unwrap();
        assert!(residual.is_empty());
        assert_eq!(again, spec);
    }

    fn arb_net_param() -> impl Strategy<Value = (String, String)> {
        prop_oneof![
            (0i64..100_000).prop_map(|v| ("asn".to_string(), v.to_string())),
            proptest::collection::vec(1i64..500, 1..4).prop_map(|v| {
                let joined = v.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
                ("org_id__in".to_string(), joined)
            }),
            "[a-z]{1,8}".prop_map(|v| ("name__contains".to_string(), v)),
            any::<bool>().prop_map(|v| ("info_ipv6".to_string(), v.to_string())),
            (1u32..28).prop_map(|d| ("created__gt".to_string(), format!("2024-02-{:02}", d))),
            (1u32..28).prop_map(|d| ("updated".to_string(), format!("2024-03-{:02}", d))),
            "[a-z]{1,6}".prop_map(|v| ("org__name".to_string(), v)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_compile_is_idempotent(params in proptest::collection::vec(arb_net_param(), 0..6)) {
            let compiler = FilterCompiler::new(&PEERING_REGISTRY);
            let (first, residual) = compiler.compile("net", &params).unwrap();
            prop_assert!(residual.is_empty());
            let (second, _) = compiler.compile("net", &first.to_params()).unwrap();
            prop_assert_eq!(&second, &first);
            let (third, _) = compiler.compile("net", &second.to_params()).unwrap();
            prop_assert_eq!(third, second);
        }
    }
}
