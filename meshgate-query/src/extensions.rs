//! Entity-specific filter hooks.
//!
//! Residual parameters left over by the compiler are matched against the
//! schema's declared extension filters and turned into
//! [`SpecialPredicate`]s the entity store knows how to evaluate.

use meshgate_core::{
    EntityId, EntitySchema, ExtensionKind, FilterError, FilterOperator, FilterValue,
    SpecialPredicate,
};

use crate::compiler::split_operator;

/// Default radius for `near` when no `distance` is given.
pub const DEFAULT_DISTANCE_KM: f64 = 50.0;

/// Bounds on the number of ASNs `asn_overlap` accepts.
pub const ASN_OVERLAP_MIN: usize = 2;
pub const ASN_OVERLAP_MAX: usize = 25;

/// Parameter carrying the `near` radius.
const DISTANCE_PARAM: &str = "distance";

/// `net_id__in` and `net_id` both address the `net` hook.
fn normalize_key(key: &str) -> &str {
    let key = key.strip_suffix("__in").unwrap_or(key);
    key.strip_suffix("_id").unwrap_or(key)
}

fn id_list(key: &str, raw: &str) -> Result<Vec<EntityId>, FilterError> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<EntityId>()
                .map_err(|_| FilterError::InvalidValue {
                    field: key.to_string(),
                    value: raw.to_string(),
                    expected: "comma separated integers".to_string(),
                })
        })
        .collect()
}

/// Resolve residual parameters into special predicates.
///
/// Keys without a matching hook are ignored.
pub fn resolve_extensions(
    schema: &EntitySchema,
    residual: &[(String, String)],
) -> Result<Vec<SpecialPredicate>, FilterError> {
    let mut predicates = Vec::new();

    for (key, raw) in residual {
        let (base, operator) = split_operator(key);
        let name = normalize_key(base);
        let ext = schema.extension(name).filter(|ext| {
            matches!(ext.kind, ExtensionKind::LinkedSum { .. })
                || matches!(operator, FilterOperator::Exact | FilterOperator::In)
        });
        let Some(ext) = ext else {
            if name != DISTANCE_PARAM {
                tracing::debug!(entity_type = schema.tag, param = %key, "Ignoring unknown filter");
            }
            continue;
        };

        let predicate = match ext.kind {
            ExtensionKind::LinkedTo(link) => SpecialPredicate::LinkedTo {
                link,
                ids: id_list(key, raw)?,
            },
            ExtensionKind::NotLinkedTo(link) => SpecialPredicate::NotLinkedTo {
                link,
                ids: id_list(key, raw)?,
            },
            ExtensionKind::LinkedToAll(link) => SpecialPredicate::LinkedToAll {
                link,
                ids: id_list(key, raw)?,
            },
            ExtensionKind::AsnOverlap(link) => {
                let asns = id_list(key, raw)?;
                if !(ASN_OVERLAP_MIN..=ASN_OVERLAP_MAX).contains(&asns.len()) {
                    return Err(FilterError::InvalidParameter {
                        parameter: key.clone(),
                        reason: format!(
                            "expects between {} and {} ASNs",
                            ASN_OVERLAP_MIN, ASN_OVERLAP_MAX
                        ),
                    });
                }
                SpecialPredicate::AsnOverlap { link, asns }
            }
            ExtensionKind::LinkedToAny(links) => SpecialPredicate::LinkedToAny {
                links,
                ids: id_list(key, raw)?,
            },
            ExtensionKind::NotLinkedToAny(links) => SpecialPredicate::NotLinkedToAny {
                links,
                ids: id_list(key, raw)?,
            },
            ExtensionKind::LinkedPrefix {
                join,
                self_col,
                field,
            } => {
                let prefix = raw.trim();
                if prefix.is_empty() {
                    continue;
                }
                SpecialPredicate::LinkedPrefix {
                    join,
                    self_col,
                    field,
                    prefix: prefix.to_lowercase(),
                }
            }
            ExtensionKind::LinkedSum {
                join,
                self_col,
                field,
            } => {
                if !operator.is_range() && operator != FilterOperator::Exact {
                    return Err(FilterError::UnsupportedOperator {
                        field: key.clone(),
                        operator: operator.suffix().unwrap_or("exact").to_string(),
                    });
                }
                let value = raw.trim().parse::<i64>().map_err(|_| FilterError::InvalidValue {
                    field: key.clone(),
                    value: raw.clone(),
                    expected: "integer".to_string(),
                })?;
                SpecialPredicate::LinkedSum {
                    join,
                    self_col,
                    field,
                    operator,
                    value,
                }
            }
            ExtensionKind::ChildMatches { child, fk, field } => SpecialPredicate::ChildMatches {
                child,
                fk,
                field,
                values: raw
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| match item.parse::<i64>() {
                        Ok(v) => FilterValue::Integer(v),
                        Err(_) => FilterValue::Text(item.to_string()),
                    })
                    .collect(),
            },
            ExtensionKind::NameSearch => {
                let needle = raw.trim();
                if needle.is_empty() {
                    continue;
                }
                SpecialPredicate::NameContains(needle.to_string())
            }
            ExtensionKind::GeoDistance => {
                let (latitude, longitude) = parse_point(key, raw)?;
                let km = match residual.iter().find(|(k, _)| k == DISTANCE_PARAM) {
                    Some((_, d)) => d.trim().parse::<f64>().ok().filter(|d| *d > 0.0).ok_or_else(
                        || FilterError::InvalidValue {
                            field: DISTANCE_PARAM.to_string(),
                            value: d.clone(),
                            expected: "positive number of kilometers".to_string(),
                        },
                    )?,
                    None => DEFAULT_DISTANCE_KM,
                };
                SpecialPredicate::WithinDistance {
                    latitude,
                    longitude,
                    km,
                }
            }
        };
        predicates.push(predicate);
    }

    Ok(predicates)
}

fn parse_point(key: &str, raw: &str) -> Result<(f64, f64), FilterError> {
    let invalid = || FilterError::InvalidValue {
        field: key.to_string(),
        value: raw.to_string(),
        expected: "<latitude>,<longitude>".to_string(),
    };
    let (lat, lon) = raw.split_once(',').ok_or_else(invalid)?;
    let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
    let lon = lon.trim().parse::<f64>().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(invalid());
    }
    Ok((lat, lon))
}
