//! Per-request query values.

use crate::error::FilterError;
use crate::record::EntityId;
use crate::schema::RootKind;

/// Query-string keys that steer the pipeline rather than filter rows.
pub const RESERVED_PARAMS: &[&str] = &["depth", "limit", "skip", "since", "fields", "format"];

/// Immutable description of one read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub entity_type: String,
    /// Present for single-object fetches.
    pub id: Option<EntityId>,
    /// Requested depth; `None` selects the type's default.
    pub depth: Option<u32>,
    pub skip: usize,
    pub limit: Option<usize>,
    /// Incremental listing cutoff (epoch seconds).
    pub since: Option<i64>,
    /// Render allow-list.
    pub fields: Option<Vec<String>>,
    /// Raw filter pairs in query-string order.
    pub filters: Vec<(String, String)>,
}

impl QueryRequest {
    pub fn listing(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: None,
            depth: None,
            skip: 0,
            limit: None,
            since: None,
            fields: None,
            filters: Vec::new(),
        }
    }

    pub fn single(entity_type: impl Into<String>, id: EntityId) -> Self {
        Self {
            id: Some(id),
            ..Self::listing(entity_type)
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    /// Build from decoded query-string pairs.
    ///
    /// `skip`, `limit` and `since` must be integers. A depth that is not a
    /// non-negative integer falls back to the type default.
    pub fn from_params(
        entity_type: impl Into<String>,
        id: Option<EntityId>,
        params: &[(String, String)],
    ) -> Result<Self, FilterError> {
        let mut request = Self::listing(entity_type);
        request.id = id;

        for (key, value) in params {
            match key.as_str() {
                "depth" => request.depth = value.trim().parse::<u32>().ok(),
                "skip" => request.skip = parse_count("skip", value)?,
                "limit" => {
                    let limit = parse_count("limit", value)?;
                    request.limit = (limit > 0).then_some(limit);
                }
                "since" => {
                    let since = value.trim().parse::<i64>().map_err(|_| {
                        FilterError::InvalidParameter {
                            parameter: "since".to_string(),
                            reason: "'since' needs to be a unix timestamp (epoch seconds)"
                                .to_string(),
                        }
                    })?;
                    request.since = (since > 0).then_some(since);
                }
                "fields" => {
                    let fields: Vec<String> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|f| !f.is_empty())
                        .map(str::to_string)
                        .collect();
                    request.fields = (!fields.is_empty()).then_some(fields);
                }
                k if RESERVED_PARAMS.contains(&k) => {}
                _ => request.filters.push((key.clone(), value.clone())),
            }
        }

        Ok(request)
    }

    pub fn root_kind(&self) -> RootKind {
        if self.id.is_some() {
            RootKind::Single
        } else {
            RootKind::List
        }
    }

    pub fn is_listing(&self) -> bool {
        self.id.is_none()
    }
}

fn parse_count(parameter: &str, value: &str) -> Result<usize, FilterError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| FilterError::InvalidParameter {
            parameter: parameter.to_string(),
            reason: format!("'{}' needs to be a non-negative integer", parameter),
        })
}
