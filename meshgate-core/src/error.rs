//! Error types for MESHGATE pipeline stages

use thiserror::Error;

/// Filter compilation errors. Raised before storage is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid value for {field}: '{value}' is not a valid {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Invalid parameter {parameter}: {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("Operator '{operator}' is not supported on {field}")]
    UnsupportedOperator { field: String, operator: String },
}

/// Schema lookup errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown entity type: {tag}")]
    UnknownEntityType { tag: String },

    #[error("Unknown relation {relation} on {tag}")]
    UnknownRelation { tag: String, relation: String },
}

/// Entity store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Query against {tag} failed: {reason}")]
    QueryFailed { tag: String, reason: String },

    #[error("Referenced {tag} row {id} is missing")]
    MissingReference { tag: String, id: i64 },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Snapshot cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Snapshot {path} could not be read: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Snapshot {path} is malformed: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Snapshot {path} could not be written: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Master error type for all MESHGATE errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result type alias for MESHGATE operations.
pub type MeshResult<T> = Result<T, MeshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_error_display() {
        let err = FilterError::InvalidValue {
            field: "asn".to_string(),
            value: "abc".to_string(),
            expected: "integer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for asn: 'abc' is not a valid integer"
        );
    }

    #[test]
    fn test_master_error_wraps_sub_errors() {
        let err: MeshError = SchemaError::UnknownEntityType {
            tag: "carrier".to_string(),
        }
        .into();
        assert!(matches!(err, MeshError::Schema(_)));
        assert!(err.to_string().contains("carrier"));

        let err: MeshError = CacheError::Malformed {
            path: "/tmp/net-0.json".to_string(),
            reason: "missing data key".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("Cache error"));
    }
}
