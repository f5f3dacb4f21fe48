use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Referenced segment not found: {0}")]
    SegmentNotFound(Uuid),

    #[error("Circular segment reference through segment {0}")]
    CircularReference(Uuid),

    #[error("Operator {operator} cannot be used on {target}")]
    InvalidOperator { operator: String, target: String },

    #[error("Invalid filter value: {0}")]
    InvalidValue(String),

    #[error("Filter nesting exceeds maximum depth of {0}")]
    TooDeep(usize),

    #[error("Invalid attribute key: {0}")]
    InvalidAttributeKey(String),
}
