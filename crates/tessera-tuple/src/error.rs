//! Error types for tuple and key handling.

use tessera_types::FieldType;
use thiserror::Error;

/// Result type for tuple operations.
pub type Result<T> = std::result::Result<T, TupleError>;

/// Errors raised while building key definitions, encoding, decoding,
/// validating or patching tuples.
#[derive(Debug, Error)]
pub enum TupleError {
    /// Serializing values failed.
    #[error("tuple encoding failed: {0}")]
    Encode(postcard::Error),

    /// The bytes are not a valid encoded array of values.
    #[error("malformed tuple: {0}")]
    Decode(postcard::Error),

    /// The array-length marker is missing or truncated.
    #[error("malformed array header")]
    ArrayHeader,

    /// A key definition references a field the tuple does not have.
    #[error("tuple field {field_no} is missing (tuple has {field_count} fields)")]
    MissingField { field_no: u32, field_count: usize },

    /// A tuple field holds a value its declared type does not accept.
    #[error("tuple field {field_no} type does not match: expected {expected}, got {actual}")]
    FieldType {
        field_no: u32,
        expected: FieldType,
        actual: &'static str,
    },

    /// A key has the wrong number of parts for its use.
    #[error("invalid key part count: expected {expected}, got {actual}")]
    KeyPartCount { expected: usize, actual: usize },

    /// A key part holds a value its key part type does not accept.
    #[error("supplied key type of part {part} does not match index part type: expected {expected}")]
    KeyPartType { part: usize, expected: FieldType },

    /// The tuple has a field count the space format forbids.
    #[error("tuple field count {actual} does not match space format: expected {expected}")]
    FieldCount { expected: String, actual: usize },

    /// The encoded tuple exceeds the configured size limit.
    #[error("tuple is too large: {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    /// Two indexes declare incompatible types for the same field.
    #[error("ambiguous field type for field {field_no}: {first} vs {second}")]
    AmbiguousFieldType {
        field_no: u32,
        first: FieldType,
        second: FieldType,
    },

    /// A key definition is malformed.
    #[error("invalid key definition: {0}")]
    InvalidKeyDef(String),

    /// A primary key field is absent from a merged key definition.
    #[error("primary key field {field_no} is not part of the merged key definition")]
    ExtractorField { field_no: u32 },

    /// An update operation is malformed or cannot be applied.
    #[error("invalid update operation: {0}")]
    InvalidUpdate(String),
}
