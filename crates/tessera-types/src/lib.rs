//! # tessera-types: Core types for `Tessera`
//!
//! This crate contains shared types used across the `Tessera` system:
//! - Entity IDs ([`SpaceId`], [`IndexId`])
//! - Ordering stamps ([`Lsn`], [`SchemaVersion`])
//! - Field typing ([`FieldType`])
//! - Field values ([`Value`])

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

mod value;

pub use value::Value;

// ============================================================================
// Entity IDs - All Copy (cheap 4-byte values)
// ============================================================================

/// Unique identifier for a space (a collection of tuples with its indexes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpaceId(u32);

impl SpaceId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Display for SpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SpaceId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<SpaceId> for u32 {
    fn from(id: SpaceId) -> Self {
        id.0
    }
}

/// Identifier of an index within its space.
///
/// Index 0 is always the primary index; every other id names a secondary
/// index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct IndexId(u32);

impl IndexId {
    /// The primary index of every space.
    pub const PRIMARY: IndexId = IndexId(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the id as a `usize` for indexing into a space's index list.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` for the primary index.
    pub fn is_primary(self) -> bool {
        self.0 == 0
    }
}

impl Display for IndexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for IndexId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<IndexId> for u32 {
    fn from(id: IndexId) -> Self {
        id.0
    }
}

// ============================================================================
// Ordering Stamps - Copy
// ============================================================================

/// Log sequence number stamped on a committed transaction.
///
/// LSNs never decrease across commits; rows replayed from one snapshot share
/// its LSN. [`Lsn::ZERO`] is the state before anything was committed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Lsn(u64);

impl Lsn {
    pub const ZERO: Lsn = Lsn(0);

    pub fn new(lsn: u64) -> Self {
        Self(lsn)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the LSN that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Lsn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Lsn {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Lsn> for u64 {
    fn from(lsn: Lsn) -> Self {
        lsn.0
    }
}

/// Process-wide schema version.
///
/// Bumped whenever the set of spaces or indexes changes. Cursors snapshot it
/// when they are positioned and stop as soon as it moves.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SchemaVersion(u64);

impl SchemaVersion {
    pub fn new(version: u64) -> Self {
        Self(version)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SchemaVersion {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ============================================================================
// Field Types - Copy (simple enum for comparison semantics)
// ============================================================================

/// Declared type of an indexed field.
///
/// The type decides which [`Value`] kinds a field accepts. Ordering between
/// accepted values is always the total order of [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Any value, including nil.
    #[default]
    Any,
    /// Non-negative integers.
    Unsigned,
    /// Signed integers (unsigned values are accepted too).
    Integer,
    /// Any numeric value, integer or floating point.
    Number,
    /// UTF-8 strings.
    String,
    /// Booleans.
    Boolean,
    /// Raw byte strings.
    Varbinary,
    /// Any non-nil value.
    Scalar,
}

impl FieldType {
    /// Returns `true` if a value of this kind may be stored in a field of
    /// this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Unsigned => matches!(value, Value::Unsigned(_)),
            Self::Integer => matches!(value, Value::Unsigned(_) | Value::Integer(_)),
            Self::Number => value.is_numeric(),
            Self::String => matches!(value, Value::String(_)),
            Self::Boolean => matches!(value, Value::Boolean(_)),
            Self::Varbinary => matches!(value, Value::Binary(_)),
            Self::Scalar => !matches!(value, Value::Nil),
        }
    }

    /// Returns `true` if one of the two types accepts every value the other
    /// accepts. The relation is symmetric.
    ///
    /// Used when two indexes declare the same field with different types:
    /// the field keeps the narrower type.
    pub fn is_compatible_with(self, other: FieldType) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (Self::Any, _) | (_, Self::Any) => true,
            (Self::Scalar, b) | (b, Self::Scalar) => b != Self::Any,
            (Self::Number, Self::Integer | Self::Unsigned)
            | (Self::Integer | Self::Unsigned, Self::Number)
            | (Self::Integer, Self::Unsigned)
            | (Self::Unsigned, Self::Integer) => true,
            _ => false,
        }
    }

    /// Returns the narrower of two compatible types.
    pub fn narrowest(self, other: FieldType) -> FieldType {
        fn rank(t: FieldType) -> u8 {
            match t {
                FieldType::Any => 0,
                FieldType::Scalar => 1,
                FieldType::Number => 2,
                FieldType::Integer => 3,
                _ => 4,
            }
        }
        if rank(other) > rank(self) { other } else { self }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::Unsigned => "unsigned",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Varbinary => "varbinary",
            Self::Scalar => "scalar",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests;
