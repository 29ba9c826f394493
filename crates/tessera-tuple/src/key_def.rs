//! Key definitions: ordered field-extraction patterns.

use std::fmt::{self, Display};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_types::{FieldType, IndexId, SpaceId};

use crate::error::{Result, TupleError};

/// One field of a tuple together with its comparison semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPart {
    /// Zero-based position of the field in the tuple the key is extracted
    /// from.
    pub field_no: u32,
    /// Declared type of the field.
    pub field_type: FieldType,
}

impl KeyPart {
    pub fn new(field_no: u32, field_type: FieldType) -> Self {
        Self {
            field_no,
            field_type,
        }
    }
}

/// Immutable, ordered description of which tuple fields form a key.
///
/// Part order defines both extraction order and comparison order. A key
/// definition also carries the identity of the index it belongs to and
/// whether that index is unique.
///
/// # Invariants
///
/// - At least one part.
/// - No field position appears twice.
///
/// Parts are shared behind an `Arc`, so cloning a definition is cheap and
/// clones may be read from any thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDef {
    space_id: SpaceId,
    index_id: IndexId,
    name: Arc<str>,
    unique: bool,
    parts: Arc<[KeyPart]>,
}

impl KeyDef {
    /// Creates a key definition, validating its parts.
    ///
    /// # Errors
    ///
    /// Returns [`TupleError::InvalidKeyDef`] if `parts` is empty or names
    /// the same field twice.
    pub fn new(
        space_id: SpaceId,
        index_id: IndexId,
        name: impl Into<String>,
        unique: bool,
        parts: Vec<KeyPart>,
    ) -> Result<Self> {
        let name = name.into();
        if parts.is_empty() {
            return Err(TupleError::InvalidKeyDef(format!(
                "index '{name}' must have at least one part"
            )));
        }
        for (i, part) in parts.iter().enumerate() {
            if parts[..i].iter().any(|p| p.field_no == part.field_no) {
                return Err(TupleError::InvalidKeyDef(format!(
                    "index '{name}' references field {} twice",
                    part.field_no
                )));
            }
        }

        Ok(Self {
            space_id,
            index_id,
            name: name.into(),
            unique,
            parts: parts.into(),
        })
    }

    /// Returns a definition with the same identity and different parts.
    ///
    /// Callers guarantee the parts uphold the invariants.
    pub(crate) fn with_parts(&self, parts: Vec<KeyPart>) -> Self {
        debug_assert!(!parts.is_empty(), "derived key definition has no parts");
        Self {
            space_id: self.space_id,
            index_id: self.index_id,
            name: Arc::clone(&self.name),
            unique: self.unique,
            parts: parts.into(),
        }
    }

    pub fn space_id(&self) -> SpaceId {
        self.space_id
    }

    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` if some part extracts `field_no`.
    pub fn contains_field(&self, field_no: u32) -> bool {
        self.position_of(field_no).is_some()
    }

    /// Returns the index of the part extracting `field_no`.
    pub fn position_of(&self, field_no: u32) -> Option<usize> {
        self.parts.iter().position(|p| p.field_no == field_no)
    }
}

impl Display for KeyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.name)?;
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", part.field_no, part.field_type)?;
        }
        write!(f, "]")
    }
}
