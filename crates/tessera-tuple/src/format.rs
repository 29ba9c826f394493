//! Per-space tuple format.

use std::collections::BTreeMap;

use tessera_types::{FieldType, Value};

use crate::codec::Tuple;
use crate::error::{Result, TupleError};
use crate::key_def::KeyDef;

/// Shape every tuple of a space must have.
///
/// The format is derived from the space's user key definitions: every
/// indexed field must be present and hold a value of its declared type.
/// Optionally the space pins an exact field count and a maximum encoded
/// size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleFormat {
    field_types: BTreeMap<u32, FieldType>,
    min_field_count: usize,
    exact_field_count: Option<usize>,
    max_tuple_size: Option<usize>,
}

impl TupleFormat {
    /// Derives a format from the key definitions of a space.
    ///
    /// When two indexes reference the same field with compatible types the
    /// narrower type wins.
    ///
    /// # Errors
    ///
    /// Returns [`TupleError::AmbiguousFieldType`] if two definitions declare
    /// incompatible types for one field.
    pub fn from_key_defs<'a>(defs: impl IntoIterator<Item = &'a KeyDef>) -> Result<Self> {
        let mut field_types: BTreeMap<u32, FieldType> = BTreeMap::new();
        for part in defs.into_iter().flat_map(KeyDef::parts) {
            match field_types.get(&part.field_no).copied() {
                None => {
                    field_types.insert(part.field_no, part.field_type);
                }
                Some(existing) if existing.is_compatible_with(part.field_type) => {
                    field_types.insert(part.field_no, existing.narrowest(part.field_type));
                }
                Some(existing) => {
                    return Err(TupleError::AmbiguousFieldType {
                        field_no: part.field_no,
                        first: existing,
                        second: part.field_type,
                    });
                }
            }
        }

        let min_field_count = field_types
            .keys()
            .next_back()
            .map_or(0, |&field_no| field_no as usize + 1);

        Ok(Self {
            field_types,
            min_field_count,
            exact_field_count: None,
            max_tuple_size: None,
        })
    }

    /// Requires every tuple to have exactly `count` fields.
    pub fn with_exact_field_count(mut self, count: usize) -> Self {
        self.exact_field_count = Some(count);
        self
    }

    /// Rejects tuples whose encoding exceeds `limit` bytes.
    pub fn with_max_tuple_size(mut self, limit: usize) -> Self {
        self.max_tuple_size = Some(limit);
        self
    }

    /// Declared type of `field_no`, if any index references it.
    pub fn field_type(&self, field_no: u32) -> Option<FieldType> {
        self.field_types.get(&field_no).copied()
    }

    pub fn min_field_count(&self) -> usize {
        self.min_field_count
    }

    pub fn exact_field_count(&self) -> Option<usize> {
        self.exact_field_count
    }

    /// Validates an encoded tuple and returns its decoded fields.
    pub fn validate(&self, tuple: &Tuple) -> Result<Vec<Value>> {
        if let Some(limit) = self.max_tuple_size {
            if tuple.bsize() > limit {
                return Err(TupleError::TooLarge {
                    size: tuple.bsize(),
                    limit,
                });
            }
        }
        let fields = tuple.decode()?;
        self.validate_fields(&fields)?;
        Ok(fields)
    }

    /// Validates decoded tuple fields.
    pub fn validate_fields(&self, fields: &[Value]) -> Result<()> {
        if let Some(exact) = self.exact_field_count {
            if fields.len() != exact {
                return Err(TupleError::FieldCount {
                    expected: exact.to_string(),
                    actual: fields.len(),
                });
            }
        }
        if fields.len() < self.min_field_count {
            return Err(TupleError::FieldCount {
                expected: format!("at least {}", self.min_field_count),
                actual: fields.len(),
            });
        }

        for (&field_no, &field_type) in &self.field_types {
            let value = fields
                .get(field_no as usize)
                .ok_or(TupleError::MissingField {
                    field_no,
                    field_count: fields.len(),
                })?;
            if !field_type.accepts(value) {
                return Err(TupleError::FieldType {
                    field_no,
                    expected: field_type,
                    actual: value.kind(),
                });
            }
        }
        Ok(())
    }
}
