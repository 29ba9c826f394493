//! Key extraction, comparison and validation driven by key definitions.

use std::cmp::Ordering;

use tessera_types::Value;

use crate::codec::Key;
use crate::error::{Result, TupleError};
use crate::key_def::KeyDef;

/// Extracts the key described by `def` from decoded tuple fields.
///
/// The key holds one part per key part, in key part order.
///
/// # Errors
///
/// Returns [`TupleError::MissingField`] if the tuple is shorter than a
/// referenced field position.
pub fn extract_key(fields: &[Value], def: &KeyDef) -> Result<Key> {
    let parts = def
        .parts()
        .iter()
        .map(|part| {
            fields
                .get(part.field_no as usize)
                .cloned()
                .ok_or(TupleError::MissingField {
                    field_no: part.field_no,
                    field_count: fields.len(),
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Key::from_values(&parts)
}

/// Compares tuple fields against a (possibly partial) key under `def`.
///
/// Only the first `key.len()` key parts take part; a prefix key compares
/// equal to every tuple that starts with it. Missing tuple fields compare as
/// `nil`.
pub fn compare_with_key(fields: &[Value], key: &[Value], def: &KeyDef) -> Ordering {
    def.parts()
        .iter()
        .zip(key)
        .map(|(part, key_part)| {
            fields
                .get(part.field_no as usize)
                .unwrap_or(&Value::Nil)
                .cmp(key_part)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Validates a search key against `def`.
///
/// With `exact` the key must carry every part; otherwise it may be any
/// prefix, including the empty key. Every supplied part must be accepted by
/// its key part type.
pub fn validate_key(def: &KeyDef, key: &[Value], exact: bool) -> Result<()> {
    let expected = def.part_count();
    if key.len() > expected || (exact && key.len() != expected) {
        return Err(TupleError::KeyPartCount {
            expected,
            actual: key.len(),
        });
    }
    for (part_no, (part, value)) in def.parts().iter().zip(key).enumerate() {
        if !part.field_type.accepts(value) {
            return Err(TupleError::KeyPartType {
                part: part_no,
                expected: part.field_type,
            });
        }
    }
    Ok(())
}
