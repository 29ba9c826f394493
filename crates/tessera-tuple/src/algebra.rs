//! Key algebra: pure functions deriving key definitions from each other.
//!
//! A non-covering secondary index stores a *partial tuple*: the secondary
//! key fields followed by whatever primary key fields the secondary key
//! does not already contain. Three derivations describe that layout:
//!
//! - [`merge`] builds the extraction pattern over the original tuple.
//! - [`condense`] renumbers it to positions inside the partial tuple.
//! - [`build_extractor`] locates the primary key inside the partial tuple.

use crate::error::{Result, TupleError};
use crate::key_def::{KeyDef, KeyPart};

/// Order-preserving union of two key definitions, keyed by field position.
///
/// The result holds every part of `first` in order, followed by the parts
/// of `second` whose field position is not already in `first`, in
/// `second`'s order. It keeps `first`'s identity (space, index, name,
/// uniqueness).
///
/// The layout is deterministic: merging the same definitions always yields
/// the same parts, so stored partial tuples stay readable across reopens.
pub fn merge(first: &KeyDef, second: &KeyDef) -> KeyDef {
    let mut parts: Vec<KeyPart> = Vec::with_capacity(first.part_count() + second.part_count());
    parts.extend_from_slice(first.parts());
    parts.extend(
        second
            .parts()
            .iter()
            .filter(|part| !first.contains_field(part.field_no)),
    );

    debug_assert!(parts.len() >= first.part_count());
    debug_assert!(parts.len() <= first.part_count() + second.part_count());

    first.with_parts(parts)
}

/// Renumbers every part to its position within `merged`.
///
/// The partial tuple a secondary index stores contains exactly the merged
/// fields in merged order, so field `i` of the partial tuple is part `i`.
pub fn condense(merged: &KeyDef) -> KeyDef {
    let parts = merged
        .parts()
        .iter()
        .enumerate()
        .map(|(position, part)| KeyPart::new(position as u32, part.field_type))
        .collect();
    merged.with_parts(parts)
}

/// Builds the key definition that extracts the primary key from a partial
/// tuple laid out by `merged`.
///
/// Each primary part is mapped to the position its field occupies in
/// `merged` (its condensed position), keeping the primary part's type and
/// order. The result keeps `primary`'s identity.
///
/// # Errors
///
/// Returns [`TupleError::ExtractorField`] if a primary field is absent from
/// `merged`. This cannot happen when `merged` came from [`merge`] with the
/// primary definition as one of its inputs.
pub fn build_extractor(primary: &KeyDef, merged: &KeyDef) -> Result<KeyDef> {
    let parts = primary
        .parts()
        .iter()
        .map(|part| {
            merged
                .position_of(part.field_no)
                .map(|position| KeyPart::new(position as u32, part.field_type))
                .ok_or(TupleError::ExtractorField {
                    field_no: part.field_no,
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(primary.with_parts(parts))
}
