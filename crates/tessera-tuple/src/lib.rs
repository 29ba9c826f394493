//! # tessera-tuple: Key definitions and tuples for `Tessera`
//!
//! This crate holds everything that describes *where* indexed data lives
//! inside a tuple:
//!
//! - [`KeyDef`] / [`KeyPart`]: immutable, ordered field-extraction patterns.
//! - Key algebra ([`merge`], [`condense`], [`build_extractor`]): deriving the
//!   layout a non-covering secondary index stores and the extractor that
//!   recovers a primary key from it.
//! - The reference tuple codec ([`Tuple`], [`Key`]): an array of [`Value`]s
//!   serialized with `postcard`, always starting with an array-length marker.
//! - Extraction and comparison driven by key definitions.
//! - [`TupleFormat`]: per-space shape validation.
//! - [`UpdateOp`]: field patch operations used by update and upsert.
//!
//! ## Secondary index layout
//!
//! ```text
//! user key def (secondary)    [f3:string]
//! user key def (primary)      [f0:unsigned]
//! merged (secondary, primary) [f3:string, f0:unsigned]   <- extracts the partial tuple
//! condensed                   [f0:string, f1:unsigned]   <- engine comparator
//! extractor                   [f1:unsigned]              <- primary key inside the partial tuple
//! ```
//!
//! [`Value`]: tessera_types::Value

mod algebra;
mod codec;
mod error;
mod extract;
mod format;
mod key_def;
mod update;


pub use algebra::{build_extractor, condense, merge};
pub use codec::{Key, Tuple, read_array_header};
pub use error::{Result, TupleError};
pub use extract::{compare_with_key, extract_key, validate_key};
pub use format::TupleFormat;
pub use key_def::{KeyDef, KeyPart};
pub use update::{UpdateOp, apply_ops, check_ops};
