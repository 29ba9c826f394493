//! Reference tuple codec.
//!
//! Tuples and keys are both arrays of [`Value`]s encoded with `postcard`.
//! The encoding starts with the element count as a LEB128 varint, which is
//! the array-length marker: a key is a tuple whose fields are key parts.

use std::fmt::{self, Debug, Display};

use bytes::Bytes;
use tessera_types::Value;

use crate::error::{Result, TupleError};

const MAX_VARINT_BYTES: usize = 10;

/// Splits an encoded array into its element count and the encoded elements.
///
/// # Errors
///
/// Returns [`TupleError::ArrayHeader`] if the marker is empty, truncated or
/// overflows `usize`.
pub fn read_array_header(bytes: &[u8]) -> Result<(usize, &[u8])> {
    let mut count: u64 = 0;
    for (i, byte) in bytes.iter().take(MAX_VARINT_BYTES).enumerate() {
        let chunk = u64::from(byte & 0x7f);
        let shift = 7 * i as u32;
        if shift >= 64 || (chunk << shift) >> shift != chunk {
            return Err(TupleError::ArrayHeader);
        }
        count |= chunk << shift;
        if byte & 0x80 == 0 {
            let count = usize::try_from(count).map_err(|_| TupleError::ArrayHeader)?;
            return Ok((count, &bytes[i + 1..]));
        }
    }
    Err(TupleError::ArrayHeader)
}

fn encode(values: &[Value]) -> Result<Bytes> {
    postcard::to_allocvec(values)
        .map(Bytes::from)
        .map_err(TupleError::Encode)
}

fn decode(bytes: &[u8]) -> Result<Vec<Value>> {
    let (count, mut body) = read_array_header(bytes)?;
    let mut values = Vec::with_capacity(count.min(body.len()));
    for _ in 0..count {
        let (value, rest) =
            postcard::take_from_bytes::<Value>(body).map_err(TupleError::Decode)?;
        values.push(value);
        body = rest;
    }
    Ok(values)
}

/// An encoded tuple: an opaque byte payload that starts with an array
/// marker.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tuple(Bytes);

impl Tuple {
    /// Encodes `values` into a tuple.
    pub fn from_values(values: &[Value]) -> Result<Self> {
        encode(values).map(Self)
    }

    /// Wraps bytes produced by [`Tuple::from_values`] or read back from
    /// storage.
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Encoded size in bytes.
    pub fn bsize(&self) -> usize {
        self.0.len()
    }

    /// Number of fields, read from the array marker only.
    pub fn field_count(&self) -> Result<usize> {
        read_array_header(&self.0).map(|(count, _)| count)
    }

    /// Decodes all fields.
    pub fn decode(&self) -> Result<Vec<Value>> {
        decode(&self.0)
    }
}

impl Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Ok(values) => f.debug_tuple("Tuple").field(&values).finish(),
            Err(_) => f.debug_tuple("Tuple").field(&self.0).finish(),
        }
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_values(f, self.decode().ok().as_deref())
    }
}

/// An encoded key: an array marker followed by zero or more key parts.
///
/// A key with fewer parts than its key definition is a *prefix* key; the
/// empty key matches everything.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key(Bytes);

impl Key {
    /// Encodes `values` as key parts.
    pub fn from_values(values: &[Value]) -> Result<Self> {
        encode(values).map(Self)
    }

    /// The key with zero parts.
    pub fn empty() -> Self {
        Self(Bytes::from_static(&[0]))
    }

    /// Wraps bytes received from a caller. The bytes are checked lazily by
    /// [`Key::part_count`] and [`Key::decode`].
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Number of parts, read from the array marker only.
    pub fn part_count(&self) -> Result<usize> {
        read_array_header(&self.0).map(|(count, _)| count)
    }

    /// Decodes all parts.
    pub fn decode(&self) -> Result<Vec<Value>> {
        decode(&self.0)
    }

    /// Returns a key holding only the first `count` parts.
    pub fn prefix(&self, count: usize) -> Result<Self> {
        let mut values = self.decode()?;
        values.truncate(count);
        Self::from_values(&values)
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Ok(values) => f.debug_tuple("Key").field(&values).finish(),
            Err(_) => f.debug_tuple("Key").field(&self.0).finish(),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_values(f, self.decode().ok().as_deref())
    }
}

fn fmt_values(f: &mut fmt::Formatter<'_>, values: Option<&[Value]>) -> fmt::Result {
    let Some(values) = values else {
        return write!(f, "<malformed>");
    };
    write!(f, "[")?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{value}")?;
    }
    write!(f, "]")
}
