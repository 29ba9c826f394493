//! Typed field values.

use std::cmp::Ordering;
use std::fmt::{self, Display};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single tuple field.
///
/// Values form a total order so they can be used directly as B-tree keys:
/// `Nil < Boolean < numbers < String < Binary`. Numbers compare by numeric
/// value across [`Value::Unsigned`], [`Value::Integer`] and
/// [`Value::Number`], exactly: no integer is rounded to a float. NaN sorts
/// above every number and `-0.0 == 0.0`.
///
/// Equality is defined by that order, so `Unsigned(1) == Integer(1)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    /// Absent value.
    #[default]
    Nil,
    /// Boolean.
    Boolean(bool),
    /// Non-negative integer.
    Unsigned(u64),
    /// Signed integer.
    ///
    /// Non-negative values built through [`From<i64>`] are normalized to
    /// [`Value::Unsigned`].
    Integer(i64),
    /// 64-bit floating point.
    Number(f64),
    /// UTF-8 string.
    String(String),
    /// Raw bytes.
    Binary(Bytes),
}

impl Value {
    /// Returns `true` for unsigned, integer and floating point values.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Unsigned(_) | Value::Integer(_) | Value::Number(_)
        )
    }

    /// Returns a short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Unsigned(_) => "unsigned",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Binary(_) => "varbinary",
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Unsigned(v) => Some(*v),
            Value::Integer(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Unsigned(v) => i64::try_from(*v).ok(),
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Unsigned(v) => Some(*v as f64),
            Value::Integer(v) => Some(*v as f64),
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Rank of the value kind in the cross-type order.
    fn class(&self) -> u8 {
        match self {
            Value::Nil => 0,
            Value::Boolean(_) => 1,
            Value::Unsigned(_) | Value::Integer(_) | Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Binary(_) => 4,
        }
    }
}

/// Compares two numeric values exactly. Both arguments must be numeric.
fn compare_numeric(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Unsigned(x), Value::Unsigned(y)) => x.cmp(y),
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Unsigned(x), Value::Integer(y)) => i128::from(*x).cmp(&i128::from(*y)),
        (Value::Integer(x), Value::Unsigned(y)) => i128::from(*x).cmp(&i128::from(*y)),
        (Value::Number(x), Value::Number(y)) => compare_floats(*x, *y),
        (Value::Number(x), other) => compare_int_float(as_i128(other), *x).reverse(),
        (other, Value::Number(y)) => compare_int_float(as_i128(other), *y),
        _ => Ordering::Equal,
    }
}

fn as_i128(value: &Value) -> i128 {
    match value {
        Value::Unsigned(v) => i128::from(*v),
        Value::Integer(v) => i128::from(*v),
        _ => 0,
    }
}

/// NaN sorts above every number; `-0.0` equals `0.0`.
fn compare_floats(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

/// Orders an integer in `[-2^63, 2^64)` against a float without rounding
/// the integer.
fn compare_int_float(int: i128, float: f64) -> Ordering {
    const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;
    const MINUS_TWO_POW_63: f64 = -9_223_372_036_854_775_808.0;

    if float.is_nan() || float >= TWO_POW_64 {
        return Ordering::Less;
    }
    if float < MINUS_TWO_POW_63 {
        return Ordering::Greater;
    }
    // |whole| <= 2^64, so the conversion is exact.
    let whole = float.trunc();
    match int.cmp(&(whole as i128)) {
        Ordering::Equal => compare_floats(0.0, float - whole),
        unequal => unequal,
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.class().cmp(&other.class()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match (self, other) {
            (Value::Nil, Value::Nil) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            _ => compare_numeric(self, other),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Number(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Binary(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Unsigned(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Unsigned(u64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        match u64::try_from(value) {
            Ok(unsigned) => Value::Unsigned(unsigned),
            Err(_) => Value::Integer(value),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::from(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Binary(value)
    }
}
