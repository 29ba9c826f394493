//! Field patch operations for update and upsert.
//!
//! Field numbers are relative to an *index base* (0 or 1) chosen by the
//! caller. Negative field numbers count from the end: `-1` is the last
//! field. For [`UpdateOp::Insert`], `-1` appends after the last field.

use serde::{Deserialize, Serialize};
use tessera_types::Value;

use crate::error::{Result, TupleError};

/// A single field patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateOp {
    /// Replace the field, or append if it is one past the last field.
    Assign { field: i64, value: Value },
    /// Insert a new field before `field`.
    Insert { field: i64, value: Value },
    /// Remove `count` fields starting at `field`.
    Delete { field: i64, count: u32 },
    /// Numeric addition.
    Add { field: i64, value: Value },
    /// Numeric subtraction.
    Subtract { field: i64, value: Value },
    /// Bitwise AND on an unsigned field.
    BitAnd { field: i64, mask: u64 },
    /// Bitwise OR on an unsigned field.
    BitOr { field: i64, mask: u64 },
    /// Bitwise XOR on an unsigned field.
    BitXor { field: i64, mask: u64 },
}

impl UpdateOp {
    /// Field number the operation targets, relative to the index base.
    pub fn field(&self) -> i64 {
        match self {
            Self::Assign { field, .. }
            | Self::Insert { field, .. }
            | Self::Delete { field, .. }
            | Self::Add { field, .. }
            | Self::Subtract { field, .. }
            | Self::BitAnd { field, .. }
            | Self::BitOr { field, .. }
            | Self::BitXor { field, .. } => *field,
        }
    }

    fn symbol(&self) -> char {
        match self {
            Self::Assign { .. } => '=',
            Self::Insert { .. } => '!',
            Self::Delete { .. } => '#',
            Self::Add { .. } => '+',
            Self::Subtract { .. } => '-',
            Self::BitAnd { .. } => '&',
            Self::BitOr { .. } => '|',
            Self::BitXor { .. } => '^',
        }
    }

    /// Zero-based position this operation touches in a tuple of `len`
    /// fields.
    fn position(&self, index_base: u32, len: usize) -> Result<usize> {
        let field = self.field();
        let appends = matches!(self, Self::Assign { .. } | Self::Insert { .. });

        let position = if field >= 0 {
            let base = i64::from(index_base);
            if field < base {
                return Err(self.invalid(format!(
                    "field {field} is invalid with index base {index_base}"
                )));
            }
            usize::try_from(field - base).ok()
        } else {
            // -1 means the last field; insert treats it as "after the last".
            let from_end = field.unsigned_abs();
            let len = len as u64 + u64::from(matches!(self, Self::Insert { .. }));
            len.checked_sub(from_end).and_then(|p| usize::try_from(p).ok())
        };

        match position {
            Some(p) if p < len || (appends && p == len) => Ok(p),
            _ => Err(self.invalid(format!("field {field} was not found in the tuple"))),
        }
    }

    fn invalid(&self, reason: String) -> TupleError {
        TupleError::InvalidUpdate(format!("'{}' {reason}", self.symbol()))
    }
}

/// Checks that operations are well-formed without a target tuple.
///
/// # Errors
///
/// Returns [`TupleError::InvalidUpdate`] for a field number below the index
/// base, a zero-length delete or a non-numeric arithmetic operand.
pub fn check_ops(ops: &[UpdateOp], index_base: u32) -> Result<()> {
    if index_base > 1 {
        return Err(TupleError::InvalidUpdate(format!(
            "index base must be 0 or 1, got {index_base}"
        )));
    }
    for op in ops {
        let field = op.field();
        if field >= 0 && field < i64::from(index_base) {
            return Err(op.invalid(format!(
                "field {field} is invalid with index base {index_base}"
            )));
        }
        match op {
            UpdateOp::Delete { count: 0, .. } => {
                return Err(op.invalid("cannot delete 0 fields".to_owned()));
            }
            UpdateOp::Add { value, .. } | UpdateOp::Subtract { value, .. }
                if !value.is_numeric() =>
            {
                return Err(op.invalid(format!(
                    "arithmetic operand must be a number, got {}",
                    value.kind()
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Applies operations in order to decoded tuple fields.
///
/// Each operation sees the result of the previous one.
///
/// # Errors
///
/// Returns [`TupleError::InvalidUpdate`] if an operation is malformed,
/// targets a field that does not exist, or cannot be applied to the value
/// it finds there.
pub fn apply_ops(mut fields: Vec<Value>, ops: &[UpdateOp], index_base: u32) -> Result<Vec<Value>> {
    check_ops(ops, index_base)?;
    for op in ops {
        let position = op.position(index_base, fields.len())?;
        match op {
            UpdateOp::Assign { value, .. } => {
                if position == fields.len() {
                    fields.push(value.clone());
                } else {
                    fields[position] = value.clone();
                }
            }
            UpdateOp::Insert { value, .. } => fields.insert(position, value.clone()),
            UpdateOp::Delete { count, .. } => {
                let end = position.saturating_add(*count as usize).min(fields.len());
                fields.drain(position..end);
            }
            UpdateOp::Add { value, .. } => {
                fields[position] = arithmetic(op, &fields[position], value, false)?;
            }
            UpdateOp::Subtract { value, .. } => {
                fields[position] = arithmetic(op, &fields[position], value, true)?;
            }
            UpdateOp::BitAnd { mask, .. } => {
                fields[position] = Value::Unsigned(unsigned(op, &fields[position])? & mask);
            }
            UpdateOp::BitOr { mask, .. } => {
                fields[position] = Value::Unsigned(unsigned(op, &fields[position])? | mask);
            }
            UpdateOp::BitXor { mask, .. } => {
                fields[position] = Value::Unsigned(unsigned(op, &fields[position])? ^ mask);
            }
        }
    }
    Ok(fields)
}

fn unsigned(op: &UpdateOp, target: &Value) -> Result<u64> {
    match target {
        Value::Unsigned(n) => Ok(*n),
        other => Err(op.invalid(format!(
            "bitwise operand must be unsigned, field holds {}",
            other.kind()
        ))),
    }
}

fn arithmetic(op: &UpdateOp, target: &Value, operand: &Value, subtract: bool) -> Result<Value> {
    if !target.is_numeric() {
        return Err(op.invalid(format!(
            "arithmetic target must be a number, field holds {}",
            target.kind()
        )));
    }

    if matches!(target, Value::Number(_)) || matches!(operand, Value::Number(_)) {
        let (Some(a), Some(b)) = (target.as_f64(), operand.as_f64()) else {
            return Err(op.invalid("arithmetic operand must be a number".to_owned()));
        };
        return Ok(Value::Number(if subtract { a - b } else { a + b }));
    }

    let (Some(a), Some(b)) = (as_i128(target), as_i128(operand)) else {
        return Err(op.invalid("arithmetic operand must be a number".to_owned()));
    };
    let result = if subtract { a - b } else { a + b };
    if result >= 0 {
        u64::try_from(result)
            .map(Value::Unsigned)
            .map_err(|_| op.invalid("integer overflow".to_owned()))
    } else {
        i64::try_from(result)
            .map(Value::Integer)
            .map_err(|_| op.invalid("integer overflow".to_owned()))
    }
}

fn as_i128(value: &Value) -> Option<i128> {
    match value {
        Value::Unsigned(n) => Some(i128::from(*n)),
        Value::Integer(n) => Some(i128::from(*n)),
        _ => None,
    }
}
