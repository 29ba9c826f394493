use std::cmp::Ordering;

use proptest::prelude::*;
use test_case::test_case;

use super::*;

// ============================================================================
// Identifier Tests
// ============================================================================

#[test]
fn index_zero_is_primary() {
    assert!(IndexId::PRIMARY.is_primary());
    assert!(IndexId::new(0).is_primary());
    assert!(!IndexId::new(1).is_primary());
}

#[test]
fn lsn_next_is_monotonic() {
    let lsn = Lsn::new(41);
    assert_eq!(lsn.next(), Lsn::new(42));
    assert!(lsn.next() > lsn);
    assert_eq!(Lsn::ZERO.as_u64(), 0);
}

// ============================================================================
// Value Ordering Tests
// ============================================================================

#[test]
fn cross_kind_ordering() {
    let ordered = [
        Value::Nil,
        Value::Boolean(false),
        Value::Boolean(true),
        Value::Integer(-5),
        Value::Unsigned(0),
        Value::Number(0.5),
        Value::Unsigned(1),
        Value::from("a"),
        Value::from("b"),
        Value::Binary(bytes::Bytes::from_static(b"\x00")),
    ];

    for pair in ordered.windows(2) {
        assert_eq!(
            pair[0].cmp(&pair[1]),
            Ordering::Less,
            "{} should sort before {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn numeric_equality_across_kinds() {
    assert_eq!(Value::Unsigned(7), Value::Integer(7));
    assert_eq!(Value::Unsigned(7), Value::Number(7.0));
    assert_ne!(Value::Unsigned(7), Value::from("7"));
}

#[test]
fn from_i64_normalizes_non_negative() {
    assert!(matches!(Value::from(3_i64), Value::Unsigned(3)));
    assert!(matches!(Value::from(-3_i64), Value::Integer(-3)));
}

// ============================================================================
// Field Type Tests
// ============================================================================

#[test_case(FieldType::Unsigned, Value::Unsigned(1), true; "unsigned accepts unsigned")]
#[test_case(FieldType::Unsigned, Value::Integer(-1), false; "unsigned rejects negative")]
#[test_case(FieldType::Integer, Value::Unsigned(1), true; "integer accepts unsigned")]
#[test_case(FieldType::Integer, Value::Number(1.5), false; "integer rejects float")]
#[test_case(FieldType::Number, Value::Number(1.5), true; "number accepts float")]
#[test_case(FieldType::String, Value::from("x"), true; "string accepts string")]
#[test_case(FieldType::String, Value::Unsigned(1), false; "string rejects number")]
#[test_case(FieldType::Scalar, Value::Nil, false; "scalar rejects nil")]
#[test_case(FieldType::Scalar, Value::Boolean(true), true; "scalar accepts boolean")]
#[test_case(FieldType::Any, Value::Nil, true; "any accepts nil")]
fn field_type_acceptance(field_type: FieldType, value: Value, expected: bool) {
    assert_eq!(field_type.accepts(&value), expected);
}

#[test]
fn compatible_types_narrow() {
    assert!(FieldType::Number.is_compatible_with(FieldType::Unsigned));
    assert!(FieldType::Unsigned.is_compatible_with(FieldType::Number));
    assert_eq!(
        FieldType::Number.narrowest(FieldType::Unsigned),
        FieldType::Unsigned
    );
    assert!(!FieldType::String.is_compatible_with(FieldType::Unsigned));
}

#[test]
fn integers_near_float_precision_limit_stay_ordered() {
    let below = Value::Unsigned(u64::MAX - 1);
    let float = Value::Number(18_446_744_073_709_551_616.0);
    let max = Value::Unsigned(u64::MAX);

    assert!(below < max);
    assert!(below < float);
    assert!(max < float);
    assert_eq!(Value::Number(2.0), Value::Unsigned(2));
    assert!(Value::Number(2.5) > Value::Integer(2));
    assert!(Value::Number(-2.5) < Value::Integer(-2));
    assert_eq!(Value::Number(-0.0), Value::Number(0.0));
    assert_eq!(Value::Number(-0.0), Value::Unsigned(0));
    assert!(Value::Number(f64::NAN) > Value::Unsigned(u64::MAX));
    assert!(Value::Number(f64::NEG_INFINITY) < Value::Integer(i64::MIN));
}

fn numeric() -> impl Strategy<Value = Value> {
    let near_limits = prop_oneof![
        (u64::MAX - 4..=u64::MAX).prop_map(Value::Unsigned),
        (i64::MIN..=i64::MIN + 4).prop_map(Value::Integer),
        Just(Value::Number(18_446_744_073_709_551_616.0)),
        Just(Value::Number(-9_223_372_036_854_775_808.0)),
    ];
    prop_oneof![
        any::<u64>().prop_map(Value::Unsigned),
        any::<i64>().prop_map(Value::from),
        any::<f64>().prop_map(Value::Number),
        (-8i64..8).prop_map(Value::from),
        (-16i32..16).prop_map(|n| Value::Number(f64::from(n) / 2.0)),
        near_limits,
    ]
}

proptest! {
    #[test]
    fn mixed_numeric_order_is_total(a in numeric(), b in numeric(), c in numeric()) {
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        if a <= b && b <= c {
            prop_assert!(a <= c);
        }
        if a == b && b == c {
            prop_assert_eq!(&a, &c);
        }
    }

    /// Integer ordering agrees with the native ordering regardless of which
    /// variant carries the number.
    #[test]
    fn integer_order_matches_native(a: i64, b: i64) {
        prop_assert_eq!(Value::from(a).cmp(&Value::from(b)), a.cmp(&b));
        prop_assert_eq!(Value::Integer(a).cmp(&Value::from(b)), a.cmp(&b));
    }

    #[test]
    fn string_order_matches_native(a: String, b: String) {
        prop_assert_eq!(Value::from(a.clone()).cmp(&Value::from(b.clone())), a.cmp(&b));
    }
}
