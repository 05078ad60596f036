//! Structural comparison of JSON values

use serde_json::{Number, Value};

fn as_integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

// Integers compare exactly; f64 is only used when a float is involved
fn numbers_equal(x: &Number, y: &Number) -> bool {
    match (as_integer(x), as_integer(y)) {
        (Some(x), Some(y)) => x == y,
        _ => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
    }
}

/// Recursive structural equality
///
/// Numbers compare by value (`1` equals `1.0`), arrays are order-sensitive
/// and objects must have identical key sets.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| deep_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map(|other| deep_equal(v, other)).unwrap_or(false))
        }
        _ => a == b,
    }
}

/// Whether `expected` is contained in `actual`
///
/// Objects match when every expected key is present and matches recursively;
/// extra keys in `actual` are ignored. Arrays must have equal length and
/// match element-wise. Everything else uses [`deep_equal`].
pub fn is_subset(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => exp
            .iter()
            .all(|(k, v)| act.get(k).map(|av| is_subset(v, av)).unwrap_or(false)),
        (Value::Array(exp), Value::Array(act)) => {
            exp.len() == act.len() && exp.iter().zip(act).all(|(e, a)| is_subset(e, a))
        }
        _ => deep_equal(expected, actual),
    }
}
