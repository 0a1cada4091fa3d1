//! Overloads of scalar operators: result types and evaluation of operators over constant arguments.

use std::cmp::Ordering;

use chrono::Duration;

use crate::datatypes::DataType;
use crate::operators::scalar::value::ScalarValue;
use crate::operators::scalar::{BinaryOp, CmpOp, UnaryOp};

/// An overload of a binary operator.
#[derive(Debug, Clone)]
pub struct BinaryOverload {
    pub op: BinaryOp,
    pub left: DataType,
    pub right: DataType,
    pub result: DataType,
}

const fn overload(op: BinaryOp, left: DataType, right: DataType, result: DataType) -> BinaryOverload {
    BinaryOverload {
        op,
        left,
        right,
        result,
    }
}

/// Registered overloads of binary operators.
pub static BINARY_OVERLOADS: &[BinaryOverload] = &[
    overload(BinaryOp::Plus, DataType::Int, DataType::Int, DataType::Int),
    overload(BinaryOp::Plus, DataType::Float, DataType::Float, DataType::Float),
    overload(BinaryOp::Plus, DataType::Int, DataType::Float, DataType::Float),
    overload(BinaryOp::Plus, DataType::Float, DataType::Int, DataType::Float),
    overload(BinaryOp::Plus, DataType::Date, DataType::Int, DataType::Date),
    overload(BinaryOp::Plus, DataType::Int, DataType::Date, DataType::Date),
    overload(BinaryOp::Minus, DataType::Int, DataType::Int, DataType::Int),
    overload(BinaryOp::Minus, DataType::Float, DataType::Float, DataType::Float),
    overload(BinaryOp::Minus, DataType::Int, DataType::Float, DataType::Float),
    overload(BinaryOp::Minus, DataType::Float, DataType::Int, DataType::Float),
    overload(BinaryOp::Minus, DataType::Date, DataType::Int, DataType::Date),
    overload(BinaryOp::Minus, DataType::Date, DataType::Date, DataType::Int),
    overload(BinaryOp::Mult, DataType::Int, DataType::Int, DataType::Int),
    overload(BinaryOp::Mult, DataType::Float, DataType::Float, DataType::Float),
    overload(BinaryOp::Mult, DataType::Int, DataType::Float, DataType::Float),
    overload(BinaryOp::Mult, DataType::Float, DataType::Int, DataType::Float),
    overload(BinaryOp::Div, DataType::Int, DataType::Int, DataType::Float),
    overload(BinaryOp::Div, DataType::Float, DataType::Float, DataType::Float),
    overload(BinaryOp::Div, DataType::Int, DataType::Float, DataType::Float),
    overload(BinaryOp::Div, DataType::Float, DataType::Int, DataType::Float),
    overload(BinaryOp::Mod, DataType::Int, DataType::Int, DataType::Int),
    overload(BinaryOp::Mod, DataType::Float, DataType::Float, DataType::Float),
    overload(BinaryOp::Concat, DataType::String, DataType::String, DataType::String),
];

/// Finds an overload of the given binary operator. An argument of unknown type (an untyped NULL) matches any type.
pub fn find_binary_overload(op: BinaryOp, left: &DataType, right: &DataType) -> Option<&'static BinaryOverload> {
    let matches = |expected: &DataType, actual: &DataType| actual == &DataType::Unknown || expected == actual;
    BINARY_OVERLOADS
        .iter()
        .find(|o| o.op == op && matches(&o.left, left) && matches(&o.right, right))
}

/// The result type of a binary operator.
pub fn binary_return_type(op: BinaryOp, left: &DataType, right: &DataType) -> DataType {
    find_binary_overload(op, left, right)
        .map(|o| o.result.clone())
        .unwrap_or(DataType::Unknown)
}

/// The result type of a unary operator.
pub fn unary_return_type(_op: UnaryOp, input: &DataType) -> DataType {
    input.clone()
}

/// Returns `true` if the given comparison can be applied to arguments of the given types.
pub fn comparison_supported(op: CmpOp, left: &DataType, right: &DataType) -> bool {
    match op {
        CmpOp::In | CmpOp::NotIn => match right {
            DataType::Tuple(types) => types.iter().all(|t| left.is_comparable_with(t)),
            _ => right == &DataType::Unknown,
        },
        CmpOp::Like | CmpOp::NotLike => {
            matches!(left, DataType::String | DataType::Unknown) && matches!(right, DataType::String | DataType::Unknown)
        }
        _ => left.is_comparable_with(right),
    }
}

/// Returns `true` if the given comparison returns a non-NULL value when an argument is NULL.
pub fn comparison_allows_null(op: CmpOp) -> bool {
    matches!(op, CmpOp::Is | CmpOp::IsNot)
}

/// Evaluates a binary operator. Returns `None` if the arguments are not supported by any overload
/// or the result can not be computed (overflow, division by zero).
pub fn eval_binary(op: BinaryOp, left: &ScalarValue, right: &ScalarValue) -> Option<ScalarValue> {
    find_binary_overload(op, &left.data_type(), &right.data_type())?;
    if left.is_null() || right.is_null() {
        return Some(ScalarValue::Null);
    }
    let value = match (op, left, right) {
        (BinaryOp::Plus, ScalarValue::Int(l), ScalarValue::Int(r)) => ScalarValue::Int(l.checked_add(*r)?),
        (BinaryOp::Minus, ScalarValue::Int(l), ScalarValue::Int(r)) => ScalarValue::Int(l.checked_sub(*r)?),
        (BinaryOp::Mult, ScalarValue::Int(l), ScalarValue::Int(r)) => ScalarValue::Int(l.checked_mul(*r)?),
        (BinaryOp::Mod, ScalarValue::Int(l), ScalarValue::Int(r)) => ScalarValue::Int(l.checked_rem(*r)?),
        (BinaryOp::Plus, ScalarValue::Date(d), ScalarValue::Int(days))
        | (BinaryOp::Plus, ScalarValue::Int(days), ScalarValue::Date(d)) => {
            ScalarValue::Date(d.checked_add_signed(Duration::try_days(*days)?)?)
        }
        (BinaryOp::Minus, ScalarValue::Date(d), ScalarValue::Int(days)) => {
            ScalarValue::Date(d.checked_sub_signed(Duration::try_days(*days)?)?)
        }
        (BinaryOp::Minus, ScalarValue::Date(l), ScalarValue::Date(r)) => {
            ScalarValue::Int(l.signed_duration_since(*r).num_days())
        }
        (BinaryOp::Concat, ScalarValue::String(l), ScalarValue::String(r)) => ScalarValue::String(format!("{}{}", l, r)),
        (op, l, r) => {
            let l = as_float(l)?;
            let r = as_float(r)?;
            let v = match op {
                BinaryOp::Plus => l + r,
                BinaryOp::Minus => l - r,
                BinaryOp::Mult => l * r,
                BinaryOp::Div if r == 0.0 => return None,
                BinaryOp::Div => l / r,
                BinaryOp::Mod if r == 0.0 => return None,
                BinaryOp::Mod => l % r,
                BinaryOp::Concat => return None,
            };
            if !v.is_finite() {
                return None;
            }
            ScalarValue::float(v)
        }
    };
    Some(value)
}

fn as_float(value: &ScalarValue) -> Option<f64> {
    match value {
        ScalarValue::Int(v) => Some(*v as f64),
        ScalarValue::Float(v) => Some(v.0),
        _ => None,
    }
}

/// Evaluates a unary operator.
pub fn eval_unary(op: UnaryOp, input: &ScalarValue) -> Option<ScalarValue> {
    match (op, input) {
        (_, ScalarValue::Null) => Some(ScalarValue::Null),
        (UnaryOp::Minus, ScalarValue::Int(v)) => Some(ScalarValue::Int(v.checked_neg()?)),
        (UnaryOp::Minus, ScalarValue::Float(v)) => Some(ScalarValue::float(-v.0)),
        (UnaryOp::BitNot, ScalarValue::Int(v)) => Some(ScalarValue::Int(!*v)),
        _ => None,
    }
}

/// Evaluates a comparison of two non-tuple values. Returns `Some(None)` if the result is NULL
/// and `None` if the values can not be compared.
pub fn eval_comparison(op: CmpOp, left: &ScalarValue, right: &ScalarValue) -> Option<Option<bool>> {
    match op {
        CmpOp::Is | CmpOp::IsNot => {
            let same = match (left.is_null(), right.is_null()) {
                (true, true) => true,
                (true, false) | (false, true) => false,
                (false, false) => left.compare(right)? == Ordering::Equal,
            };
            return Some(Some(same == (op == CmpOp::Is)));
        }
        _ if left.is_null() || right.is_null() => return Some(None),
        _ => {}
    }
    let result = match op {
        CmpOp::Like | CmpOp::NotLike => match (left, right) {
            (ScalarValue::String(s), ScalarValue::String(pattern)) => like(s, pattern) == (op == CmpOp::Like),
            _ => return None,
        },
        _ => {
            let ord = left.compare(right)?;
            match op {
                CmpOp::Eq => ord == Ordering::Equal,
                CmpOp::Ne => ord != Ordering::Equal,
                CmpOp::Lt => ord == Ordering::Less,
                CmpOp::Le => ord != Ordering::Greater,
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::Ge => ord != Ordering::Less,
                _ => return None,
            }
        }
    };
    Some(Some(result))
}

/// Evaluates `value IN (list)`. The result is NULL if no element matches and either the value or
/// an element of the list is NULL.
pub fn eval_in(value: &ScalarValue, list: &[ScalarValue]) -> Option<Option<bool>> {
    if list.is_empty() {
        return Some(Some(false));
    }
    if value.is_null() {
        return Some(None);
    }
    let mut saw_null = false;
    for elem in list {
        match eval_comparison(CmpOp::Eq, value, elem)? {
            Some(true) => return Some(Some(true)),
            Some(false) => {}
            None => saw_null = true,
        }
    }
    Some(if saw_null { None } else { Some(false) })
}

/// Matches a string against a LIKE pattern where `%` matches any sequence of characters
/// and `_` matches a single character.
pub fn like(s: &str, pattern: &str) -> bool {
    let s: Vec<char> = s.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut i, mut j) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while i < s.len() {
        if j < p.len() && (p[j] == '_' || p[j] == s[i]) {
            i += 1;
            j += 1;
        } else if j < p.len() && p[j] == '%' {
            backtrack = Some((j, i));
            j += 1;
        } else if let Some((pj, si)) = backtrack {
            j = pj + 1;
            i = si + 1;
            backtrack = Some((pj, si + 1));
        } else {
            return false;
        }
    }
    p[j..].iter().all(|c| *c == '%')
}

/// Returns `true` if a conversion between the given types preserves the order of values.
/// Such conversions are used to rewrite comparisons of a column with a constant of another type.
pub fn is_monotonic_conversion(from: &DataType, to: &DataType) -> bool {
    (from.is_numeric() && to.is_numeric()) || (from.is_temporal() && to.is_temporal())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_commutative_overloads() {
        for o in BINARY_OVERLOADS.iter().filter(|o| o.op.is_commutative()) {
            let commuted = find_binary_overload(o.op, &o.right, &o.left);
            assert!(commuted.is_some(), "No overload for commuted {:?}({}, {})", o.op, o.left, o.right);
            assert_eq!(commuted.map(|c| &c.result), Some(&o.result));
        }
    }

    #[test]
    fn test_eval_binary() {
        let int = ScalarValue::Int;
        assert_eq!(eval_binary(BinaryOp::Plus, &int(1), &int(2)), Some(int(3)));
        assert_eq!(eval_binary(BinaryOp::Plus, &int(1), &ScalarValue::float(0.5)), Some(ScalarValue::float(1.5)));
        assert_eq!(eval_binary(BinaryOp::Div, &int(1), &int(0)), None);
        assert_eq!(eval_binary(BinaryOp::Mult, &int(i64::MAX), &int(2)), None);
        assert_eq!(eval_binary(BinaryOp::Plus, &int(1), &ScalarValue::Null), Some(ScalarValue::Null));
        assert_eq!(eval_binary(BinaryOp::Concat, &int(1), &int(1)), None);

        let date = ScalarValue::date("2020-01-31").unwrap();
        let next = ScalarValue::date("2020-02-01").unwrap();
        assert_eq!(eval_binary(BinaryOp::Plus, &int(1), &date), Some(next.clone()));
        assert_eq!(eval_binary(BinaryOp::Minus, &next, &date), Some(int(1)));
    }

    #[test]
    fn test_eval_comparison() {
        let int = ScalarValue::Int;
        assert_eq!(eval_comparison(CmpOp::Lt, &int(1), &int(2)), Some(Some(true)));
        assert_eq!(eval_comparison(CmpOp::Eq, &int(1), &ScalarValue::Null), Some(None));
        assert_eq!(eval_comparison(CmpOp::Is, &ScalarValue::Null, &ScalarValue::Null), Some(Some(true)));
        assert_eq!(eval_comparison(CmpOp::IsNot, &int(1), &ScalarValue::Null), Some(Some(true)));
        assert_eq!(eval_comparison(CmpOp::Eq, &int(1), &ScalarValue::String("1".into())), None);
    }

    #[test]
    fn test_eval_in() {
        let int = ScalarValue::Int;
        assert_eq!(eval_in(&ScalarValue::Null, &[]), Some(Some(false)));
        assert_eq!(eval_in(&int(1), &[int(2), int(1)]), Some(Some(true)));
        assert_eq!(eval_in(&int(1), &[int(2), ScalarValue::Null]), Some(None));
    }

    #[test]
    fn test_like() {
        assert!(like("abc", "a%"));
        assert!(like("abc", "_b_"));
        assert!(like("abc", "%c"));
        assert!(like("", "%"));
        assert!(!like("abc", "a_"));
        assert!(like("aXbXc", "a%b%c"));
    }
}
