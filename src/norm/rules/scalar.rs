//! Rules for scalar expressions.

use crate::datatypes::DataType;
use crate::memo::ExprId;
use crate::norm::rules::select::replace_with_captured;
use crate::norm::rules::{Captures, NormRule};
use crate::norm::{Factory, RuleName};
use crate::operators::scalar::overloads::{
    binary_return_type, comparison_allows_null, eval_binary, eval_comparison, eval_in, eval_unary,
    is_monotonic_conversion, unary_return_type,
};
use crate::operators::scalar::value::ScalarValue;
use crate::operators::scalar::CmpOp;
use crate::operators::{Expr, Operator, ScalarExpr};

const UNARY: &[Operator] = &[Operator::UnaryMinus, Operator::BitNot];

const BINARY: &[Operator] = &[
    Operator::Plus,
    Operator::Minus,
    Operator::Mult,
    Operator::Div,
    Operator::Mod,
    Operator::Concat,
];

const COMPARISON: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Lt,
    Operator::Le,
    Operator::Gt,
    Operator::Ge,
    Operator::Is,
    Operator::IsNot,
    Operator::In,
    Operator::NotIn,
    Operator::Like,
    Operator::NotLike,
];

pub(super) static RULES: &[NormRule] = &[
    NormRule {
        name: RuleName::FoldNullUnary,
        ops: UNARY,
        matcher: match_null_unary,
        replace: fold_null_unary,
    },
    NormRule {
        name: RuleName::FoldNullBinary,
        ops: BINARY,
        matcher: match_null_binary,
        replace: fold_null_binary,
    },
    NormRule {
        name: RuleName::FoldNullComparison,
        ops: COMPARISON,
        matcher: match_null_comparison,
        replace: replace_with_folded,
    },
    NormRule {
        name: RuleName::FoldUnary,
        ops: UNARY,
        matcher: match_fold_unary,
        replace: replace_with_folded,
    },
    NormRule {
        name: RuleName::FoldBinary,
        ops: BINARY,
        matcher: match_fold_binary,
        replace: replace_with_folded,
    },
    NormRule {
        name: RuleName::FoldComparison,
        ops: COMPARISON,
        matcher: match_fold_comparison,
        replace: replace_with_folded,
    },
    NormRule {
        name: RuleName::FoldCast,
        ops: &[Operator::Cast],
        matcher: match_fold_cast,
        replace: fold_cast,
    },
    NormRule {
        name: RuleName::EliminateCast,
        ops: &[Operator::Cast],
        matcher: match_eliminate_cast,
        replace: replace_with_captured,
    },
    NormRule {
        name: RuleName::NormalizeTupleEquality,
        ops: &[Operator::Eq],
        matcher: match_tuple_equality,
        replace: normalize_tuple_equality,
    },
    NormRule {
        name: RuleName::FoldInEmpty,
        ops: &[Operator::In],
        matcher: match_in_empty,
        replace: replace_with_folded,
    },
    NormRule {
        name: RuleName::FoldNotInEmpty,
        ops: &[Operator::NotIn],
        matcher: match_in_empty,
        replace: replace_with_folded,
    },
    NormRule {
        name: RuleName::FoldInConst,
        ops: &[Operator::In, Operator::NotIn],
        matcher: match_fold_in_const,
        replace: replace_with_folded,
    },
    NormRule {
        name: RuleName::CommuteConstBinary,
        ops: BINARY,
        matcher: match_commute_const_binary,
        replace: commute_const_binary,
    },
    NormRule {
        name: RuleName::CommuteConstComparison,
        ops: COMPARISON,
        matcher: match_commute_const_comparison,
        replace: commute_const_comparison,
    },
    NormRule {
        name: RuleName::UnifyComparisonTypes,
        ops: COMPARISON,
        matcher: match_unify_comparison_types,
        replace: unify_comparison_types,
    },
    NormRule {
        name: RuleName::SimplifyAnd,
        ops: &[Operator::And],
        matcher: match_simplify_and,
        replace: replace_with_folded,
    },
    NormRule {
        name: RuleName::SimplifyOr,
        ops: &[Operator::Or],
        matcher: match_simplify_or,
        replace: replace_with_folded,
    },
    NormRule {
        name: RuleName::NormalizeNestedAnd,
        ops: &[Operator::And],
        matcher: match_nested_and,
        replace: normalize_nested_and,
    },
    NormRule {
        name: RuleName::EliminateNot,
        ops: &[Operator::Not],
        matcher: match_eliminate_not,
        replace: replace_with_folded,
    },
    NormRule {
        name: RuleName::NegateComparison,
        ops: &[Operator::Not],
        matcher: match_negate_comparison,
        replace: negate_comparison,
    },
    NormRule {
        name: RuleName::FoldIsNull,
        ops: &[Operator::Is, Operator::IsNot],
        matcher: match_fold_is_null,
        replace: replace_with_folded,
    },
    NormRule {
        name: RuleName::EliminateCoalesce,
        ops: &[Operator::Coalesce],
        matcher: match_eliminate_coalesce,
        replace: eliminate_coalesce,
    },
    NormRule {
        name: RuleName::SimplifyCase,
        ops: &[Operator::Case],
        matcher: match_simplify_case,
        replace: simplify_case,
    },
    NormRule {
        name: RuleName::ExtractRedundantConjunct,
        ops: &[Operator::Or],
        matcher: match_redundant_conjunct,
        replace: extract_redundant_conjunct,
    },
    NormRule {
        name: RuleName::SimplifyRange,
        ops: &[Operator::Range],
        matcher: match_simplify_range,
        replace: replace_with_captured,
    },
];

/// Replaces an expression with the captured value or with the captured expression when there is no value.
/// A NULL value becomes a boolean NULL.
fn replace_with_folded(f: &mut Factory, _expr: &Expr, captures: Captures) -> ExprId {
    match captures.value {
        Some(ScalarValue::Null) => f.construct_null(DataType::Bool),
        Some(value) => f.construct_const(value),
        None => captures.exprs[0],
    }
}

fn scalar(expr: &Expr) -> Option<&ScalarExpr> {
    match expr {
        Expr::Scalar(expr) => Some(expr),
        Expr::Relational(_) => None,
    }
}

fn comparison_parts(expr: &Expr) -> Option<(CmpOp, ExprId, ExprId)> {
    match scalar(expr)? {
        ScalarExpr::Comparison { op, left, right } => Some((*op, *left, *right)),
        _ => None,
    }
}

fn match_null_unary(f: &Factory, expr: &Expr) -> Option<Captures> {
    let input = match_expr!(scalar(expr)?, ScalarExpr::Unary { input, .. } => *input);
    f.is_null(input).then(Captures::empty)
}

fn fold_null_unary(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let (op, input) = expect_expr!(scalar(expr), Some(ScalarExpr::Unary { op, input }) => (*op, *input));
    let data_type = unary_return_type(op, &f.type_of(input));
    f.construct_null(data_type)
}

fn match_null_binary(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (left, right) = match_expr!(scalar(expr)?, ScalarExpr::Binary { left, right, .. } => (*left, *right));
    (f.is_null(left) || f.is_null(right)).then(Captures::empty)
}

fn fold_null_binary(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let (op, left, right) =
        expect_expr!(scalar(expr), Some(ScalarExpr::Binary { op, left, right }) => (*op, *left, *right));
    let data_type = binary_return_type(op, &f.type_of(left), &f.type_of(right));
    f.construct_null(data_type)
}

fn is_empty_tuple(f: &Factory, id: ExprId) -> bool {
    matches!(f.scalar_of(id), ScalarExpr::Tuple(elems) if elems.is_empty())
}

// `x IN ()` is false even when x is NULL.
fn match_null_comparison(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (op, left, right) = comparison_parts(expr)?;
    if comparison_allows_null(op) {
        return None;
    }
    let null = match op {
        CmpOp::In | CmpOp::NotIn => f.is_null(right) || (f.is_null(left) && !is_empty_tuple(f, right)),
        _ => f.is_null(left) || f.is_null(right),
    };
    null.then(|| Captures::value(ScalarValue::Null))
}

fn match_fold_unary(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (op, input) = match_expr!(scalar(expr)?, ScalarExpr::Unary { op, input } => (*op, *input));
    let value = eval_unary(op, &f.const_of(input)?)?;
    (!value.is_null()).then(|| Captures::value(value))
}

fn match_fold_binary(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (op, left, right) =
        match_expr!(scalar(expr)?, ScalarExpr::Binary { op, left, right } => (*op, *left, *right));
    let value = eval_binary(op, &f.const_of(left)?, &f.const_of(right)?)?;
    (!value.is_null()).then(|| Captures::value(value))
}

fn bool_value(value: Option<bool>) -> ScalarValue {
    value.map(ScalarValue::Bool).unwrap_or(ScalarValue::Null)
}

fn match_fold_comparison(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (op, left, right) = comparison_parts(expr)?;
    if matches!(op, CmpOp::Is | CmpOp::IsNot | CmpOp::In | CmpOp::NotIn) {
        return None;
    }
    let result = eval_comparison(op, &f.const_of(left)?, &f.const_of(right)?)?;
    Some(Captures::value(bool_value(result)))
}

fn match_fold_cast(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (input, data_type) = match_expr!(scalar(expr)?, ScalarExpr::Cast { input, data_type } => (*input, data_type));
    let value = f.const_of(input)?.cast(data_type)?;
    Some(Captures::value(value))
}

fn fold_cast(f: &mut Factory, expr: &Expr, captures: Captures) -> ExprId {
    let data_type = expect_expr!(scalar(expr), Some(ScalarExpr::Cast { data_type, .. }) => data_type);
    match captures.value {
        Some(ScalarValue::Null) | None => f.construct_null(data_type.clone()),
        Some(value) => f.construct_const(value),
    }
}

fn match_eliminate_cast(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (input, data_type) = match_expr!(scalar(expr)?, ScalarExpr::Cast { input, data_type } => (*input, data_type));
    (&f.type_of(input) == data_type).then(|| Captures::expr(input))
}

fn match_tuple_equality(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (op, left, right) = comparison_parts(expr)?;
    if op != CmpOp::Eq {
        return None;
    }
    match (f.scalar_of(left), f.scalar_of(right)) {
        (ScalarExpr::Tuple(l), ScalarExpr::Tuple(r)) if l.len() == r.len() => {
            Some(Captures::lists(vec![l.clone(), r.clone()]))
        }
        _ => None,
    }
}

// (a, b) = (c, d) becomes a = c AND b = d.
fn normalize_tuple_equality(f: &mut Factory, _expr: &Expr, captures: Captures) -> ExprId {
    let eqs: Vec<_> = captures.lists[0]
        .iter()
        .zip(captures.lists[1].iter())
        .map(|(l, r)| f.construct_eq(*l, *r))
        .collect();
    f.construct_conjunction(&eqs)
}

fn match_in_empty(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (op, _, right) = comparison_parts(expr)?;
    is_empty_tuple(f, right).then(|| Captures::value(ScalarValue::Bool(op == CmpOp::NotIn)))
}

fn match_fold_in_const(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (op, left, right) = comparison_parts(expr)?;
    let value = f.const_of(left)?;
    let list = match f.scalar_of(right) {
        ScalarExpr::Tuple(elems) => elems.iter().map(|e| f.const_of(*e)).collect::<Option<Vec<_>>>()?,
        _ => return None,
    };
    let result = eval_in(&value, &list)?;
    let result = if op == CmpOp::NotIn { result.map(|b| !b) } else { result };
    Some(Captures::value(bool_value(result)))
}

fn match_commute_const_binary(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (op, left, right) =
        match_expr!(scalar(expr)?, ScalarExpr::Binary { op, left, right } => (*op, *left, *right));
    (op.is_commutative() && f.is_const(left) && !f.is_const(right)).then(Captures::empty)
}

fn commute_const_binary(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let (op, left, right) =
        expect_expr!(scalar(expr), Some(ScalarExpr::Binary { op, left, right }) => (*op, *left, *right));
    f.construct_binary(op, right, left)
}

// Constants move to the right side of comparisons.
fn match_commute_const_comparison(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (op, left, right) = comparison_parts(expr)?;
    (op.commute().is_some() && f.is_const(left) && !f.is_const(right)).then(Captures::empty)
}

fn commute_const_comparison(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let (op, left, right) = expect_expr!(comparison_parts(expr), Some(parts) => parts);
    let commuted = expect_expr!(op.commute(), Some(op) => op);
    f.construct_comparison(commuted, right, left)
}

// Converts the constant of `col <op> const` to the type of the column when the conversion
// does not lose information.
fn match_unify_comparison_types(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (op, left, right) = comparison_parts(expr)?;
    if !(op.is_inequality() || op == CmpOp::Eq || op == CmpOp::Ne) {
        return None;
    }
    let value = match (f.scalar_of(left), f.scalar_of(right)) {
        (ScalarExpr::Variable(_), ScalarExpr::Const(value)) => value,
        _ => return None,
    };
    let col_type = f.type_of(left);
    let value_type = value.data_type();
    if col_type == value_type || col_type == DataType::Unknown || !is_monotonic_conversion(&value_type, &col_type) {
        return None;
    }
    let converted = value.cast(&col_type)?;
    if converted.cast(&value_type).as_ref() != Some(value) {
        return None;
    }
    Some(Captures::value(converted))
}

fn unify_comparison_types(f: &mut Factory, expr: &Expr, captures: Captures) -> ExprId {
    let (op, left, _) = expect_expr!(comparison_parts(expr), Some(parts) => parts);
    let value = expect_expr!(captures.value, Some(value) => value);
    let right = f.construct_const(value);
    f.construct_comparison(op, left, right)
}

fn match_simplify_and(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (left, right) = match_expr!(scalar(expr)?, ScalarExpr::And(left, right) => (*left, *right));
    if f.is_false(left) || f.is_false(right) {
        Some(Captures::value(ScalarValue::Bool(false)))
    } else if f.is_true(left) {
        Some(Captures::expr(right))
    } else if f.is_true(right) || left == right {
        Some(Captures::expr(left))
    } else {
        None
    }
}

fn match_simplify_or(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (left, right) = match_expr!(scalar(expr)?, ScalarExpr::Or(left, right) => (*left, *right));
    if f.is_true(left) || f.is_true(right) {
        Some(Captures::value(ScalarValue::Bool(true)))
    } else if f.is_false(left) {
        Some(Captures::expr(right))
    } else if f.is_false(right) || left == right {
        Some(Captures::expr(left))
    } else {
        None
    }
}

// Conjunctions are left-deep: a AND (b AND c) becomes (a AND b) AND c.
fn match_nested_and(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (left, right) = match_expr!(scalar(expr)?, ScalarExpr::And(left, right) => (*left, *right));
    match f.scalar_of(right) {
        ScalarExpr::And(a, b) => Some(Captures::exprs(vec![left, *a, *b])),
        _ => None,
    }
}

fn normalize_nested_and(f: &mut Factory, _expr: &Expr, captures: Captures) -> ExprId {
    let left = f.construct_and(captures.exprs[0], captures.exprs[1]);
    f.construct_and(left, captures.exprs[2])
}

fn match_eliminate_not(f: &Factory, expr: &Expr) -> Option<Captures> {
    let input = match_expr!(scalar(expr)?, ScalarExpr::Not(input) => *input);
    match f.scalar_of(input) {
        ScalarExpr::Not(inner) => Some(Captures::expr(*inner)),
        ScalarExpr::True => Some(Captures::value(ScalarValue::Bool(false))),
        ScalarExpr::False => Some(Captures::value(ScalarValue::Bool(true))),
        ScalarExpr::Null(_) => Some(Captures::value(ScalarValue::Null)),
        _ => None,
    }
}

fn match_negate_comparison(f: &Factory, expr: &Expr) -> Option<Captures> {
    let input = match_expr!(scalar(expr)?, ScalarExpr::Not(input) => *input);
    match f.scalar_of(input) {
        ScalarExpr::Comparison { .. } => Some(Captures::expr(input)),
        _ => None,
    }
}

fn negate_comparison(f: &mut Factory, _expr: &Expr, captures: Captures) -> ExprId {
    let (op, left, right) = expect_expr!(
        f.scalar_of(captures.exprs[0]),
        ScalarExpr::Comparison { op, left, right } => (*op, *left, *right)
    );
    f.construct_comparison(op.negate(), left, right)
}

fn match_fold_is_null(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (op, left, right) = comparison_parts(expr)?;
    let result = eval_comparison(op, &f.const_of(left)?, &f.const_of(right)?)?;
    Some(Captures::value(bool_value(result)))
}

fn match_eliminate_coalesce(f: &Factory, expr: &Expr) -> Option<Captures> {
    let args = match_expr!(scalar(expr)?, ScalarExpr::Coalesce(args) => args);
    let last = *args.last()?;
    if args.len() == 1 {
        return Some(Captures::expr(last));
    }
    let nulls = args.iter().take_while(|arg| f.is_null(**arg)).count();
    if nulls == args.len() {
        return Some(Captures::expr(last));
    }
    let rest = &args[nulls..];
    if rest.len() == 1 || f.is_const(rest[0]) {
        return Some(Captures::expr(rest[0]));
    }
    (nulls > 0).then(|| Captures::list(rest.to_vec()))
}

fn eliminate_coalesce(f: &mut Factory, _expr: &Expr, captures: Captures) -> ExprId {
    match captures.exprs.first() {
        Some(expr) => *expr,
        None => f.construct_coalesce(captures.lists[0].clone()),
    }
}

// Drops WHEN branches of a CASE with a constant input that can not match. The first branch that
// matches becomes the ELSE branch.
fn match_simplify_case(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (input, whens, or_else) = match_expr!(
        scalar(expr)?,
        ScalarExpr::Case { input, whens, or_else } => (*input, whens, *or_else)
    );
    let value = f.const_of(input)?;
    let mut kept = Vec::with_capacity(whens.len());
    let mut result = or_else;
    let mut changed = false;
    for when in whens {
        let (condition, then) = expect_expr!(
            f.scalar_of(*when),
            ScalarExpr::When { condition, value: then } => (*condition, *then)
        );
        let matches = f.const_of(condition).and_then(|c| eval_comparison(CmpOp::Eq, &value, &c));
        match matches {
            Some(Some(true)) => {
                result = then;
                changed = true;
                break;
            }
            Some(_) => changed = true,
            None => kept.push(*when),
        }
    }
    changed.then(|| Captures {
        exprs: vec![input, result],
        lists: vec![kept],
        ..Default::default()
    })
}

fn simplify_case(f: &mut Factory, _expr: &Expr, captures: Captures) -> ExprId {
    let whens = &captures.lists[0];
    if whens.is_empty() {
        captures.exprs[1]
    } else {
        f.construct_case(captures.exprs[0], whens.clone(), captures.exprs[1])
    }
}

// (A AND B) OR (A AND C) becomes A AND (B OR C). A OR (A AND B) becomes A.
fn match_redundant_conjunct(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (left, right) = match_expr!(scalar(expr)?, ScalarExpr::Or(left, right) => (*left, *right));
    let left_conjuncts = f.conjuncts(left);
    let right_conjuncts = f.conjuncts(right);
    if left_conjuncts.len() == 1 && right_conjuncts.len() == 1 {
        return None;
    }
    if left_conjuncts.iter().all(|c| right_conjuncts.contains(c)) {
        return Some(Captures::expr(left));
    }
    if right_conjuncts.iter().all(|c| left_conjuncts.contains(c)) {
        return Some(Captures::expr(right));
    }
    let (common, left_rest): (Vec<_>, Vec<_>) = left_conjuncts.into_iter().partition(|c| right_conjuncts.contains(c));
    if common.is_empty() {
        return None;
    }
    let right_rest: Vec<_> = right_conjuncts.into_iter().filter(|c| !common.contains(c)).collect();
    Some(Captures::lists(vec![common, left_rest, right_rest]))
}

fn extract_redundant_conjunct(f: &mut Factory, _expr: &Expr, captures: Captures) -> ExprId {
    if let Some(expr) = captures.exprs.first() {
        return *expr;
    }
    let common = f.construct_conjunction(&captures.lists[0]);
    let left = f.construct_conjunction(&captures.lists[1]);
    let right = f.construct_conjunction(&captures.lists[2]);
    let or = f.construct_or(left, right);
    f.construct_and(common, or)
}

fn match_simplify_range(f: &Factory, expr: &Expr) -> Option<Captures> {
    let input = match_expr!(scalar(expr)?, ScalarExpr::Range(input) => *input);
    (!matches!(f.scalar_of(input), ScalarExpr::And(_, _))).then(|| Captures::expr(input))
}
