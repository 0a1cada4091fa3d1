//! Rules for Limit and Offset.

use crate::norm::rules::select::{replace_with_captured, replace_with_empty_values};
use crate::norm::rules::{Captures, NormRule};
use crate::norm::{Factory, RuleName};
use crate::operators::{Expr, Operator, RelExpr};

pub(super) static RULES: &[NormRule] = &[
    NormRule {
        name: RuleName::EliminateLimit,
        ops: &[Operator::Limit],
        matcher: match_eliminate_limit,
        replace: replace_with_captured,
    },
    NormRule {
        name: RuleName::LimitZero,
        ops: &[Operator::Limit],
        matcher: match_limit_zero,
        replace: replace_with_empty_values,
    },
    NormRule {
        name: RuleName::EliminateOffset,
        ops: &[Operator::Offset],
        matcher: match_eliminate_offset,
        replace: replace_with_captured,
    },
];

// A limit that is not less than the maximum number of rows of its input has no effect.
fn match_eliminate_limit(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (input, limit) = match_expr!(expr, Expr::Relational(RelExpr::Limit { input, limit, .. }) => (*input, *limit));
    let limit = f.const_int(limit)?;
    let cardinality = f.memo.logical(input).cardinality;
    if cardinality.is_unbounded() || limit < i64::from(cardinality.max) {
        return None;
    }
    Some(Captures::expr(input))
}

fn match_limit_zero(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (input, limit) = match_expr!(expr, Expr::Relational(RelExpr::Limit { input, limit, .. }) => (*input, *limit));
    let limit = f.const_int(limit)?;
    (limit <= 0).then(|| Captures::cols(f.output_cols(input).clone()))
}

fn match_eliminate_offset(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (input, offset) =
        match_expr!(expr, Expr::Relational(RelExpr::Offset { input, offset, .. }) => (*input, *offset));
    let offset = f.const_int(offset)?;
    (offset <= 0).then(|| Captures::expr(input))
}
