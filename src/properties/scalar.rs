//! Scalar properties.

use crate::datatypes::DataType;
use crate::memo::{ExprId, Memo};
use crate::operators::scalar::overloads::{binary_return_type, unary_return_type};
use crate::operators::scalar::value::ScalarValue;
use crate::operators::scalar::CmpOp;
use crate::operators::{Expr, ScalarExpr};
use crate::properties::constraints::{ColumnConstraint, Constraints, Span};
use crate::properties::ColSet;

/// Properties of a scalar expression. Computed lazily and cached by the [memo](crate::memo::Memo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarProps {
    /// Columns referenced by this expression and by subqueries within it.
    pub outer_cols: ColSet,
    pub has_subquery: bool,
    /// A subquery within this expression refers to columns not produced by that subquery.
    pub has_correlated_subquery: bool,
    pub has_placeholder: bool,
    pub data_type: DataType,
    /// Constraints implied by a boolean condition. `None` when nothing is known.
    pub constraints: Option<Constraints>,
    /// The constraints represent the condition exactly.
    pub tight: bool,
}

/// Derives scalar properties of the given scalar expression. Properties of children
/// are obtained from the memo.
pub fn derive_scalar(memo: &Memo, id: ExprId) -> ScalarProps {
    let expr = memo.scalar_expr(id);
    let relational = expr.relational_children();

    let mut outer_cols = ColSet::new();
    let mut has_subquery = !relational.is_empty();
    let mut has_correlated_subquery = false;
    let mut has_placeholder = matches!(expr, ScalarExpr::Placeholder { .. });

    if let ScalarExpr::Variable(col) = expr {
        outer_cols.insert(*col);
    }

    for child in expr.children() {
        match memo.expr(child) {
            Expr::Relational(_) => {
                let props = memo.logical(child);
                outer_cols.union_with(&props.outer_cols);
                has_correlated_subquery |= !props.outer_cols.is_empty() || props.has_correlated_subquery;
                has_placeholder |= props.has_placeholder;
            }
            Expr::Scalar(_) => {
                let props = memo.scalar_props(child);
                outer_cols.union_with(&props.outer_cols);
                has_subquery |= props.has_subquery;
                has_correlated_subquery |= props.has_correlated_subquery;
                has_placeholder |= props.has_placeholder;
            }
        }
    }

    let (constraints, tight) = build_constraints(memo, expr);

    ScalarProps {
        outer_cols,
        has_subquery,
        has_correlated_subquery,
        has_placeholder,
        data_type: data_type(memo, expr),
        constraints,
        tight,
    }
}

fn child_type(memo: &Memo, id: ExprId) -> DataType {
    memo.scalar_props(id).data_type.clone()
}

fn first_known_type(memo: &Memo, ids: impl Iterator<Item = ExprId>) -> DataType {
    ids.map(|id| child_type(memo, id))
        .find(|t| *t != DataType::Unknown)
        .unwrap_or(DataType::Unknown)
}

fn data_type(memo: &Memo, expr: &ScalarExpr) -> DataType {
    match expr {
        ScalarExpr::Variable(col) => memo.metadata().column(*col).data_type().clone(),
        ScalarExpr::Const(value) => value.data_type(),
        ScalarExpr::Null(data_type) => data_type.clone(),
        ScalarExpr::Placeholder { data_type, .. } => data_type.clone(),
        ScalarExpr::True
        | ScalarExpr::False
        | ScalarExpr::And(_, _)
        | ScalarExpr::Or(_, _)
        | ScalarExpr::Not(_)
        | ScalarExpr::Range(_)
        | ScalarExpr::Comparison { .. }
        | ScalarExpr::Exists(_)
        | ScalarExpr::Any { .. }
        | ScalarExpr::FiltersItem(_) => DataType::Bool,
        ScalarExpr::Binary { op, left, right } => {
            binary_return_type(*op, &child_type(memo, *left), &child_type(memo, *right))
        }
        ScalarExpr::Unary { op, input } => unary_return_type(*op, &child_type(memo, *input)),
        ScalarExpr::Case { whens, or_else, .. } => {
            first_known_type(memo, whens.iter().copied().chain(std::iter::once(*or_else)))
        }
        ScalarExpr::When { value, .. } => child_type(memo, *value),
        ScalarExpr::Coalesce(args) => first_known_type(memo, args.iter().copied()),
        ScalarExpr::Tuple(elems) => DataType::Tuple(elems.iter().map(|e| child_type(memo, *e)).collect()),
        ScalarExpr::Array { elem_type, .. } => DataType::Array(Box::new(elem_type.clone())),
        ScalarExpr::Cast { data_type, .. } => data_type.clone(),
        ScalarExpr::Function { private, .. } => private.return_type.clone(),
        ScalarExpr::Subquery(input) => match memo.logical(*input).output_cols.first() {
            Some(col) => memo.metadata().column(col).data_type().clone(),
            None => DataType::Unknown,
        },
        ScalarExpr::ArrayFlatten { private, .. } => {
            let elem_type = memo.metadata().column(private.requested_col).data_type().clone();
            DataType::Array(Box::new(elem_type))
        }
        ScalarExpr::Agg { func, input } => func.return_type(&child_type(memo, *input)),
        ScalarExpr::CountRows | ScalarExpr::WindowFunc(_) => DataType::Int,
        ScalarExpr::AggDistinct(input) | ScalarExpr::AggFilter { input, .. } => child_type(memo, *input),
        ScalarExpr::ProjectionsItem { element, .. } => child_type(memo, *element),
        ScalarExpr::AggregationsItem { agg, .. } => child_type(memo, *agg),
        ScalarExpr::WindowsItem { function, .. } => child_type(memo, *function),
        ScalarExpr::ZipItem { func, .. } => child_type(memo, *func),
    }
}

fn build_constraints(memo: &Memo, expr: &ScalarExpr) -> (Option<Constraints>, bool) {
    match expr {
        ScalarExpr::FiltersItem(condition) | ScalarExpr::Range(condition) => {
            let props = memo.scalar_props(*condition);
            (props.constraints.clone(), props.tight)
        }
        ScalarExpr::True => (Some(Constraints::unconstrained()), true),
        ScalarExpr::False | ScalarExpr::Null(_) => (Some(Constraints::contradiction()), true),
        ScalarExpr::Variable(col) if memo.metadata().column(*col).data_type() == &DataType::Bool => {
            let constraint = ColumnConstraint::new(*col, vec![Span::point(ScalarValue::Bool(true))]);
            (Some(Constraints::single(constraint)), true)
        }
        ScalarExpr::Not(input) => match memo.scalar_expr(*input) {
            ScalarExpr::Variable(col) if memo.metadata().column(*col).data_type() == &DataType::Bool => {
                let constraint = ColumnConstraint::new(*col, vec![Span::point(ScalarValue::Bool(false))]);
                (Some(Constraints::single(constraint)), true)
            }
            _ => (None, false),
        },
        ScalarExpr::Comparison { op, left, right } => comparison_constraints(memo, *op, *left, *right),
        ScalarExpr::And(left, right) => {
            let left = memo.scalar_props(*left);
            let right = memo.scalar_props(*right);
            match (left.constraints.as_ref(), right.constraints.as_ref()) {
                (Some(l), Some(r)) => (Some(l.intersect(r)), left.tight && right.tight),
                (Some(c), None) | (None, Some(c)) => (Some(c.clone()), false),
                (None, None) => (None, false),
            }
        }
        ScalarExpr::Or(left, right) => {
            let left = memo.scalar_props(*left);
            let right = memo.scalar_props(*right);
            match (left.constraints.as_ref(), right.constraints.as_ref()) {
                (Some(l), Some(r)) => match l.union(r) {
                    Some(c) => (Some(c), left.tight && right.tight),
                    None => (None, false),
                },
                _ => (None, false),
            }
        }
        _ => (None, false),
    }
}

fn comparison_constraints(memo: &Memo, op: CmpOp, left: ExprId, right: ExprId) -> (Option<Constraints>, bool) {
    let left_expr = memo.scalar_expr(left);
    let right_expr = memo.scalar_expr(right);

    let (col, op, value) = match (left_expr, right_expr) {
        (ScalarExpr::Variable(l), ScalarExpr::Variable(r)) => {
            if matches!(op, CmpOp::Is | CmpOp::IsNot) {
                return (None, false);
            }
            // Both sides are not NULL when a comparison of two columns holds.
            let constraints = Constraints::single(ColumnConstraint::new(*l, vec![Span::not_null()]))
                .intersect(&Constraints::single(ColumnConstraint::new(*r, vec![Span::not_null()])));
            return (Some(constraints), false);
        }
        (ScalarExpr::Variable(col), _) => (*col, op, right_expr),
        (_, ScalarExpr::Variable(col)) => match op.commute() {
            Some(op) => (*col, op, left_expr),
            None => return (None, false),
        },
        _ => return (None, false),
    };

    if op == CmpOp::In {
        return in_constraints(memo, col, value);
    }

    let value = match value.const_value() {
        Some(value) => value,
        None => {
            // A comparison with a non constant expression still rejects NULLs in the column.
            if matches!(op, CmpOp::Is | CmpOp::IsNot) {
                return (None, false);
            }
            let constraint = ColumnConstraint::new(col, vec![Span::not_null()]);
            return (Some(Constraints::single(constraint)), false);
        }
    };

    if value.is_null() {
        let spans = match op {
            CmpOp::Is => vec![Span::null()],
            CmpOp::IsNot => vec![Span::not_null()],
            _ => return (Some(Constraints::contradiction()), true),
        };
        return (Some(Constraints::single(ColumnConstraint::new(col, spans))), true);
    }

    let spans = match op {
        CmpOp::Eq | CmpOp::Is => vec![Span::point(value)],
        CmpOp::Ne => vec![Span::less(value.clone(), false), Span::greater(value, false)],
        CmpOp::Lt => vec![Span::less(value, false)],
        CmpOp::Le => vec![Span::less(value, true)],
        CmpOp::Gt => vec![Span::greater(value, false)],
        CmpOp::Ge => vec![Span::greater(value, true)],
        CmpOp::Like => {
            let constraint = ColumnConstraint::new(col, vec![Span::not_null()]);
            return (Some(Constraints::single(constraint)), false);
        }
        _ => return (None, false),
    };
    (Some(Constraints::single(ColumnConstraint::new(col, spans))), true)
}

fn in_constraints(memo: &Memo, col: crate::meta::ColumnId, list: &ScalarExpr) -> (Option<Constraints>, bool) {
    let elems = match list {
        ScalarExpr::Tuple(elems) => elems,
        _ => return (None, false),
    };
    let mut spans = Vec::with_capacity(elems.len());
    let mut tight = true;
    for elem in elems {
        match memo.scalar_expr(*elem).const_value() {
            // x IN (.., NULL) never returns true because of the NULL.
            Some(ScalarValue::Null) => {}
            Some(value) => spans.push(Span::point(value)),
            None => {
                spans.push(Span::not_null());
                tight = false;
            }
        }
    }
    (Some(Constraints::single(ColumnConstraint::new(col, spans))), tight)
}
