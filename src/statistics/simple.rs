//! Statistics computed from the information available in a database catalog.

use crate::memo::{ExprId, Memo};
use crate::meta::ColumnId;
use crate::operators::relational::{GroupByKind, JoinKind, SetOpKind};
use crate::operators::scalar::value::ScalarValue;
use crate::operators::scalar::CmpOp;
use crate::operators::{RelExpr, ScalarExpr};
use crate::statistics::{Statistics, StatisticsBuilder, UNKNOWN_ROW_COUNT};

/// Selectivity of a predicate when nothing is known about it.
const DEFAULT_FILTER_SELECTIVITY: f64 = 1.0 / 3.0;
/// Selectivity of an equality when the number of distinct values is unknown.
const DEFAULT_EQ_SELECTIVITY: f64 = 0.1;
/// The number of rows produced by a set-returning function per input row.
const SET_RETURNING_ROWS: f64 = 10.0;

/// A [StatisticsBuilder] that uses table statistics stored in the catalog: row counts and distinct counts.
#[derive(Debug, Default)]
pub struct SimpleStatisticsBuilder;

impl StatisticsBuilder for SimpleStatisticsBuilder {
    fn build_statistics(&self, memo: &Memo, expr: &RelExpr) -> Statistics {
        let rows = |id: ExprId| memo.logical(id).stats.row_count();

        match expr {
            RelExpr::Scan(private) => Statistics::from_row_count(table_row_count(memo, private.table)),
            RelExpr::Values { rows, .. } => Statistics::from_row_count(rows.len() as f64),
            RelExpr::Project { input, .. }
            | RelExpr::Sort { input, .. }
            | RelExpr::Ordinality { input, .. }
            | RelExpr::Window { input, .. }
            | RelExpr::IndexJoin { input, .. } => Statistics::from_row_count(rows(*input)),
            RelExpr::Select { input, filters } => {
                let selectivity = filters_selectivity(memo, filters);
                Statistics::new(rows(*input) * selectivity, selectivity)
            }
            RelExpr::Join {
                kind, left, right, on, ..
            }
            | RelExpr::MergeJoin {
                kind, left, right, on, ..
            } => join_statistics(memo, *kind, rows(*left), rows(*right), on),
            RelExpr::LookupJoin {
                kind, input, on, private,
            } => join_statistics(memo, *kind, rows(*input), table_row_count(memo, private.table), on),
            RelExpr::ZigzagJoin { on, private } => {
                let selectivity = filters_selectivity(memo, on);
                Statistics::new(table_row_count(memo, private.table) * selectivity, selectivity)
            }
            RelExpr::GroupBy {
                kind, input, private, ..
            } => match kind {
                GroupByKind::ScalarGroupBy => Statistics::from_row_count(1.0),
                GroupByKind::GroupBy | GroupByKind::DistinctOn => {
                    let input_rows = rows(*input);
                    let groups = private
                        .grouping_cols
                        .iter()
                        .map(|c| distinct_count(memo, c).unwrap_or(input_rows * DEFAULT_EQ_SELECTIVITY).max(1.0))
                        .product::<f64>();
                    Statistics::from_row_count(groups.min(input_rows))
                }
            },
            RelExpr::SetOp { kind, left, right, .. } => {
                let (l, r) = (rows(*left), rows(*right));
                let row_count = match kind {
                    SetOpKind::UnionAll => l + r,
                    SetOpKind::Union => l.max(r),
                    SetOpKind::Intersect | SetOpKind::IntersectAll => l.min(r),
                    SetOpKind::Except | SetOpKind::ExceptAll => l,
                };
                Statistics::from_row_count(row_count)
            }
            RelExpr::Limit { input, limit, .. } => {
                let input_rows = rows(*input);
                match const_count(memo, *limit) {
                    Some(n) => Statistics::from_row_count(input_rows.min(n)),
                    None => Statistics::from_row_count(input_rows),
                }
            }
            RelExpr::Offset { input, offset, .. } => {
                let input_rows = rows(*input);
                match const_count(memo, *offset) {
                    Some(n) => Statistics::from_row_count((input_rows - n).max(0.0)),
                    None => Statistics::from_row_count(input_rows),
                }
            }
            RelExpr::ProjectSet { input, .. } => Statistics::from_row_count(rows(*input) * SET_RETURNING_ROWS),
            RelExpr::Mutation { input, private, .. } => {
                if private.returning {
                    Statistics::from_row_count(rows(*input))
                } else {
                    Statistics::from_row_count(0.0)
                }
            }
            RelExpr::Explain { .. } => Statistics::from_row_count(SET_RETURNING_ROWS),
        }
    }
}

fn join_statistics(memo: &Memo, kind: JoinKind, left: f64, right: f64, on: &[ExprId]) -> Statistics {
    let selectivity = filters_selectivity(memo, on);
    let inner = left * right * selectivity;
    let row_count = match kind {
        JoinKind::Inner => inner,
        JoinKind::Left => inner.max(left),
        JoinKind::Full => inner.max(left + right),
        JoinKind::Semi => left * selectivity,
        JoinKind::Anti => left * (1.0 - selectivity),
    };
    Statistics::new(row_count, selectivity)
}

fn table_row_count(memo: &Memo, table: crate::meta::TableId) -> f64 {
    memo.metadata()
        .table(table)
        .table()
        .statistics()
        .map(|s| s.row_count() as f64)
        .unwrap_or(UNKNOWN_ROW_COUNT)
}

fn const_count(memo: &Memo, id: ExprId) -> Option<f64> {
    match memo.scalar_expr(id) {
        ScalarExpr::Const(ScalarValue::Int(n)) => Some((*n).max(0) as f64),
        _ => None,
    }
}

// The number of distinct values of a table column.
fn distinct_count(memo: &Memo, col: ColumnId) -> Option<f64> {
    let metadata = memo.metadata();
    let table = metadata.table(metadata.column(col).table()?);
    let ordinal = table.column_ordinal(col)?;
    let stats = table.table().statistics()?.column(ordinal)?;
    Some(stats.distinct_count() as f64)
}

fn null_fraction(memo: &Memo, col: ColumnId) -> Option<f64> {
    let metadata = memo.metadata();
    let table = metadata.table(metadata.column(col).table()?);
    let ordinal = table.column_ordinal(col)?;
    let table_stats = table.table().statistics()?;
    let stats = table_stats.column(ordinal)?;
    if table_stats.row_count() == 0 {
        return Some(0.0);
    }
    Some(stats.null_count() as f64 / table_stats.row_count() as f64)
}

/// The selectivity of a conjunction of filters.
pub fn filters_selectivity(memo: &Memo, filters: &[ExprId]) -> f64 {
    filters.iter().map(|f| selectivity(memo, *f)).product::<f64>().clamp(0.0, 1.0)
}

/// The selectivity of the given boolean expression.
pub fn selectivity(memo: &Memo, id: ExprId) -> f64 {
    let s = match memo.scalar_expr(id) {
        ScalarExpr::FiltersItem(condition) | ScalarExpr::Range(condition) => selectivity(memo, *condition),
        ScalarExpr::True => 1.0,
        ScalarExpr::False | ScalarExpr::Null(_) => 0.0,
        ScalarExpr::And(l, r) => selectivity(memo, *l) * selectivity(memo, *r),
        ScalarExpr::Or(l, r) => {
            let (l, r) = (selectivity(memo, *l), selectivity(memo, *r));
            l + r - l * r
        }
        ScalarExpr::Not(input) => 1.0 - selectivity(memo, *input),
        ScalarExpr::Comparison { op, left, right } => comparison_selectivity(memo, *op, *left, *right),
        _ => DEFAULT_FILTER_SELECTIVITY,
    };
    s.clamp(0.0, 1.0)
}

fn eq_selectivity(memo: &Memo, col: ColumnId) -> f64 {
    match distinct_count(memo, col) {
        Some(n) if n > 0.0 => 1.0 / n,
        _ => DEFAULT_EQ_SELECTIVITY,
    }
}

fn comparison_selectivity(memo: &Memo, op: CmpOp, left: ExprId, right: ExprId) -> f64 {
    let (l, r) = (memo.scalar_expr(left), memo.scalar_expr(right));
    let (col, other) = match (l, r) {
        (ScalarExpr::Variable(a), ScalarExpr::Variable(b)) if op == CmpOp::Eq => {
            let a = distinct_count(memo, *a);
            let b = distinct_count(memo, *b);
            return match a.into_iter().chain(b).reduce(f64::max) {
                Some(n) if n > 0.0 => 1.0 / n,
                _ => DEFAULT_EQ_SELECTIVITY,
            };
        }
        (ScalarExpr::Variable(col), other) | (other, ScalarExpr::Variable(col)) => (*col, other),
        _ => return DEFAULT_FILTER_SELECTIVITY,
    };
    match op {
        CmpOp::Eq => eq_selectivity(memo, col),
        CmpOp::Ne => 1.0 - eq_selectivity(memo, col),
        CmpOp::Is if matches!(other, ScalarExpr::Null(_)) => null_fraction(memo, col).unwrap_or(DEFAULT_EQ_SELECTIVITY),
        CmpOp::IsNot if matches!(other, ScalarExpr::Null(_)) => {
            1.0 - null_fraction(memo, col).unwrap_or(DEFAULT_EQ_SELECTIVITY)
        }
        CmpOp::Is => eq_selectivity(memo, col),
        CmpOp::In => match other {
            ScalarExpr::Tuple(elems) => elems.len() as f64 * eq_selectivity(memo, col),
            _ => DEFAULT_FILTER_SELECTIVITY,
        },
        CmpOp::NotIn => match other {
            ScalarExpr::Tuple(elems) => 1.0 - elems.len() as f64 * eq_selectivity(memo, col),
            _ => DEFAULT_FILTER_SELECTIVITY,
        },
        _ => DEFAULT_FILTER_SELECTIVITY,
    }
}
