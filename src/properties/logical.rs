//! Logical properties of relational expressions.
//!
//! Logical properties are shared by every expression of a memo group and are derived from
//! the first (normalized) expression of that group.

use std::fmt::{Display, Formatter};

use crate::memo::{ExprId, Memo};
use crate::meta::{ColumnId, TableId};
use crate::operators::relational::{GroupByKind, JoinKind, SetOpKind};
use crate::operators::scalar::value::ScalarValue;
use crate::operators::scalar::{AggFunc, CmpOp};
use crate::operators::{RelExpr, ScalarExpr};
use crate::properties::{Cardinality, ColSet, FuncDepSet};
use crate::statistics::Statistics;

/// Logical properties of a relational expression.
#[derive(Debug, Clone)]
pub struct Relational {
    /// Columns produced by the expression.
    pub output_cols: ColSet,
    /// Output columns that never contain NULLs.
    pub not_null_cols: ColSet,
    /// Columns referenced by the expression that are not produced by its inputs.
    pub outer_cols: ColSet,
    pub fd: FuncDepSet,
    pub cardinality: Cardinality,
    pub has_subquery: bool,
    pub has_correlated_subquery: bool,
    pub has_placeholder: bool,
    /// The expression modifies data.
    pub can_mutate: bool,
    pub stats: Statistics,
}

impl Relational {
    /// Returns `true` if both properties describe the same relation. Statistics are not compared.
    pub fn equivalent(&self, other: &Relational) -> bool {
        self.output_cols == other.output_cols
            && self.not_null_cols == other.not_null_cols
            && self.outer_cols == other.outer_cols
            && self.cardinality == other.cardinality
            && self.has_subquery == other.has_subquery
            && self.has_correlated_subquery == other.has_correlated_subquery
            && self.has_placeholder == other.has_placeholder
            && self.can_mutate == other.can_mutate
            && self.fd.equivalent(&other.fd)
    }

    fn empty() -> Self {
        Relational {
            output_cols: ColSet::new(),
            not_null_cols: ColSet::new(),
            outer_cols: ColSet::new(),
            fd: FuncDepSet::new(),
            cardinality: Cardinality::any(),
            has_subquery: false,
            has_correlated_subquery: false,
            has_placeholder: false,
            can_mutate: false,
            stats: Statistics::default(),
        }
    }

    // Copies everything except the statistics.
    fn from_input(input: &Relational) -> Self {
        Relational {
            stats: Statistics::default(),
            ..input.clone()
        }
    }
}

impl Display for Relational {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cols: {} not-null: {} card: {}", self.output_cols, self.not_null_cols, self.cardinality)?;
        if !self.outer_cols.is_empty() {
            write!(f, " outer: {}", self.outer_cols)?;
        }
        if !self.fd.is_empty() {
            write!(f, " fd: {}", self.fd)?;
        }
        write!(f, " rows: {:.2}", self.stats.row_count())
    }
}

/// Derives logical properties of the given relational expression. Children of the expression
/// must already be in the memo.
pub fn derive_relational(memo: &Memo, expr: &RelExpr) -> Relational {
    let mut props = match expr {
        RelExpr::Scan(private) => scan_props(memo, private.table, &private.cols),
        RelExpr::Values { rows, private } => {
            let mut props = Relational::empty();
            props.output_cols = private.cols.iter().collect();
            props.cardinality = Cardinality::exactly(rows.len() as u32);
            props.not_null_cols = values_not_null_cols(memo, rows, &private.cols);
            props
        }
        RelExpr::Project {
            input,
            projections,
            passthrough,
        } => project_props(memo, *input, projections, passthrough),
        RelExpr::Select { input, filters } => {
            let mut props = Relational::from_input(memo.logical(*input));
            apply_filters(memo, &mut props, filters);
            props
        }
        RelExpr::Join {
            kind, left, right, on, ..
        }
        | RelExpr::MergeJoin {
            kind, left, right, on, ..
        } => join_props(memo, *kind, memo.logical(*left), memo.logical(*right), on),
        RelExpr::LookupJoin {
            kind, input, on, private,
        } => {
            let right = scan_props(memo, private.table, &private.cols);
            join_props(memo, *kind, memo.logical(*input), &right, on)
        }
        RelExpr::ZigzagJoin { on, private } => {
            let mut props = scan_props(memo, private.table, &private.cols);
            apply_filters(memo, &mut props, on);
            props
        }
        RelExpr::IndexJoin { input, private } => {
            let mut props = scan_props(memo, private.table, &private.cols);
            props.cardinality = memo.logical(*input).cardinality;
            props
        }
        RelExpr::GroupBy {
            kind,
            input,
            aggregations,
            private,
        } => group_by_props(memo, *kind, *input, aggregations, &private.grouping_cols),
        RelExpr::SetOp {
            kind, left, right, private,
        } => {
            let (left, right) = (memo.logical(*left), memo.logical(*right));
            let mut props = Relational::empty();
            props.output_cols = private.out_cols.iter().collect();
            for (i, col) in private.out_cols.iter().enumerate() {
                let l = left.not_null_cols.contains(private.left_cols[i]);
                let r = right.not_null_cols.contains(private.right_cols[i]);
                let not_null = match kind {
                    SetOpKind::Union | SetOpKind::UnionAll => l && r,
                    SetOpKind::Intersect | SetOpKind::IntersectAll => l || r,
                    SetOpKind::Except | SetOpKind::ExceptAll => l,
                };
                if not_null {
                    props.not_null_cols.insert(*col);
                }
            }
            if kind.is_distinct() {
                let output_cols = props.output_cols.clone();
                props.fd.add_strict_key(&output_cols, &output_cols);
            }
            let (lc, rc) = (left.cardinality, right.cardinality);
            props.cardinality = match kind {
                SetOpKind::UnionAll => lc.add(&rc),
                SetOpKind::Union => {
                    let sum = lc.add(&rc);
                    Cardinality {
                        min: lc.min.min(1).max(rc.min.min(1)),
                        max: sum.max,
                    }
                }
                SetOpKind::Intersect | SetOpKind::IntersectAll => Cardinality {
                    min: 0,
                    max: lc.max.min(rc.max),
                },
                SetOpKind::Except | SetOpKind::ExceptAll => lc.as_low_as(0),
            };
            props
        }
        RelExpr::Limit { input, limit, .. } => {
            let mut props = Relational::from_input(memo.logical(*input));
            props.cardinality = match const_int(memo, *limit) {
                Some(n) => props.cardinality.limit(n),
                None => props.cardinality.as_low_as(0),
            };
            props
        }
        RelExpr::Offset { input, offset, .. } => {
            let mut props = Relational::from_input(memo.logical(*input));
            props.cardinality = match const_int(memo, *offset) {
                Some(n) => props.cardinality.skip(n),
                None => props.cardinality.as_low_as(0),
            };
            props
        }
        RelExpr::Sort { input, .. } => Relational::from_input(memo.logical(*input)),
        RelExpr::Ordinality { input, private } => {
            let mut props = Relational::from_input(memo.logical(*input));
            props.output_cols.insert(private.col);
            props.not_null_cols.insert(private.col);
            let output_cols = props.output_cols.clone();
            props.fd.add_strict_key(&ColSet::single(private.col), &output_cols);
            props
        }
        RelExpr::Window { input, windows, .. } => {
            let input_props = memo.logical(*input);
            let mut props = Relational::from_input(input_props);
            for item in windows {
                if let ScalarExpr::WindowsItem { col, .. } = memo.scalar_expr(*item) {
                    props.output_cols.insert(*col);
                    // ranking functions never return NULL.
                    props.not_null_cols.insert(*col);
                    if let Some(key) = input_props.fd.strict_key() {
                        props.fd.add_synthesized_col(key, *col);
                    }
                }
            }
            props
        }
        RelExpr::ProjectSet { input, zip } => {
            let input_props = memo.logical(*input);
            let mut props = Relational::empty();
            props.output_cols = input_props.output_cols.clone();
            props.not_null_cols = input_props.not_null_cols.clone();
            for item in zip {
                for col in memo.scalar_expr(*item).item_cols() {
                    props.output_cols.insert(col);
                }
            }
            props.cardinality = Cardinality::any();
            props
        }
        RelExpr::Mutation { input, private, .. } => {
            let input_props = memo.logical(*input);
            let mut props = if private.returning {
                let mut props = scan_props(memo, private.table, &memo.metadata().table(private.table).readable_cols());
                props.cardinality = input_props.cardinality;
                props
            } else {
                let mut props = Relational::empty();
                props.cardinality = Cardinality::zero();
                props
            };
            props.can_mutate = true;
            props
        }
        RelExpr::Explain { private, .. } => {
            let mut props = Relational::empty();
            props.output_cols = private.cols.iter().collect();
            props
        }
    };

    add_shared_props(memo, expr, &mut props);

    if props.cardinality.is_zero_or_one() {
        let output_cols = props.output_cols.clone();
        props.fd.make_max1_row(&output_cols);
    }
    props.stats = memo.statistics_builder().build_statistics(memo, expr).clamp(&props.cardinality);
    props
}

// Outer columns and subquery/placeholder/mutation flags computed from children.
fn add_shared_props(memo: &Memo, expr: &RelExpr, props: &mut Relational) {
    let mut bound_cols = ColSet::new();
    let mut outer_cols = ColSet::new();

    for input in expr.inputs() {
        let input_props = memo.logical(input);
        bound_cols.union_with(&input_props.output_cols);
        outer_cols.union_with(&input_props.outer_cols);
        props.has_subquery |= input_props.has_subquery;
        props.has_correlated_subquery |= input_props.has_correlated_subquery;
        props.has_placeholder |= input_props.has_placeholder;
        props.can_mutate |= input_props.can_mutate;
    }
    // Scan-like operators bind the columns they read.
    match expr {
        RelExpr::LookupJoin { private, .. } => bound_cols.union_with(&private.cols),
        RelExpr::ZigzagJoin { private, .. } => bound_cols.union_with(&private.cols),
        _ => {}
    }

    let inputs = expr.inputs();
    for child in expr.children().into_iter().filter(|c| !inputs.contains(c)) {
        let scalar = memo.scalar_props(child);
        outer_cols.union_with(&scalar.outer_cols);
        props.has_subquery |= scalar.has_subquery;
        props.has_correlated_subquery |= scalar.has_correlated_subquery;
        props.has_placeholder |= scalar.has_placeholder;
    }

    props.outer_cols = outer_cols.difference(&bound_cols);
}

/// Logical properties of a scan of the given columns of a table. Also used by operators
/// that read rows from a table (lookup joins, index joins etc).
pub fn scan_props(memo: &Memo, table_id: TableId, cols: &ColSet) -> Relational {
    let table = memo.metadata().table(table_id);
    let catalog_table = table.table();

    let mut props = Relational::empty();
    props.output_cols = cols.clone();
    props.not_null_cols = cols
        .iter()
        .filter(|c| {
            table
                .column_ordinal(*c)
                .map(|ordinal| !catalog_table.column(ordinal).nullable())
                .unwrap_or(false)
        })
        .collect();

    for index in 0..catalog_table.index_count() {
        if index > 0 && !catalog_table.index(index).is_unique() {
            continue;
        }
        let key = table.index_key_cols(index);
        let lax_key = table.index_lax_key_cols(index);
        if lax_key.is_subset_of(cols) && lax_key.is_subset_of(&props.not_null_cols) {
            props.fd.add_strict_key(&lax_key, cols);
        } else if key.is_subset_of(cols) {
            props.fd.add_strict_key(&key, cols);
        } else if lax_key.is_subset_of(cols) {
            props.fd.add_lax_key(&lax_key, cols);
        }
    }
    props
}

fn values_not_null_cols(memo: &Memo, rows: &[ExprId], cols: &[ColumnId]) -> ColSet {
    let mut not_null: ColSet = cols.iter().collect();
    for row in rows {
        if let ScalarExpr::Tuple(elems) = memo.scalar_expr(*row) {
            for (i, elem) in elems.iter().enumerate() {
                let non_null_const = matches!(
                    memo.scalar_expr(*elem),
                    ScalarExpr::Const(_) | ScalarExpr::True | ScalarExpr::False
                );
                if !non_null_const {
                    not_null.remove(cols[i]);
                }
            }
        }
    }
    not_null
}

fn project_props(memo: &Memo, input: ExprId, projections: &[ExprId], passthrough: &ColSet) -> Relational {
    let input_props = memo.logical(input);
    let mut props = Relational::from_input(input_props);
    props.output_cols = passthrough.clone();
    props.not_null_cols = input_props.not_null_cols.intersection(passthrough);

    for item in projections {
        if let ScalarExpr::ProjectionsItem { element, col } = memo.scalar_expr(*item) {
            props.output_cols.insert(*col);
            match memo.scalar_expr(*element) {
                ScalarExpr::Variable(source) => {
                    if input_props.not_null_cols.contains(*source) {
                        props.not_null_cols.insert(*col);
                    }
                    if input_props.output_cols.contains(*source) {
                        props.fd.add_equivalency(*source, *col);
                    }
                }
                ScalarExpr::Const(_) | ScalarExpr::True | ScalarExpr::False => {
                    props.not_null_cols.insert(*col);
                    props.fd.add_constants(&ColSet::single(*col));
                }
                ScalarExpr::Null(_) => props.fd.add_constants(&ColSet::single(*col)),
                _ => {
                    let element_props = memo.scalar_props(*element);
                    if !element_props.has_subquery && !element_props.has_placeholder {
                        let from = element_props.outer_cols.intersection(&input_props.output_cols);
                        props.fd.add_synthesized_col(&from, *col);
                    }
                }
            }
        }
    }
    let output_cols = props.output_cols.clone();
    props.fd.project_cols(&output_cols);
    props
}

/// Applies the given filters to the properties of a relation: adds constant columns, equivalencies and
/// not null columns implied by the filters and adjusts the cardinality.
fn apply_filters(memo: &Memo, props: &mut Relational, filters: &[ExprId]) {
    if filters.is_empty() {
        return;
    }
    props.cardinality = props.cardinality.as_low_as(0);

    for item in filters {
        let scalar = memo.scalar_props(*item);
        if let Some(constraints) = scalar.constraints.as_ref() {
            if constraints.is_contradiction() {
                props.cardinality = Cardinality::zero();
                continue;
            }
            let not_null = constraints.not_null_cols().intersection(&props.output_cols);
            props.not_null_cols.union_with(&not_null);
            let constants = constraints.constant_cols().intersection(&props.output_cols);
            props.fd.add_constants(&constants);
        }

        let condition = match memo.scalar_expr(*item) {
            ScalarExpr::FiltersItem(condition) => memo.scalar_expr(*condition),
            _ => continue,
        };
        if let ScalarExpr::Comparison {
            op: CmpOp::Eq,
            left,
            right,
        } = condition
        {
            if let (ScalarExpr::Variable(l), ScalarExpr::Variable(r)) = (memo.scalar_expr(*left), memo.scalar_expr(*right))
            {
                if props.output_cols.contains(*l) && props.output_cols.contains(*r) {
                    props.fd.add_equivalency(*l, *r);
                }
            }
        }
    }

    let constants = props.fd.constant_cols();
    if props.fd.colset_is_strict_key(&constants) {
        props.cardinality = props.cardinality.limit(1);
    }
}

fn join_props(memo: &Memo, kind: JoinKind, left: &Relational, right: &Relational, on: &[ExprId]) -> Relational {
    let mut props = Relational::from_input(left);
    match kind {
        JoinKind::Inner => {
            props.output_cols.union_with(&right.output_cols);
            props.not_null_cols.union_with(&right.not_null_cols);
            props.fd.make_product(&right.fd);
            props.cardinality = left.cardinality.product(&right.cardinality);
            apply_filters(memo, &mut props, on);
        }
        JoinKind::Left => {
            props.output_cols.union_with(&right.output_cols);
            props.fd.make_product(&right.fd);
            props.fd.make_outer(&right.output_cols);
            let right_max = Cardinality {
                min: 1,
                max: right.cardinality.max.max(1),
            };
            props.cardinality = Cardinality {
                min: left.cardinality.min,
                max: left.cardinality.product(&right_max).max,
            };
        }
        JoinKind::Full => {
            props.output_cols.union_with(&right.output_cols);
            props.not_null_cols = ColSet::new();
            props.fd.make_product(&right.fd);
            let all_cols = props.output_cols.clone();
            props.fd.make_outer(&all_cols);
            let max = left
                .cardinality
                .product(&right.cardinality)
                .add(&left.cardinality)
                .add(&right.cardinality)
                .max;
            props.cardinality = Cardinality {
                min: left.cardinality.min.max(right.cardinality.min),
                max,
            };
        }
        JoinKind::Semi | JoinKind::Anti => {
            props.cardinality = left.cardinality.as_low_as(0);
        }
    }
    props
}

fn group_by_props(
    memo: &Memo,
    kind: GroupByKind,
    input: ExprId,
    aggregations: &[ExprId],
    grouping_cols: &ColSet,
) -> Relational {
    let input_props = memo.logical(input);
    let mut props = Relational::empty();
    props.output_cols = grouping_cols.clone();
    props.not_null_cols = input_props.not_null_cols.intersection(grouping_cols);

    for item in aggregations {
        if let ScalarExpr::AggregationsItem { agg, col } = memo.scalar_expr(*item) {
            props.output_cols.insert(*col);
            let not_null = match memo.scalar_expr(*agg) {
                ScalarExpr::CountRows
                | ScalarExpr::Agg {
                    func: AggFunc::Count, ..
                } => true,
                // Aggregates of a non-empty group of non NULL values.
                ScalarExpr::Agg { input: arg, .. } => {
                    kind != GroupByKind::ScalarGroupBy
                        && matches!(memo.scalar_expr(*arg), ScalarExpr::Variable(c) if input_props.not_null_cols.contains(*c))
                }
                _ => false,
            };
            if not_null {
                props.not_null_cols.insert(*col);
            }
        }
    }

    match kind {
        GroupByKind::ScalarGroupBy => {
            props.cardinality = Cardinality::one();
        }
        GroupByKind::GroupBy | GroupByKind::DistinctOn => {
            props.fd = input_props.fd.clone();
            props.fd.project_cols(grouping_cols);
            let output_cols = props.output_cols.clone();
            props.fd.add_strict_key(grouping_cols, &output_cols);
            props.cardinality = if grouping_cols.is_empty() {
                input_props.cardinality.limit(1)
            } else if input_props.fd.colset_is_strict_key(grouping_cols) {
                input_props.cardinality
            } else {
                Cardinality {
                    min: input_props.cardinality.min.min(1),
                    max: input_props.cardinality.max,
                }
            };
        }
    }
    props
}

/// Returns a non negative integer constant.
fn const_int(memo: &Memo, id: ExprId) -> Option<u32> {
    match memo.scalar_expr(id) {
        ScalarExpr::Const(ScalarValue::Int(n)) if *n >= 0 => Some((*n).min(u32::MAX as i64 - 1) as u32),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datatypes::DataType;
    use crate::operators::relational::{JoinFlags, ValuesPrivate};

    fn values(memo: &mut Memo, rows: &[&[i64]]) -> (ExprId, Vec<ColumnId>) {
        let width = rows[0].len();
        let cols: Vec<ColumnId> = (0..width)
            .map(|i| memo.metadata_mut().add_column(&format!("c{}", i), DataType::Int))
            .collect();
        let rows = rows
            .iter()
            .map(|row| {
                let elems = row
                    .iter()
                    .map(|v| memo.intern(ScalarExpr::Const(ScalarValue::Int(*v)).into()))
                    .collect();
                memo.intern(ScalarExpr::Tuple(elems).into())
            })
            .collect();
        let id = memo.metadata_mut().next_values_id();
        let expr = memo.intern(
            RelExpr::Values {
                rows,
                private: ValuesPrivate { cols: cols.clone(), id },
            }
            .into(),
        );
        (expr, cols)
    }

    fn eq_filter(memo: &mut Memo, l: ColumnId, r: ColumnId) -> ExprId {
        let left = memo.intern(ScalarExpr::Variable(l).into());
        let right = memo.intern(ScalarExpr::Variable(r).into());
        let cmp = memo.intern(
            ScalarExpr::Comparison {
                op: CmpOp::Eq,
                left,
                right,
            }
            .into(),
        );
        memo.intern(ScalarExpr::FiltersItem(cmp).into())
    }

    #[test]
    fn test_values() {
        let mut memo = Memo::default();
        let (v, cols) = values(&mut memo, &[&[1, 2], &[3, 4]]);
        let props = memo.logical(v);
        assert_eq!(props.cardinality, Cardinality::exactly(2));
        assert_eq!(props.not_null_cols, cols.iter().collect());
        assert_eq!(props.stats.row_count(), 2.0);
    }

    #[test]
    fn test_inner_join() {
        let mut memo = Memo::default();
        let (l, lcols) = values(&mut memo, &[&[1], &[2]]);
        let (r, rcols) = values(&mut memo, &[&[1], &[2], &[3]]);
        let on = eq_filter(&mut memo, lcols[0], rcols[0]);
        let join = memo.intern(
            RelExpr::Join {
                kind: JoinKind::Inner,
                left: l,
                right: r,
                on: vec![on],
                flags: JoinFlags::empty(),
            }
            .into(),
        );
        let props = memo.logical(join);
        assert_eq!(props.output_cols.len(), 2);
        assert_eq!(props.cardinality, Cardinality { min: 0, max: 6 });
        assert!(props.fd.equiv_group(lcols[0]).contains(rcols[0]));
        assert!(props.outer_cols.is_empty());
    }

    #[test]
    fn test_left_join() {
        let mut memo = Memo::default();
        let (l, _) = values(&mut memo, &[&[1], &[2]]);
        let (r, rcols) = values(&mut memo, &[&[1], &[2], &[3]]);
        let join = memo.intern(
            RelExpr::Join {
                kind: JoinKind::Left,
                left: l,
                right: r,
                on: vec![],
                flags: JoinFlags::empty(),
            }
            .into(),
        );
        let props = memo.logical(join);
        assert_eq!(props.cardinality, Cardinality { min: 2, max: 6 });
        assert!(!props.not_null_cols.contains(rcols[0]));
    }

    #[test]
    fn test_outer_cols() {
        let mut memo = Memo::default();
        let (l, _) = values(&mut memo, &[&[1]]);
        let outer = memo.metadata_mut().add_column("outer", DataType::Int);
        let (_, cols) = values(&mut memo, &[&[1]]);
        let filter = eq_filter(&mut memo, cols[0], outer);
        let select = memo.intern(
            RelExpr::Select {
                input: l,
                filters: vec![filter],
            }
            .into(),
        );
        let props = memo.logical(select);
        assert_eq!(props.outer_cols.len(), 2);
        assert!(props.outer_cols.contains(outer));
    }
}
