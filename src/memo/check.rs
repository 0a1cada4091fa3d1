//! Consistency checks of expressions added to a memo.
//!
//! Every failed check is a bug in the code that has built the expression, so checks panic.

use crate::memo::{ExprId, Memo};
use crate::operators::relational::{GroupByKind, MutationKind};
use crate::operators::scalar::AggFunc;
use crate::operators::{Expr, Operator, RelExpr, ScalarExpr};
use crate::properties::ColSet;

/// Checks the expression with the given identifier.
///
/// # Panics
///
/// Panics if the expression is malformed.
pub fn check_expr(memo: &Memo, id: ExprId) {
    match memo.expr(id) {
        Expr::Relational(expr) => check_relational(memo, id, expr),
        Expr::Scalar(expr) => check_scalar(memo, expr),
    }
}

fn check_relational(memo: &Memo, id: ExprId, expr: &RelExpr) {
    for input in expr.inputs() {
        assert!(
            memo.expr(input).is_relational(),
            "Input {} of {} is not a relational expression",
            input,
            expr.op()
        );
    }
    for (list_op, items) in expr.lists() {
        for item in items {
            let item_op = memo.expr(*item).op();
            if list_op == Operator::Tuple {
                assert_eq!(item_op, Operator::Tuple, "Rows of {} must be tuples", expr.op());
            } else {
                assert_eq!(
                    item_op.owning_list(),
                    Some(list_op),
                    "{} can not contain {} as a list item. Expr: {}",
                    list_op,
                    item_op,
                    expr.op()
                );
            }
        }
    }

    let output_cols = &memo.logical(id).output_cols;
    if let Some((ordering, applies_to_input)) = expr.stored_ordering() {
        let cols = if applies_to_input {
            let mut cols = ColSet::new();
            for input in expr.inputs() {
                cols.union_with(&memo.logical(input).output_cols);
            }
            cols
        } else {
            output_cols.clone()
        };
        assert!(
            ordering.subset_of_cols(&cols),
            "Ordering {} of {} refers to columns outside of {}",
            ordering,
            expr.op(),
            cols
        );
    }

    match expr {
        RelExpr::Scan(private) => {
            assert!(
                !(private.flags.no_index_join && private.flags.force_index),
                "Scan can not have both NoIndexJoin and ForceIndex flags set"
            );
            let table = memo.metadata().table(private.table);
            if private.flags.force_index {
                assert!(
                    private.flags.index < table.table().index_count(),
                    "Forced index {} does not exist",
                    private.flags.index
                );
            }
        }
        RelExpr::Project {
            projections,
            passthrough,
            input,
        } => {
            let input_cols = &memo.logical(*input).output_cols;
            assert!(
                passthrough.is_subset_of(input_cols),
                "Passthrough columns {} are not produced by the input {}",
                passthrough,
                input_cols
            );
            for item in projections {
                if let ScalarExpr::ProjectionsItem { element, col } = memo.scalar_expr(*item) {
                    check_column(memo, col.index());
                    assert!(
                        !passthrough.contains(*col),
                        "Column {} is both passed through and synthesized",
                        col
                    );
                    assert!(
                        memo.scalar_expr(*element) != &ScalarExpr::Variable(*col),
                        "Projection passes through column {} under its own id",
                        col
                    );
                }
            }
        }
        RelExpr::GroupBy { kind, aggregations, .. } => {
            for item in aggregations {
                if let ScalarExpr::AggregationsItem { agg, col } = memo.scalar_expr(*item) {
                    check_column(memo, col.index());
                    check_aggregation(memo, *kind, *agg);
                }
            }
        }
        RelExpr::IndexJoin { private, .. } => {
            assert!(!private.cols.is_empty(), "Index join with no columns");
        }
        RelExpr::LookupJoin { private, .. } => {
            assert!(!private.key_cols.is_empty(), "Lookup join with no key columns");
            assert!(!private.cols.is_empty(), "Lookup join with no lookup columns");
            assert!(!output_cols.is_empty(), "Lookup join with no output columns");
        }
        RelExpr::ZigzagJoin { private, .. } => {
            assert_eq!(
                private.left_eq_cols.len(),
                private.right_eq_cols.len(),
                "Zigzag join with mismatched equality columns"
            );
        }
        RelExpr::Mutation { kind, private, .. } => {
            let table = memo.metadata().table(private.table);
            let count = table.table().column_count();
            for (name, cols) in [("insert", &private.insert_cols), ("update", &private.update_cols)] {
                assert!(
                    cols.is_empty() || cols.len() == count,
                    "Mutation {} columns do not match the number of table columns",
                    name
                );
            }
            if *kind == MutationKind::Upsert || *kind == MutationKind::Insert {
                assert!(!private.insert_cols.is_empty(), "{} without insert columns", kind_name(*kind));
            }
            assert!(
                !output_cols.intersects(&table.mutation_cols()),
                "Mutation columns are present in the output of {}",
                expr.op()
            );
        }
        _ => {}
    }
}

fn kind_name(kind: MutationKind) -> &'static str {
    match kind {
        MutationKind::Insert => "Insert",
        MutationKind::Update => "Update",
        MutationKind::Delete => "Delete",
        MutationKind::Upsert => "Upsert",
    }
}

fn check_aggregation(memo: &Memo, kind: GroupByKind, agg: ExprId) {
    let expr = memo.scalar_expr(agg);
    assert!(
        !matches!(expr, ScalarExpr::Variable(_)),
        "Aggregation can not be a variable"
    );
    let func = match aggregate_of(memo, agg) {
        Some(func) => func,
        None => panic!("Aggregation is not an aggregate function: {}", expr.op()),
    };
    match kind {
        GroupByKind::DistinctOn => assert!(
            matches!(func, Some(AggFunc::FirstAgg) | Some(AggFunc::ConstAgg)),
            "DistinctOn can only use FirstAgg or ConstAgg"
        ),
        GroupByKind::GroupBy | GroupByKind::ScalarGroupBy => {
            assert!(func != Some(AggFunc::FirstAgg), "GroupBy can not use FirstAgg")
        }
    }
}

// Returns the aggregate function of the given aggregation. Some(None) is CountRows.
fn aggregate_of(memo: &Memo, agg: ExprId) -> Option<Option<AggFunc>> {
    match memo.scalar_expr(agg) {
        ScalarExpr::Agg { func, .. } => Some(Some(*func)),
        ScalarExpr::CountRows => Some(None),
        ScalarExpr::AggFilter { input, .. } => aggregate_of(memo, *input),
        ScalarExpr::AggDistinct(input) => aggregate_of(memo, *input),
        _ => None,
    }
}

fn check_scalar(memo: &Memo, expr: &ScalarExpr) {
    let relational = expr.relational_children();
    for child in expr.children() {
        let child_expr = memo.expr(child);
        if relational.contains(&child) {
            assert!(
                child_expr.is_relational(),
                "Input {} of {} is not a relational expression",
                child,
                expr.op()
            );
            continue;
        }
        assert!(
            child_expr.is_scalar(),
            "Child {} of {} is not a scalar expression",
            child,
            expr.op()
        );
        assert!(
            !child_expr.op().is_list_item(),
            "List item {} can not be a child of {}",
            child_expr.op(),
            expr.op()
        );
    }

    match expr {
        ScalarExpr::Const(value) => assert!(!value.is_null(), "Const can not hold NULL. Use Null instead"),
        ScalarExpr::Variable(col) => check_column(memo, col.index()),
        ScalarExpr::AggDistinct(input) => assert!(
            memo.scalar_expr(*input).op() != Operator::AggFilter,
            "AggFilter must wrap AggDistinct, not the other way around"
        ),
        ScalarExpr::Range(input) => {
            let props = memo.scalar_props(*input);
            assert!(props.tight, "Range condition must have tight constraints");
            let cols = props.constraints.as_ref().map(|c| c.constrained_cols()).unwrap_or_default();
            assert_eq!(cols.len(), 1, "Range condition must refer to exactly one column");
        }
        _ => {}
    }
}

fn check_column(memo: &Memo, index: usize) {
    assert!(
        index > 0 && index <= memo.metadata().column_count(),
        "Unknown column id: {}",
        index
    );
}
