//! Rules for GroupBy and DistinctOn.

use crate::memo::ExprId;
use crate::meta::ColumnId;
use crate::norm::rules::{Captures, NormRule};
use crate::norm::{Factory, RuleName};
use crate::operators::relational::{GroupByKind, GroupingPrivate};
use crate::operators::scalar::AggFunc;
use crate::operators::{Expr, Operator, RelExpr, ScalarExpr};
use crate::properties::ColSet;

const GROUPING: &[Operator] = &[Operator::GroupBy, Operator::DistinctOn];

pub(super) static RULES: &[NormRule] = &[
    NormRule {
        name: RuleName::ReduceGroupingCols,
        ops: GROUPING,
        matcher: match_reduce_grouping_cols,
        replace: reduce_grouping_cols,
    },
    NormRule {
        name: RuleName::ConvertGroupByToProject,
        ops: GROUPING,
        matcher: match_group_by_on_key,
        replace: convert_group_by_to_project,
    },
];

fn group_by_parts(expr: &Expr) -> Option<(GroupByKind, ExprId, &[ExprId], &GroupingPrivate)> {
    match expr {
        Expr::Relational(RelExpr::GroupBy {
            kind,
            input,
            aggregations,
            private,
        }) if *kind != GroupByKind::ScalarGroupBy => Some((*kind, *input, aggregations, private)),
        _ => None,
    }
}

fn match_reduce_grouping_cols(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (_, input, _, private) = group_by_parts(expr)?;
    let reduced = f.memo.logical(input).fd.reduce_cols(&private.grouping_cols);
    if reduced.is_empty() || reduced == private.grouping_cols {
        return None;
    }
    Some(Captures::cols(private.grouping_cols.difference(&reduced)))
}

// Grouping columns determined by other grouping columns become constant aggregates.
fn reduce_grouping_cols(f: &mut Factory, expr: &Expr, captures: Captures) -> ExprId {
    let (kind, input, aggregations, private) = expect_expr!(group_by_parts(expr), Some(parts) => parts);
    let mut aggregations = aggregations.to_vec();
    for col in captures.cols.iter() {
        let var = f.construct_variable(col);
        let agg = f.construct_agg(AggFunc::ConstAgg, var);
        aggregations.push(f.construct_aggregations_item(agg, col));
    }
    let private = GroupingPrivate {
        grouping_cols: private.grouping_cols.difference(&captures.cols),
        ordering: private.ordering.clone(),
    };
    f.construct_group_by(kind, input, aggregations, private)
}

// The input column and the output column of an aggregate that returns its argument
// when applied to a single row.
fn single_row_aggregate(f: &Factory, item: ExprId) -> Option<(ColumnId, ColumnId)> {
    let (agg, col) = match f.scalar_of(item) {
        ScalarExpr::AggregationsItem { agg, col } => (*agg, *col),
        _ => return None,
    };
    let input = match f.scalar_of(agg) {
        ScalarExpr::Agg {
            func: AggFunc::ConstAgg | AggFunc::FirstAgg | AggFunc::Min | AggFunc::Max | AggFunc::Sum | AggFunc::BoolAnd | AggFunc::BoolOr,
            input,
        } => *input,
        _ => return None,
    };
    match f.scalar_of(input) {
        ScalarExpr::Variable(var) => Some((*var, col)),
        _ => None,
    }
}

fn match_group_by_on_key(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (_, input, aggregations, private) = group_by_parts(expr)?;
    if !f.memo.logical(input).fd.colset_is_strict_key(&private.grouping_cols) {
        return None;
    }
    let all_single_row = aggregations.iter().all(|item| single_row_aggregate(f, *item).is_some());
    all_single_row.then(Captures::empty)
}

// Every group has exactly one row when the grouping columns form a strict key.
fn convert_group_by_to_project(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let (_, input, aggregations, private) = expect_expr!(group_by_parts(expr), Some(parts) => parts);
    let mut passthrough: ColSet = private.grouping_cols.clone();
    let mut projections = Vec::new();
    for item in aggregations {
        let (var, col) = expect_expr!(single_row_aggregate(f, *item), Some(cols) => cols);
        if var == col {
            passthrough.insert(col);
        } else {
            let element = f.construct_variable(var);
            projections.push(f.construct_projections_item(element, col));
        }
    }
    f.construct_project(input, projections, passthrough)
}

#[cfg(test)]
mod test {
    use crate::datatypes::DataType;
    use crate::norm::rules::testing::NormTester;
    use crate::norm::{RuleName, RuleSet};
    use crate::operators::relational::{GroupByKind, GroupingPrivate};
    use crate::operators::scalar::AggFunc;
    use crate::properties::{ColSet, OrderingChoice};

    fn grouping(cols: &[crate::meta::ColumnId]) -> GroupingPrivate {
        GroupingPrivate {
            grouping_cols: cols.iter().copied().collect(),
            ordering: OrderingChoice::any(),
        }
    }

    #[test]
    fn test_reduce_grouping_cols() {
        let mut t = NormTester::new();
        t.f.set_disabled_rules([RuleName::ConvertGroupByToProject].into_iter().collect::<RuleSet>());
        let a = t.t1_col(0);
        let b = t.t1_col(1);
        let scan = t.scan_t1();
        let group_by = t.f.construct_group_by(GroupByKind::GroupBy, scan, vec![], grouping(&[a, b]));
        t.expect(
            group_by,
            r#"
group-by aggregations=[col:2=const_agg(col:2)] grouping=[1]
  scan table=t1 cols=[1, 2, 3]
"#,
        );
    }

    #[test]
    fn test_group_by_on_key_becomes_project() {
        let mut t = NormTester::new();
        let a = t.t1_col(0);
        let b = t.t1_col(1);
        let c = t.t1_col(2);
        let max_c = t.f.metadata_mut().add_column("max_c", DataType::Int);
        let scan = t.scan_t1();

        let vc = t.var(c);
        let max = t.f.construct_agg(AggFunc::Max, vc);
        let item = t.f.construct_aggregations_item(max, max_c);
        let group_by = t.f.construct_group_by(GroupByKind::GroupBy, scan, vec![item], grouping(&[a, b]));
        t.expect(
            group_by,
            r#"
project projections=[col:7=col:3] passthrough=[1, 2]
  scan table=t1 cols=[1, 2, 3]
"#,
        );
    }

    #[test]
    fn test_group_by_not_on_key() {
        let mut t = NormTester::new();
        let b = t.t1_col(1);
        let c = t.t1_col(2);
        let cnt = t.f.metadata_mut().add_column("count", DataType::Int);
        let scan = t.scan_t1();

        let vc = t.var(c);
        let count = t.f.construct_agg(AggFunc::Count, vc);
        let item = t.f.construct_aggregations_item(count, cnt);
        let group_by = t.f.construct_group_by(GroupByKind::GroupBy, scan, vec![item], grouping(&[b]));
        t.expect(
            group_by,
            r#"
group-by aggregations=[col:7=count(col:3)] grouping=[2]
  scan table=t1 cols=[1, 2, 3]
"#,
        );
        assert_eq!(t.f.memo().logical(group_by).output_cols, ColSet::from_iter([b, cnt]));
    }
}
