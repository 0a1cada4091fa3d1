use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::catalog::{Catalog, DataSourceName, Privilege, TableBuilder, DEFAULT_SCHEMA};
use crate::datatypes::DataType;
use crate::error::{OptimizerError, SqlCode};
use crate::memo::{ExprId, Memo};
use crate::meta::ColumnId;
use crate::norm::{RuleName, RuleSet};
use crate::operators::format::{format_expr, format_memo};
use crate::operators::relational::{
    GroupByKind, GroupingPrivate, JoinFlags, JoinKind, MutationKind, MutationPrivate, ScanFlags, ScanPrivate,
    SetOpKind, SetPrivate,
};
use crate::operators::scalar::{AggFunc, CmpOp};
use crate::operators::{Expr, Operator, RelExpr, ScalarExpr};
use crate::optimizer::{OptimizerOptions, PlanExpr};
use crate::properties::physical::PhysicalProps;
use crate::properties::{ColSet, OrderingChoice, OrderingColumnChoice};
use crate::testing::OptimizerTester;

fn values_row(t: &mut OptimizerTester, values: &[i64]) -> (ExprId, Vec<ColumnId>) {
    let cols: Vec<_> = (0..values.len())
        .map(|i| t.f().metadata_mut().add_column(&format!("column{}", i + 1), DataType::Int))
        .collect();
    let elems: Vec<_> = values.iter().map(|v| t.int(*v)).collect();
    let row = t.f().construct_tuple(elems);
    let values = t.f().construct_values(vec![row], cols.clone());
    (values, cols)
}

fn ordering(cols: &[ColumnId]) -> PhysicalProps {
    PhysicalProps::with_ordering(OrderingChoice::asc(cols))
}

// Operators of the plan in pre-order.
fn plan_ops(t: &OptimizerTester, plan: &PlanExpr) -> Vec<Operator> {
    let mut ops = vec![t.optimizer.memo().rel_expr(plan.expr).op()];
    for input in plan.inputs.iter().chain(plan.subqueries.iter()) {
        ops.extend(plan_ops(t, input));
    }
    ops
}

fn delete_private(t: &OptimizerTester, table: crate::meta::TableId) -> MutationPrivate {
    let fetch_cols = ["a1", "a2", "a3"].iter().map(|c| Some(t.col(table, c))).collect();
    MutationPrivate {
        table,
        insert_cols: vec![],
        fetch_cols,
        update_cols: vec![],
        returning: false,
    }
}

#[test]
fn test_constant_filters_are_removed() {
    let mut t = OptimizerTester::new();
    let (values, _) = values_row(&mut t, &[1]);

    let tru = t.f().construct_true();
    let both = t.f().construct_and(tru, tru);
    let one_a = t.int(1);
    let one_b = t.int(1);
    let one_eq_one = t.f().construct_eq(one_a, one_b);
    let condition = t.f().construct_and(both, one_eq_one);
    let select = t.select(values, &[condition]);

    t.expect_expr(select, "values cols=[1] rows=[(1)]");
    t.expect_plan(
        select,
        PhysicalProps::any(),
        r#"
        query: SELECT 1 WHERE TRUE AND TRUE AND 1=1
        values cols=[1] rows=[(1)]
        "#,
    );
}

#[test]
fn test_duplicate_conjuncts() {
    let mut t = OptimizerTester::new();
    let (scan, a) = t.scan("a");
    let a1 = t.col(a, "a1");

    let left = t.eq(a1, 5);
    let right = t.eq(a1, 5);
    let condition = t.f().construct_and(left, right);
    let select = t.select(scan, &[condition]);
    t.expect_expr(
        select,
        r#"
select filters=[col:1 = 5]
  scan table=a cols=[1, 2, 3]
"#,
    );
}

#[test]
fn test_tuple_equality_is_split() {
    let mut t = OptimizerTester::new();
    let (scan, a) = t.scan("a");
    let a1 = t.var(t.col(a, "a1"));
    let a2 = t.var(t.col(a, "a2"));
    let one = t.int(1);
    let two = t.int(2);

    let left = t.f().construct_tuple(vec![a1, a2]);
    let right = t.f().construct_tuple(vec![one, two]);
    let eq = t.f().construct_eq(left, right);
    let select = t.select(scan, &[eq]);
    t.expect_expr(
        select,
        r#"
select filters=[col:1 = 1, col:2 = 2]
  scan table=a cols=[1, 2, 3]
"#,
    );
}

#[test]
fn test_duplicate_disjuncts() {
    let mut t = OptimizerTester::new();
    let (scan, a) = t.scan("a");
    let a2 = t.var(t.col(a, "a2"));

    let left = t.f().construct_is_null(a2);
    let right = t.f().construct_is_null(a2);
    let or = t.f().construct_or(left, right);
    let select = t.select(scan, &[or]);
    t.expect_expr(
        select,
        r#"
select filters=[col:2 IS NULL]
  scan table=a cols=[1, 2, 3]
"#,
    );
}

#[test]
fn test_coalesce_skips_leading_nulls() {
    let mut t = OptimizerTester::new();
    let a = t.table("a");
    let x = t.var(t.col(a, "a1"));
    let y = t.var(t.col(a, "a2"));
    let null = t.f().construct_null(DataType::Unknown);

    let coalesce = t.f().construct_coalesce(vec![null, null, x, y]);
    t.expect_expr(coalesce, "coalesce(col:1, col:2)");
}

#[test]
fn test_limit_above_max_cardinality() {
    let mut t = OptimizerTester::new();
    let (values, _) = values_row(&mut t, &[1, 2]);
    let limit = t.int(5);
    let limit = t.f().construct_limit(values, limit, OrderingChoice::any());
    assert_eq!(limit, values);

    let (scan, _) = t.scan("a");
    let ten = t.int(10);
    let limit = t.f().construct_limit(scan, ten, OrderingChoice::any());
    assert_ne!(limit, scan);
    let one = t.int(1);
    let outer = t.f().construct_limit(limit, one, OrderingChoice::any());
    assert_eq!(t.optimizer.memo().logical(outer).cardinality.max, 1);
}

#[test]
fn test_redundant_disjunct_is_pushed_into_join() {
    let mut t = OptimizerTester::new();
    let (scan_a, a) = t.scan("a");
    let (scan_b, b) = t.scan("b");
    let a1 = t.col(a, "a1");
    let a2 = t.col(a, "a2");
    let b2 = t.col(b, "b2");

    let cond_a = t.eq(a1, 1);
    let cond_b = t.eq(a2, 2);
    let cond_c = t.eq(b2, 3);
    let left = t.f().construct_and(cond_a, cond_b);
    let right = t.f().construct_and(cond_a, cond_c);
    let or = t.f().construct_or(left, right);

    let join = t.inner_join(scan_a, scan_b, &[]);
    let select = t.select(join, &[or]);
    t.expect_expr(
        select,
        r#"
select filters=[(col:2 = 2 OR col:5 = 3)]
  inner-join
    select filters=[col:1 = 1]
      scan table=a cols=[1, 2, 3]
    scan table=b cols=[4, 5, 6]
"#,
    );
}

#[test]
fn test_copy_and_replace_identity() {
    let mut t = OptimizerTester::new();
    let (scan_a, a) = t.scan("a");
    let (scan_b, b) = t.scan("b");
    let eq = t.cols_eq(t.col(a, "a1"), t.col(b, "b1"));
    let filter = t.eq(t.col(b, "b2"), 10);
    // Rewritten into two conjuncts by normalization.
    let a1 = t.var(t.col(a, "a1"));
    let a2 = t.var(t.col(a, "a2"));
    let one = t.int(1);
    let two = t.int(2);
    let left = t.f().construct_tuple(vec![a1, a2]);
    let right = t.f().construct_tuple(vec![one, two]);
    let tuple_eq = t.f().construct_eq(left, right);
    let join = t.inner_join(scan_a, scan_b, &[eq, filter, tuple_eq]);
    t.optimizer.set_root(join, PhysicalProps::any());

    let memo = t.optimizer.detach_memo();
    let expected = format_expr(&memo, join);
    let copy = t.optimizer.copy_and_replace(&memo, join, &PhysicalProps::any(), |_, _, _| None);
    let copied = t.optimizer.memo();

    assert_eq!(format_expr(copied, copy), expected);
    assert_eq!(reachable_exprs(copied, copy), reachable_exprs(&memo, join));
    assert_eq!(copied.num_groups(), memo.num_groups());
    assert!(copied.logical(copy).equivalent(memo.logical(join)));
    assert_eq!(t.optimizer.metadata().column_count(), memo.metadata().column_count());
    assert!(copied.root().is_some());
    t.optimizer.optimize().unwrap();
}

// The number of distinct expressions reachable from the given expression.
fn reachable_exprs(memo: &Memo, root: ExprId) -> usize {
    let mut visited = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if visited.insert(id) {
            stack.extend(memo.expr(id).children());
        }
    }
    visited.len()
}

#[test]
fn test_replace_placeholders() {
    let mut t = OptimizerTester::new();
    let (scan, a) = t.scan("a");
    let a1 = t.var(t.col(a, "a1"));
    let placeholder = t.f().construct_placeholder(1, DataType::Int);
    let eq = t.f().construct_eq(a1, placeholder);
    let select = t.select(scan, &[eq]);
    t.expect_expr(
        select,
        r#"
select filters=[col:1 = $1]
  scan table=a cols=[1, 2, 3]
"#,
    );

    let memo = t.optimizer.detach_memo();
    let root = t.optimizer.copy_and_replace(&memo, select, &PhysicalProps::any(), |f, from, id| {
        match from.expr(id) {
            Expr::Scalar(ScalarExpr::Placeholder { index: 1, .. }) => Some(f.construct_int(7)),
            _ => None,
        }
    });
    t.expect_expr(
        root,
        r#"
select filters=[col:1 = 7]
  scan table=a cols=[1, 2, 3]
"#,
    );
}

#[test]
fn test_group_by_key_becomes_project() {
    let mut t = OptimizerTester::new();
    let (scan, a) = t.scan("a");
    let a1 = t.col(a, "a1");
    let a3 = t.var(t.col(a, "a3"));
    let max_col = t.f().metadata_mut().add_column("max", DataType::String);

    let max = t.f().construct_agg(AggFunc::Max, a3);
    let item = t.f().construct_aggregations_item(max, max_col);
    let private = GroupingPrivate {
        grouping_cols: [a1].into_iter().collect::<ColSet>(),
        ordering: OrderingChoice::any(),
    };
    let group_by = t.f().construct_group_by(GroupByKind::GroupBy, scan, vec![item], private);
    t.expect_expr(
        group_by,
        r#"
project projections=[col:4=col:3] passthrough=[1]
  scan table=a cols=[1, 2, 3]
"#,
    );
}

#[test]
fn test_set_op_with_empty_input() {
    let mut t = OptimizerTester::new();
    let (scan, _) = t.scan("a");
    let cols = t.optimizer.memo().logical(scan).output_cols.clone();
    let empty = t.f().construct_empty_values(&cols);
    let out_cols: Vec<_> = (0..3)
        .map(|i| t.f().metadata_mut().add_column(&format!("out{}", i), DataType::Int))
        .collect();
    let private = SetPrivate {
        left_cols: cols.to_vec(),
        right_cols: cols.to_vec(),
        out_cols,
    };

    let intersect = t.f().construct_set_op(SetOpKind::Intersect, scan, empty, private);
    t.expect_expr(intersect, "values cols=[4, 5, 6]");
    t.expect_plan(intersect, PhysicalProps::any(), "values cols=[4, 5, 6]");
}

#[test]
fn test_filter_order_is_canonical() {
    let mut t = OptimizerTester::new();
    let (scan, a) = t.scan("a");
    let a1 = t.col(a, "a1");
    let a2 = t.col(a, "a2");
    let a3 = t.var(t.col(a, "a3"));

    let mut conditions = vec![t.eq(a2, 1), t.cmp(CmpOp::Gt, a1, 5)];
    let null = t.f().construct_null(DataType::Unknown);
    conditions.push(t.f().construct_comparison(CmpOp::IsNot, a3, null));

    let expected = t.select(scan, &conditions);
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..10 {
        conditions.shuffle(&mut rng);
        let select = t.select(scan, &conditions);
        assert_eq!(select, expected, "{}", t.format(select));
    }
}

#[test]
fn test_normalized_expressions_are_fixed_points() {
    let mut t = OptimizerTester::new();
    let (scan_a, a) = t.scan("a");
    let (scan_b, b) = t.scan("b");
    let eq = t.cols_eq(t.col(a, "a1"), t.col(b, "b1"));
    let gt = t.cmp(CmpOp::Gt, t.col(a, "a2"), 10);
    let join = t.inner_join(scan_a, scan_b, &[eq, gt]);
    let ten = t.int(10);
    let limit = t.f().construct_limit(join, ten, OrderingChoice::any());

    let exprs: Vec<_> = t
        .optimizer
        .memo()
        .exprs()
        .filter(|(_, expr)| expr.is_relational())
        .map(|(id, _)| id)
        .collect();
    for id in exprs {
        if t.optimizer.memo().normalized(id) == id {
            assert_eq!(t.f().reconstruct(id), id, "Not a fixed point: {}", t.format(id));
        }
    }
    assert_eq!(t.f().reconstruct(limit), limit);
}

#[test]
fn test_disable_optimizations() {
    let mut t = OptimizerTester::new();
    t.optimizer.disable_optimizations();
    let (scan, a) = t.scan("a");
    let a1 = t.col(a, "a1");
    let first = t.eq(a1, 1);
    let second = t.eq(a1, 1);
    let select = t.select(scan, &[first, second]);
    t.expect_expr(
        select,
        r#"
select filters=[col:1 = 1, col:1 = 1]
  scan table=a cols=[1, 2, 3]
"#,
    );

    let plan = t.optimize(select, PhysicalProps::any());
    assert_eq!(plan_ops(&t, &plan), vec![Operator::Select, Operator::Scan]);
    assert_eq!(t.optimizer.stats().rules_applied, 0);
}

#[test]
fn test_optimization_is_deterministic() {
    fn build() -> (String, String) {
        let mut t = OptimizerTester::new();
        let (scan_a, a) = t.scan("a");
        let (scan_b, b) = t.scan("b");
        let (scan_c, c) = t.scan("c");
        let ab = t.cols_eq(t.col(a, "a1"), t.col(b, "b2"));
        let bc = t.cols_eq(t.col(b, "b1"), t.col(c, "c1"));
        let join = t.inner_join(scan_a, scan_b, &[ab]);
        let join = t.inner_join(join, scan_c, &[bc]);
        let plan = t.optimize(join, ordering(&[t.col(a, "a1")]));
        (t.format_plan(&plan), format_memo(t.optimizer.memo()))
    }

    let (plan1, memo1) = build();
    let (plan2, memo2) = build();
    assert_eq!(plan1, plan2);
    assert_eq!(memo1, memo2);
}

#[test]
fn test_scan_ordered_by_primary_key() {
    let mut t = OptimizerTester::new();
    let (scan, a) = t.scan("a");
    let a1 = t.col(a, "a1");
    t.expect_plan(
        scan,
        ordering(&[a1]),
        r#"
        query: SELECT * FROM a ORDER BY a1
        scan table=a cols=[1, 2, 3] provided=+1
        "#,
    );
    assert!(t.optimizer.stats().enforcers >= 1);
}

#[test]
fn test_sort_enforcer() {
    let mut t = OptimizerTester::new();
    let (scan, a) = t.scan("a");
    let a3 = t.col(a, "a3");
    t.expect_plan(
        scan,
        ordering(&[a3]),
        r#"
        query: SELECT * FROM a ORDER BY a3
        sort ordering=+3 provided=+3
          scan table=a cols=[1, 2, 3]
        "#,
    );

    let memo = t.optimizer.memo();
    let scan_group = memo.group_of(scan);
    assert!(memo.group_exprs(scan_group).all(|e| memo.rel_expr(e).op() != Operator::Sort));
    let sorts: Vec<_> = memo
        .exprs()
        .filter(|(_, expr)| matches!(expr, Expr::Relational(RelExpr::Sort { .. })))
        .map(|(id, _)| id)
        .collect();
    assert_eq!(sorts.len(), 1, "{}", format_memo(memo));
    assert_ne!(memo.group_of(sorts[0]), scan_group);
    assert_eq!(memo.group_of(memo.rel_expr(sorts[0]).inputs()[0]), scan_group);
}

#[test]
fn test_presentation() {
    let mut t = OptimizerTester::new();
    let (scan, c) = t.scan("c");
    let c1 = t.col(c, "c1");
    let required = PhysicalProps::any().with_presentation(vec![("id".to_string(), c1)]);
    t.expect_plan(
        scan,
        required,
        r#"
        presentation: id:1
        scan table=c cols=[1, 2]
        "#,
    );
}

#[test]
fn test_covering_index_scan() {
    let mut t = OptimizerTester::new();
    let (scan, _) = t.scan("b");
    t.expect_plan(
        scan,
        PhysicalProps::any(),
        r#"
        query: SELECT * FROM b
        scan table=b cols=[1, 2, 3] index=b_b2
        "#,
    );
}

#[test]
fn test_force_index() {
    let mut t = OptimizerTester::new();
    let b = t.table("b");
    let cols = t.optimizer.metadata().table(b).readable_cols();

    let mut primary = ScanPrivate::new(b, cols.clone());
    primary.flags = ScanFlags {
        no_index_join: false,
        force_index: true,
        index: 0,
    };
    let scan = t.f().construct_scan(primary);
    t.expect_plan(
        scan,
        PhysicalProps::any(),
        r#"
        query: SELECT * FROM b@primary
        scan table=b cols=[1, 2, 3] flags=force-index
        "#,
    );

    let mut t = OptimizerTester::new();
    let b = t.table("b");
    let mut secondary = ScanPrivate::new(b, cols);
    secondary.flags = ScanFlags {
        no_index_join: false,
        force_index: true,
        index: 1,
    };
    let scan = t.f().construct_scan(secondary);
    let b1 = t.col(b, "b1");
    t.expect_plan(
        scan,
        ordering(&[b1]),
        r#"
        query: SELECT * FROM b@b_b2 ORDER BY b1
        sort ordering=+1 provided=+1
          scan table=b cols=[1, 2, 3] index=b_b2 flags=force-index
        "#,
    );
}

#[test]
fn test_join_alternatives() {
    let mut t = OptimizerTester::new();
    let (scan_a, a) = t.scan("a");
    let (scan_b, b) = t.scan("b");
    let eq = t.cols_eq(t.col(a, "a1"), t.col(b, "b1"));
    let join = t.inner_join(scan_a, scan_b, &[eq]);

    let plan = t.optimize(join, PhysicalProps::any());
    let ops = plan_ops(&t, &plan);
    assert!(
        matches!(ops[0], Operator::InnerJoin | Operator::MergeJoin | Operator::LookupJoin),
        "Unexpected plan:\n{}",
        t.format_plan(&plan)
    );

    let memo = t.optimizer.memo();
    let group = memo.group_of(join);
    let alternatives: Vec<_> = memo.group_exprs(group).map(|e| memo.rel_expr(e).op()).collect();
    assert!(alternatives.contains(&Operator::MergeJoin), "{:?}", alternatives);
    assert!(alternatives.contains(&Operator::LookupJoin), "{:?}", alternatives);
    assert!(alternatives.iter().filter(|op| **op == Operator::InnerJoin).count() >= 2, "{:?}", alternatives);

    let stats = t.optimizer.stats();
    assert!(stats.groups_optimized >= 3, "{:?}", stats);
    assert!(stats.alternatives_costed > stats.groups_optimized, "{:?}", stats);
    assert!(stats.rules_applied > 0, "{:?}", stats);
}

#[test]
fn test_merge_join_provided_ordering() {
    let mut t = OptimizerTester::new();
    let (scan_a, a) = t.scan("a");
    let (scan_b, b) = t.scan("b");
    let a1 = t.col(a, "a1");
    let b1 = t.col(b, "b1");
    let eq = t.cols_eq(a1, b1);
    let on = t.f().construct_filters(&[eq]);
    let flags = JoinFlags::NO_HASH_JOIN.with(JoinFlags::NO_LOOKUP_JOIN);
    let join = t.f().construct_join(JoinKind::Inner, scan_a, scan_b, on, flags);

    let mut group = ColSet::single(a1);
    group.insert(b1);
    let required = OrderingChoice::new(vec![OrderingColumnChoice {
        group,
        descending: false,
    }]);
    assert_eq!(required.to_string(), "+(1|4)");

    let plan = t.optimize(join, PhysicalProps::with_ordering(required.clone()));
    let formatted = t.format_plan(&plan);
    assert_eq!(plan_ops(&t, &plan)[0], Operator::MergeJoin, "{}", formatted);
    assert_eq!(plan.provided.to_string(), "+1", "{}", formatted);
    assert!(plan.provided.implies(&required));
    assert!(!formatted.contains('|'), "{}", formatted);

    for input in plan.inputs.iter() {
        assert_eq!(input.provided.len(), 1, "{}", formatted);
        let col = input.provided.columns()[0].group.single_column();
        assert!(col == Some(a1) || col == Some(b1), "{}", formatted);
    }
}

#[test]
fn test_merge_join_reports_ordering_when_not_required() {
    let mut t = OptimizerTester::new();
    let (scan_a, a) = t.scan("a");
    let (scan_b, b) = t.scan("b");
    let a1 = t.col(a, "a1");
    let b1 = t.col(b, "b1");
    let eq = t.cols_eq(a1, b1);
    let on = t.f().construct_filters(&[eq]);
    let flags = JoinFlags::NO_HASH_JOIN.with(JoinFlags::NO_LOOKUP_JOIN);
    let join = t.f().construct_join(JoinKind::Inner, scan_a, scan_b, on, flags);

    let plan = t.optimize(join, PhysicalProps::any());
    let formatted = t.format_plan(&plan);
    assert_eq!(plan_ops(&t, &plan)[0], Operator::MergeJoin, "{}", formatted);

    let col = plan.provided.columns().first().and_then(|c| c.group.single_column());
    assert!(col == Some(a1) || col == Some(b1), "{}", formatted);
    assert_eq!(plan.provided.len(), 1, "{}", formatted);
}

#[test]
fn test_join_hints() {
    let mut t = OptimizerTester::new();
    let (scan_a, a) = t.scan("a");
    let (scan_b, b) = t.scan("b");
    let eq = t.cols_eq(t.col(a, "a1"), t.col(b, "b1"));
    let on = t.f().construct_filters(&[eq]);
    let flags = JoinFlags::NO_MERGE_JOIN.with(JoinFlags::NO_LOOKUP_JOIN);
    let join = t.f().construct_join(JoinKind::Inner, scan_a, scan_b, on, flags);

    let plan = t.optimize(join, PhysicalProps::any());
    assert_eq!(plan_ops(&t, &plan)[0], Operator::InnerJoin, "{}", t.format_plan(&plan));

    let memo = t.optimizer.memo();
    let alternatives: Vec<_> = memo.group_exprs(memo.group_of(join)).map(|e| memo.rel_expr(e).op()).collect();
    assert!(!alternatives.contains(&Operator::MergeJoin), "{:?}", alternatives);
    assert!(!alternatives.contains(&Operator::LookupJoin), "{:?}", alternatives);
}

#[test]
fn test_disabled_exploration_rules() {
    let options = OptimizerOptions::default()
        .with_check_expressions(true)
        .with_disabled_rules([RuleName::CommuteJoin, RuleName::GenerateLookupJoins].into_iter().collect::<RuleSet>());
    let mut t = OptimizerTester::with_options(options);
    let (scan_a, a) = t.scan("a");
    let (scan_b, b) = t.scan("b");
    let eq = t.cols_eq(t.col(a, "a1"), t.col(b, "b1"));
    let join = t.inner_join(scan_a, scan_b, &[eq]);
    t.optimize(join, PhysicalProps::any());

    let memo = t.optimizer.memo();
    let alternatives: Vec<_> = memo.group_exprs(memo.group_of(join)).map(|e| memo.rel_expr(e).op()).collect();
    assert_eq!(alternatives.iter().filter(|op| **op == Operator::InnerJoin).count(), 1, "{:?}", alternatives);
    assert!(!alternatives.contains(&Operator::LookupJoin), "{:?}", alternatives);
}

#[test]
fn test_exploration_disabled() {
    let options = OptimizerOptions::default().with_check_expressions(true).with_explore(false);
    let mut t = OptimizerTester::with_options(options);
    let (scan, _) = t.scan("b");
    let plan = t.optimize(scan, PhysicalProps::any());
    assert_eq!(t.format_plan(&plan), "scan table=b cols=[1, 2, 3]");
    assert_eq!(t.optimizer.memo().group_exprs(t.optimizer.memo().group_of(scan)).count(), 1);
}

#[test]
fn test_rule_notifications() {
    let mut t = OptimizerTester::new();
    let applied = Rc::new(RefCell::new(Vec::new()));
    let collected = applied.clone();
    t.optimizer.notify_on_applied_rule(move |rule, _, _| collected.borrow_mut().push(rule));
    t.optimizer.notify_on_matched_rule(|rule| rule != RuleName::CommuteJoin);

    let (scan_a, a) = t.scan("a");
    let (scan_b, b) = t.scan("b");
    let eq = t.cols_eq(t.col(a, "a1"), t.col(b, "b1"));
    let join = t.inner_join(scan_a, scan_b, &[eq]);
    t.optimize(join, PhysicalProps::any());

    let applied = applied.borrow();
    assert!(applied.contains(&RuleName::GenerateMergeJoins), "{:?}", applied);
    assert!(applied.contains(&RuleName::GenerateIndexScans), "{:?}", applied);
    assert!(!applied.contains(&RuleName::CommuteJoin), "{:?}", applied);
    assert_eq!(t.optimizer.stats().rules_applied, applied.len());
}

#[test]
fn test_optimize_without_root() {
    let mut t = OptimizerTester::new();
    let err = t.optimizer.optimize().unwrap_err();
    assert!(matches!(err, OptimizerError::Internal(_)), "{}", err);
}

#[test]
fn test_memory_budget() {
    let options = OptimizerOptions::default().with_memory_budget(16);
    let mut t = OptimizerTester::with_options(options);
    let (scan, _) = t.scan("a");
    t.optimizer.set_root(scan, PhysicalProps::any());

    assert!(t.optimizer.memory_estimate() > 16);
    let err = t.optimizer.optimize().unwrap_err();
    assert!(matches!(err, OptimizerError::Resource(_)), "{}", err);
    assert_eq!(err.code(), SqlCode::OutOfMemory);
}

#[test]
fn test_stale_catalog() {
    let mut t = OptimizerTester::new();
    t.table("a");

    let table = TableBuilder::new("d").add_column("d1", DataType::Int).build().unwrap();
    t.catalog.add_table(DEFAULT_SCHEMA, table).unwrap();

    let err = t.optimizer.resolve_table(&DataSourceName::new("b")).unwrap_err();
    assert_eq!(err.code(), SqlCode::StaleCatalog);

    t.optimizer.init();
    t.optimizer.resolve_table(&DataSourceName::new("d")).unwrap();
}

#[test]
fn test_case_sensitivity() {
    let mut t = OptimizerTester::new();
    t.optimizer.resolve_table(&DataSourceName::new("A")).unwrap();

    let options = OptimizerOptions::default().with_case_sensitive(true);
    t.optimizer.set_options(options);
    // Options take effect after init.
    t.optimizer.resolve_table(&DataSourceName::new("B")).unwrap();

    t.optimizer.init();
    let err = t.optimizer.resolve_table(&DataSourceName::new("B")).unwrap_err();
    assert_eq!(err.code(), SqlCode::UndefinedTable);
}

#[test]
fn test_select_privilege() {
    let mut t = OptimizerTester::new();
    let (table, _) = t.catalog.resolve_data_source(&DataSourceName::new("a")).unwrap();
    t.catalog.deny_privilege(table.id(), Privilege::Select);
    t.optimizer.init();

    let err = t.optimizer.resolve_table(&DataSourceName::new("a")).unwrap_err();
    assert_eq!(err.code(), SqlCode::InsufficientPrivilege);
    t.optimizer.resolve_table(&DataSourceName::new("b")).unwrap();
}

#[test]
fn test_mutation_privileges() {
    let mut t = OptimizerTester::new();
    let (table, _) = t.catalog.resolve_data_source(&DataSourceName::new("a")).unwrap();
    t.catalog.deny_privilege(table.id(), Privilege::Update);
    t.optimizer.init();

    let (scan, a) = t.scan("a");
    let private = delete_private(&t, a);
    let delete = t.optimizer.construct_mutation(MutationKind::Delete, scan, private).unwrap();
    assert_eq!(t.optimizer.memo().rel_expr(delete).op(), Operator::Delete);

    let mut upsert = delete_private(&t, a);
    upsert.insert_cols = upsert.fetch_cols.clone();
    upsert.update_cols = upsert.fetch_cols.clone();
    let err = t.optimizer.construct_mutation(MutationKind::Upsert, scan, upsert).unwrap_err();
    assert_eq!(err.code(), SqlCode::InsufficientPrivilege);
}

#[test]
fn test_detach_memo() {
    let mut t = OptimizerTester::new();
    let (scan, _) = t.scan("a");
    t.optimize(scan, PhysicalProps::any());

    let memo = t.optimizer.detach_memo();
    assert!(memo.num_groups() > 0);
    assert_eq!(memo.root().map(|(root, _)| root), Some(scan));
    assert_eq!(t.optimizer.memo().num_groups(), 0);
    assert!(t.optimizer.memo().root().is_none());
}
