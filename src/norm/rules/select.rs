//! Rules for Select and rules shared by all operators with a filter list.

use crate::memo::ExprId;
use crate::meta::ColumnId;
use crate::norm::funcs::{has_duplicates, is_sorted, remove_duplicates};
use crate::norm::rules::{Captures, NormRule};
use crate::norm::{Factory, RuleName};
use crate::operators::relational::JoinKind;
use crate::operators::{Expr, Operator, RelExpr, ScalarExpr};

const SELECT: &[Operator] = &[Operator::Select];

const FILTERED: &[Operator] = &[
    Operator::Select,
    Operator::InnerJoin,
    Operator::LeftJoin,
    Operator::FullJoin,
    Operator::SemiJoin,
    Operator::AntiJoin,
];

pub(super) static RULES: &[NormRule] = &[
    NormRule {
        name: RuleName::EliminateSelect,
        ops: SELECT,
        matcher: match_eliminate_select,
        replace: replace_with_captured,
    },
    NormRule {
        name: RuleName::DetectSelectContradiction,
        ops: SELECT,
        matcher: match_select_contradiction,
        replace: replace_with_empty_values,
    },
    NormRule {
        name: RuleName::SimplifySelectFilters,
        ops: SELECT,
        matcher: match_simplify_select_filters,
        replace: simplify_select_filters,
    },
    NormRule {
        name: RuleName::RemoveDuplicateFilters,
        ops: FILTERED,
        matcher: match_duplicate_filters,
        replace: remove_duplicate_filters,
    },
    NormRule {
        name: RuleName::ConsolidateSelectFilters,
        ops: SELECT,
        matcher: match_consolidate_filters,
        replace: consolidate_filters,
    },
    NormRule {
        name: RuleName::SortFilters,
        ops: FILTERED,
        matcher: match_unsorted_filters,
        replace: sort_filters,
    },
    NormRule {
        name: RuleName::MergeSelects,
        ops: SELECT,
        matcher: match_merge_selects,
        replace: merge_selects,
    },
    NormRule {
        name: RuleName::PushSelectIntoJoinLeft,
        ops: SELECT,
        matcher: match_push_select_into_join_left,
        replace: push_select_into_join_left,
    },
    NormRule {
        name: RuleName::PushSelectIntoJoinRight,
        ops: SELECT,
        matcher: match_push_select_into_join_right,
        replace: push_select_into_join_right,
    },
];

/// Returns the first captured expression.
pub(super) fn replace_with_captured(_f: &mut Factory, _expr: &Expr, captures: Captures) -> ExprId {
    captures.exprs[0]
}

/// Replaces an expression with an empty VALUES clause that has the captured columns.
pub(super) fn replace_with_empty_values(f: &mut Factory, _expr: &Expr, captures: Captures) -> ExprId {
    f.construct_empty_values(&captures.cols)
}

/// The filter list of a select or a join.
pub(super) fn filters_of(expr: &Expr) -> Option<&[ExprId]> {
    match expr {
        Expr::Relational(RelExpr::Select { filters, .. }) => Some(filters),
        Expr::Relational(RelExpr::Join { on, .. }) => Some(on),
        _ => None,
    }
}

/// Builds a copy of a select or a join with the given filter list.
pub(super) fn with_filters(f: &mut Factory, expr: &Expr, filters: Vec<ExprId>) -> ExprId {
    match expr {
        Expr::Relational(RelExpr::Select { input, .. }) => f.construct_select(*input, filters),
        Expr::Relational(RelExpr::Join {
            kind,
            left,
            right,
            flags,
            ..
        }) => f.construct_join(*kind, *left, *right, filters, *flags),
        other => unreachable!("Unexpected expression: {:?}", other),
    }
}

fn match_eliminate_select(_f: &Factory, expr: &Expr) -> Option<Captures> {
    let (input, filters) = match_expr!(expr, Expr::Relational(RelExpr::Select { input, filters }) => (*input, filters));
    filters.is_empty().then(|| Captures::expr(input))
}

fn match_select_contradiction(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (input, filters) = match_expr!(expr, Expr::Relational(RelExpr::Select { input, filters }) => (*input, filters));
    if filters.iter().any(|item| f.is_contradiction(*item)) {
        Some(Captures::cols(f.output_cols(input).clone()))
    } else {
        None
    }
}

fn match_simplify_select_filters(f: &Factory, expr: &Expr) -> Option<Captures> {
    let filters = match_expr!(expr, Expr::Relational(RelExpr::Select { filters, .. }) => filters);
    f.can_simplify_filters(filters).then(Captures::empty)
}

fn simplify_select_filters(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let (input, filters) = expect_expr!(expr, Expr::Relational(RelExpr::Select { input, filters }) => (*input, filters));
    let filters = f.simplify_filters(filters);
    f.construct_select(input, filters)
}

fn match_duplicate_filters(_f: &Factory, expr: &Expr) -> Option<Captures> {
    let filters = filters_of(expr)?;
    has_duplicates(filters).then(Captures::empty)
}

fn remove_duplicate_filters(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let filters = filters_of(expr).map(remove_duplicates).unwrap_or_default();
    with_filters(f, expr, filters)
}

// The column a filter constrains when the filter can be part of a range.
fn range_col(f: &Factory, item: ExprId) -> Option<ColumnId> {
    let props = f.memo.scalar_props(item);
    if !props.tight || props.has_subquery {
        return None;
    }
    let constraints = props.constraints.as_ref()?;
    if constraints.is_contradiction() {
        return None;
    }
    constraints.constrained_cols().single_column()
}

fn match_consolidate_filters(f: &Factory, expr: &Expr) -> Option<Captures> {
    let filters = match_expr!(expr, Expr::Relational(RelExpr::Select { filters, .. }) => filters);
    let cols: Vec<_> = filters.iter().map(|item| range_col(f, *item)).collect();
    for (i, col) in cols.iter().enumerate() {
        let col = match col {
            Some(col) => *col,
            None => continue,
        };
        let items: Vec<_> = filters[i..]
            .iter()
            .zip(cols[i..].iter())
            .filter(|(_, c)| **c == Some(col))
            .map(|(item, _)| *item)
            .collect();
        if items.len() > 1 {
            return Some(Captures::list(items));
        }
    }
    None
}

fn consolidate_filters(f: &mut Factory, expr: &Expr, captures: Captures) -> ExprId {
    let (input, filters) = expect_expr!(expr, Expr::Relational(RelExpr::Select { input, filters }) => (*input, filters));
    let items = &captures.lists[0];
    let conditions: Vec<_> = items
        .iter()
        .map(|item| {
            let condition = f.condition(*item);
            match f.scalar_of(condition) {
                ScalarExpr::Range(inner) => *inner,
                _ => condition,
            }
        })
        .collect();

    let conjunction = f.construct_conjunction(&conditions);
    let props = f.memo.scalar_props(conjunction);
    let contradiction = props.constraints.as_ref().map(|c| c.is_contradiction()).unwrap_or_default();
    if contradiction || f.is_false(conjunction) {
        let cols = f.output_cols(input).clone();
        return f.construct_empty_values(&cols);
    }

    let range = f.construct_range(conjunction);
    let mut new_filters: Vec<_> = filters.iter().filter(|item| !items.contains(item)).copied().collect();
    new_filters.push(f.construct_filters_item(range));
    f.construct_select(input, new_filters)
}

fn match_unsorted_filters(_f: &Factory, expr: &Expr) -> Option<Captures> {
    let filters = filters_of(expr)?;
    (!is_sorted(filters)).then(Captures::empty)
}

fn sort_filters(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let mut filters = filters_of(expr).map(|f| f.to_vec()).unwrap_or_default();
    filters.sort();
    with_filters(f, expr, filters)
}

fn match_merge_selects(f: &Factory, expr: &Expr) -> Option<Captures> {
    let input = match_expr!(expr, Expr::Relational(RelExpr::Select { input, .. }) => *input);
    match f.memo.rel_expr(input) {
        RelExpr::Select { input, filters } => Some(Captures {
            exprs: vec![*input],
            lists: vec![filters.clone()],
            ..Default::default()
        }),
        _ => None,
    }
}

fn merge_selects(f: &mut Factory, expr: &Expr, captures: Captures) -> ExprId {
    let filters = expect_expr!(expr, Expr::Relational(RelExpr::Select { filters, .. }) => filters);
    let mut merged = captures.lists[0].clone();
    merged.extend_from_slice(filters);
    f.construct_select(captures.exprs[0], merged)
}

// Matches a select on top of a join of one of the given kinds whose filters can be pushed into
// one side of the join.
fn match_push_select(f: &Factory, expr: &Expr, kinds: &[JoinKind], into_left: bool) -> Option<Captures> {
    let (input, filters) = match_expr!(expr, Expr::Relational(RelExpr::Select { input, filters }) => (*input, filters));
    let (kind, left, right) = match f.memo.rel_expr(input) {
        RelExpr::Join { kind, left, right, .. } => (*kind, *left, *right),
        _ => return None,
    };
    if !kinds.contains(&kind) {
        return None;
    }
    let (bound, other) = if into_left { (left, right) } else { (right, left) };
    f.any_filter_bound_by(filters, f.output_cols(bound), f.output_cols(other))
        .then(Captures::empty)
}

fn push_select(f: &mut Factory, expr: &Expr, into_left: bool) -> ExprId {
    let (input, filters) = expect_expr!(expr, Expr::Relational(RelExpr::Select { input, filters }) => (*input, filters));
    let (kind, left, right, on, flags) = expect_expr!(
        f.memo.rel_expr(input),
        RelExpr::Join { kind, left, right, on, flags } => (*kind, *left, *right, on.clone(), *flags)
    );
    let (bound, other) = if into_left { (left, right) } else { (right, left) };
    let (pushed, remaining) = f.split_filters(filters, &f.output_cols(bound).clone(), &f.output_cols(other).clone());

    let filtered = f.construct_select(bound, pushed);
    let join = if into_left {
        f.construct_join(kind, filtered, right, on, flags)
    } else {
        f.construct_join(kind, left, filtered, on, flags)
    };
    if remaining.is_empty() {
        join
    } else {
        f.construct_select(join, remaining)
    }
}

fn match_push_select_into_join_left(f: &Factory, expr: &Expr) -> Option<Captures> {
    match_push_select(f, expr, &[JoinKind::Inner, JoinKind::Left, JoinKind::Semi, JoinKind::Anti], true)
}

fn push_select_into_join_left(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    push_select(f, expr, true)
}

fn match_push_select_into_join_right(f: &Factory, expr: &Expr) -> Option<Captures> {
    match_push_select(f, expr, &[JoinKind::Inner], false)
}

fn push_select_into_join_right(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    push_select(f, expr, false)
}

#[cfg(test)]
mod test {
    use crate::norm::rules::testing::NormTester;
    use crate::norm::{RuleName, RuleSet};
    use crate::operators::scalar::CmpOp;

    #[test]
    fn test_eliminate_select() {
        let mut t = NormTester::new();
        let scan = t.scan_t1();
        let select = t.select(scan, &[]);
        assert_eq!(select, scan);

        let tru = t.f.construct_true();
        let select = t.select(scan, &[tru]);
        assert_eq!(select, scan);
    }

    #[test]
    fn test_remove_duplicate_filters() {
        let mut t = NormTester::new();
        let a = t.t1_col(0);
        let scan = t.scan_t1();
        let eq1 = t.eq(a, 1);
        let eq2 = t.eq(a, 1);
        let select = t.select(scan, &[eq1, eq2]);
        t.expect(
            select,
            r#"
select filters=[col:1 = 1]
  scan table=t1 cols=[1, 2, 3]
"#,
        );
    }

    #[test]
    fn test_contradiction() {
        let mut t = NormTester::new();
        let a = t.t1_col(0);
        let scan = t.scan_t1();
        let gt = t.cmp(CmpOp::Gt, a, 1);
        let lt = t.cmp(CmpOp::Lt, a, 1);
        let select = t.select(scan, &[gt, lt]);
        t.expect(select, "values cols=[1, 2, 3]");

        let fls = t.f.construct_false();
        let select = t.select(scan, &[fls]);
        t.expect(select, "values cols=[1, 2, 3]");
    }

    #[test]
    fn test_consolidate_filters() {
        let mut t = NormTester::new();
        let a = t.t1_col(0);
        let b = t.t1_col(1);
        let scan = t.scan_t1();
        let gt = t.cmp(CmpOp::Gt, a, 1);
        let eq = t.eq(b, 2);
        let lt = t.cmp(CmpOp::Lt, a, 10);
        let select = t.select(scan, &[gt, eq, lt]);
        t.expect(
            select,
            r#"
select filters=[col:2 = 2, range(col:1 > 1 AND col:1 < 10)]
  scan table=t1 cols=[1, 2, 3]
"#,
        );
    }

    #[test]
    fn test_sort_filters() {
        let mut t = NormTester::new();
        let b = t.t1_col(1);
        let c = t.t1_col(2);
        let scan = t.scan_t1();
        let first = t.eq(b, 1);
        let second = t.eq(c, 2);
        let select = t.select(scan, &[second, first]);
        t.expect(
            select,
            r#"
select filters=[col:2 = 1, col:3 = 2]
  scan table=t1 cols=[1, 2, 3]
"#,
        );
    }

    #[test]
    fn test_merge_selects() {
        let mut t = NormTester::new();
        let b = t.t1_col(1);
        let c = t.t1_col(2);
        let scan = t.scan_t1();
        let eq_b = t.eq(b, 1);
        let eq_c = t.eq(c, 2);
        let inner = t.select(scan, &[eq_c]);
        let outer = t.select(inner, &[eq_b]);
        t.expect(
            outer,
            r#"
select filters=[col:2 = 1, col:3 = 2]
  scan table=t1 cols=[1, 2, 3]
"#,
        );
    }

    #[test]
    fn test_push_select_into_join() {
        let mut t = NormTester::new();
        let a = t.t1_col(0);
        let x = t.t2_col(0);
        let y = t.t2_col(1);
        let t1 = t.scan_t1();
        let t2 = t.scan_t2();
        let join = t.f.construct_inner_join(t1, t2, vec![]);

        let a_eq = t.eq(a, 1);
        let y_eq = t.eq(y, 2);
        let va = t.var(a);
        let vx = t.var(x);
        let a_x = t.f.construct_eq(va, vx);
        let select = t.select(join, &[a_eq, y_eq, a_x]);
        t.expect(
            select,
            r#"
select filters=[col:1 = col:4]
  inner-join
    select filters=[col:1 = 1]
      scan table=t1 cols=[1, 2, 3]
    select filters=[col:5 = 2]
      scan table=t2 cols=[4, 5, 6]
"#,
        );
    }

    #[test]
    fn test_disabled_rule() {
        let mut t = NormTester::new();
        t.f.set_disabled_rules([RuleName::EliminateSelect].into_iter().collect::<RuleSet>());
        let scan = t.scan_t1();
        let select = t.select(scan, &[]);
        assert_ne!(select, scan);
        t.expect(select, "select\n  scan table=t1 cols=[1, 2, 3]");
    }
}
