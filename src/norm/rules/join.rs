//! Rules for logical joins.

use crate::memo::ExprId;
use crate::norm::rules::select::{replace_with_captured, replace_with_empty_values};
use crate::norm::rules::{Captures, NormRule};
use crate::norm::{Factory, RuleName};
use crate::operators::relational::{JoinFlags, JoinKind};
use crate::operators::{Expr, Operator, RelExpr};

const JOINS: &[Operator] = &[
    Operator::InnerJoin,
    Operator::LeftJoin,
    Operator::FullJoin,
    Operator::SemiJoin,
    Operator::AntiJoin,
];

pub(super) static RULES: &[NormRule] = &[
    NormRule {
        name: RuleName::SimplifyJoinFilters,
        ops: JOINS,
        matcher: match_simplify_join_filters,
        replace: simplify_join_filters,
    },
    NormRule {
        name: RuleName::DetectJoinContradiction,
        ops: JOINS,
        matcher: match_join_contradiction,
        replace: replace_with_captured_or_empty,
    },
    NormRule {
        name: RuleName::PushFilterIntoJoinLeft,
        ops: JOINS,
        matcher: match_push_filter_into_left,
        replace: push_filter_into_left,
    },
    NormRule {
        name: RuleName::PushFilterIntoJoinRight,
        ops: JOINS,
        matcher: match_push_filter_into_right,
        replace: push_filter_into_right,
    },
    NormRule {
        name: RuleName::SimplifyZeroCardinalityJoin,
        ops: JOINS,
        matcher: match_zero_cardinality_join,
        replace: replace_with_captured_or_empty,
    },
];

type JoinParts<'a> = (JoinKind, ExprId, ExprId, &'a [ExprId], JoinFlags);

fn join_parts(expr: &Expr) -> Option<JoinParts<'_>> {
    match expr {
        Expr::Relational(RelExpr::Join {
            kind,
            left,
            right,
            on,
            flags,
        }) => Some((*kind, *left, *right, on, *flags)),
        _ => None,
    }
}

// Replaces a join with the captured expression or with an empty VALUES clause when nothing was captured.
fn replace_with_captured_or_empty(f: &mut Factory, expr: &Expr, captures: Captures) -> ExprId {
    if captures.exprs.is_empty() {
        replace_with_empty_values(f, expr, captures)
    } else {
        replace_with_captured(f, expr, captures)
    }
}

fn match_simplify_join_filters(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (_, _, _, on, _) = join_parts(expr)?;
    f.can_simplify_filters(on).then(Captures::empty)
}

fn simplify_join_filters(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let (kind, left, right, on, flags) = expect_expr!(join_parts(expr), Some(parts) => parts);
    let on = f.simplify_filters(on);
    f.construct_join(kind, left, right, on, flags)
}

fn match_join_contradiction(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (kind, left, right, on, _) = join_parts(expr)?;
    if !on.iter().any(|item| f.is_contradiction(*item)) {
        return None;
    }
    match kind {
        JoinKind::Inner | JoinKind::Semi => Some(Captures::cols(f.join_output_cols(kind, left, right))),
        JoinKind::Anti => Some(Captures::expr(left)),
        JoinKind::Left | JoinKind::Full => None,
    }
}

fn match_push_filter(f: &Factory, expr: &Expr, kinds: &[JoinKind], into_left: bool) -> Option<Captures> {
    let (kind, left, right, on, _) = join_parts(expr)?;
    if !kinds.contains(&kind) {
        return None;
    }
    let (bound, other) = if into_left { (left, right) } else { (right, left) };
    f.any_filter_bound_by(on, f.output_cols(bound), f.output_cols(other))
        .then(Captures::empty)
}

fn push_filter(f: &mut Factory, expr: &Expr, into_left: bool) -> ExprId {
    let (kind, left, right, on, flags) = expect_expr!(join_parts(expr), Some(parts) => parts);
    let (bound, other) = if into_left { (left, right) } else { (right, left) };
    let bound_cols = f.output_cols(bound).clone();
    let other_cols = f.output_cols(other).clone();
    let (pushed, remaining) = f.split_filters(on, &bound_cols, &other_cols);

    let filtered = f.construct_select(bound, pushed);
    if into_left {
        f.construct_join(kind, filtered, right, remaining, flags)
    } else {
        f.construct_join(kind, left, filtered, remaining, flags)
    }
}

fn match_push_filter_into_left(f: &Factory, expr: &Expr) -> Option<Captures> {
    match_push_filter(f, expr, &[JoinKind::Inner, JoinKind::Semi], true)
}

fn push_filter_into_left(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    push_filter(f, expr, true)
}

fn match_push_filter_into_right(f: &Factory, expr: &Expr) -> Option<Captures> {
    match_push_filter(f, expr, &[JoinKind::Inner, JoinKind::Left, JoinKind::Semi, JoinKind::Anti], false)
}

fn push_filter_into_right(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    push_filter(f, expr, false)
}

fn match_zero_cardinality_join(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (kind, left, right, _, _) = join_parts(expr)?;
    let left_zero = f.memo.logical(left).cardinality.is_zero();
    let right_zero = f.memo.logical(right).cardinality.is_zero();
    let empty = || Some(Captures::cols(f.join_output_cols(kind, left, right)));
    match kind {
        JoinKind::Inner | JoinKind::Semi if left_zero || right_zero => empty(),
        JoinKind::Left if left_zero => empty(),
        JoinKind::Full if left_zero && right_zero => empty(),
        JoinKind::Anti if left_zero => empty(),
        JoinKind::Anti if right_zero => Some(Captures::expr(left)),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use crate::norm::rules::testing::NormTester;
    use crate::operators::relational::{JoinFlags, JoinKind};

    #[test]
    fn test_push_filters_into_inner_join() {
        let mut t = NormTester::new();
        let a = t.t1_col(0);
        let x = t.t2_col(0);
        let s = t.t2_col(2);
        let t1 = t.scan_t1();
        let t2 = t.scan_t2();

        let a_eq = t.eq(a, 1);
        let s_val = t.string("s");
        let s_var = t.var(s);
        let s_eq = t.f.construct_eq(s_var, s_val);
        let va = t.var(a);
        let vx = t.var(x);
        let a_x = t.f.construct_eq(va, vx);
        let on = t.f.construct_filters(&[a_eq, s_eq, a_x]);
        let join = t.f.construct_inner_join(t1, t2, on);
        t.expect(
            join,
            r#"
inner-join on=[col:1 = col:4]
  select filters=[col:1 = 1]
    scan table=t1 cols=[1, 2, 3]
  select filters=[col:6 = 's']
    scan table=t2 cols=[4, 5, 6]
"#,
        );
    }

    #[test]
    fn test_left_join_keeps_left_filters() {
        let mut t = NormTester::new();
        let a = t.t1_col(0);
        let y = t.t2_col(1);
        let t1 = t.scan_t1();
        let t2 = t.scan_t2();

        let a_eq = t.eq(a, 1);
        let y_eq = t.eq(y, 2);
        let on = t.f.construct_filters(&[a_eq, y_eq]);
        let join = t.f.construct_join(JoinKind::Left, t1, t2, on, JoinFlags::empty());
        t.expect(
            join,
            r#"
left-join on=[col:1 = 1]
  scan table=t1 cols=[1, 2, 3]
  select filters=[col:5 = 2]
    scan table=t2 cols=[4, 5, 6]
"#,
        );
    }

    #[test]
    fn test_join_contradiction() {
        let mut t = NormTester::new();
        let t1 = t.scan_t1();
        let t2 = t.scan_t2();
        let fls = t.f.construct_false();
        let on = t.f.construct_filters(&[fls]);
        let join = t.f.construct_inner_join(t1, t2, on.clone());
        t.expect(join, "values cols=[1, 2, 3, 4, 5, 6]");

        let anti = t.f.construct_join(JoinKind::Anti, t1, t2, on.clone(), JoinFlags::empty());
        assert_eq!(anti, t1);

        let left = t.f.construct_join(JoinKind::Left, t1, t2, on, JoinFlags::empty());
        t.expect(
            left,
            r#"
left-join on=[false]
  scan table=t1 cols=[1, 2, 3]
  scan table=t2 cols=[4, 5, 6]
"#,
        );
    }

    #[test]
    fn test_zero_cardinality_join() {
        let mut t = NormTester::new();
        let t1 = t.scan_t1();
        let t2 = t.scan_t2();
        let t2_cols = t.f.memo().logical(t2).output_cols.clone();
        let empty = t.f.construct_empty_values(&t2_cols);

        let semi = t.f.construct_join(JoinKind::Semi, t1, empty, vec![], JoinFlags::empty());
        t.expect(semi, "values cols=[1, 2, 3]");

        let anti = t.f.construct_join(JoinKind::Anti, t1, empty, vec![], JoinFlags::empty());
        assert_eq!(anti, t1);

        let full = t.f.construct_join(JoinKind::Full, t1, empty, vec![], JoinFlags::empty());
        t.expect(
            full,
            r#"
full-join
  scan table=t1 cols=[1, 2, 3]
  values cols=[4, 5, 6]
"#,
        );
    }
}
