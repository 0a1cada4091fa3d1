//! Rules for set operators.

use crate::memo::ExprId;
use crate::norm::rules::{Captures, NormRule};
use crate::norm::{Factory, RuleName};
use crate::operators::relational::SetOpKind;
use crate::operators::{Expr, Operator, RelExpr};
use crate::properties::ColSet;

pub(super) static RULES: &[NormRule] = &[NormRule {
    name: RuleName::SimplifyZeroCardinalitySetOp,
    ops: &[
        Operator::Union,
        Operator::UnionAll,
        Operator::Intersect,
        Operator::IntersectAll,
        Operator::Except,
        Operator::ExceptAll,
    ],
    matcher: match_zero_cardinality_set_op,
    replace: simplify_zero_cardinality_set_op,
}];

// Captures nothing when the result is empty. Otherwise captures the non-empty input of a UNION ALL.
fn match_zero_cardinality_set_op(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (kind, left, right) = match_expr!(
        expr,
        Expr::Relational(RelExpr::SetOp { kind, left, right, .. }) => (*kind, *left, *right)
    );
    let left_zero = f.memo.logical(left).cardinality.is_zero();
    let right_zero = f.memo.logical(right).cardinality.is_zero();
    let empty = match kind {
        SetOpKind::Union | SetOpKind::UnionAll => left_zero && right_zero,
        SetOpKind::Intersect | SetOpKind::IntersectAll => left_zero || right_zero,
        SetOpKind::Except | SetOpKind::ExceptAll => left_zero,
    };
    if empty {
        return Some(Captures::empty());
    }
    match kind {
        SetOpKind::UnionAll if left_zero => Some(Captures::expr(right)),
        SetOpKind::UnionAll if right_zero => Some(Captures::expr(left)),
        _ => None,
    }
}

fn simplify_zero_cardinality_set_op(f: &mut Factory, expr: &Expr, captures: Captures) -> ExprId {
    let (left, private) = expect_expr!(expr, Expr::Relational(RelExpr::SetOp { left, private, .. }) => (*left, private));
    if captures.exprs.is_empty() {
        return f.construct_values(Vec::new(), private.out_cols.clone());
    }

    // UNION ALL with an empty input returns rows of the other input under the output columns.
    let input = captures.exprs[0];
    let input_cols = if input == left { &private.left_cols } else { &private.right_cols };
    let mut passthrough = ColSet::new();
    let mut projections = Vec::new();
    for (from, to) in input_cols.iter().zip(private.out_cols.iter()) {
        if from == to {
            passthrough.insert(*to);
        } else {
            let var = f.construct_variable(*from);
            projections.push(f.construct_projections_item(var, *to));
        }
    }
    f.construct_project(input, projections, passthrough)
}

#[cfg(test)]
mod test {
    use crate::norm::rules::testing::NormTester;
    use crate::operators::relational::{SetOpKind, SetPrivate};

    #[test]
    fn test_zero_cardinality_set_op() {
        let mut t = NormTester::new();
        let t1 = t.scan_t1();
        let t1_cols = t.f.memo().logical(t1).output_cols.clone();
        let empty = t.f.construct_empty_values(&t1_cols);
        let out_cols: Vec<_> = (0..3)
            .map(|i| t.f.metadata_mut().add_column(&format!("out{}", i), crate::datatypes::DataType::Int))
            .collect();
        let private = SetPrivate {
            left_cols: t1_cols.to_vec(),
            right_cols: t1_cols.to_vec(),
            out_cols,
        };

        let intersect = t.f.construct_set_op(SetOpKind::Intersect, t1, empty, private.clone());
        t.expect(intersect, "values cols=[7, 8, 9]");

        let except = t.f.construct_set_op(SetOpKind::Except, empty, t1, private.clone());
        t.expect(except, "values cols=[7, 8, 9]");

        let except = t.f.construct_set_op(SetOpKind::Except, t1, empty, private.clone());
        t.expect(
            except,
            r#"
except left-cols=[1, 2, 3] right-cols=[1, 2, 3] out-cols=[7, 8, 9]
  scan table=t1 cols=[1, 2, 3]
  values cols=[1, 2, 3]
"#,
        );

        let union = t.f.construct_set_op(SetOpKind::UnionAll, t1, empty, private);
        t.expect(
            union,
            r#"
project projections=[col:7=col:1, col:8=col:2, col:9=col:3]
  scan table=t1 cols=[1, 2, 3]
"#,
        );
    }
}
