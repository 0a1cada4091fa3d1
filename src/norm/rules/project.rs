//! Rules for Project.

use crate::memo::ExprId;
use crate::norm::rules::select::replace_with_captured;
use crate::norm::rules::{Captures, NormRule};
use crate::norm::{Factory, RuleName};
use crate::operators::{Expr, Operator, RelExpr, ScalarExpr};
use crate::properties::ColSet;

const PROJECT: &[Operator] = &[Operator::Project];

pub(super) static RULES: &[NormRule] = &[
    NormRule {
        name: RuleName::EliminateProject,
        ops: PROJECT,
        matcher: match_eliminate_project,
        replace: replace_with_captured,
    },
    NormRule {
        name: RuleName::FoldPassthroughProjections,
        ops: PROJECT,
        matcher: match_passthrough_projections,
        replace: fold_passthrough_projections,
    },
    NormRule {
        name: RuleName::MergeProjects,
        ops: PROJECT,
        matcher: match_merge_projects,
        replace: merge_projects,
    },
    NormRule {
        name: RuleName::MergeProjectWithValues,
        ops: PROJECT,
        matcher: match_project_with_values,
        replace: merge_project_with_values,
    },
];

fn project_parts(expr: &Expr) -> Option<(ExprId, &[ExprId], &ColSet)> {
    match expr {
        Expr::Relational(RelExpr::Project {
            input,
            projections,
            passthrough,
        }) => Some((*input, projections, passthrough)),
        _ => None,
    }
}

fn projection_of(f: &Factory, item: ExprId) -> (ExprId, crate::meta::ColumnId) {
    expect_expr!(f.scalar_of(item), ScalarExpr::ProjectionsItem { element, col } => (*element, *col))
}

fn match_eliminate_project(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (input, projections, passthrough) = project_parts(expr)?;
    (projections.is_empty() && passthrough == f.output_cols(input)).then(|| Captures::expr(input))
}

fn is_passthrough(f: &Factory, item: ExprId) -> bool {
    let (element, col) = projection_of(f, item);
    matches!(f.scalar_of(element), ScalarExpr::Variable(c) if *c == col)
}

fn match_passthrough_projections(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (_, projections, _) = project_parts(expr)?;
    projections.iter().any(|item| is_passthrough(f, *item)).then(Captures::empty)
}

fn fold_passthrough_projections(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let (input, projections, passthrough) = expect_expr!(project_parts(expr), Some(parts) => parts);
    let mut passthrough = passthrough.clone();
    let mut remaining = Vec::with_capacity(projections.len());
    for item in projections {
        if is_passthrough(f, *item) {
            passthrough.insert(projection_of(f, *item).1);
        } else {
            remaining.push(*item);
        }
    }
    f.construct_project(input, remaining, passthrough)
}

fn synthesized_cols(f: &Factory, projections: &[ExprId]) -> ColSet {
    projections.iter().map(|item| projection_of(f, *item).1).collect()
}

fn match_merge_projects(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (input, projections, _) = project_parts(expr)?;
    let inner = match f.memo.rel_expr(input) {
        RelExpr::Project { projections, .. } => projections,
        _ => return None,
    };
    let synthesized = synthesized_cols(f, inner);
    if projections.iter().any(|item| f.outer_cols(*item).intersects(&synthesized)) {
        return None;
    }
    Some(Captures::empty())
}

fn merge_projects(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let (input, projections, passthrough) = expect_expr!(project_parts(expr), Some(parts) => parts);
    let (inner_input, inner_projections, inner_passthrough) = expect_expr!(
        f.memo.rel_expr(input),
        RelExpr::Project { input, projections, passthrough } => (*input, projections.clone(), passthrough.clone())
    );

    let mut merged = projections.to_vec();
    for item in inner_projections {
        if passthrough.contains(projection_of(f, item).1) {
            merged.push(item);
        }
    }
    f.construct_project(inner_input, merged, passthrough.intersection(&inner_passthrough))
}

fn match_project_with_values(f: &Factory, expr: &Expr) -> Option<Captures> {
    let (input, projections, _) = project_parts(expr)?;
    let (rows, cols) = match f.memo.rel_expr(input) {
        RelExpr::Values { rows, private } if rows.len() == 1 => (rows, &private.cols),
        _ => return None,
    };
    if !matches!(f.scalar_of(rows[0]), ScalarExpr::Tuple(_)) {
        return None;
    }
    let values_cols: ColSet = cols.iter().copied().collect();
    for item in projections {
        let (element, _) = projection_of(f, *item);
        let props = f.memo.scalar_props(element);
        let allowed = match f.scalar_of(element) {
            ScalarExpr::Variable(col) => values_cols.contains(*col),
            _ => !props.has_subquery && !props.outer_cols.intersects(&values_cols),
        };
        if !allowed {
            return None;
        }
    }
    Some(Captures::empty())
}

fn merge_project_with_values(f: &mut Factory, expr: &Expr, _captures: Captures) -> ExprId {
    let (input, projections, passthrough) = expect_expr!(project_parts(expr), Some(parts) => parts);
    let (row, values_cols) = expect_expr!(
        f.memo.rel_expr(input),
        RelExpr::Values { rows, private } => (rows[0], private.cols.clone())
    );
    let elems = expect_expr!(f.scalar_of(row), ScalarExpr::Tuple(elems) => elems.clone());

    let mut cols = Vec::with_capacity(passthrough.len() + projections.len());
    let mut new_elems = Vec::with_capacity(cols.capacity());
    for (col, elem) in values_cols.iter().zip(elems.iter()) {
        if passthrough.contains(*col) {
            cols.push(*col);
            new_elems.push(*elem);
        }
    }
    for item in projections {
        let (element, col) = projection_of(f, *item);
        let value = match f.scalar_of(element) {
            ScalarExpr::Variable(var) => values_cols.iter().position(|c| c == var).map(|i| elems[i]).unwrap_or(element),
            _ => element,
        };
        cols.push(col);
        new_elems.push(value);
    }

    let row = f.construct_tuple(new_elems);
    f.construct_values(vec![row], cols)
}

#[cfg(test)]
mod test {
    use crate::datatypes::DataType;
    use crate::norm::rules::testing::NormTester;
    use crate::operators::scalar::BinaryOp;
    use crate::properties::ColSet;

    #[test]
    fn test_eliminate_project() {
        let mut t = NormTester::new();
        let scan = t.scan_t1();
        let cols = t.f.memo().logical(scan).output_cols.clone();
        let project = t.f.construct_project(scan, vec![], cols);
        assert_eq!(project, scan);
    }

    #[test]
    fn test_fold_passthrough_projections() {
        let mut t = NormTester::new();
        let a = t.t1_col(0);
        let b = t.t1_col(1);
        let scan = t.scan_t1();
        let vb = t.var(b);
        let item = t.f.construct_projections_item(vb, b);
        let project = t.f.construct_project(scan, vec![item], ColSet::single(a));
        t.expect(
            project,
            r#"
project passthrough=[1, 2]
  scan table=t1 cols=[1, 2, 3]
"#,
        );
    }

    #[test]
    fn test_merge_projects() {
        let mut t = NormTester::new();
        let a = t.t1_col(0);
        let b = t.t1_col(1);
        let d = t.f.metadata_mut().add_column("d", DataType::Int);
        let e = t.f.metadata_mut().add_column("e", DataType::Int);
        let scan = t.scan_t1();

        let va = t.var(a);
        let one = t.int(1);
        let plus = t.f.construct_binary(BinaryOp::Plus, va, one);
        let d_item = t.f.construct_projections_item(plus, d);
        let inner = t.f.construct_project(scan, vec![d_item], ColSet::single(b));

        let vb = t.var(b);
        let two = t.int(2);
        let mult = t.f.construct_binary(BinaryOp::Mult, vb, two);
        let e_item = t.f.construct_projections_item(mult, e);
        let outer = t.f.construct_project(inner, vec![e_item], ColSet::single(d));
        t.expect(
            outer,
            r#"
project projections=[col:8=(col:2 * 2), col:7=(col:1 + 1)]
  scan table=t1 cols=[1, 2, 3]
"#,
        );
    }

    #[test]
    fn test_merge_projects_with_dependent_projection() {
        let mut t = NormTester::new();
        let a = t.t1_col(0);
        let d = t.f.metadata_mut().add_column("d", DataType::Int);
        let e = t.f.metadata_mut().add_column("e", DataType::Int);
        let scan = t.scan_t1();

        let va = t.var(a);
        let one = t.int(1);
        let plus = t.f.construct_binary(BinaryOp::Plus, va, one);
        let d_item = t.f.construct_projections_item(plus, d);
        let inner = t.f.construct_project(scan, vec![d_item], ColSet::new());

        let vd = t.var(d);
        let two = t.int(2);
        let mult = t.f.construct_binary(BinaryOp::Mult, vd, two);
        let e_item = t.f.construct_projections_item(mult, e);
        let outer = t.f.construct_project(inner, vec![e_item], ColSet::new());
        t.expect(
            outer,
            r#"
project projections=[col:8=(col:7 * 2)]
  project projections=[col:7=(col:1 + 1)]
    scan table=t1 cols=[1, 2, 3]
"#,
        );
    }

    #[test]
    fn test_merge_project_with_values() {
        let mut t = NormTester::new();
        let (values, cols) = t.values_row(&[1, 2]);
        let new_col = t.f.metadata_mut().add_column("x", DataType::Int);
        let var = t.var(cols[1]);
        let item = t.f.construct_projections_item(var, new_col);
        let project = t.f.construct_project(values, vec![item], ColSet::single(cols[0]));
        t.expect(project, "values cols=[7, 9] rows=[(1, 2)]");
    }
}
