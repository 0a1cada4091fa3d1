//! Textual representation of expressions, plans and memo contents.

use std::fmt::Display;

use itertools::Itertools;

use crate::memo::{ExprId, Memo};
use crate::operators::relational::{JoinFlags, MutationKind};
use crate::operators::scalar::{AggFunc, WindowFunc};
use crate::operators::{Expr, RelExpr, ScalarExpr};
use crate::optimizer::PlanExpr;

/// Provides methods to build a textual representation of a relational expression.
pub trait ExprFormatter {
    /// Writes the name of an expression.
    fn write_name(&mut self, name: &str);

    /// Writes a relational input of an expression.
    fn write_input(&mut self, name: &str, input: ExprId);

    /// Writes a value of some attribute of an expression.
    fn write_value<D>(&mut self, name: &str, value: D)
    where
        D: Display;

    /// Writes values of some attribute of an expression.
    fn write_values<D>(&mut self, name: &str, values: &[D])
    where
        D: Display;
}

/// Writes expressions to a string buffer. Inputs are written as group identifiers if `write_inputs` is set.
struct StringFormatter<'a, 'b> {
    memo: &'a Memo,
    buf: &'b mut String,
    write_inputs: bool,
}

impl ExprFormatter for StringFormatter<'_, '_> {
    fn write_name(&mut self, name: &str) {
        self.buf.push_str(name);
    }

    fn write_input(&mut self, name: &str, input: ExprId) {
        if self.write_inputs {
            self.buf.push(' ');
            self.buf.push_str(name);
            self.buf.push('=');
            self.buf.push_str(&self.memo.group_of(input).to_string());
        }
    }

    fn write_value<D>(&mut self, name: &str, value: D)
    where
        D: Display,
    {
        self.buf.push(' ');
        self.buf.push_str(name);
        self.buf.push('=');
        self.buf.push_str(&value.to_string());
    }

    fn write_values<D>(&mut self, name: &str, values: &[D])
    where
        D: Display,
    {
        if values.is_empty() {
            return;
        }
        self.buf.push(' ');
        self.buf.push_str(name);
        self.buf.push_str("=[");
        self.buf.push_str(&values.iter().join(", "));
        self.buf.push(']');
    }
}

/// Writes the given relational expression to the formatter. Scalar children are written inline.
pub fn format_rel_expr<F>(memo: &Memo, expr: &RelExpr, f: &mut F)
where
    F: ExprFormatter,
{
    let scalars = |list: &[ExprId]| list.iter().map(|e| format_scalar(memo, *e)).collect::<Vec<_>>();
    let cols = |cols: &[crate::meta::ColumnId]| cols.iter().map(|c| format!("{}", c)).collect::<Vec<_>>();

    f.write_name(expr.op().name());
    match expr {
        RelExpr::Scan(private) => {
            let table = memo.metadata().table(private.table);
            f.write_value("table", table.table().name());
            f.write_values("cols", &cols(&private.cols.to_vec()));
            if private.index > 0 {
                f.write_value("index", table.table().index(private.index).name());
            }
            if private.flags.no_index_join {
                f.write_value("flags", "no-index-join");
            }
            if private.flags.force_index {
                f.write_value("flags", "force-index");
            }
        }
        RelExpr::Values { rows, private } => {
            f.write_values("cols", &cols(&private.cols));
            f.write_values("rows", &scalars(rows));
        }
        RelExpr::Project {
            input,
            projections,
            passthrough,
        } => {
            f.write_input("input", *input);
            f.write_values("projections", &scalars(projections));
            f.write_values("passthrough", &cols(&passthrough.to_vec()));
        }
        RelExpr::Select { input, filters } => {
            f.write_input("input", *input);
            f.write_values("filters", &scalars(filters));
        }
        RelExpr::Join {
            left, right, on, flags, ..
        } => {
            f.write_input("left", *left);
            f.write_input("right", *right);
            f.write_values("on", &scalars(on));
            write_join_flags(f, *flags);
        }
        RelExpr::LookupJoin {
            kind,
            input,
            on,
            private,
        } => {
            let table = memo.metadata().table(private.table);
            f.write_value("type", kind.op().name());
            f.write_input("input", *input);
            f.write_value("table", table.table().name());
            f.write_value("index", table.table().index(private.index).name());
            f.write_values("key", &cols(&private.key_cols));
            f.write_values("cols", &cols(&private.cols.to_vec()));
            f.write_values("on", &scalars(on));
        }
        RelExpr::MergeJoin {
            kind,
            left,
            right,
            on,
            private,
        } => {
            f.write_value("type", kind.op().name());
            f.write_input("left", *left);
            f.write_input("right", *right);
            f.write_values("left-eq", &cols(&private.left_eq));
            f.write_values("right-eq", &cols(&private.right_eq));
            f.write_values("on", &scalars(on));
        }
        RelExpr::ZigzagJoin { on, private } => {
            let table = memo.metadata().table(private.table);
            f.write_value("table", table.table().name());
            f.write_value("left-index", table.table().index(private.left_index).name());
            f.write_value("right-index", table.table().index(private.right_index).name());
            f.write_values("left-eq", &cols(&private.left_eq_cols));
            f.write_values("right-eq", &cols(&private.right_eq_cols));
            f.write_values("cols", &cols(&private.cols.to_vec()));
            f.write_values("on", &scalars(on));
        }
        RelExpr::IndexJoin { input, private } => {
            let table = memo.metadata().table(private.table);
            f.write_input("input", *input);
            f.write_value("table", table.table().name());
            f.write_values("cols", &cols(&private.cols.to_vec()));
        }
        RelExpr::GroupBy {
            input,
            aggregations,
            private,
            ..
        } => {
            f.write_input("input", *input);
            f.write_values("aggregations", &scalars(aggregations));
            f.write_values("grouping", &cols(&private.grouping_cols.to_vec()));
            if !private.ordering.is_any() {
                f.write_value("ordering", &private.ordering);
            }
        }
        RelExpr::SetOp {
            left, right, private, ..
        } => {
            f.write_input("left", *left);
            f.write_input("right", *right);
            f.write_values("left-cols", &cols(&private.left_cols));
            f.write_values("right-cols", &cols(&private.right_cols));
            f.write_values("out-cols", &cols(&private.out_cols));
        }
        RelExpr::Limit { input, limit, ordering } => {
            f.write_input("input", *input);
            f.write_value("limit", format_scalar(memo, *limit));
            if !ordering.is_any() {
                f.write_value("ordering", ordering);
            }
        }
        RelExpr::Offset {
            input,
            offset,
            ordering,
        } => {
            f.write_input("input", *input);
            f.write_value("offset", format_scalar(memo, *offset));
            if !ordering.is_any() {
                f.write_value("ordering", ordering);
            }
        }
        RelExpr::Sort { input, ordering } => {
            f.write_input("input", *input);
            f.write_value("ordering", ordering);
        }
        RelExpr::Ordinality { input, private } => {
            f.write_input("input", *input);
            f.write_value("col", private.col);
            if !private.ordering.is_any() {
                f.write_value("ordering", &private.ordering);
            }
        }
        RelExpr::Window {
            input,
            windows,
            private,
        } => {
            f.write_input("input", *input);
            f.write_values("windows", &scalars(windows));
            f.write_values("partition", &cols(&private.partition.to_vec()));
            if !private.ordering.is_any() {
                f.write_value("ordering", &private.ordering);
            }
        }
        RelExpr::ProjectSet { input, zip } => {
            f.write_input("input", *input);
            f.write_values("zip", &scalars(zip));
        }
        RelExpr::Mutation { kind, input, private } => {
            let table = memo.metadata().table(private.table);
            let opt_cols = |cols: &[Option<crate::meta::ColumnId>]| {
                cols.iter()
                    .map(|c| c.map(|c| c.to_string()).unwrap_or_else(|| "_".to_string()))
                    .collect::<Vec<_>>()
            };
            f.write_input("input", *input);
            f.write_value("table", table.table().name());
            match kind {
                MutationKind::Insert | MutationKind::Upsert => {
                    f.write_values("insert", &opt_cols(&private.insert_cols));
                }
                MutationKind::Update | MutationKind::Delete => {}
            }
            f.write_values("fetch", &opt_cols(&private.fetch_cols));
            f.write_values("update", &opt_cols(&private.update_cols));
            if private.returning {
                f.write_value("returning", true);
            }
        }
        RelExpr::Explain { input, private } => {
            f.write_input("input", *input);
            f.write_values("cols", &cols(&private.cols));
            f.write_value("props", memo.phys_props(private.props));
        }
    }
}

fn write_join_flags<F>(f: &mut F, flags: JoinFlags)
where
    F: ExprFormatter,
{
    if flags.is_empty() {
        return;
    }
    let mut names = Vec::new();
    if flags.contains(JoinFlags::NO_HASH_JOIN) {
        names.push("no-hash-join");
    }
    if flags.contains(JoinFlags::NO_MERGE_JOIN) {
        names.push("no-merge-join");
    }
    if flags.contains(JoinFlags::NO_LOOKUP_JOIN) {
        names.push("no-lookup-join");
    }
    f.write_values("flags", &names);
}

/// Returns a textual representation of the given scalar expression.
pub fn format_scalar(memo: &Memo, id: ExprId) -> String {
    let s = |id: &ExprId| format_scalar(memo, *id);
    let list = |ids: &[ExprId]| ids.iter().map(s).join(", ");
    let group = |id: &ExprId| memo.group_of(*id).to_string();

    match memo.scalar_expr(id) {
        ScalarExpr::Variable(col) => format!("col:{}", col),
        ScalarExpr::Const(value) => value.to_string(),
        ScalarExpr::Null(_) => "NULL".to_string(),
        ScalarExpr::True => "true".to_string(),
        ScalarExpr::False => "false".to_string(),
        ScalarExpr::Placeholder { index, .. } => format!("${}", index),
        ScalarExpr::And(l, r) => format!("{} AND {}", s(l), s(r)),
        ScalarExpr::Or(l, r) => format!("({} OR {})", s(l), s(r)),
        ScalarExpr::Not(e) => format!("NOT {}", s(e)),
        ScalarExpr::Range(e) => format!("range({})", s(e)),
        ScalarExpr::Comparison { op, left, right } => format!("{} {} {}", s(left), op, s(right)),
        ScalarExpr::Binary { op, left, right } => format!("({} {} {})", s(left), op, s(right)),
        ScalarExpr::Unary { op, input } => format!("{}{}", op, s(input)),
        ScalarExpr::Case { input, whens, or_else } => {
            let whens = whens.iter().map(s).join(" ");
            format!("CASE {} {} ELSE {} END", s(input), whens, s(or_else))
        }
        ScalarExpr::When { condition, value } => format!("WHEN {} THEN {}", s(condition), s(value)),
        ScalarExpr::Coalesce(args) => format!("coalesce({})", list(args)),
        ScalarExpr::Tuple(elems) => format!("({})", list(elems)),
        ScalarExpr::Array { elems, .. } => format!("ARRAY[{}]", list(elems)),
        ScalarExpr::Cast { input, data_type } => format!("CAST({} AS {})", s(input), data_type),
        ScalarExpr::Function { private, args } => format!("{}({})", private.name, list(args)),
        ScalarExpr::Subquery(input) => format!("subquery({})", group(input)),
        ScalarExpr::Exists(input) => format!("exists({})", group(input)),
        ScalarExpr::Any { input, scalar, cmp } => format!("{} {} ANY({})", s(scalar), cmp, group(input)),
        ScalarExpr::ArrayFlatten { input, .. } => format!("array-flatten({})", group(input)),
        ScalarExpr::Agg { func, input } => format!("{}({})", agg_name(*func), s(input)),
        ScalarExpr::CountRows => "count_rows()".to_string(),
        ScalarExpr::AggDistinct(input) => format!("distinct({})", s(input)),
        ScalarExpr::AggFilter { input, filter } => format!("{} FILTER (WHERE {})", s(input), s(filter)),
        ScalarExpr::WindowFunc(func) => match func {
            WindowFunc::RowNumber => "row_number()".to_string(),
            WindowFunc::Rank => "rank()".to_string(),
            WindowFunc::DenseRank => "dense_rank()".to_string(),
        },
        ScalarExpr::FiltersItem(condition) => s(condition),
        ScalarExpr::ProjectionsItem { element, col } => format!("col:{}={}", col, s(element)),
        ScalarExpr::AggregationsItem { agg, col } => format!("col:{}={}", col, s(agg)),
        ScalarExpr::WindowsItem { function, col } => format!("col:{}={}", col, s(function)),
        ScalarExpr::ZipItem { func, cols } => format!("({})={}", cols.iter().join(","), s(func)),
    }
}

fn agg_name(func: AggFunc) -> &'static str {
    match func {
        AggFunc::Sum => "sum",
        AggFunc::Count => "count",
        AggFunc::Min => "min",
        AggFunc::Max => "max",
        AggFunc::Avg => "avg",
        AggFunc::ConstAgg => "const_agg",
        AggFunc::FirstAgg => "first_agg",
        AggFunc::BoolAnd => "bool_and",
        AggFunc::BoolOr => "bool_or",
    }
}

fn format_header(memo: &Memo, expr: &RelExpr, write_inputs: bool) -> String {
    let mut buf = String::new();
    let mut f = StringFormatter {
        memo,
        buf: &mut buf,
        write_inputs,
    };
    format_rel_expr(memo, expr, &mut f);
    buf
}

/// Builds the following textual representation of the given expression:
///
/// ```text:
///  RootExpr [root-expr-attributes]
///    Expr_0 [expr_0-attributes]
///      ...
///        LeafExpr_0 [leaf-expr_0-attributes]
///    ...
/// ```
///
/// A scalar expression is written on a single line.
pub fn format_expr(memo: &Memo, id: ExprId) -> String {
    fn write(memo: &Memo, id: ExprId, depth: usize, buf: &mut String) {
        let expr = memo.rel_expr(id);
        if depth > 0 {
            buf.push('\n');
        }
        buf.push_str(&"  ".repeat(depth));
        buf.push_str(&format_header(memo, expr, false));
        for input in expr.inputs() {
            write(memo, input, depth + 1, buf);
        }
    }

    match memo.expr(id) {
        Expr::Relational(_) => {
            let mut buf = String::new();
            write(memo, id, 0, &mut buf);
            buf
        }
        Expr::Scalar(_) => format_scalar(memo, id),
    }
}

/// Builds a textual representation of the given plan in the same format as [format_expr]. Orderings
/// provided by plan nodes are appended to their lines.
pub fn format_plan(memo: &Memo, plan: &PlanExpr) -> String {
    fn write(memo: &Memo, plan: &PlanExpr, depth: usize, buf: &mut String) {
        if depth > 0 {
            buf.push('\n');
        }
        buf.push_str(&"  ".repeat(depth));
        buf.push_str(&format_header(memo, memo.rel_expr(plan.expr), false));
        if !plan.provided.is_any() {
            buf.push_str(&format!(" provided={}", plan.provided));
        }
        for input in plan.inputs.iter() {
            write(memo, input, depth + 1, buf);
        }
        for subquery in plan.subqueries.iter() {
            write(memo, subquery, depth + 1, buf);
        }
    }

    let mut buf = String::new();
    let presentation = &memo.phys_props(plan.required).presentation;
    if !presentation.is_empty() {
        let columns = presentation.iter().map(|(name, col)| format!("{}:{}", name, col)).join(", ");
        buf.push_str(&format!("presentation: {}\n", columns));
    }
    write(memo, plan, 0, &mut buf);
    buf
}

/// Builds a textual representation of the memo: groups in reverse order, one line per alternative.
///
/// ```text:
///  02 select input=01 filters=[col:1 = 1]
///  01 scan table=a cols=[1, 2]
///     scan table=a cols=[1, 2] index=a_idx
/// ```
pub fn format_memo(memo: &Memo) -> String {
    let mut buf = String::new();
    let groups: Vec<_> = memo.groups().map(|(id, _)| id).collect();
    for group in groups.into_iter().rev() {
        buf.push_str(&format!("{} ", group));
        for (i, expr) in memo.group_exprs(group).enumerate() {
            if i > 0 {
                buf.push_str("\n   ");
            }
            buf.push_str(&format_header(memo, memo.rel_expr(expr), true));
        }
        buf.push('\n');
    }
    buf
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datatypes::DataType;
    use crate::operators::relational::ValuesPrivate;
    use crate::operators::scalar::value::ScalarValue;
    use crate::operators::scalar::CmpOp;

    #[test]
    fn test_format_expr() {
        let mut memo = Memo::default();
        let col = memo.metadata_mut().add_column("a", DataType::Int);
        let one = memo.intern(ScalarExpr::Const(ScalarValue::Int(1)).into());
        let row = memo.intern(ScalarExpr::Tuple(vec![one]).into());
        let id = memo.metadata_mut().next_values_id();
        let values = memo.intern(
            RelExpr::Values {
                rows: vec![row],
                private: ValuesPrivate { cols: vec![col], id },
            }
            .into(),
        );
        let var = memo.intern(ScalarExpr::Variable(col).into());
        let cmp = memo.intern(
            ScalarExpr::Comparison {
                op: CmpOp::Gt,
                left: var,
                right: one,
            }
            .into(),
        );
        let filter = memo.intern(ScalarExpr::FiltersItem(cmp).into());
        let select = memo.intern(
            RelExpr::Select {
                input: values,
                filters: vec![filter],
            }
            .into(),
        );

        assert_eq!(
            format_expr(&memo, select),
            "select filters=[col:1 > 1]\n  values cols=[1] rows=[(1)]"
        );
        assert_eq!(
            format_memo(&memo),
            "01 select input=00 filters=[col:1 > 1]\n00 values cols=[1] rows=[(1)]\n"
        );
        assert_eq!(format_expr(&memo, cmp), "col:1 > 1");
    }
}
