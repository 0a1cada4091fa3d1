//! Normalization rules.
//!
//! Rules are declared as static tables. Each entry names the rule, the operators it applies to,
//! a matcher that inspects a candidate expression and a replace function that builds the replacement
//! through the [factory](Factory). Rules of an operator are tried in the order of their [names](RuleName).

use std::sync::OnceLock;

use crate::memo::ExprId;
use crate::norm::{Factory, RuleName};
use crate::operators::scalar::value::ScalarValue;
use crate::operators::{Expr, Operator};
use crate::properties::ColSet;

mod group_by;
mod join;
mod limit;
mod project;
mod scalar;
mod select;
mod set_op;

/// Values captured by a matcher and passed to the replace function of the same rule.
#[derive(Debug, Clone, Default)]
pub struct Captures {
    pub exprs: Vec<ExprId>,
    pub lists: Vec<Vec<ExprId>>,
    pub cols: ColSet,
    pub value: Option<ScalarValue>,
}

impl Captures {
    /// Captures nothing.
    pub fn empty() -> Self {
        Captures::default()
    }

    pub fn expr(expr: ExprId) -> Self {
        Captures {
            exprs: vec![expr],
            ..Default::default()
        }
    }

    pub fn exprs(exprs: Vec<ExprId>) -> Self {
        Captures {
            exprs,
            ..Default::default()
        }
    }

    pub fn list(list: Vec<ExprId>) -> Self {
        Captures {
            lists: vec![list],
            ..Default::default()
        }
    }

    pub fn lists(lists: Vec<Vec<ExprId>>) -> Self {
        Captures {
            lists,
            ..Default::default()
        }
    }

    pub fn cols(cols: ColSet) -> Self {
        Captures {
            cols,
            ..Default::default()
        }
    }

    pub fn value(value: ScalarValue) -> Self {
        Captures {
            value: Some(value),
            ..Default::default()
        }
    }
}

/// A normalization rule.
pub struct NormRule {
    pub name: RuleName,
    /// Operators this rule applies to.
    pub ops: &'static [Operator],
    /// Returns captures if the rule can be applied to the given expression.
    pub matcher: fn(&Factory, &Expr) -> Option<Captures>,
    /// Builds the replacement of the given expression.
    pub replace: fn(&mut Factory, &Expr, Captures) -> ExprId,
}

impl std::fmt::Debug for NormRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormRule").field("name", &self.name).field("ops", &self.ops).finish()
    }
}

const NUM_OPERATORS: usize = Operator::ZipItem as usize + 1;

static RULES_BY_OPERATOR: OnceLock<Vec<Vec<&'static NormRule>>> = OnceLock::new();

/// Returns an iterator over all normalization rules.
pub fn all_rules() -> impl Iterator<Item = &'static NormRule> {
    select::RULES
        .iter()
        .chain(join::RULES.iter())
        .chain(project::RULES.iter())
        .chain(group_by::RULES.iter())
        .chain(limit::RULES.iter())
        .chain(set_op::RULES.iter())
        .chain(scalar::RULES.iter())
}

/// Returns rules that apply to the given operator in the order they are tried.
pub fn rules_for(op: Operator) -> &'static [&'static NormRule] {
    let rules = RULES_BY_OPERATOR.get_or_init(|| {
        let mut rules: Vec<Vec<&'static NormRule>> = vec![Vec::new(); NUM_OPERATORS];
        for rule in all_rules() {
            for op in rule.ops {
                rules[*op as usize].push(rule);
            }
        }
        for list in rules.iter_mut() {
            list.sort_by_key(|r| r.name);
        }
        rules
    });
    &rules[op as usize]
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::catalog::{IndexBuilder, TableBuilder};
    use crate::datatypes::DataType;
    use crate::memo::{ExprId, Memo};
    use crate::meta::{ColumnId, TableId};
    use crate::norm::Factory;
    use crate::operators::format::format_expr;
    use crate::operators::relational::ScanPrivate;
    use crate::operators::scalar::value::ScalarValue;
    use crate::operators::scalar::CmpOp;
    use crate::properties::ColSet;

    /// A factory with two tables:
    /// `t1(a int primary key, b int, c int)` and `t2(x int primary key, y int, s string)` with an index on `t2.y`.
    pub struct NormTester {
        pub f: Factory,
        pub t1: TableId,
        pub t2: TableId,
    }

    impl NormTester {
        pub fn new() -> Self {
            let t1 = TableBuilder::new("t1")
                .add_column("a", DataType::Int)
                .add_column("b", DataType::Int)
                .add_column("c", DataType::Int)
                .primary_key(&["a"])
                .build()
                .unwrap();
            let t2 = TableBuilder::new("t2")
                .add_column("x", DataType::Int)
                .add_column("y", DataType::Int)
                .add_column("s", DataType::String)
                .primary_key(&["x"])
                .add_index(IndexBuilder::new("t2_y").add_column("y"))
                .build()
                .unwrap();

            let mut memo = Memo::default();
            memo.set_check_expressions(true);
            let t1 = memo.metadata_mut().add_table(Arc::new(t1));
            let t2 = memo.metadata_mut().add_table(Arc::new(t2));
            NormTester {
                f: Factory::new(memo),
                t1,
                t2,
            }
        }

        /// The column of `t1` with the given ordinal.
        pub fn t1_col(&self, ordinal: usize) -> ColumnId {
            self.f.metadata().table(self.t1).column_id(ordinal)
        }

        /// The column of `t2` with the given ordinal.
        pub fn t2_col(&self, ordinal: usize) -> ColumnId {
            self.f.metadata().table(self.t2).column_id(ordinal)
        }

        pub fn scan_t1(&mut self) -> ExprId {
            let cols: ColSet = (0..3).map(|i| self.t1_col(i)).collect();
            self.f.construct_scan(ScanPrivate::new(self.t1, cols))
        }

        pub fn scan_t2(&mut self) -> ExprId {
            let cols: ColSet = (0..3).map(|i| self.t2_col(i)).collect();
            self.f.construct_scan(ScanPrivate::new(self.t2, cols))
        }

        pub fn var(&mut self, col: ColumnId) -> ExprId {
            self.f.construct_variable(col)
        }

        pub fn int(&mut self, value: i64) -> ExprId {
            self.f.construct_int(value)
        }

        pub fn string(&mut self, value: &str) -> ExprId {
            self.f.construct_const(ScalarValue::String(value.to_string()))
        }

        /// Builds `col <op> value`.
        pub fn cmp(&mut self, op: CmpOp, col: ColumnId, value: i64) -> ExprId {
            let var = self.var(col);
            let value = self.int(value);
            self.f.construct_comparison(op, var, value)
        }

        /// Builds `col = value`.
        pub fn eq(&mut self, col: ColumnId, value: i64) -> ExprId {
            self.cmp(CmpOp::Eq, col, value)
        }

        /// Builds a select with one filter item per condition.
        pub fn select(&mut self, input: ExprId, conditions: &[ExprId]) -> ExprId {
            let filters = self.f.construct_filters(conditions);
            self.f.construct_select(input, filters)
        }

        /// Builds a VALUES clause with a single row.
        pub fn values_row(&mut self, values: &[i64]) -> (ExprId, Vec<ColumnId>) {
            let cols: Vec<_> = (0..values.len())
                .map(|i| self.f.metadata_mut().add_column(&format!("column{}", i + 1), DataType::Int))
                .collect();
            let elems: Vec<_> = values.iter().map(|v| self.int(*v)).collect();
            let row = self.f.construct_tuple(elems);
            let values = self.f.construct_values(vec![row], cols.clone());
            (values, cols)
        }

        pub fn format(&self, id: ExprId) -> String {
            format_expr(self.f.memo(), id)
        }

        /// Compares the textual representation of the given expression with the expected string.
        pub fn expect(&self, id: ExprId, expected: &str) {
            let actual = self.format(id);
            assert_eq!(actual.trim(), expected.trim(), "Unexpected expression.\n{}", actual);
        }
    }
}
