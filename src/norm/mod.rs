//! Normalization. See [Factory].
//!
//! Every expression added to a memo is built by the factory. Before an expression is interned the factory
//! looks up normalization rules registered for its operator and applies the first rule that matches.
//! A rule builds its replacement through the factory again, so a replacement is normalized as well.

use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use crate::datatypes::DataType;
use crate::memo::{ExprId, Memo};
use crate::meta::{ColumnId, Metadata};
use crate::operators::relational::{
    ExplainPrivate, GroupByKind, GroupingPrivate, JoinFlags, JoinKind, MutationKind, MutationPrivate,
    OrdinalityPrivate, ScanPrivate, SetOpKind, SetPrivate, ValuesPrivate, WindowPrivate,
};
use crate::operators::scalar::value::ScalarValue;
use crate::operators::scalar::{
    AggFunc, ArrayFlattenPrivate, BinaryOp, CmpOp, FunctionPrivate, UnaryOp, WindowFunc,
};
use crate::operators::{Expr, Operator, RelExpr, ScalarExpr};
use crate::properties::{ColSet, OrderingChoice};

#[macro_use]
mod funcs;
pub mod rule_name;
pub mod rules;

pub use rule_name::{RuleName, RuleSet};
pub use rules::{Captures, NormRule};

/// Called when a rule matches an expression. A rule is applied only if the callback returns `true`.
pub type MatchedRuleCallback = Rc<dyn Fn(RuleName) -> bool>;

/// Called after a rule has been applied to an expression of the given operator.
/// The last argument is the identifier of the replacement.
pub type AppliedRuleCallback = Rc<dyn Fn(RuleName, Operator, ExprId)>;

/// Builds normalized expressions and adds them to the [memo](Memo).
pub struct Factory {
    memo: Memo,
    disabled_rules: RuleSet,
    optimizations_disabled: bool,
    matched_rule: Option<MatchedRuleCallback>,
    applied_rule: Option<AppliedRuleCallback>,
}

impl Factory {
    /// Creates a factory that adds expressions to the given memo.
    pub fn new(memo: Memo) -> Self {
        Factory {
            memo,
            disabled_rules: RuleSet::new(),
            optimizations_disabled: false,
            matched_rule: None,
            applied_rule: None,
        }
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    pub fn memo_mut(&mut self) -> &mut Memo {
        &mut self.memo
    }

    pub fn metadata(&self) -> &Metadata {
        self.memo.metadata()
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        self.memo.metadata_mut()
    }

    /// Replaces the memo of this factory and returns the previous one.
    pub fn replace_memo(&mut self, memo: Memo) -> Memo {
        std::mem::replace(&mut self.memo, memo)
    }

    /// Disables every normalization rule. Expressions are interned as is.
    pub fn disable_optimizations(&mut self) {
        self.optimizations_disabled = true;
    }

    /// Returns `true` if normalization rules are disabled.
    pub fn optimizations_disabled(&self) -> bool {
        self.optimizations_disabled
    }

    /// Excludes the given rules from matching.
    pub fn set_disabled_rules(&mut self, rules: RuleSet) {
        self.disabled_rules = rules;
    }

    pub fn disabled_rules(&self) -> &RuleSet {
        &self.disabled_rules
    }

    /// Sets a callback that is called every time a rule matches an expression.
    /// If the callback returns `false` the rule is not applied.
    pub fn notify_on_matched_rule<F>(&mut self, f: F)
    where
        F: Fn(RuleName) -> bool + 'static,
    {
        self.matched_rule = Some(Rc::new(f));
    }

    /// Sets a callback that is called every time a rule is applied.
    pub fn notify_on_applied_rule<F>(&mut self, f: F)
    where
        F: Fn(RuleName, Operator, ExprId) + 'static,
    {
        self.applied_rule = Some(Rc::new(f));
    }

    pub(crate) fn set_rule_callbacks(
        &mut self,
        matched: Option<MatchedRuleCallback>,
        applied: Option<AppliedRuleCallback>,
    ) {
        self.matched_rule = matched;
        self.applied_rule = applied;
    }

    /// Builds the given expression.
    pub fn construct(&mut self, expr: Expr) -> ExprId {
        self.normalize(expr)
    }

    /// Builds the expression with the given identifier once again. If that expression is normalized
    /// the result is the same identifier.
    pub fn reconstruct(&mut self, id: ExprId) -> ExprId {
        let expr = self.memo.expr(id).clone();
        self.normalize(expr)
    }

    fn normalize(&mut self, expr: Expr) -> ExprId {
        if !self.optimizations_disabled {
            let op = expr.op();
            for rule in rules::rules_for(op) {
                if self.disabled_rules.contains(rule.name) {
                    continue;
                }
                let captures = match (rule.matcher)(self, &expr) {
                    Some(captures) => captures,
                    None => continue,
                };
                if let Some(matched) = self.matched_rule.as_ref() {
                    if !matched(rule.name) {
                        continue;
                    }
                }
                let result = (rule.replace)(self, &expr, captures);
                log::trace!("Applied rule {} to {}: {}", rule.name, op, result);
                if let Some(applied) = self.applied_rule.as_ref() {
                    applied(rule.name, op, result);
                }
                return result;
            }
        }
        self.memo.intern(expr)
    }

    fn rel(&mut self, expr: RelExpr) -> ExprId {
        self.normalize(Expr::Relational(expr))
    }

    fn scalar(&mut self, expr: ScalarExpr) -> ExprId {
        self.normalize(Expr::Scalar(expr))
    }

    // Relational operators.

    pub fn construct_scan(&mut self, private: ScanPrivate) -> ExprId {
        self.rel(RelExpr::Scan(private))
    }

    /// Builds a VALUES clause. Every row must be a tuple with one element per column.
    pub fn construct_values(&mut self, rows: Vec<ExprId>, cols: Vec<ColumnId>) -> ExprId {
        let id = self.metadata_mut().next_values_id();
        self.rel(RelExpr::Values {
            rows,
            private: ValuesPrivate { cols, id },
        })
    }

    /// Builds a VALUES clause with the given columns and no rows.
    pub fn construct_empty_values(&mut self, cols: &ColSet) -> ExprId {
        self.construct_values(Vec::new(), cols.to_vec())
    }

    pub fn construct_project(&mut self, input: ExprId, projections: Vec<ExprId>, passthrough: ColSet) -> ExprId {
        self.rel(RelExpr::Project {
            input,
            projections,
            passthrough,
        })
    }

    pub fn construct_select(&mut self, input: ExprId, filters: Vec<ExprId>) -> ExprId {
        self.rel(RelExpr::Select { input, filters })
    }

    pub fn construct_join(
        &mut self,
        kind: JoinKind,
        left: ExprId,
        right: ExprId,
        on: Vec<ExprId>,
        flags: JoinFlags,
    ) -> ExprId {
        self.rel(RelExpr::Join {
            kind,
            left,
            right,
            on,
            flags,
        })
    }

    pub fn construct_inner_join(&mut self, left: ExprId, right: ExprId, on: Vec<ExprId>) -> ExprId {
        self.construct_join(JoinKind::Inner, left, right, on, JoinFlags::empty())
    }

    pub fn construct_group_by(
        &mut self,
        kind: GroupByKind,
        input: ExprId,
        aggregations: Vec<ExprId>,
        private: GroupingPrivate,
    ) -> ExprId {
        self.rel(RelExpr::GroupBy {
            kind,
            input,
            aggregations,
            private,
        })
    }

    pub fn construct_set_op(&mut self, kind: SetOpKind, left: ExprId, right: ExprId, private: SetPrivate) -> ExprId {
        self.rel(RelExpr::SetOp {
            kind,
            left,
            right,
            private,
        })
    }

    pub fn construct_limit(&mut self, input: ExprId, limit: ExprId, ordering: OrderingChoice) -> ExprId {
        self.rel(RelExpr::Limit { input, limit, ordering })
    }

    pub fn construct_offset(&mut self, input: ExprId, offset: ExprId, ordering: OrderingChoice) -> ExprId {
        self.rel(RelExpr::Offset {
            input,
            offset,
            ordering,
        })
    }

    pub fn construct_ordinality(&mut self, input: ExprId, private: OrdinalityPrivate) -> ExprId {
        self.rel(RelExpr::Ordinality { input, private })
    }

    pub fn construct_window(&mut self, input: ExprId, windows: Vec<ExprId>, private: WindowPrivate) -> ExprId {
        self.rel(RelExpr::Window {
            input,
            windows,
            private,
        })
    }

    pub fn construct_project_set(&mut self, input: ExprId, zip: Vec<ExprId>) -> ExprId {
        self.rel(RelExpr::ProjectSet { input, zip })
    }

    pub fn construct_mutation(&mut self, kind: MutationKind, input: ExprId, private: MutationPrivate) -> ExprId {
        self.rel(RelExpr::Mutation { kind, input, private })
    }

    pub fn construct_explain(&mut self, input: ExprId, private: ExplainPrivate) -> ExprId {
        self.rel(RelExpr::Explain { input, private })
    }

    // Scalar operators.

    pub fn construct_variable(&mut self, col: ColumnId) -> ExprId {
        self.scalar(ScalarExpr::Variable(col))
    }

    /// Builds a constant. A NULL value becomes a `Null` of unknown type.
    pub fn construct_const(&mut self, value: ScalarValue) -> ExprId {
        match value {
            ScalarValue::Null => self.construct_null(DataType::Unknown),
            ScalarValue::Bool(true) => self.construct_true(),
            ScalarValue::Bool(false) => self.construct_false(),
            value => self.scalar(ScalarExpr::Const(value)),
        }
    }

    pub fn construct_int(&mut self, value: i64) -> ExprId {
        self.construct_const(ScalarValue::Int(value))
    }

    pub fn construct_null(&mut self, data_type: DataType) -> ExprId {
        self.scalar(ScalarExpr::Null(data_type))
    }

    pub fn construct_true(&mut self) -> ExprId {
        self.scalar(ScalarExpr::True)
    }

    pub fn construct_false(&mut self) -> ExprId {
        self.scalar(ScalarExpr::False)
    }

    pub fn construct_bool(&mut self, value: bool) -> ExprId {
        if value {
            self.construct_true()
        } else {
            self.construct_false()
        }
    }

    pub fn construct_placeholder(&mut self, index: usize, data_type: DataType) -> ExprId {
        self.scalar(ScalarExpr::Placeholder { index, data_type })
    }

    pub fn construct_and(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.scalar(ScalarExpr::And(left, right))
    }

    pub fn construct_or(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.scalar(ScalarExpr::Or(left, right))
    }

    pub fn construct_not(&mut self, input: ExprId) -> ExprId {
        self.scalar(ScalarExpr::Not(input))
    }

    pub fn construct_range(&mut self, input: ExprId) -> ExprId {
        self.scalar(ScalarExpr::Range(input))
    }

    pub fn construct_comparison(&mut self, op: CmpOp, left: ExprId, right: ExprId) -> ExprId {
        self.scalar(ScalarExpr::Comparison { op, left, right })
    }

    pub fn construct_eq(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.construct_comparison(CmpOp::Eq, left, right)
    }

    /// Builds `input IS NULL`.
    pub fn construct_is_null(&mut self, input: ExprId) -> ExprId {
        let null = self.construct_null(DataType::Unknown);
        self.construct_comparison(CmpOp::Is, input, null)
    }

    pub fn construct_binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.scalar(ScalarExpr::Binary { op, left, right })
    }

    pub fn construct_unary(&mut self, op: UnaryOp, input: ExprId) -> ExprId {
        self.scalar(ScalarExpr::Unary { op, input })
    }

    pub fn construct_case(&mut self, input: ExprId, whens: Vec<ExprId>, or_else: ExprId) -> ExprId {
        self.scalar(ScalarExpr::Case { input, whens, or_else })
    }

    pub fn construct_when(&mut self, condition: ExprId, value: ExprId) -> ExprId {
        self.scalar(ScalarExpr::When { condition, value })
    }

    pub fn construct_coalesce(&mut self, args: Vec<ExprId>) -> ExprId {
        self.scalar(ScalarExpr::Coalesce(args))
    }

    pub fn construct_tuple(&mut self, elems: Vec<ExprId>) -> ExprId {
        self.scalar(ScalarExpr::Tuple(elems))
    }

    pub fn construct_array(&mut self, elems: Vec<ExprId>, elem_type: DataType) -> ExprId {
        self.scalar(ScalarExpr::Array { elems, elem_type })
    }

    pub fn construct_cast(&mut self, input: ExprId, data_type: DataType) -> ExprId {
        self.scalar(ScalarExpr::Cast { input, data_type })
    }

    pub fn construct_function(&mut self, private: FunctionPrivate, args: Vec<ExprId>) -> ExprId {
        self.scalar(ScalarExpr::Function { private, args })
    }

    pub fn construct_subquery(&mut self, input: ExprId) -> ExprId {
        self.scalar(ScalarExpr::Subquery(input))
    }

    pub fn construct_exists(&mut self, input: ExprId) -> ExprId {
        self.scalar(ScalarExpr::Exists(input))
    }

    pub fn construct_any(&mut self, input: ExprId, scalar: ExprId, cmp: CmpOp) -> ExprId {
        self.scalar(ScalarExpr::Any { input, scalar, cmp })
    }

    pub fn construct_array_flatten(&mut self, input: ExprId, private: ArrayFlattenPrivate) -> ExprId {
        self.scalar(ScalarExpr::ArrayFlatten { input, private })
    }

    pub fn construct_agg(&mut self, func: AggFunc, input: ExprId) -> ExprId {
        self.scalar(ScalarExpr::Agg { func, input })
    }

    pub fn construct_count_rows(&mut self) -> ExprId {
        self.scalar(ScalarExpr::CountRows)
    }

    pub fn construct_agg_distinct(&mut self, input: ExprId) -> ExprId {
        self.scalar(ScalarExpr::AggDistinct(input))
    }

    pub fn construct_agg_filter(&mut self, input: ExprId, filter: ExprId) -> ExprId {
        self.scalar(ScalarExpr::AggFilter { input, filter })
    }

    pub fn construct_window_func(&mut self, func: WindowFunc) -> ExprId {
        self.scalar(ScalarExpr::WindowFunc(func))
    }

    // List items.

    pub fn construct_filters_item(&mut self, condition: ExprId) -> ExprId {
        self.scalar(ScalarExpr::FiltersItem(condition))
    }

    /// Builds a list of filters. Each condition becomes a separate item.
    pub fn construct_filters(&mut self, conditions: &[ExprId]) -> Vec<ExprId> {
        conditions.iter().map(|c| self.construct_filters_item(*c)).collect()
    }

    pub fn construct_projections_item(&mut self, element: ExprId, col: ColumnId) -> ExprId {
        self.scalar(ScalarExpr::ProjectionsItem { element, col })
    }

    pub fn construct_aggregations_item(&mut self, agg: ExprId, col: ColumnId) -> ExprId {
        self.scalar(ScalarExpr::AggregationsItem { agg, col })
    }

    pub fn construct_windows_item(&mut self, function: ExprId, col: ColumnId) -> ExprId {
        self.scalar(ScalarExpr::WindowsItem { function, col })
    }

    pub fn construct_zip_item(&mut self, func: ExprId, cols: Vec<ColumnId>) -> ExprId {
        self.scalar(ScalarExpr::ZipItem { func, cols })
    }
}

impl Debug for Factory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("memo", &self.memo)
            .field("disabled_rules", &self.disabled_rules)
            .field("optimizations_disabled", &self.optimizations_disabled)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::norm::rules::testing::NormTester;
    use crate::norm::RuleName;
    use crate::operators::Operator;

    #[test]
    fn test_applied_rule_callback() {
        let mut t = NormTester::new();
        let applied = Rc::new(RefCell::new(Vec::new()));
        let log = applied.clone();
        t.f.notify_on_applied_rule(move |rule, op, _| log.borrow_mut().push((rule, op)));

        let scan = t.scan_t1();
        let select = t.select(scan, &[]);
        assert_eq!(select, scan);
        assert_eq!(applied.borrow().as_slice(), &[(RuleName::EliminateSelect, Operator::Select)]);
    }

    #[test]
    fn test_matched_rule_callback_can_veto() {
        let mut t = NormTester::new();
        t.f.notify_on_matched_rule(|rule| rule != RuleName::EliminateSelect);
        let scan = t.scan_t1();
        let select = t.select(scan, &[]);
        assert_ne!(select, scan);
    }

    #[test]
    fn test_disable_optimizations() {
        let mut t = NormTester::new();
        t.f.disable_optimizations();
        assert!(t.f.optimizations_disabled());

        let one = t.int(1);
        let two = t.int(2);
        let eq = t.f.construct_eq(one, two);
        t.expect(eq, "1 = 2");
    }

    #[test]
    fn test_reconstruct() {
        let mut t = NormTester::new();
        t.f.disable_optimizations();
        let one = t.int(1);
        let two = t.int(2);
        let eq = t.f.construct_eq(one, two);

        let mut t2 = NormTester::new();
        let memo = t.f.replace_memo(crate::memo::Memo::default());
        t2.f.replace_memo(memo);
        let folded = t2.f.reconstruct(eq);
        assert_ne!(folded, eq);
        t2.expect(folded, "false");
        assert_eq!(t2.f.reconstruct(folded), folded);
    }
}
