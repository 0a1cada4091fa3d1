//! Helper functions used by normalization rules.

use crate::datatypes::DataType;
use crate::memo::ExprId;
use crate::norm::Factory;
use crate::operators::relational::JoinKind;
use crate::operators::scalar::value::ScalarValue;
use crate::operators::ScalarExpr;
use crate::properties::ColSet;

/// Destructures a candidate expression inside a matcher. Returns `None` from the matcher
/// when the expression does not match the pattern.
macro_rules! match_expr {
    ($expr:expr, $pat:pat => $res:expr) => {
        match $expr {
            $pat => $res,
            _ => return None,
        }
    };
}

/// Destructures an expression that has already been matched by a rule.
macro_rules! expect_expr {
    ($expr:expr, $pat:pat => $res:expr) => {
        match $expr {
            $pat => $res,
            other => unreachable!("Unexpected expression: {:?}", other),
        }
    };
}

impl Factory {
    pub(crate) fn scalar_of(&self, id: ExprId) -> &ScalarExpr {
        self.memo.scalar_expr(id)
    }

    /// The value of a `Const`, `Null`, `True` or `False` expression.
    pub(crate) fn const_of(&self, id: ExprId) -> Option<ScalarValue> {
        self.memo.scalar_expr(id).const_value()
    }

    pub(crate) fn is_const(&self, id: ExprId) -> bool {
        self.memo.scalar_expr(id).op().is_const_value()
    }

    pub(crate) fn is_null(&self, id: ExprId) -> bool {
        matches!(self.memo.scalar_expr(id), ScalarExpr::Null(_))
    }

    pub(crate) fn is_true(&self, id: ExprId) -> bool {
        matches!(self.memo.scalar_expr(id), ScalarExpr::True)
    }

    pub(crate) fn is_false(&self, id: ExprId) -> bool {
        matches!(self.memo.scalar_expr(id), ScalarExpr::False)
    }

    pub(crate) fn type_of(&self, id: ExprId) -> DataType {
        self.memo.scalar_props(id).data_type.clone()
    }

    /// Output columns of a relational expression.
    pub(crate) fn output_cols(&self, id: ExprId) -> &ColSet {
        &self.memo.logical(id).output_cols
    }

    /// Columns referenced by a scalar expression.
    pub(crate) fn outer_cols(&self, id: ExprId) -> &ColSet {
        &self.memo.scalar_props(id).outer_cols
    }

    /// Columns produced by a join of the given kind.
    pub(crate) fn join_output_cols(&self, kind: JoinKind, left: ExprId, right: ExprId) -> ColSet {
        if kind.is_semi_or_anti() {
            self.output_cols(left).clone()
        } else {
            self.output_cols(left).union(self.output_cols(right))
        }
    }

    /// The condition of a filters item.
    pub(crate) fn condition(&self, item: ExprId) -> ExprId {
        match self.memo.scalar_expr(item) {
            ScalarExpr::FiltersItem(condition) => *condition,
            _ => item,
        }
    }

    /// Splits a condition into its conjuncts.
    pub(crate) fn conjuncts(&self, condition: ExprId) -> Vec<ExprId> {
        let mut result = Vec::new();
        self.collect_conjuncts(condition, &mut result);
        result
    }

    fn collect_conjuncts(&self, condition: ExprId, result: &mut Vec<ExprId>) {
        match self.memo.scalar_expr(condition) {
            ScalarExpr::And(left, right) => {
                self.collect_conjuncts(*left, result);
                self.collect_conjuncts(*right, result);
            }
            _ => result.push(condition),
        }
    }

    /// Returns `true` if the given filters item never holds.
    pub(crate) fn is_contradiction(&self, item: ExprId) -> bool {
        let condition = self.condition(item);
        if self.is_false(condition) || self.is_null(condition) {
            return true;
        }
        let props = self.memo.scalar_props(item);
        props.constraints.as_ref().map(|c| c.is_contradiction()).unwrap_or_default()
    }

    /// Returns `true` if a filter list contains a condition that is `True` or a conjunction.
    pub(crate) fn can_simplify_filters(&self, filters: &[ExprId]) -> bool {
        filters.iter().any(|item| {
            let condition = self.condition(*item);
            matches!(self.memo.scalar_expr(condition), ScalarExpr::True | ScalarExpr::And(_, _))
        })
    }

    /// Drops `True` conditions and splits conjunctions into separate items.
    pub(crate) fn simplify_filters(&mut self, filters: &[ExprId]) -> Vec<ExprId> {
        let mut result = Vec::with_capacity(filters.len());
        for item in filters {
            let condition = self.condition(*item);
            match self.memo.scalar_expr(condition) {
                ScalarExpr::True => {}
                ScalarExpr::And(_, _) => {
                    for conjunct in self.conjuncts(condition) {
                        if !self.is_true(conjunct) {
                            result.push(self.construct_filters_item(conjunct));
                        }
                    }
                }
                _ => result.push(*item),
            }
        }
        result
    }

    /// Builds a left-deep conjunction of the given conditions. An empty list is `True`.
    pub(crate) fn construct_conjunction(&mut self, conditions: &[ExprId]) -> ExprId {
        match conditions.split_first() {
            None => self.construct_true(),
            Some((first, rest)) => {
                let mut result = *first;
                for condition in rest {
                    result = self.construct_and(result, *condition);
                }
                result
            }
        }
    }

    /// Splits filters into items that can be evaluated against the `bound` columns alone and the rest.
    /// An item moves when it references at least one `bound` column and no `other` column.
    pub(crate) fn split_filters(&self, filters: &[ExprId], bound: &ColSet, other: &ColSet) -> (Vec<ExprId>, Vec<ExprId>) {
        filters.iter().copied().partition(|item| {
            let outer_cols = self.outer_cols(*item);
            outer_cols.intersects(bound) && !outer_cols.intersects(other)
        })
    }

    pub(crate) fn any_filter_bound_by(&self, filters: &[ExprId], bound: &ColSet, other: &ColSet) -> bool {
        filters.iter().any(|item| {
            let outer_cols = self.outer_cols(*item);
            outer_cols.intersects(bound) && !outer_cols.intersects(other)
        })
    }

    /// The integer value of a constant expression.
    pub(crate) fn const_int(&self, id: ExprId) -> Option<i64> {
        match self.memo.scalar_expr(id) {
            ScalarExpr::Const(ScalarValue::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

pub(crate) fn has_duplicates(items: &[ExprId]) -> bool {
    items.iter().enumerate().any(|(i, item)| items[..i].contains(item))
}

pub(crate) fn remove_duplicates(items: &[ExprId]) -> Vec<ExprId> {
    let mut result: Vec<ExprId> = Vec::with_capacity(items.len());
    for item in items {
        if !result.contains(item) {
            result.push(*item);
        }
    }
    result
}

pub(crate) fn is_sorted(items: &[ExprId]) -> bool {
    items.windows(2).all(|w| w[0] <= w[1])
}
