//! Operators and expressions.
//!
//! An [expression](Expr) is either a [relational](RelExpr) or a [scalar](ScalarExpr) expression.
//! Every expression has an [operator tag](Operator). Children of an expression are referenced
//! by [identifiers](ExprId) of expressions interned in the same [memo](crate::memo::Memo).

use std::fmt::{Display, Formatter};

use crate::memo::ExprId;

pub mod format;
pub mod relational;
pub mod scalar;

pub use relational::RelExpr;
pub use scalar::ScalarExpr;

/// An expression stored in a [memo](crate::memo::Memo).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Relational(RelExpr),
    Scalar(ScalarExpr),
}

impl Expr {
    /// The operator tag of this expression.
    pub fn op(&self) -> Operator {
        match self {
            Expr::Relational(expr) => expr.op(),
            Expr::Scalar(expr) => expr.op(),
        }
    }

    /// Returns `true` if this is a relational expression.
    pub fn is_relational(&self) -> bool {
        matches!(self, Expr::Relational(_))
    }

    /// Returns `true` if this is a scalar expression.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Expr::Scalar(_))
    }

    /// Returns the underlying relational expression.
    ///
    /// # Panics
    ///
    /// This method panics if this is not a relational expression.
    pub fn as_relational(&self) -> &RelExpr {
        match self {
            Expr::Relational(expr) => expr,
            Expr::Scalar(expr) => panic!("Expected a relational expression but got {:?}", expr),
        }
    }

    /// Returns the underlying scalar expression.
    ///
    /// # Panics
    ///
    /// This method panics if this is not a scalar expression.
    pub fn as_scalar(&self) -> &ScalarExpr {
        match self {
            Expr::Relational(expr) => panic!("Expected a scalar expression but got {:?}", expr),
            Expr::Scalar(expr) => expr,
        }
    }

    /// All children of this expression in the order they appear in the expression.
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            Expr::Relational(expr) => expr.children(),
            Expr::Scalar(expr) => expr.children(),
        }
    }

    /// Returns a copy of this expression where every child is replaced by the result of the given function.
    pub fn map_children<F>(&self, f: F) -> Expr
    where
        F: FnMut(ExprId) -> ExprId,
    {
        match self {
            Expr::Relational(expr) => Expr::Relational(expr.map_children(f)),
            Expr::Scalar(expr) => Expr::Scalar(expr.map_children(f)),
        }
    }
}

impl From<RelExpr> for Expr {
    fn from(expr: RelExpr) -> Self {
        Expr::Relational(expr)
    }
}

impl From<ScalarExpr> for Expr {
    fn from(expr: ScalarExpr) -> Self {
        Expr::Scalar(expr)
    }
}

/// Operator tags. The set of operators is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    // Relational operators.
    Scan,
    Values,
    Project,
    Select,
    InnerJoin,
    LeftJoin,
    FullJoin,
    SemiJoin,
    AntiJoin,
    LookupJoin,
    MergeJoin,
    ZigzagJoin,
    IndexJoin,
    GroupBy,
    ScalarGroupBy,
    DistinctOn,
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
    Limit,
    Offset,
    Sort,
    Ordinality,
    Window,
    ProjectSet,
    Insert,
    Update,
    Delete,
    Upsert,
    Explain,
    // Scalar operators.
    Variable,
    Const,
    Null,
    True,
    False,
    Placeholder,
    And,
    Or,
    Not,
    Range,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,
    In,
    NotIn,
    Like,
    NotLike,
    Plus,
    Minus,
    Mult,
    Div,
    Mod,
    Concat,
    UnaryMinus,
    BitNot,
    Case,
    When,
    Coalesce,
    Tuple,
    Array,
    Cast,
    Function,
    Subquery,
    Exists,
    Any,
    ArrayFlatten,
    Sum,
    Count,
    CountRows,
    Min,
    Max,
    Avg,
    ConstAgg,
    FirstAgg,
    BoolAnd,
    BoolOr,
    AggDistinct,
    AggFilter,
    RowNumber,
    Rank,
    DenseRank,
    // Lists.
    Filters,
    Projections,
    Aggregations,
    Windows,
    Zip,
    // List items.
    FiltersItem,
    ProjectionsItem,
    AggregationsItem,
    WindowsItem,
    ZipItem,
}

impl Operator {
    /// Returns `true` if this is a relational operator.
    pub fn is_relational(&self) -> bool {
        *self <= Operator::Explain
    }

    /// Returns `true` if this is a scalar operator (list and list item operators are scalar).
    pub fn is_scalar(&self) -> bool {
        !self.is_relational()
    }

    /// Returns `true` if this is a join operator.
    pub fn is_join(&self) -> bool {
        matches!(
            self,
            Operator::InnerJoin
                | Operator::LeftJoin
                | Operator::FullJoin
                | Operator::SemiJoin
                | Operator::AntiJoin
                | Operator::LookupJoin
                | Operator::MergeJoin
                | Operator::ZigzagJoin
                | Operator::IndexJoin
        )
    }

    /// Returns `true` if this is an aggregate function.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Operator::Sum
                | Operator::Count
                | Operator::CountRows
                | Operator::Min
                | Operator::Max
                | Operator::Avg
                | Operator::ConstAgg
                | Operator::FirstAgg
                | Operator::BoolAnd
                | Operator::BoolOr
        )
    }

    /// Returns `true` if this is a window function.
    pub fn is_window(&self) -> bool {
        matches!(self, Operator::RowNumber | Operator::Rank | Operator::DenseRank)
    }

    /// Returns `true` if this is a list operator.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Operator::Filters | Operator::Projections | Operator::Aggregations | Operator::Windows | Operator::Zip
        )
    }

    /// Returns `true` if this is a list item operator.
    pub fn is_list_item(&self) -> bool {
        self.owning_list().is_some()
    }

    /// The list operator a list item belongs to.
    pub fn owning_list(&self) -> Option<Operator> {
        match self {
            Operator::FiltersItem => Some(Operator::Filters),
            Operator::ProjectionsItem => Some(Operator::Projections),
            Operator::AggregationsItem => Some(Operator::Aggregations),
            Operator::WindowsItem => Some(Operator::Windows),
            Operator::ZipItem => Some(Operator::Zip),
            _ => None,
        }
    }

    /// Returns `true` if this operator is a constant value: `Const`, `Null`, `True` or `False`.
    pub fn is_const_value(&self) -> bool {
        matches!(self, Operator::Const | Operator::Null | Operator::True | Operator::False)
    }

    /// Returns `true` if this is a comparison operator.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::Ne
                | Operator::Lt
                | Operator::Le
                | Operator::Gt
                | Operator::Ge
                | Operator::Is
                | Operator::IsNot
                | Operator::In
                | Operator::NotIn
                | Operator::Like
                | Operator::NotLike
        )
    }

    /// Returns `true` if this is a set operator.
    pub fn is_set_op(&self) -> bool {
        matches!(
            self,
            Operator::Union
                | Operator::UnionAll
                | Operator::Intersect
                | Operator::IntersectAll
                | Operator::Except
                | Operator::ExceptAll
        )
    }

    /// Returns `true` if this is a mutation operator.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Operator::Insert | Operator::Update | Operator::Delete | Operator::Upsert)
    }

    /// The name of this operator.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Scan => "scan",
            Operator::Values => "values",
            Operator::Project => "project",
            Operator::Select => "select",
            Operator::InnerJoin => "inner-join",
            Operator::LeftJoin => "left-join",
            Operator::FullJoin => "full-join",
            Operator::SemiJoin => "semi-join",
            Operator::AntiJoin => "anti-join",
            Operator::LookupJoin => "lookup-join",
            Operator::MergeJoin => "merge-join",
            Operator::ZigzagJoin => "zigzag-join",
            Operator::IndexJoin => "index-join",
            Operator::GroupBy => "group-by",
            Operator::ScalarGroupBy => "scalar-group-by",
            Operator::DistinctOn => "distinct-on",
            Operator::Union => "union",
            Operator::UnionAll => "union-all",
            Operator::Intersect => "intersect",
            Operator::IntersectAll => "intersect-all",
            Operator::Except => "except",
            Operator::ExceptAll => "except-all",
            Operator::Limit => "limit",
            Operator::Offset => "offset",
            Operator::Sort => "sort",
            Operator::Ordinality => "ordinality",
            Operator::Window => "window",
            Operator::ProjectSet => "project-set",
            Operator::Insert => "insert",
            Operator::Update => "update",
            Operator::Delete => "delete",
            Operator::Upsert => "upsert",
            Operator::Explain => "explain",
            Operator::Variable => "variable",
            Operator::Const => "const",
            Operator::Null => "null",
            Operator::True => "true",
            Operator::False => "false",
            Operator::Placeholder => "placeholder",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
            Operator::Range => "range",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Is => "is",
            Operator::IsNot => "is-not",
            Operator::In => "in",
            Operator::NotIn => "not-in",
            Operator::Like => "like",
            Operator::NotLike => "not-like",
            Operator::Plus => "plus",
            Operator::Minus => "minus",
            Operator::Mult => "mult",
            Operator::Div => "div",
            Operator::Mod => "mod",
            Operator::Concat => "concat",
            Operator::UnaryMinus => "unary-minus",
            Operator::BitNot => "bit-not",
            Operator::Case => "case",
            Operator::When => "when",
            Operator::Coalesce => "coalesce",
            Operator::Tuple => "tuple",
            Operator::Array => "array",
            Operator::Cast => "cast",
            Operator::Function => "function",
            Operator::Subquery => "subquery",
            Operator::Exists => "exists",
            Operator::Any => "any",
            Operator::ArrayFlatten => "array-flatten",
            Operator::Sum => "sum",
            Operator::Count => "count",
            Operator::CountRows => "count-rows",
            Operator::Min => "min",
            Operator::Max => "max",
            Operator::Avg => "avg",
            Operator::ConstAgg => "const-agg",
            Operator::FirstAgg => "first-agg",
            Operator::BoolAnd => "bool-and",
            Operator::BoolOr => "bool-or",
            Operator::AggDistinct => "agg-distinct",
            Operator::AggFilter => "agg-filter",
            Operator::RowNumber => "row-number",
            Operator::Rank => "rank",
            Operator::DenseRank => "dense-rank",
            Operator::Filters => "filters",
            Operator::Projections => "projections",
            Operator::Aggregations => "aggregations",
            Operator::Windows => "windows",
            Operator::Zip => "zip",
            Operator::FiltersItem => "filters-item",
            Operator::ProjectionsItem => "projections-item",
            Operator::AggregationsItem => "aggregations-item",
            Operator::WindowsItem => "windows-item",
            Operator::ZipItem => "zip-item",
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod test {
    use super::Operator;

    #[test]
    fn test_operator_kinds() {
        assert!(Operator::Scan.is_relational());
        assert!(Operator::Explain.is_relational());
        assert!(Operator::Variable.is_scalar());
        assert!(Operator::FiltersItem.is_scalar());

        assert!(Operator::LookupJoin.is_join());
        assert!(!Operator::Select.is_join());
        assert!(Operator::ConstAgg.is_aggregate());
        assert!(!Operator::AggDistinct.is_aggregate());

        assert!(Operator::Filters.is_list());
        assert!(!Operator::Filters.is_list_item());
        assert_eq!(Operator::ZipItem.owning_list(), Some(Operator::Zip));
        assert!(Operator::Null.is_const_value());
        assert!(!Operator::Placeholder.is_const_value());
    }

    #[test]
    fn test_names() {
        assert_eq!(Operator::InnerJoin.to_string(), "inner-join");
        assert_eq!(Operator::ProjectionsItem.to_string(), "projections-item");
    }
}
