//! Scalar operators.

use std::fmt::{Display, Formatter};

use crate::datatypes::DataType;
use crate::memo::ExprId;
use crate::meta::ColumnId;
use crate::operators::scalar::value::ScalarValue;
use crate::operators::Operator;
use crate::properties::OrderingChoice;

pub mod overloads;
pub mod value;

/// A scalar expression. List items (`FiltersItem`, `ProjectionsItem` etc.) are scalar expressions as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarExpr {
    Variable(ColumnId),
    /// A non-NULL constant.
    Const(ScalarValue),
    /// A typed NULL.
    Null(DataType),
    True,
    False,
    /// A query parameter.
    Placeholder {
        index: usize,
        data_type: DataType,
    },
    And(ExprId, ExprId),
    Or(ExprId, ExprId),
    Not(ExprId),
    /// Wraps a conjunction of conditions on a single column that have tight constraints.
    Range(ExprId),
    Comparison {
        op: CmpOp,
        left: ExprId,
        right: ExprId,
    },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Unary {
        op: UnaryOp,
        input: ExprId,
    },
    /// `CASE input WHEN .. THEN .. ELSE or_else END`. A searched case uses `True` as its input.
    Case {
        input: ExprId,
        whens: Vec<ExprId>,
        or_else: ExprId,
    },
    When {
        condition: ExprId,
        value: ExprId,
    },
    Coalesce(Vec<ExprId>),
    Tuple(Vec<ExprId>),
    Array {
        elems: Vec<ExprId>,
        elem_type: DataType,
    },
    Cast {
        input: ExprId,
        data_type: DataType,
    },
    Function {
        private: FunctionPrivate,
        args: Vec<ExprId>,
    },
    /// A subquery that returns a single column and at most one row.
    Subquery(ExprId),
    Exists(ExprId),
    /// `scalar <cmp> ANY (input)`.
    Any {
        input: ExprId,
        scalar: ExprId,
        cmp: CmpOp,
    },
    ArrayFlatten {
        input: ExprId,
        private: ArrayFlattenPrivate,
    },
    Agg {
        func: AggFunc,
        input: ExprId,
    },
    CountRows,
    AggDistinct(ExprId),
    AggFilter {
        input: ExprId,
        filter: ExprId,
    },
    WindowFunc(WindowFunc),
    FiltersItem(ExprId),
    ProjectionsItem {
        element: ExprId,
        col: ColumnId,
    },
    AggregationsItem {
        agg: ExprId,
        col: ColumnId,
    },
    WindowsItem {
        function: ExprId,
        col: ColumnId,
    },
    ZipItem {
        func: ExprId,
        cols: Vec<ColumnId>,
    },
}

impl ScalarExpr {
    /// The operator tag of this expression.
    pub fn op(&self) -> Operator {
        match self {
            ScalarExpr::Variable(_) => Operator::Variable,
            ScalarExpr::Const(_) => Operator::Const,
            ScalarExpr::Null(_) => Operator::Null,
            ScalarExpr::True => Operator::True,
            ScalarExpr::False => Operator::False,
            ScalarExpr::Placeholder { .. } => Operator::Placeholder,
            ScalarExpr::And(_, _) => Operator::And,
            ScalarExpr::Or(_, _) => Operator::Or,
            ScalarExpr::Not(_) => Operator::Not,
            ScalarExpr::Range(_) => Operator::Range,
            ScalarExpr::Comparison { op, .. } => op.op(),
            ScalarExpr::Binary { op, .. } => op.op(),
            ScalarExpr::Unary { op, .. } => match op {
                UnaryOp::Minus => Operator::UnaryMinus,
                UnaryOp::BitNot => Operator::BitNot,
            },
            ScalarExpr::Case { .. } => Operator::Case,
            ScalarExpr::When { .. } => Operator::When,
            ScalarExpr::Coalesce(_) => Operator::Coalesce,
            ScalarExpr::Tuple(_) => Operator::Tuple,
            ScalarExpr::Array { .. } => Operator::Array,
            ScalarExpr::Cast { .. } => Operator::Cast,
            ScalarExpr::Function { .. } => Operator::Function,
            ScalarExpr::Subquery(_) => Operator::Subquery,
            ScalarExpr::Exists(_) => Operator::Exists,
            ScalarExpr::Any { .. } => Operator::Any,
            ScalarExpr::ArrayFlatten { .. } => Operator::ArrayFlatten,
            ScalarExpr::Agg { func, .. } => func.op(),
            ScalarExpr::CountRows => Operator::CountRows,
            ScalarExpr::AggDistinct(_) => Operator::AggDistinct,
            ScalarExpr::AggFilter { .. } => Operator::AggFilter,
            ScalarExpr::WindowFunc(func) => match func {
                WindowFunc::RowNumber => Operator::RowNumber,
                WindowFunc::Rank => Operator::Rank,
                WindowFunc::DenseRank => Operator::DenseRank,
            },
            ScalarExpr::FiltersItem(_) => Operator::FiltersItem,
            ScalarExpr::ProjectionsItem { .. } => Operator::ProjectionsItem,
            ScalarExpr::AggregationsItem { .. } => Operator::AggregationsItem,
            ScalarExpr::WindowsItem { .. } => Operator::WindowsItem,
            ScalarExpr::ZipItem { .. } => Operator::ZipItem,
        }
    }

    /// All children of this expression. Relational inputs of subqueries are included.
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            ScalarExpr::Variable(_)
            | ScalarExpr::Const(_)
            | ScalarExpr::Null(_)
            | ScalarExpr::True
            | ScalarExpr::False
            | ScalarExpr::Placeholder { .. }
            | ScalarExpr::CountRows
            | ScalarExpr::WindowFunc(_) => Vec::new(),
            ScalarExpr::And(l, r) | ScalarExpr::Or(l, r) => vec![*l, *r],
            ScalarExpr::Not(e)
            | ScalarExpr::Range(e)
            | ScalarExpr::Subquery(e)
            | ScalarExpr::Exists(e)
            | ScalarExpr::AggDistinct(e)
            | ScalarExpr::FiltersItem(e) => vec![*e],
            ScalarExpr::Comparison { left, right, .. } | ScalarExpr::Binary { left, right, .. } => vec![*left, *right],
            ScalarExpr::Unary { input, .. } | ScalarExpr::Cast { input, .. } | ScalarExpr::Agg { input, .. } => {
                vec![*input]
            }
            ScalarExpr::Case { input, whens, or_else } => {
                let mut children = Vec::with_capacity(whens.len() + 2);
                children.push(*input);
                children.extend_from_slice(whens);
                children.push(*or_else);
                children
            }
            ScalarExpr::When { condition, value } => vec![*condition, *value],
            ScalarExpr::Coalesce(args) | ScalarExpr::Tuple(args) => args.clone(),
            ScalarExpr::Array { elems, .. } => elems.clone(),
            ScalarExpr::Function { args, .. } => args.clone(),
            ScalarExpr::Any { input, scalar, .. } => vec![*input, *scalar],
            ScalarExpr::ArrayFlatten { input, .. } => vec![*input],
            ScalarExpr::AggFilter { input, filter } => vec![*input, *filter],
            ScalarExpr::ProjectionsItem { element, .. } => vec![*element],
            ScalarExpr::AggregationsItem { agg, .. } => vec![*agg],
            ScalarExpr::WindowsItem { function, .. } => vec![*function],
            ScalarExpr::ZipItem { func, .. } => vec![*func],
        }
    }

    /// Returns a copy of this expression where every child is replaced by the result of the given function.
    pub fn map_children<F>(&self, mut f: F) -> ScalarExpr
    where
        F: FnMut(ExprId) -> ExprId,
    {
        match self {
            ScalarExpr::Variable(_)
            | ScalarExpr::Const(_)
            | ScalarExpr::Null(_)
            | ScalarExpr::True
            | ScalarExpr::False
            | ScalarExpr::Placeholder { .. }
            | ScalarExpr::CountRows
            | ScalarExpr::WindowFunc(_) => self.clone(),
            ScalarExpr::And(l, r) => ScalarExpr::And(f(*l), f(*r)),
            ScalarExpr::Or(l, r) => ScalarExpr::Or(f(*l), f(*r)),
            ScalarExpr::Not(e) => ScalarExpr::Not(f(*e)),
            ScalarExpr::Range(e) => ScalarExpr::Range(f(*e)),
            ScalarExpr::Comparison { op, left, right } => ScalarExpr::Comparison {
                op: *op,
                left: f(*left),
                right: f(*right),
            },
            ScalarExpr::Binary { op, left, right } => ScalarExpr::Binary {
                op: *op,
                left: f(*left),
                right: f(*right),
            },
            ScalarExpr::Unary { op, input } => ScalarExpr::Unary {
                op: *op,
                input: f(*input),
            },
            ScalarExpr::Case { input, whens, or_else } => ScalarExpr::Case {
                input: f(*input),
                whens: whens.iter().map(|w| f(*w)).collect(),
                or_else: f(*or_else),
            },
            ScalarExpr::When { condition, value } => ScalarExpr::When {
                condition: f(*condition),
                value: f(*value),
            },
            ScalarExpr::Coalesce(args) => ScalarExpr::Coalesce(args.iter().map(|a| f(*a)).collect()),
            ScalarExpr::Tuple(args) => ScalarExpr::Tuple(args.iter().map(|a| f(*a)).collect()),
            ScalarExpr::Array { elems, elem_type } => ScalarExpr::Array {
                elems: elems.iter().map(|e| f(*e)).collect(),
                elem_type: elem_type.clone(),
            },
            ScalarExpr::Cast { input, data_type } => ScalarExpr::Cast {
                input: f(*input),
                data_type: data_type.clone(),
            },
            ScalarExpr::Function { private, args } => ScalarExpr::Function {
                private: private.clone(),
                args: args.iter().map(|a| f(*a)).collect(),
            },
            ScalarExpr::Subquery(e) => ScalarExpr::Subquery(f(*e)),
            ScalarExpr::Exists(e) => ScalarExpr::Exists(f(*e)),
            ScalarExpr::Any { input, scalar, cmp } => ScalarExpr::Any {
                input: f(*input),
                scalar: f(*scalar),
                cmp: *cmp,
            },
            ScalarExpr::ArrayFlatten { input, private } => ScalarExpr::ArrayFlatten {
                input: f(*input),
                private: private.clone(),
            },
            ScalarExpr::Agg { func, input } => ScalarExpr::Agg {
                func: *func,
                input: f(*input),
            },
            ScalarExpr::AggDistinct(e) => ScalarExpr::AggDistinct(f(*e)),
            ScalarExpr::AggFilter { input, filter } => ScalarExpr::AggFilter {
                input: f(*input),
                filter: f(*filter),
            },
            ScalarExpr::FiltersItem(e) => ScalarExpr::FiltersItem(f(*e)),
            ScalarExpr::ProjectionsItem { element, col } => ScalarExpr::ProjectionsItem {
                element: f(*element),
                col: *col,
            },
            ScalarExpr::AggregationsItem { agg, col } => ScalarExpr::AggregationsItem { agg: f(*agg), col: *col },
            ScalarExpr::WindowsItem { function, col } => ScalarExpr::WindowsItem {
                function: f(*function),
                col: *col,
            },
            ScalarExpr::ZipItem { func, cols } => ScalarExpr::ZipItem {
                func: f(*func),
                cols: cols.clone(),
            },
        }
    }

    /// Returns the identifiers of children that are relational expressions (inputs of subqueries).
    pub fn relational_children(&self) -> Vec<ExprId> {
        match self {
            ScalarExpr::Subquery(e) | ScalarExpr::Exists(e) => vec![*e],
            ScalarExpr::Any { input, .. } | ScalarExpr::ArrayFlatten { input, .. } => vec![*input],
            _ => Vec::new(),
        }
    }

    /// Returns the constant value of this expression if this is a `Const`, `Null`, `True` or `False`.
    pub fn const_value(&self) -> Option<ScalarValue> {
        match self {
            ScalarExpr::Const(v) => Some(v.clone()),
            ScalarExpr::Null(_) => Some(ScalarValue::Null),
            ScalarExpr::True => Some(ScalarValue::Bool(true)),
            ScalarExpr::False => Some(ScalarValue::Bool(false)),
            _ => None,
        }
    }

    /// Columns produced by this list item.
    pub fn item_cols(&self) -> Vec<ColumnId> {
        match self {
            ScalarExpr::ProjectionsItem { col, .. }
            | ScalarExpr::AggregationsItem { col, .. }
            | ScalarExpr::WindowsItem { col, .. } => vec![*col],
            ScalarExpr::ZipItem { cols, .. } => cols.clone(),
            _ => Vec::new(),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `IS NOT DISTINCT FROM`. `a IS NULL` is `Is(a, Null)`.
    Is,
    /// `IS DISTINCT FROM`.
    IsNot,
    In,
    NotIn,
    Like,
    NotLike,
}

impl CmpOp {
    pub fn op(&self) -> Operator {
        match self {
            CmpOp::Eq => Operator::Eq,
            CmpOp::Ne => Operator::Ne,
            CmpOp::Lt => Operator::Lt,
            CmpOp::Le => Operator::Le,
            CmpOp::Gt => Operator::Gt,
            CmpOp::Ge => Operator::Ge,
            CmpOp::Is => Operator::Is,
            CmpOp::IsNot => Operator::IsNot,
            CmpOp::In => Operator::In,
            CmpOp::NotIn => Operator::NotIn,
            CmpOp::Like => Operator::Like,
            CmpOp::NotLike => Operator::NotLike,
        }
    }

    /// The comparison that holds when the operands are swapped: `a < b` is `b > a`.
    pub fn commute(&self) -> Option<CmpOp> {
        match self {
            CmpOp::Eq => Some(CmpOp::Eq),
            CmpOp::Ne => Some(CmpOp::Ne),
            CmpOp::Lt => Some(CmpOp::Gt),
            CmpOp::Le => Some(CmpOp::Ge),
            CmpOp::Gt => Some(CmpOp::Lt),
            CmpOp::Ge => Some(CmpOp::Le),
            CmpOp::Is => Some(CmpOp::Is),
            CmpOp::IsNot => Some(CmpOp::IsNot),
            _ => None,
        }
    }

    /// The comparison that holds when this comparison is false (ignoring NULLs).
    pub fn negate(&self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
            CmpOp::Is => CmpOp::IsNot,
            CmpOp::IsNot => CmpOp::Is,
            CmpOp::In => CmpOp::NotIn,
            CmpOp::NotIn => CmpOp::In,
            CmpOp::Like => CmpOp::NotLike,
            CmpOp::NotLike => CmpOp::Like,
        }
    }

    /// Returns `true` for `<`, `<=`, `>` and `>=`.
    pub fn is_inequality(&self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge)
    }
}

impl Display for CmpOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Is => "IS",
            CmpOp::IsNot => "IS NOT",
            CmpOp::In => "IN",
            CmpOp::NotIn => "NOT IN",
            CmpOp::Like => "LIKE",
            CmpOp::NotLike => "NOT LIKE",
        };
        write!(f, "{}", s)
    }
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Plus,
    Minus,
    Mult,
    Div,
    Mod,
    Concat,
}

impl BinaryOp {
    pub fn op(&self) -> Operator {
        match self {
            BinaryOp::Plus => Operator::Plus,
            BinaryOp::Minus => Operator::Minus,
            BinaryOp::Mult => Operator::Mult,
            BinaryOp::Div => Operator::Div,
            BinaryOp::Mod => Operator::Mod,
            BinaryOp::Concat => Operator::Concat,
        }
    }

    /// Returns `true` if operands of this operator can be swapped.
    pub fn is_commutative(&self) -> bool {
        matches!(self, BinaryOp::Plus | BinaryOp::Mult)
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mult => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => "||",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Minus,
    BitNot,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Minus => write!(f, "-"),
            UnaryOp::BitNot => write!(f, "~"),
        }
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggFunc {
    Sum,
    Count,
    Min,
    Max,
    Avg,
    /// Returns the value of a column that is constant within a group.
    ConstAgg,
    /// Returns the first value of a column within a group.
    FirstAgg,
    BoolAnd,
    BoolOr,
}

impl AggFunc {
    pub fn op(&self) -> Operator {
        match self {
            AggFunc::Sum => Operator::Sum,
            AggFunc::Count => Operator::Count,
            AggFunc::Min => Operator::Min,
            AggFunc::Max => Operator::Max,
            AggFunc::Avg => Operator::Avg,
            AggFunc::ConstAgg => Operator::ConstAgg,
            AggFunc::FirstAgg => Operator::FirstAgg,
            AggFunc::BoolAnd => Operator::BoolAnd,
            AggFunc::BoolOr => Operator::BoolOr,
        }
    }

    /// The type of the result of this aggregate function for an argument of the given type.
    pub fn return_type(&self, arg: &DataType) -> DataType {
        match self {
            AggFunc::Count => DataType::Int,
            AggFunc::Avg => DataType::Float,
            AggFunc::BoolAnd | AggFunc::BoolOr => DataType::Bool,
            AggFunc::Sum | AggFunc::Min | AggFunc::Max | AggFunc::ConstAgg | AggFunc::FirstAgg => arg.clone(),
        }
    }

    /// Returns `true` if duplicate input values do not change the result.
    pub fn ignores_duplicates(&self) -> bool {
        matches!(
            self,
            AggFunc::Min | AggFunc::Max | AggFunc::ConstAgg | AggFunc::BoolAnd | AggFunc::BoolOr
        )
    }
}

/// Window functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowFunc {
    RowNumber,
    Rank,
    DenseRank,
}

/// A function call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionPrivate {
    pub name: String,
    pub return_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayFlattenPrivate {
    /// The ordering of elements of the resulting array.
    pub ordering: OrderingChoice,
    /// The column of the input whose values become elements of the array.
    pub requested_col: ColumnId,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_children() {
        let case = ScalarExpr::Case {
            input: ExprId(1),
            whens: vec![ExprId(2), ExprId(3)],
            or_else: ExprId(4),
        };
        assert_eq!(case.op(), Operator::Case);
        assert_eq!(case.children(), vec![ExprId(1), ExprId(2), ExprId(3), ExprId(4)]);

        let mapped = case.map_children(|e| ExprId(e.0 * 2));
        assert_eq!(mapped.children(), vec![ExprId(2), ExprId(4), ExprId(6), ExprId(8)]);
    }

    #[test]
    fn test_cmp_ops() {
        assert_eq!(CmpOp::Lt.commute(), Some(CmpOp::Gt));
        assert_eq!(CmpOp::In.commute(), None);
        assert_eq!(CmpOp::Ge.negate(), CmpOp::Lt);
        assert_eq!(CmpOp::Is.negate().negate(), CmpOp::Is);
        assert_eq!(CmpOp::NotLike.op(), Operator::NotLike);
    }

    #[test]
    fn test_const_value() {
        assert_eq!(ScalarExpr::True.const_value(), Some(ScalarValue::Bool(true)));
        assert_eq!(ScalarExpr::Null(DataType::Int).const_value(), Some(ScalarValue::Null));
        assert_eq!(ScalarExpr::Variable(ColumnId::new(1)).const_value(), None);
    }
}
