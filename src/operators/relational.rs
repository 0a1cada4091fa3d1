//! Relational operators.

use crate::memo::{ExprId, PhysPropsId};
use crate::meta::{ColumnId, TableId, ValuesId};
use crate::operators::Operator;
use crate::properties::{ColSet, OrderingChoice};

/// A relational expression. Relational children are referenced by the identifier of the first
/// expression of their group. Lists (filters, projections etc.) are stored inline as identifiers of list items.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelExpr {
    Scan(ScanPrivate),
    Values {
        /// Each row is a tuple.
        rows: Vec<ExprId>,
        private: ValuesPrivate,
    },
    Project {
        input: ExprId,
        projections: Vec<ExprId>,
        passthrough: ColSet,
    },
    Select {
        input: ExprId,
        filters: Vec<ExprId>,
    },
    Join {
        kind: JoinKind,
        left: ExprId,
        right: ExprId,
        on: Vec<ExprId>,
        flags: JoinFlags,
    },
    LookupJoin {
        kind: JoinKind,
        input: ExprId,
        on: Vec<ExprId>,
        private: LookupJoinPrivate,
    },
    MergeJoin {
        kind: JoinKind,
        left: ExprId,
        right: ExprId,
        on: Vec<ExprId>,
        private: MergeJoinPrivate,
    },
    ZigzagJoin {
        on: Vec<ExprId>,
        private: ZigzagJoinPrivate,
    },
    IndexJoin {
        input: ExprId,
        private: IndexJoinPrivate,
    },
    GroupBy {
        kind: GroupByKind,
        input: ExprId,
        aggregations: Vec<ExprId>,
        private: GroupingPrivate,
    },
    SetOp {
        kind: SetOpKind,
        left: ExprId,
        right: ExprId,
        private: SetPrivate,
    },
    Limit {
        input: ExprId,
        limit: ExprId,
        ordering: OrderingChoice,
    },
    Offset {
        input: ExprId,
        offset: ExprId,
        ordering: OrderingChoice,
    },
    /// Sort enforcer. Only created by the optimizer.
    Sort {
        input: ExprId,
        ordering: OrderingChoice,
    },
    Ordinality {
        input: ExprId,
        private: OrdinalityPrivate,
    },
    Window {
        input: ExprId,
        windows: Vec<ExprId>,
        private: WindowPrivate,
    },
    ProjectSet {
        input: ExprId,
        zip: Vec<ExprId>,
    },
    Mutation {
        kind: MutationKind,
        input: ExprId,
        private: MutationPrivate,
    },
    Explain {
        input: ExprId,
        private: ExplainPrivate,
    },
}

impl RelExpr {
    /// The operator tag of this expression.
    pub fn op(&self) -> Operator {
        match self {
            RelExpr::Scan(_) => Operator::Scan,
            RelExpr::Values { .. } => Operator::Values,
            RelExpr::Project { .. } => Operator::Project,
            RelExpr::Select { .. } => Operator::Select,
            RelExpr::Join { kind, .. } => kind.op(),
            RelExpr::LookupJoin { .. } => Operator::LookupJoin,
            RelExpr::MergeJoin { .. } => Operator::MergeJoin,
            RelExpr::ZigzagJoin { .. } => Operator::ZigzagJoin,
            RelExpr::IndexJoin { .. } => Operator::IndexJoin,
            RelExpr::GroupBy { kind, .. } => match kind {
                GroupByKind::GroupBy => Operator::GroupBy,
                GroupByKind::ScalarGroupBy => Operator::ScalarGroupBy,
                GroupByKind::DistinctOn => Operator::DistinctOn,
            },
            RelExpr::SetOp { kind, .. } => match kind {
                SetOpKind::Union => Operator::Union,
                SetOpKind::UnionAll => Operator::UnionAll,
                SetOpKind::Intersect => Operator::Intersect,
                SetOpKind::IntersectAll => Operator::IntersectAll,
                SetOpKind::Except => Operator::Except,
                SetOpKind::ExceptAll => Operator::ExceptAll,
            },
            RelExpr::Limit { .. } => Operator::Limit,
            RelExpr::Offset { .. } => Operator::Offset,
            RelExpr::Sort { .. } => Operator::Sort,
            RelExpr::Ordinality { .. } => Operator::Ordinality,
            RelExpr::Window { .. } => Operator::Window,
            RelExpr::ProjectSet { .. } => Operator::ProjectSet,
            RelExpr::Mutation { kind, .. } => match kind {
                MutationKind::Insert => Operator::Insert,
                MutationKind::Update => Operator::Update,
                MutationKind::Delete => Operator::Delete,
                MutationKind::Upsert => Operator::Upsert,
            },
            RelExpr::Explain { .. } => Operator::Explain,
        }
    }

    /// Relational children of this expression.
    pub fn inputs(&self) -> Vec<ExprId> {
        match self {
            RelExpr::Scan(_) | RelExpr::Values { .. } | RelExpr::ZigzagJoin { .. } => Vec::new(),
            RelExpr::Join { left, right, .. }
            | RelExpr::MergeJoin { left, right, .. }
            | RelExpr::SetOp { left, right, .. } => vec![*left, *right],
            RelExpr::Project { input, .. }
            | RelExpr::Select { input, .. }
            | RelExpr::LookupJoin { input, .. }
            | RelExpr::IndexJoin { input, .. }
            | RelExpr::GroupBy { input, .. }
            | RelExpr::Limit { input, .. }
            | RelExpr::Offset { input, .. }
            | RelExpr::Sort { input, .. }
            | RelExpr::Ordinality { input, .. }
            | RelExpr::Window { input, .. }
            | RelExpr::ProjectSet { input, .. }
            | RelExpr::Mutation { input, .. }
            | RelExpr::Explain { input, .. } => vec![*input],
        }
    }

    /// Lists of this expression along with the list operator of each list.
    pub fn lists(&self) -> Vec<(Operator, &[ExprId])> {
        match self {
            RelExpr::Values { rows, .. } => vec![(Operator::Tuple, rows.as_slice())],
            RelExpr::Project { projections, .. } => vec![(Operator::Projections, projections.as_slice())],
            RelExpr::Select { filters, .. } => vec![(Operator::Filters, filters.as_slice())],
            RelExpr::Join { on, .. }
            | RelExpr::LookupJoin { on, .. }
            | RelExpr::MergeJoin { on, .. }
            | RelExpr::ZigzagJoin { on, .. } => vec![(Operator::Filters, on.as_slice())],
            RelExpr::GroupBy { aggregations, .. } => vec![(Operator::Aggregations, aggregations.as_slice())],
            RelExpr::Window { windows, .. } => vec![(Operator::Windows, windows.as_slice())],
            RelExpr::ProjectSet { zip, .. } => vec![(Operator::Zip, zip.as_slice())],
            _ => Vec::new(),
        }
    }

    /// All children of this expression: relational inputs first, then list items and other scalar children.
    pub fn children(&self) -> Vec<ExprId> {
        let mut children = self.inputs();
        for (_, list) in self.lists() {
            children.extend_from_slice(list);
        }
        match self {
            RelExpr::Limit { limit, .. } => children.push(*limit),
            RelExpr::Offset { offset, .. } => children.push(*offset),
            _ => {}
        }
        children
    }

    /// Returns a copy of this expression where every child is replaced by the result of the given function.
    pub fn map_children<F>(&self, mut f: F) -> RelExpr
    where
        F: FnMut(ExprId) -> ExprId,
    {
        let map_list = |list: &[ExprId], f: &mut F| list.iter().map(|e| f(*e)).collect::<Vec<_>>();
        match self {
            RelExpr::Scan(_) => self.clone(),
            RelExpr::Values { rows, private } => RelExpr::Values {
                rows: map_list(rows, &mut f),
                private: private.clone(),
            },
            RelExpr::Project {
                input,
                projections,
                passthrough,
            } => RelExpr::Project {
                input: f(*input),
                projections: map_list(projections, &mut f),
                passthrough: passthrough.clone(),
            },
            RelExpr::Select { input, filters } => RelExpr::Select {
                input: f(*input),
                filters: map_list(filters, &mut f),
            },
            RelExpr::Join {
                kind,
                left,
                right,
                on,
                flags,
            } => RelExpr::Join {
                kind: *kind,
                left: f(*left),
                right: f(*right),
                on: map_list(on, &mut f),
                flags: *flags,
            },
            RelExpr::LookupJoin {
                kind,
                input,
                on,
                private,
            } => RelExpr::LookupJoin {
                kind: *kind,
                input: f(*input),
                on: map_list(on, &mut f),
                private: private.clone(),
            },
            RelExpr::MergeJoin {
                kind,
                left,
                right,
                on,
                private,
            } => RelExpr::MergeJoin {
                kind: *kind,
                left: f(*left),
                right: f(*right),
                on: map_list(on, &mut f),
                private: private.clone(),
            },
            RelExpr::ZigzagJoin { on, private } => RelExpr::ZigzagJoin {
                on: map_list(on, &mut f),
                private: private.clone(),
            },
            RelExpr::IndexJoin { input, private } => RelExpr::IndexJoin {
                input: f(*input),
                private: private.clone(),
            },
            RelExpr::GroupBy {
                kind,
                input,
                aggregations,
                private,
            } => RelExpr::GroupBy {
                kind: *kind,
                input: f(*input),
                aggregations: map_list(aggregations, &mut f),
                private: private.clone(),
            },
            RelExpr::SetOp {
                kind,
                left,
                right,
                private,
            } => RelExpr::SetOp {
                kind: *kind,
                left: f(*left),
                right: f(*right),
                private: private.clone(),
            },
            RelExpr::Limit { input, limit, ordering } => RelExpr::Limit {
                input: f(*input),
                limit: f(*limit),
                ordering: ordering.clone(),
            },
            RelExpr::Offset {
                input,
                offset,
                ordering,
            } => RelExpr::Offset {
                input: f(*input),
                offset: f(*offset),
                ordering: ordering.clone(),
            },
            RelExpr::Sort { input, ordering } => RelExpr::Sort {
                input: f(*input),
                ordering: ordering.clone(),
            },
            RelExpr::Ordinality { input, private } => RelExpr::Ordinality {
                input: f(*input),
                private: private.clone(),
            },
            RelExpr::Window {
                input,
                windows,
                private,
            } => RelExpr::Window {
                input: f(*input),
                windows: map_list(windows, &mut f),
                private: private.clone(),
            },
            RelExpr::ProjectSet { input, zip } => RelExpr::ProjectSet {
                input: f(*input),
                zip: map_list(zip, &mut f),
            },
            RelExpr::Mutation { kind, input, private } => RelExpr::Mutation {
                kind: *kind,
                input: f(*input),
                private: private.clone(),
            },
            RelExpr::Explain { input, private } => RelExpr::Explain {
                input: f(*input),
                private: private.clone(),
            },
        }
    }

    /// Returns the ordering stored in the private of this expression and whether that ordering
    /// refers to the columns of the input rather than the output.
    pub fn stored_ordering(&self) -> Option<(&OrderingChoice, bool)> {
        match self {
            RelExpr::GroupBy { private, .. } => Some((&private.ordering, true)),
            RelExpr::Limit { ordering, .. } | RelExpr::Offset { ordering, .. } | RelExpr::Sort { ordering, .. } => {
                Some((ordering, false))
            }
            RelExpr::Ordinality { private, .. } => Some((&private.ordering, false)),
            RelExpr::Window { private, .. } => Some((&private.ordering, true)),
            _ => None,
        }
    }
}

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Full,
    Semi,
    Anti,
}

impl JoinKind {
    /// The operator tag of a logical join of this kind.
    pub fn op(&self) -> Operator {
        match self {
            JoinKind::Inner => Operator::InnerJoin,
            JoinKind::Left => Operator::LeftJoin,
            JoinKind::Full => Operator::FullJoin,
            JoinKind::Semi => Operator::SemiJoin,
            JoinKind::Anti => Operator::AntiJoin,
        }
    }

    /// Returns `true` if only the columns of the left side are returned.
    pub fn is_semi_or_anti(&self) -> bool {
        matches!(self, JoinKind::Semi | JoinKind::Anti)
    }
}

/// Join hints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct JoinFlags(u8);

impl JoinFlags {
    pub const NO_HASH_JOIN: JoinFlags = JoinFlags(1);
    pub const NO_MERGE_JOIN: JoinFlags = JoinFlags(1 << 1);
    pub const NO_LOOKUP_JOIN: JoinFlags = JoinFlags(1 << 2);

    /// No hints.
    pub fn empty() -> Self {
        JoinFlags(0)
    }

    pub fn contains(&self, flags: JoinFlags) -> bool {
        self.0 & flags.0 == flags.0
    }

    pub fn with(self, flags: JoinFlags) -> Self {
        JoinFlags(self.0 | flags.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Index hints of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ScanFlags {
    /// Index joins must not be used to read the table.
    pub no_index_join: bool,
    /// The index set in `index` must be used.
    pub force_index: bool,
    pub index: usize,
}

impl ScanFlags {
    pub fn is_empty(&self) -> bool {
        !self.no_index_join && !self.force_index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanPrivate {
    pub table: TableId,
    /// The ordinal of the index. `0` is the primary index.
    pub index: usize,
    pub cols: ColSet,
    pub flags: ScanFlags,
}

impl ScanPrivate {
    /// A scan of the primary index.
    pub fn new(table: TableId, cols: ColSet) -> Self {
        ScanPrivate {
            table,
            index: 0,
            cols,
            flags: ScanFlags::default(),
        }
    }

    /// Returns a copy of this private that scans the given index.
    pub fn with_index(&self, index: usize) -> Self {
        ScanPrivate {
            index,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValuesPrivate {
    pub cols: Vec<ColumnId>,
    pub id: ValuesId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupJoinPrivate {
    pub table: TableId,
    pub index: usize,
    /// Input columns equal to the leading columns of the index.
    pub key_cols: Vec<ColumnId>,
    /// Columns retrieved from the index.
    pub cols: ColSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeJoinPrivate {
    pub left_eq: Vec<ColumnId>,
    pub right_eq: Vec<ColumnId>,
}

impl MergeJoinPrivate {
    /// The ordering required from the left input.
    pub fn left_ordering(&self) -> OrderingChoice {
        OrderingChoice::asc(&self.left_eq)
    }

    /// The ordering required from the right input.
    pub fn right_ordering(&self) -> OrderingChoice {
        OrderingChoice::asc(&self.right_eq)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZigzagJoinPrivate {
    pub table: TableId,
    pub left_index: usize,
    pub right_index: usize,
    pub left_eq_cols: Vec<ColumnId>,
    pub right_eq_cols: Vec<ColumnId>,
    pub cols: ColSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexJoinPrivate {
    pub table: TableId,
    pub cols: ColSet,
}

/// Kinds of grouping operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupByKind {
    GroupBy,
    /// Aggregation without grouping columns. Always returns exactly one row.
    ScalarGroupBy,
    DistinctOn,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupingPrivate {
    pub grouping_cols: ColSet,
    /// The ordering of input rows within each group.
    pub ordering: OrderingChoice,
}

/// Kinds of set operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOpKind {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

impl SetOpKind {
    /// Returns `true` if this set operator removes duplicates.
    pub fn is_distinct(&self) -> bool {
        matches!(self, SetOpKind::Union | SetOpKind::Intersect | SetOpKind::Except)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetPrivate {
    pub left_cols: Vec<ColumnId>,
    pub right_cols: Vec<ColumnId>,
    pub out_cols: Vec<ColumnId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrdinalityPrivate {
    pub ordering: OrderingChoice,
    pub col: ColumnId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowPrivate {
    pub partition: ColSet,
    pub ordering: OrderingChoice,
}

/// Kinds of mutation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
    Upsert,
}

/// Column lists of a mutation are indexed by the ordinal of a table column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationPrivate {
    pub table: TableId,
    /// Input columns that provide values for inserted rows.
    pub insert_cols: Vec<Option<ColumnId>>,
    /// Input columns that provide existing values of updated or deleted rows.
    pub fetch_cols: Vec<Option<ColumnId>>,
    /// Input columns that provide new values of updated rows.
    pub update_cols: Vec<Option<ColumnId>>,
    /// Whether the mutation returns the rows it has changed.
    pub returning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExplainPrivate {
    /// Output columns of the explain operator.
    pub cols: Vec<ColumnId>,
    /// Physical properties required from the input.
    pub props: PhysPropsId,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memo::ExprId;

    #[test]
    fn test_children_order() {
        let join = RelExpr::Join {
            kind: JoinKind::Left,
            left: ExprId(1),
            right: ExprId(2),
            on: vec![ExprId(3), ExprId(4)],
            flags: JoinFlags::empty(),
        };
        assert_eq!(join.op(), Operator::LeftJoin);
        assert_eq!(join.inputs(), vec![ExprId(1), ExprId(2)]);
        assert_eq!(join.children(), vec![ExprId(1), ExprId(2), ExprId(3), ExprId(4)]);

        let mapped = join.map_children(|e| ExprId(e.0 + 10));
        assert_eq!(mapped.children(), vec![ExprId(11), ExprId(12), ExprId(13), ExprId(14)]);
    }

    #[test]
    fn test_join_flags() {
        let flags = JoinFlags::empty().with(JoinFlags::NO_MERGE_JOIN);
        assert!(flags.contains(JoinFlags::NO_MERGE_JOIN));
        assert!(!flags.contains(JoinFlags::NO_LOOKUP_JOIN));
        assert!(JoinFlags::empty().is_empty());
    }
}
