//! Memo. Stores interned expressions and groups logically equivalent relational expressions.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};

use triomphe::Arc;

use crate::memo::store::{Store, StoreElementId};
use crate::meta::Metadata;
use crate::operators::{Expr, RelExpr, ScalarExpr};
use crate::properties::logical::{derive_relational, Relational};
use crate::properties::physical::PhysicalProps;
use crate::properties::scalar::{derive_scalar, ScalarProps};
use crate::statistics::simple::SimpleStatisticsBuilder;
use crate::statistics::StatisticsBuilder;

pub mod check;
pub mod store;

const PAGE_SIZE: usize = 256;

/// Uniquely identifies an expression stored in a [memo](Memo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub usize);

impl Display for ExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Uniquely identifies a group of equivalent relational expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub usize);

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// Identifies interned [physical properties](PhysicalProps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysPropsId(pub usize);

impl Display for PhysPropsId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

struct MemoNode {
    expr: Expr,
    group: Option<GroupId>,
    // the next alternative in the same group.
    next: Option<ExprId>,
    scalar: OnceCell<ScalarProps>,
}

/// A group of equivalent relational expressions.
#[derive(Debug)]
pub struct MemoGroup {
    first: ExprId,
    last: ExprId,
    props: Arc<Relational>,
}

impl MemoGroup {
    /// The normalized expression of this group.
    pub fn first(&self) -> ExprId {
        self.first
    }

    /// Logical properties shared by every expression of this group.
    pub fn props(&self) -> &Relational {
        &self.props
    }
}

/// Deduplicating container of expressions.
///
/// Relational expressions are organised into groups. The first expression of a group is its normalized expression;
/// logical properties of a group are derived from that expression. Children of relational expressions always reference
/// normalized expressions of their groups. Scalar expressions do not belong to groups.
pub struct Memo {
    metadata: Metadata,
    exprs: Store<MemoNode>,
    groups: Vec<MemoGroup>,
    interned: HashMap<Expr, ExprId>,
    phys_props: Vec<PhysicalProps>,
    interned_phys_props: HashMap<PhysicalProps, PhysPropsId>,
    root: Option<(ExprId, PhysPropsId)>,
    statistics: Box<dyn StatisticsBuilder>,
    check_expressions: bool,
}

impl Memo {
    /// Creates an empty memo.
    pub fn new(metadata: Metadata) -> Self {
        Memo {
            metadata,
            exprs: Store::new(PAGE_SIZE),
            groups: Vec::new(),
            interned: HashMap::new(),
            phys_props: Vec::new(),
            interned_phys_props: HashMap::new(),
            root: None,
            statistics: Box::new(SimpleStatisticsBuilder),
            check_expressions: cfg!(debug_assertions),
        }
    }

    /// Replaces the builder used to estimate statistics of new groups.
    pub fn set_statistics_builder(&mut self, statistics: Box<dyn StatisticsBuilder>) {
        self.statistics = statistics;
    }

    pub fn statistics_builder(&self) -> &dyn StatisticsBuilder {
        self.statistics.as_ref()
    }

    /// Enables or disables [expression checks](check::check_expr) and the cross check of logical properties of
    /// alternative expressions.
    pub fn set_check_expressions(&mut self, value: bool) {
        self.check_expressions = value;
    }

    pub fn check_expressions(&self) -> bool {
        self.check_expressions
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Discards every expression and the metadata.
    pub fn reset(&mut self) {
        let mut memo = Memo::new(Metadata::new());
        memo.check_expressions = self.check_expressions;
        std::mem::swap(&mut memo.statistics, &mut self.statistics);
        *self = memo;
    }

    /// Interns the given expression. If an identical expression already exists returns its identifier.
    /// For relational expressions the returned identifier is the identifier of the first expression of a group.
    ///
    /// A new relational expression starts a new group.
    pub fn intern(&mut self, expr: Expr) -> ExprId {
        if let Some(id) = self.interned.get(&expr) {
            return self.normalized(*id);
        }
        self.check_children(&expr, None);

        let id = ExprId(self.exprs.next_id().index());
        let group = match &expr {
            Expr::Relational(rel) => {
                let props = derive_relational(self, rel);
                let group = GroupId(self.groups.len());
                self.groups.push(MemoGroup {
                    first: id,
                    last: id,
                    props: Arc::new(props),
                });
                log::trace!("New group {} expr {}: {}", group, id, rel.op());
                Some(group)
            }
            Expr::Scalar(_) => None,
        };
        self.add_node(id, expr, group);
        id
    }

    /// Adds the given expression to the given group. If an identical expression already exists returns its identifier.
    ///
    /// # Panics
    ///
    /// Panics if the expression references the group it is added to.
    /// If expression checks are enabled this method panics when logical properties of the expression
    /// are not equivalent to the logical properties of the group.
    pub fn add_to_group(&mut self, expr: RelExpr, group: GroupId) -> ExprId {
        let expr = Expr::Relational(expr);
        if let Some(id) = self.interned.get(&expr) {
            return *id;
        }
        self.check_children(&expr, Some(group));

        if self.check_expressions {
            let props = derive_relational(self, expr.as_relational());
            let group_props = &self.groups[group.0].props;
            assert!(
                props.equivalent(group_props),
                "Logical properties of {:?} do not match logical properties of group {}.\nExpected: {:?}\nActual: {:?}",
                expr,
                group,
                group_props,
                props
            );
        }

        let id = ExprId(self.exprs.next_id().index());
        let last = self.groups[group.0].last;
        self.add_node(id, expr, Some(group));
        if let Some(node) = self.exprs.get_mut(StoreElementId(last.0)) {
            node.next = Some(id);
        }
        self.groups[group.0].last = id;
        log::trace!("Add expr {} to group {}", id, group);
        id
    }

    fn add_node(&mut self, id: ExprId, expr: Expr, group: Option<GroupId>) {
        self.exprs.insert(MemoNode {
            expr: expr.clone(),
            group,
            next: None,
            scalar: OnceCell::new(),
        });
        self.interned.insert(expr, id);

        if self.check_expressions {
            check::check_expr(self, id);
        }
    }

    fn check_children(&self, expr: &Expr, group: Option<GroupId>) {
        let next = self.exprs.next_id().index();
        for child in expr.children() {
            assert!(child.0 < next, "Child expression {} of {:?} does not belong to this memo", child, expr);
            if let (Some(group), Some(child_group)) = (group, self.node(child).group) {
                assert_ne!(group, child_group, "Expression {:?} can not be an ancestor of itself", expr);
            }
        }
    }

    /// Returns the identifier of an existing expression identical to the given one.
    pub fn lookup(&self, expr: &Expr) -> Option<ExprId> {
        self.interned.get(expr).copied()
    }

    fn node(&self, id: ExprId) -> &MemoNode {
        self.exprs
            .get(StoreElementId(id.0))
            .unwrap_or_else(|| panic!("Unexpected expression id: {}", id))
    }

    /// Returns the expression with the given identifier.
    ///
    /// # Panics
    ///
    /// Panics if there is no such expression.
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.node(id).expr
    }

    /// Returns the relational expression with the given identifier.
    pub fn rel_expr(&self, id: ExprId) -> &RelExpr {
        self.expr(id).as_relational()
    }

    /// Returns the scalar expression with the given identifier.
    pub fn scalar_expr(&self, id: ExprId) -> &ScalarExpr {
        self.expr(id).as_scalar()
    }

    /// Returns the group of the given relational expression.
    ///
    /// # Panics
    ///
    /// Panics if the expression is not a relational expression.
    pub fn group_of(&self, id: ExprId) -> GroupId {
        self.node(id)
            .group
            .unwrap_or_else(|| panic!("Expression {} is not a relational expression", id))
    }

    pub fn group(&self, id: GroupId) -> &MemoGroup {
        &self.groups[id.0]
    }

    /// Returns the identifier of the normalized expression of the group the given expression belongs to.
    /// For scalar expressions returns the given identifier.
    pub fn normalized(&self, id: ExprId) -> ExprId {
        match self.node(id).group {
            Some(group) => self.groups[group.0].first,
            None => id,
        }
    }

    /// Returns an iterator over expressions of the given group in the order they were added.
    pub fn group_exprs(&self, group: GroupId) -> GroupExprIter<'_> {
        GroupExprIter {
            memo: self,
            next: Some(self.groups[group.0].first),
        }
    }

    /// Logical properties of the given relational expression.
    pub fn logical(&self, id: ExprId) -> &Relational {
        &self.groups[self.group_of(id).0].props
    }

    /// Scalar properties of the given scalar expression. Properties are computed on first access.
    ///
    /// # Panics
    ///
    /// Panics if the expression is not a scalar expression.
    pub fn scalar_props(&self, id: ExprId) -> &ScalarProps {
        let node = self.node(id);
        assert!(node.group.is_none(), "Expression {} is not a scalar expression", id);
        node.scalar.get_or_init(|| derive_scalar(self, id))
    }

    /// Interns the given physical properties.
    pub fn intern_phys_props(&mut self, props: PhysicalProps) -> PhysPropsId {
        if let Some(id) = self.interned_phys_props.get(&props) {
            return *id;
        }
        let id = PhysPropsId(self.phys_props.len());
        self.phys_props.push(props.clone());
        self.interned_phys_props.insert(props, id);
        id
    }

    pub fn phys_props(&self, id: PhysPropsId) -> &PhysicalProps {
        &self.phys_props[id.0]
    }

    /// Sets the root expression and the physical properties required from it.
    pub fn set_root(&mut self, expr: ExprId, props: PhysPropsId) {
        let expr = self.normalized(expr);
        self.root = Some((expr, props));
    }

    /// The root expression and the physical properties required from it.
    pub fn root(&self) -> Option<(ExprId, PhysPropsId)> {
        self.root
    }

    /// The number of expressions.
    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }

    /// The number of groups.
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Returns an iterator over all groups.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &MemoGroup)> {
        self.groups.iter().enumerate().map(|(i, g)| (GroupId(i), g))
    }

    /// Returns an iterator over all expressions in the order they were added.
    pub fn exprs(&self) -> impl Iterator<Item = (ExprId, &Expr)> {
        self.exprs.iter().enumerate().map(|(i, n)| (ExprId(i), &n.expr))
    }

    /// A rough estimate of the number of bytes used by this memo.
    pub fn memory_estimate(&self) -> usize {
        let id_size = std::mem::size_of::<ExprId>();
        let node_size = std::mem::size_of::<MemoNode>() + std::mem::size_of::<Expr>() + id_size;
        let children: usize = self.exprs.iter().map(|n| n.expr.children().len() * id_size * 2).sum();
        let scalar_props: usize = self
            .exprs
            .iter()
            .filter(|n| n.scalar.get().is_some())
            .map(|_| std::mem::size_of::<ScalarProps>())
            .sum();
        let groups = self.groups.len() * (std::mem::size_of::<MemoGroup>() + std::mem::size_of::<Relational>());
        let phys_props = self.phys_props.len() * std::mem::size_of::<PhysicalProps>() * 2;

        self.metadata.memory_estimate()
            + self.exprs.allocated_bytes()
            + self.exprs.len() * node_size
            + children
            + scalar_props
            + groups
            + phys_props
    }
}

impl Default for Memo {
    fn default() -> Self {
        Memo::new(Metadata::new())
    }
}

impl Debug for Memo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("num_exprs", &self.num_exprs())
            .field("num_groups", &self.num_groups())
            .field("root", &self.root)
            .finish()
    }
}

/// An iterator over expressions of a group.
pub struct GroupExprIter<'a> {
    memo: &'a Memo,
    next: Option<ExprId>,
}

impl Iterator for GroupExprIter<'_> {
    type Item = ExprId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.memo.node(current).next;
        Some(current)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datatypes::DataType;
    use crate::operators::relational::{JoinFlags, JoinKind, ValuesPrivate};
    use crate::operators::scalar::value::ScalarValue;

    fn values(memo: &mut Memo, v: i64) -> ExprId {
        let col = memo.metadata_mut().add_column("a", DataType::Int);
        let value = memo.intern(ScalarExpr::Const(ScalarValue::Int(v)).into());
        let row = memo.intern(ScalarExpr::Tuple(vec![value]).into());
        let id = memo.metadata_mut().next_values_id();
        memo.intern(
            RelExpr::Values {
                rows: vec![row],
                private: ValuesPrivate { cols: vec![col], id },
            }
            .into(),
        )
    }

    fn join(left: ExprId, right: ExprId) -> RelExpr {
        RelExpr::Join {
            kind: JoinKind::Inner,
            left,
            right,
            on: vec![],
            flags: JoinFlags::empty(),
        }
    }

    #[test]
    fn test_intern_deduplicates() {
        let mut memo = Memo::default();
        let a = memo.intern(ScalarExpr::Const(ScalarValue::Int(1)).into());
        let b = memo.intern(ScalarExpr::Const(ScalarValue::Int(1)).into());
        let c = memo.intern(ScalarExpr::Const(ScalarValue::Int(2)).into());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(memo.num_exprs(), 2);
        assert_eq!(memo.num_groups(), 0);
    }

    #[test]
    fn test_groups() {
        let mut memo = Memo::default();
        let l = values(&mut memo, 1);
        let r = values(&mut memo, 2);
        let j = memo.intern(join(l, r).into());
        let group = memo.group_of(j);

        let commuted = memo.add_to_group(join(r, l), group);
        assert_ne!(j, commuted);
        assert_eq!(memo.group_of(commuted), group);
        assert_eq!(memo.group_exprs(group).collect::<Vec<_>>(), vec![j, commuted]);

        // interning an alternative returns the normalized expression of its group.
        assert_eq!(memo.intern(join(r, l).into()), j);
        assert_eq!(memo.add_to_group(join(r, l), group), commuted);
        assert_eq!(memo.num_groups(), 3);
    }

    #[test]
    #[should_panic(expected = "does not belong to this memo")]
    fn test_reject_unknown_child() {
        let mut memo = Memo::default();
        memo.intern(ScalarExpr::Not(ExprId(10)).into());
    }

    #[test]
    #[should_panic(expected = "ancestor of itself")]
    fn test_reject_cycles() {
        let mut memo = Memo::default();
        let l = values(&mut memo, 1);
        let r = values(&mut memo, 2);
        let j = memo.intern(join(l, r).into());
        let group = memo.group_of(j);
        memo.add_to_group(join(j, r), group);
    }

    #[test]
    fn test_phys_props() {
        let mut memo = Memo::default();
        let a = memo.intern_phys_props(PhysicalProps::default());
        let b = memo.intern_phys_props(PhysicalProps::default());
        assert_eq!(a, b);
        assert!(memo.memory_estimate() > 0);
    }
}
