//! Physical properties. See [PhysicalProps].

use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::memo::{ExprId, Memo};
use crate::meta::{ColumnId, TableId};
use crate::operators::relational::GroupByKind;
use crate::operators::{RelExpr, ScalarExpr};
use crate::properties::{ColSet, FuncDepSet, OrderingChoice, OrderingColumnChoice};

/// Physical properties required from an expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PhysicalProps {
    /// Names and order of the columns returned by the expression. Only the root of a plan has a presentation.
    pub presentation: Vec<(String, ColumnId)>,
    /// The ordering of rows.
    pub ordering: OrderingChoice,
}

impl PhysicalProps {
    /// Physical properties that impose no requirements.
    pub fn any() -> Self {
        PhysicalProps::default()
    }

    /// Creates physical properties that require the given ordering.
    pub fn with_ordering(ordering: OrderingChoice) -> Self {
        PhysicalProps {
            presentation: Vec::new(),
            ordering,
        }
    }

    /// Returns a copy of these properties with the given presentation.
    pub fn with_presentation(self, presentation: Vec<(String, ColumnId)>) -> Self {
        PhysicalProps {
            presentation,
            ordering: self.ordering,
        }
    }

    /// Returns `true` if these properties impose no requirements.
    pub fn is_any(&self) -> bool {
        self.presentation.is_empty() && self.ordering.is_any()
    }
}

impl Display for PhysicalProps {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        if !self.presentation.is_empty() {
            let columns = self.presentation.iter().map(|(name, col)| format!("{}:{}", name, col)).join(",");
            write!(f, "presentation: {}", columns)?;
            if !self.ordering.is_any() {
                write!(f, " ")?;
            }
        }
        if !self.ordering.is_any() {
            write!(f, "ordering: {}", self.ordering)?;
        }
        write!(f, "]")
    }
}

/// Returns `true` if the given expression can produce rows in the required order without a sort enforcer.
pub fn can_provide_ordering(memo: &Memo, id: ExprId, required: &OrderingChoice) -> bool {
    if required.is_any() {
        return true;
    }
    let props = memo.logical(id);
    if props.cardinality.is_zero_or_one() {
        return true;
    }
    let required = required.simplify(&props.fd);
    if required.is_any() {
        return true;
    }

    match memo.rel_expr(id) {
        RelExpr::Scan(private) => {
            let provided = index_ordering(memo, private.table, private.index).project_cols(&private.cols);
            provided.simplify(&props.fd).implies(&required)
        }
        RelExpr::Select { input, .. }
        | RelExpr::IndexJoin { input, .. }
        | RelExpr::LookupJoin { input, .. }
        | RelExpr::ProjectSet { input, .. } => {
            required.subset_of_cols(&memo.logical(*input).output_cols)
        }
        RelExpr::Project { passthrough, .. } => required.can_project_cols(passthrough),
        RelExpr::Limit { ordering, .. }
        | RelExpr::Offset { ordering, .. }
        | RelExpr::Sort { ordering, .. } => ordering.simplify(&props.fd).implies(&required),
        RelExpr::Ordinality { private, .. } => private.ordering.simplify(&props.fd).implies(&required),
        RelExpr::MergeJoin { private, .. } => private.left_ordering().simplify(&props.fd).implies(&required),
        RelExpr::GroupBy {
            kind: GroupByKind::GroupBy | GroupByKind::DistinctOn,
            private,
            ..
        } => private.ordering.is_any() && required.subset_of_cols(&private.grouping_cols),
        _ => false,
    }
}

/// Builds the physical properties required from the `child`-th relational input of the given expression
/// when the expression itself must satisfy `required`.
pub fn build_child_required(memo: &Memo, id: ExprId, required: &PhysicalProps, child: usize) -> PhysicalProps {
    let expr = memo.rel_expr(id);
    let ordering = match expr {
        RelExpr::Explain { private, .. } => return memo.phys_props(private.props).clone(),
        RelExpr::Sort { .. } => OrderingChoice::any(),
        RelExpr::MergeJoin { private, .. } => {
            if child == 0 {
                private.left_ordering()
            } else {
                private.right_ordering()
            }
        }
        RelExpr::Limit { ordering, .. } | RelExpr::Offset { ordering, .. } => ordering.clone(),
        RelExpr::Ordinality { private, .. } => private.ordering.clone(),
        RelExpr::Window { private, .. } => {
            let mut columns: Vec<_> = private.partition.iter().map(OrderingColumnChoice::asc).collect();
            columns.extend(private.ordering.columns().iter().cloned());
            OrderingChoice::new(columns)
        }
        RelExpr::GroupBy { private, .. } => {
            if private.ordering.is_any() && required.ordering.subset_of_cols(&private.grouping_cols) {
                required.ordering.clone()
            } else {
                private.ordering.clone()
            }
        }
        RelExpr::Select { input, .. }
        | RelExpr::IndexJoin { input, .. }
        | RelExpr::LookupJoin { input, .. }
        | RelExpr::ProjectSet { input, .. } => {
            let input_cols = &memo.logical(*input).output_cols;
            if required.ordering.subset_of_cols(input_cols) {
                required.ordering.clone()
            } else {
                OrderingChoice::any()
            }
        }
        RelExpr::Project { input, passthrough, .. } => {
            let input_props = memo.logical(*input);
            if required.ordering.can_project_cols(passthrough) {
                required.ordering.project_cols(passthrough).simplify(&input_props.fd)
            } else {
                OrderingChoice::any()
            }
        }
        _ => OrderingChoice::any(),
    };
    PhysicalProps::with_ordering(ordering)
}

/// Builds the ordering of rows produced by the given expression when its relational inputs produce rows
/// in `input_provided` order. Every entry of the result is a single output column of the expression.
///
/// The result is trimmed to the shortest prefix that satisfies `required`. When nothing is required,
/// operators that order rows themselves still report their own ordering.
pub fn build_provided(
    memo: &Memo,
    id: ExprId,
    required: &OrderingChoice,
    input_provided: &[OrderingChoice],
) -> OrderingChoice {
    let props = memo.logical(id);
    if props.cardinality.is_zero_or_one() {
        return OrderingChoice::any();
    }
    let input = || input_provided.first().cloned().unwrap_or_default();

    let (provided, own) = match memo.rel_expr(id) {
        RelExpr::Scan(private) => {
            (index_ordering(memo, private.table, private.index).project_cols(&private.cols), None)
        }
        RelExpr::Sort { ordering, .. } => (ordering.clone(), Some(ordering.clone())),
        RelExpr::Limit { ordering, .. } | RelExpr::Offset { ordering, .. } => (input(), Some(ordering.clone())),
        RelExpr::Ordinality { private, .. } => (input(), Some(private.ordering.clone())),
        RelExpr::MergeJoin { private, .. } => (input(), Some(private.left_ordering())),
        RelExpr::Select { .. }
        | RelExpr::IndexJoin { .. }
        | RelExpr::LookupJoin { .. }
        | RelExpr::ProjectSet { .. }
        | RelExpr::Project { .. }
        | RelExpr::GroupBy {
            kind: GroupByKind::GroupBy | GroupByKind::DistinctOn,
            ..
        } => (input(), None),
        _ => (OrderingChoice::any(), None),
    };

    let target = match own {
        Some(own) if required.is_any() => own,
        _ => required.clone(),
    };
    let provided = remap_provided(&provided, &props.fd, &props.output_cols);
    trim_provided(&provided, &target, &props.fd, &props.output_cols)
}

// Replaces every group with a single column from the output columns. Columns that are not output
// are replaced with equivalent output columns. Truncated at the first entry that has none.
fn remap_provided(provided: &OrderingChoice, fd: &FuncDepSet, output_cols: &ColSet) -> OrderingChoice {
    let mut columns = Vec::with_capacity(provided.len());
    for c in provided.columns() {
        let mut candidates = c.group.intersection(output_cols);
        if candidates.is_empty() {
            for col in c.group.iter() {
                candidates.union_with(&fd.equiv_group(col).intersection(output_cols));
            }
        }
        match candidates.first() {
            Some(col) => columns.push(OrderingColumnChoice {
                group: ColSet::single(col),
                descending: c.descending,
            }),
            None => break,
        }
    }
    OrderingChoice::new(columns)
}

// Keeps the shortest prefix of `provided` that satisfies `required` and prefers the columns
// named by `required` among equivalent ones.
fn trim_provided(
    provided: &OrderingChoice,
    required: &OrderingChoice,
    fd: &FuncDepSet,
    output_cols: &ColSet,
) -> OrderingChoice {
    let simplified = required.simplify(fd);
    if simplified.is_any() {
        return OrderingChoice::any();
    }
    let prefix = |len: usize| OrderingChoice::new(provided.columns()[..len].to_vec());
    let len = (1..=provided.len())
        .find(|len| prefix(*len).simplify(fd).implies(&simplified))
        .unwrap_or(provided.len());

    let required_cols = required.cols();
    let columns = provided.columns()[..len]
        .iter()
        .map(|c| {
            let col = c.any_col();
            let preferred = fd.equiv_group(col).intersection(output_cols).intersection(&required_cols).first();
            OrderingColumnChoice {
                group: ColSet::single(preferred.unwrap_or(col)),
                descending: c.descending,
            }
        })
        .collect();
    OrderingChoice::new(columns)
}

/// The physical properties required from the relational input of a scalar expression.
pub fn subquery_required(expr: &ScalarExpr) -> PhysicalProps {
    match expr {
        ScalarExpr::ArrayFlatten { private, .. } => PhysicalProps::with_ordering(private.ordering.clone()),
        _ => PhysicalProps::any(),
    }
}

/// The ordering of rows provided by the given index of a table. Rows are ordered by the strict key columns.
pub fn index_ordering(memo: &Memo, table: TableId, index: usize) -> OrderingChoice {
    let table = memo.metadata().table(table);
    let catalog_index = table.table().index(index);
    let columns = (0..catalog_index.key_column_count())
        .map(|i| {
            let column = catalog_index.column(i);
            let col = table.column_id(column.ordinal);
            if column.descending {
                OrderingColumnChoice::desc(col)
            } else {
                OrderingColumnChoice::asc(col)
            }
        })
        .collect();
    OrderingChoice::new(columns)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let props = PhysicalProps::with_ordering(OrderingChoice::asc(&[ColumnId::new(1)]))
            .with_presentation(vec![("a".to_string(), ColumnId::new(1))]);
        assert_eq!(props.to_string(), "[presentation: a:1 ordering: +1]");
        assert_eq!(PhysicalProps::any().to_string(), "[]");
        assert!(PhysicalProps::any().is_any());
    }
}
