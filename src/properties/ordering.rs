use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::meta::ColumnId;
use crate::properties::{ColSet, FuncDepSet};

/// Ordering choice. Describes a set of orderings: each entry of an ordering choice is a group of
/// equivalent columns sorted in the same direction. An empty ordering choice is satisfied by any ordering.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct OrderingChoice {
    columns: Vec<OrderingColumnChoice>,
}

/// An entry of an [OrderingChoice].
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct OrderingColumnChoice {
    pub group: ColSet,
    pub descending: bool,
}

impl OrderingColumnChoice {
    /// Ascending ordering by the given column.
    pub fn asc(col: ColumnId) -> Self {
        OrderingColumnChoice {
            group: ColSet::single(col),
            descending: false,
        }
    }

    /// Descending ordering by the given column.
    pub fn desc(col: ColumnId) -> Self {
        OrderingColumnChoice {
            group: ColSet::single(col),
            descending: true,
        }
    }

    /// The column of this entry with the smallest identifier.
    pub fn any_col(&self) -> ColumnId {
        self.group.first().expect("Empty ordering column group")
    }
}

impl OrderingChoice {
    /// Creates an ordering choice from the given entries.
    ///
    /// # Panics
    ///
    /// Panics if a group of columns is empty.
    pub fn new(columns: Vec<OrderingColumnChoice>) -> Self {
        assert!(columns.iter().all(|c| !c.group.is_empty()), "ordering column group is empty");
        OrderingChoice { columns }
    }

    /// An ordering choice that is satisfied by any ordering.
    pub fn any() -> Self {
        OrderingChoice::default()
    }

    /// Creates an ordering where all the given columns are sorted in ascending order.
    pub fn asc(cols: &[ColumnId]) -> Self {
        OrderingChoice::new(cols.iter().map(|c| OrderingColumnChoice::asc(*c)).collect())
    }

    /// Creates an ordering from the given pairs of (column, descending).
    pub fn from_columns(cols: &[(ColumnId, bool)]) -> Self {
        OrderingChoice::new(
            cols.iter()
                .map(|(c, descending)| OrderingColumnChoice {
                    group: ColSet::single(*c),
                    descending: *descending,
                })
                .collect(),
        )
    }

    /// Returns `true` if this ordering choice is satisfied by any ordering.
    pub fn is_any(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[OrderingColumnChoice] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All columns referenced by this ordering choice.
    pub fn cols(&self) -> ColSet {
        let mut cols = ColSet::new();
        for c in self.columns.iter() {
            cols.union_with(&c.group);
        }
        cols
    }

    /// Returns `true` if this ordering choice refers only to the given columns.
    pub fn subset_of_cols(&self, cols: &ColSet) -> bool {
        self.columns.iter().all(|c| c.group.is_subset_of(cols))
    }

    /// Returns `true` if every entry of this ordering choice has a column in the given set.
    pub fn can_project_cols(&self, cols: &ColSet) -> bool {
        self.columns.iter().all(|c| c.group.intersects(cols))
    }

    /// Restricts groups to the given columns. The ordering is truncated at the first entry
    /// that has no columns left.
    pub fn project_cols(&self, cols: &ColSet) -> OrderingChoice {
        let columns = self
            .columns
            .iter()
            .map(|c| OrderingColumnChoice {
                group: c.group.intersection(cols),
                descending: c.descending,
            })
            .take_while(|c| !c.group.is_empty())
            .collect();
        OrderingChoice { columns }
    }

    /// Returns the longest common prefix of both ordering choices.
    /// Groups of the result are intersections of the corresponding groups.
    pub fn prefix_intersection(&self, other: &OrderingChoice) -> OrderingChoice {
        let columns = self
            .columns
            .iter()
            .zip(other.columns.iter())
            .map(|(l, r)| OrderingColumnChoice {
                group: l.group.intersection(&r.group),
                descending: l.descending,
            })
            .zip(self.columns.iter().zip(other.columns.iter()))
            .take_while(|(c, (l, r))| !c.group.is_empty() && l.descending == r.descending)
            .map(|(c, _)| c)
            .collect();
        OrderingChoice { columns }
    }

    /// Returns `true` if every ordering that satisfies this ordering choice also satisfies the given one.
    pub fn implies(&self, required: &OrderingChoice) -> bool {
        if self.columns.len() < required.columns.len() {
            return false;
        }
        self.columns
            .iter()
            .zip(required.columns.iter())
            .all(|(l, r)| l.descending == r.descending && l.group.intersects(&r.group))
    }

    /// Adds equivalent columns to groups and removes entries whose columns are determined by
    /// the columns of preceding entries.
    pub fn simplify(&self, fd: &FuncDepSet) -> OrderingChoice {
        let mut prefix = ColSet::new();
        let mut columns = Vec::with_capacity(self.columns.len());
        for c in self.columns.iter() {
            if fd.in_closure_of(&c.group, &prefix) {
                continue;
            }
            let mut group = c.group.clone();
            for col in c.group.iter() {
                group.union_with(&fd.equiv_group(col));
            }
            prefix.union_with(&group);
            columns.push(OrderingColumnChoice {
                group,
                descending: c.descending,
            });
        }
        OrderingChoice { columns }
    }

    /// Returns an ordering that uses a single column from every group.
    pub fn to_single_columns(&self) -> Vec<(ColumnId, bool)> {
        self.columns.iter().map(|c| (c.any_col(), c.descending)).collect()
    }
}

impl Display for OrderingChoice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut columns = self.columns.iter().map(|c| {
            let dir = if c.descending { "-" } else { "+" };
            match c.group.single_column() {
                Some(col) => format!("{}{}", dir, col),
                None => format!("{}({})", dir, c.group.iter().join("|")),
            }
        });
        write!(f, "{}", columns.join(","))
    }
}
