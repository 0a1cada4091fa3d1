use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

use bit_set::BitSet;
use itertools::Itertools;

use crate::meta::ColumnId;

/// A set of column identifiers. Iteration order is always ascending.
#[derive(Clone, Default)]
pub struct ColSet {
    bits: BitSet,
}

impl ColSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        ColSet::default()
    }

    /// Creates a set with the single column.
    pub fn single(col: ColumnId) -> Self {
        let mut set = ColSet::new();
        set.insert(col);
        set
    }

    /// Adds the given column. Returns `true` if the column has not been in this set.
    pub fn insert(&mut self, col: ColumnId) -> bool {
        self.bits.insert(col.index())
    }

    /// Removes the given column. Returns `true` if the column has been in this set.
    pub fn remove(&mut self, col: ColumnId) -> bool {
        self.bits.remove(col.index())
    }

    pub fn contains(&self, col: ColumnId) -> bool {
        self.bits.contains(col.index())
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Iterates over columns in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.bits.iter().map(ColumnId::new)
    }

    /// The smallest column of this set.
    pub fn first(&self) -> Option<ColumnId> {
        self.iter().next()
    }

    /// Returns the only column of this set or `None` if this set has zero or more than one column.
    pub fn single_column(&self) -> Option<ColumnId> {
        if self.len() == 1 {
            self.first()
        } else {
            None
        }
    }

    pub fn union(&self, other: &ColSet) -> ColSet {
        let mut bits = self.bits.clone();
        bits.union_with(&other.bits);
        ColSet { bits }
    }

    pub fn union_with(&mut self, other: &ColSet) {
        self.bits.union_with(&other.bits);
    }

    pub fn intersection(&self, other: &ColSet) -> ColSet {
        let mut bits = self.bits.clone();
        bits.intersect_with(&other.bits);
        ColSet { bits }
    }

    pub fn intersect_with(&mut self, other: &ColSet) {
        self.bits.intersect_with(&other.bits);
    }

    pub fn difference(&self, other: &ColSet) -> ColSet {
        let mut bits = self.bits.clone();
        bits.difference_with(&other.bits);
        ColSet { bits }
    }

    pub fn difference_with(&mut self, other: &ColSet) {
        self.bits.difference_with(&other.bits);
    }

    /// Returns `true` if every column of this set is also in the given set.
    pub fn is_subset_of(&self, other: &ColSet) -> bool {
        self.bits.is_subset(&other.bits)
    }

    /// Returns `true` if this set and the given set have at least one column in common.
    pub fn intersects(&self, other: &ColSet) -> bool {
        !self.bits.is_disjoint(&other.bits)
    }

    /// Returns columns of this set as a vector.
    pub fn to_vec(&self) -> Vec<ColumnId> {
        self.iter().collect()
    }
}

impl PartialEq for ColSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for ColSet {}

impl Hash for ColSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for col in self.iter() {
            col.hash(state);
        }
    }
}

impl FromIterator<ColumnId> for ColSet {
    fn from_iter<T: IntoIterator<Item = ColumnId>>(iter: T) -> Self {
        let mut set = ColSet::new();
        for col in iter {
            set.insert(col);
        }
        set
    }
}

impl<'a> FromIterator<&'a ColumnId> for ColSet {
    fn from_iter<T: IntoIterator<Item = &'a ColumnId>>(iter: T) -> Self {
        iter.into_iter().copied().collect()
    }
}

impl Display for ColSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.iter().join(","))
    }
}

impl Debug for ColSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

/// Creates a [ColSet] from the given column numbers.
#[cfg(test)]
pub fn cols(ids: &[usize]) -> ColSet {
    ids.iter().map(|id| ColumnId::new(*id)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_set_operations() {
        let a = cols(&[1, 2, 3]);
        let b = cols(&[3, 4]);

        assert_eq!(a.union(&b), cols(&[1, 2, 3, 4]));
        assert_eq!(a.intersection(&b), cols(&[3]));
        assert_eq!(a.difference(&b), cols(&[1, 2]));
        assert!(cols(&[1, 3]).is_subset_of(&a));
        assert!(!b.is_subset_of(&a));
        assert!(a.intersects(&b));
        assert!(!cols(&[1]).intersects(&b));
        assert!(ColSet::new().is_subset_of(&b));
    }

    #[test]
    fn test_ascending_iteration() {
        let set: ColSet = vec![ColumnId::new(9), ColumnId::new(2), ColumnId::new(5)].into_iter().collect();
        assert_eq!(set.to_vec(), vec![ColumnId::new(2), ColumnId::new(5), ColumnId::new(9)]);
        assert_eq!(set.first(), Some(ColumnId::new(2)));
        assert_eq!(set.to_string(), "(2,5,9)");
    }

    #[test]
    fn test_equality_ignores_capacity() {
        let mut a = cols(&[1, 100]);
        a.remove(ColumnId::new(100));
        let b = cols(&[1]);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b), "hash must not depend on capacity");
    }

    #[test]
    fn test_single_column() {
        assert_eq!(cols(&[4]).single_column(), Some(ColumnId::new(4)));
        assert_eq!(cols(&[4, 5]).single_column(), None);
        assert_eq!(ColSet::new().single_column(), None);
    }
}
