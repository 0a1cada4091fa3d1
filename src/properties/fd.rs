//! Functional dependencies.

use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::meta::ColumnId;
use crate::properties::ColSet;

/// A functional dependency `from --> to`.
///
/// A strict dependency treats NULLs as equal, a lax dependency holds only for rows where
/// every `from` column is not NULL. An equivalency `a == b` is stored as a pair of strict dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FuncDep {
    from: ColSet,
    to: ColSet,
    strict: bool,
    equiv: bool,
}

/// The kind of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// No two rows have equal values of key columns. NULLs are treated as equal.
    Strict,
    /// No two rows without NULLs in key columns have equal values of key columns.
    Lax,
}

/// A set of functional dependencies between columns of a relational expression
/// plus the (optional) key of that expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuncDepSet {
    deps: Vec<FuncDep>,
    key: Option<(ColSet, KeyType)>,
}

impl FuncDepSet {
    /// Creates an empty set of dependencies.
    pub fn new() -> Self {
        FuncDepSet::default()
    }

    /// The key of this set if there is one.
    pub fn key(&self) -> Option<(&ColSet, KeyType)> {
        self.key.as_ref().map(|(cols, key_type)| (cols, *key_type))
    }

    /// Returns the strict key of this set if there is one.
    pub fn strict_key(&self) -> Option<&ColSet> {
        match self.key.as_ref() {
            Some((key, KeyType::Strict)) => Some(key),
            _ => None,
        }
    }

    /// Returns `true` if this set has no dependencies and no key.
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty() && self.key.is_none()
    }

    /// Marks the given columns as constant: `() --> cols`.
    pub fn add_constants(&mut self, cols: &ColSet) {
        let cols = cols.difference(&self.constant_cols());
        if cols.is_empty() {
            return;
        }
        match self.deps.iter_mut().find(|d| d.from.is_empty() && d.strict) {
            Some(dep) => dep.to.union_with(&cols),
            None => self.deps.push(FuncDep {
                from: ColSet::new(),
                to: cols,
                strict: true,
                equiv: false,
            }),
        }
        self.reduce_key();
    }

    /// Adds an equivalency between the given columns.
    pub fn add_equivalency(&mut self, a: ColumnId, b: ColumnId) {
        if a == b || self.equiv_group(a).contains(b) {
            return;
        }
        self.deps.push(FuncDep {
            from: ColSet::single(a),
            to: ColSet::single(b),
            strict: true,
            equiv: true,
        });
        self.deps.push(FuncDep {
            from: ColSet::single(b),
            to: ColSet::single(a),
            strict: true,
            equiv: true,
        });
        self.reduce_key();
    }

    /// Adds a dependency from the given columns to a column computed from them.
    pub fn add_synthesized_col(&mut self, from: &ColSet, col: ColumnId) {
        self.add_dep(from.clone(), ColSet::single(col), true);
    }

    /// Adds a strict key. `all_cols` are the columns determined by that key.
    /// The key of this set is replaced when the new key is smaller or the current key is lax.
    pub fn add_strict_key(&mut self, key: &ColSet, all_cols: &ColSet) {
        self.add_dep(key.clone(), all_cols.difference(key), true);
        let key = self.reduce_cols(key);
        let replace = match self.key.as_ref() {
            None => true,
            Some((_, KeyType::Lax)) => true,
            Some((current, KeyType::Strict)) => key.len() < current.len(),
        };
        if replace {
            self.key = Some((key, KeyType::Strict));
        }
    }

    /// Adds a lax key. `all_cols` are the columns determined by that key.
    pub fn add_lax_key(&mut self, key: &ColSet, all_cols: &ColSet) {
        self.add_dep(key.clone(), all_cols.difference(key), false);
        if self.key.is_none() {
            self.key = Some((key.clone(), KeyType::Lax));
        }
    }

    fn add_dep(&mut self, from: ColSet, to: ColSet, strict: bool) {
        let to = to.difference(&from);
        if to.is_empty() {
            return;
        }
        if let Some(dep) = self.deps.iter_mut().find(|d| d.from == from && d.strict == strict && !d.equiv) {
            dep.to.union_with(&to);
        } else {
            self.deps.push(FuncDep {
                from,
                to,
                strict,
                equiv: false,
            });
        }
    }

    /// Adds all dependencies of the given set to this set. Keys of this set are kept.
    pub fn add_from(&mut self, other: &FuncDepSet) {
        for dep in other.deps.iter() {
            if dep.equiv {
                if let (Some(a), Some(b)) = (dep.from.first(), dep.to.first()) {
                    self.add_equivalency(a, b);
                }
            } else if dep.from.is_empty() && dep.strict {
                self.add_constants(&dep.to);
            } else {
                self.add_dep(dep.from.clone(), dep.to.clone(), dep.strict);
            }
        }
        self.reduce_key();
    }

    /// Combines this set with the dependencies of the other side of a cross product.
    /// The result has a strict key only if both sides have strict keys.
    pub fn make_product(&mut self, other: &FuncDepSet) {
        let key = match (self.strict_key(), other.strict_key()) {
            (Some(l), Some(r)) => Some(l.union(r)),
            _ => None,
        };
        self.key = None;
        self.add_from(other);
        if let Some(key) = key {
            self.key = Some((self.reduce_cols(&key), KeyType::Strict));
        }
    }

    /// Weakens dependencies that involve columns that can be NULL-extended by an outer join.
    /// Constant columns that are NULL-extended stop being constant.
    pub fn make_outer(&mut self, null_extended: &ColSet) {
        for dep in self.deps.iter_mut().filter(|d| d.from.is_empty()) {
            dep.to.difference_with(null_extended);
        }
        self.deps.retain(|d| !(d.from.is_empty() && d.to.is_empty()));
        for dep in self.deps.iter_mut() {
            if dep.from.intersects(null_extended) || dep.to.intersects(null_extended) {
                dep.strict = false;
                dep.equiv = false;
            }
        }
    }

    /// Called for expressions that return at most one row. Every column is constant and the empty set is a key.
    pub fn make_max1_row(&mut self, cols: &ColSet) {
        self.deps.clear();
        self.key = Some((ColSet::new(), KeyType::Strict));
        self.add_constants(cols);
    }

    /// Returns columns that are functionally determined by the given columns (including the columns themselves).
    /// Only strict dependencies are used.
    pub fn closure(&self, cols: &ColSet) -> ColSet {
        let mut closure = cols.clone();
        loop {
            let mut changed = false;
            for dep in self.deps.iter().filter(|d| d.strict) {
                if dep.from.is_subset_of(&closure) && !dep.to.is_subset_of(&closure) {
                    closure.union_with(&dep.to);
                    changed = true;
                }
            }
            if !changed {
                return closure;
            }
        }
    }

    /// Returns `true` if `cols` are functionally determined by `in_cols`.
    pub fn in_closure_of(&self, cols: &ColSet, in_cols: &ColSet) -> bool {
        cols.is_subset_of(&self.closure(in_cols))
    }

    /// Columns that have the same value in every row.
    pub fn constant_cols(&self) -> ColSet {
        self.closure(&ColSet::new())
    }

    /// Columns equivalent to the given column (including that column).
    pub fn equiv_group(&self, col: ColumnId) -> ColSet {
        let mut group = ColSet::single(col);
        loop {
            let mut changed = false;
            for dep in self.deps.iter().filter(|d| d.equiv) {
                if dep.from.is_subset_of(&group) && !dep.to.is_subset_of(&group) {
                    group.union_with(&dep.to);
                    changed = true;
                }
            }
            if !changed {
                return group;
            }
        }
    }

    /// Returns `true` if the given columns form a strict key.
    pub fn colset_is_strict_key(&self, cols: &ColSet) -> bool {
        match self.strict_key() {
            Some(key) => self.in_closure_of(key, cols),
            None => false,
        }
    }

    /// Returns `true` if the given columns form either a strict key or a lax key.
    pub fn colset_is_lax_key(&self, cols: &ColSet) -> bool {
        match self.key.as_ref() {
            Some((key, _)) => self.in_closure_of(key, cols),
            None => false,
        }
    }

    /// Removes columns determined by other columns of the given set. Columns with greater identifiers are removed first.
    /// No column of the result is in the closure of the other columns of the result.
    pub fn reduce_cols(&self, cols: &ColSet) -> ColSet {
        let mut result = cols.clone();
        for col in cols.to_vec().into_iter().rev() {
            let mut without = result.clone();
            without.remove(col);
            if self.closure(&without).contains(col) {
                result = without;
            }
        }
        result
    }

    fn reduce_key(&mut self) {
        if let Some((key, KeyType::Strict)) = self.key.as_ref() {
            let reduced = self.reduce_cols(key);
            self.key = Some((reduced, KeyType::Strict));
        }
    }

    /// Restricts this set to the given columns. Dependencies that pass through removed columns
    /// are kept when removed columns have equivalents among the given columns.
    pub fn project_cols(&mut self, cols: &ColSet) {
        let mut result = FuncDepSet::new();

        result.add_constants(&self.constant_cols().intersection(cols));

        let mut seen = ColSet::new();
        for col in cols.iter() {
            if seen.contains(col) {
                continue;
            }
            let group = self.equiv_group(col).intersection(cols);
            for other in group.iter().filter(|c| *c != col) {
                result.add_equivalency(col, other);
            }
            seen.union_with(&group);
        }

        for dep in self.deps.iter().filter(|d| !d.equiv && !d.from.is_empty()) {
            if dep.strict {
                let from = match self.map_to_cols(&dep.from, cols) {
                    Some(from) => from,
                    None => continue,
                };
                let to = self.closure(&dep.from).intersection(cols).difference(&from);
                result.add_dep(from, to, true);
            } else if dep.from.is_subset_of(cols) {
                result.add_dep(dep.from.clone(), dep.to.intersection(cols), false);
            }
        }

        result.key = match self.key.take() {
            Some((key, KeyType::Strict)) if self.in_closure_of(&key, cols) => {
                let key = self.reduce_cols(&self.map_to_cols(&key, cols).unwrap_or_else(|| cols.clone()));
                result.add_dep(key.clone(), cols.difference(&key), true);
                Some((result.reduce_cols(&key), KeyType::Strict))
            }
            Some((key, KeyType::Lax)) if key.is_subset_of(cols) => Some((key, KeyType::Lax)),
            _ => None,
        };

        *self = result;
    }

    // Replaces every column that is not in `cols` with an equivalent column from `cols`.
    fn map_to_cols(&self, from: &ColSet, cols: &ColSet) -> Option<ColSet> {
        let mut mapped = ColSet::new();
        for col in from.iter() {
            if cols.contains(col) {
                mapped.insert(col);
            } else {
                mapped.insert(self.equiv_group(col).intersection(cols).first()?);
            }
        }
        Some(mapped)
    }

    /// Returns `true` if both sets describe the same dependencies regardless of the order
    /// in which those dependencies have been added.
    pub fn equivalent(&self, other: &FuncDepSet) -> bool {
        if self.key != other.key {
            return false;
        }
        let implies = |a: &FuncDepSet, b: &FuncDepSet| {
            a.deps
                .iter()
                .filter(|d| d.strict)
                .all(|d| b.in_closure_of(&d.to, &d.from))
        };
        let lax = |a: &FuncDepSet, b: &FuncDepSet| {
            a.deps.iter().filter(|d| !d.strict).all(|d| b.deps.iter().any(|o| !o.strict && o == d))
        };
        implies(self, other) && implies(other, self) && lax(self, other) && lax(other, self)
    }
}

impl Display for FuncDepSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        match self.key.as_ref() {
            Some((key, KeyType::Strict)) => parts.push(format!("key{}", key)),
            Some((key, KeyType::Lax)) => parts.push(format!("lax-key{}", key)),
            None => {}
        }
        for dep in self.deps.iter() {
            if dep.equiv {
                if dep.from.first() < dep.to.first() {
                    parts.push(format!("{}=={}", dep.from, dep.to));
                }
            } else if dep.strict {
                parts.push(format!("{}-->{}", dep.from, dep.to));
            } else {
                parts.push(format!("{}~~>{}", dep.from, dep.to));
            }
        }
        write!(f, "{}", parts.iter().join("; "))
    }
}
