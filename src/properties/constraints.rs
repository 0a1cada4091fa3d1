//! Single-column span constraints derived from filter conditions.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::meta::ColumnId;
use crate::operators::scalar::value::ScalarValue;
use crate::properties::ColSet;

/// A boundary of a [Span]. NULL sorts before every value, `Max` sorts after every value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpanKey {
    Null,
    Value(ScalarValue),
    Max,
}

impl SpanKey {
    fn compare(&self, other: &SpanKey) -> Ordering {
        match (self, other) {
            (SpanKey::Null, SpanKey::Null) | (SpanKey::Max, SpanKey::Max) => Ordering::Equal,
            (SpanKey::Null, _) | (_, SpanKey::Max) => Ordering::Less,
            (_, SpanKey::Null) | (SpanKey::Max, _) => Ordering::Greater,
            (SpanKey::Value(l), SpanKey::Value(r)) => l
                .compare(r)
                .unwrap_or_else(|| l.data_type().to_string().cmp(&r.data_type().to_string())),
        }
    }
}

impl Display for SpanKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SpanKey::Null => write!(f, "NULL"),
            SpanKey::Value(v) => write!(f, "{}", v),
            SpanKey::Max => write!(f, ""),
        }
    }
}

/// A contiguous range of values of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: SpanKey,
    pub start_inclusive: bool,
    pub end: SpanKey,
    pub end_inclusive: bool,
}

impl Span {
    /// Every value including NULL.
    pub fn unconstrained() -> Self {
        Span {
            start: SpanKey::Null,
            start_inclusive: true,
            end: SpanKey::Max,
            end_inclusive: true,
        }
    }

    /// Only NULL.
    pub fn null() -> Self {
        Span {
            start: SpanKey::Null,
            start_inclusive: true,
            end: SpanKey::Null,
            end_inclusive: true,
        }
    }

    /// Every value except NULL.
    pub fn not_null() -> Self {
        Span {
            start: SpanKey::Null,
            start_inclusive: false,
            end: SpanKey::Max,
            end_inclusive: true,
        }
    }

    /// A single value.
    pub fn point(value: ScalarValue) -> Self {
        Span {
            start: SpanKey::Value(value.clone()),
            start_inclusive: true,
            end: SpanKey::Value(value),
            end_inclusive: true,
        }
    }

    /// Values greater than (or equal to) the given value.
    pub fn greater(value: ScalarValue, inclusive: bool) -> Self {
        Span {
            start: SpanKey::Value(value),
            start_inclusive: inclusive,
            end: SpanKey::Max,
            end_inclusive: true,
        }
    }

    /// Non-NULL values less than (or equal to) the given value.
    pub fn less(value: ScalarValue, inclusive: bool) -> Self {
        Span {
            start: SpanKey::Null,
            start_inclusive: false,
            end: SpanKey::Value(value),
            end_inclusive: inclusive,
        }
    }

    /// Returns `true` if this span contains no values.
    pub fn is_empty(&self) -> bool {
        match self.start.compare(&self.end) {
            Ordering::Greater => true,
            Ordering::Equal => !(self.start_inclusive && self.end_inclusive),
            Ordering::Less => false,
        }
    }

    /// Returns `true` if this span contains NULL.
    pub fn contains_null(&self) -> bool {
        self.start == SpanKey::Null && self.start_inclusive
    }

    /// Returns the value if this span contains exactly one non-NULL value.
    pub fn single_value(&self) -> Option<&ScalarValue> {
        match (&self.start, &self.end) {
            (SpanKey::Value(s), SpanKey::Value(e))
                if self.start_inclusive && self.end_inclusive && s.compare(e) == Some(Ordering::Equal) =>
            {
                Some(s)
            }
            _ => None,
        }
    }

    fn intersect(&self, other: &Span) -> Span {
        let (start, start_inclusive) = match self.start.compare(&other.start) {
            Ordering::Less => (other.start.clone(), other.start_inclusive),
            Ordering::Greater => (self.start.clone(), self.start_inclusive),
            Ordering::Equal => (self.start.clone(), self.start_inclusive && other.start_inclusive),
        };
        let (end, end_inclusive) = match self.end.compare(&other.end) {
            Ordering::Less => (self.end.clone(), self.end_inclusive),
            Ordering::Greater => (other.end.clone(), other.end_inclusive),
            Ordering::Equal => (self.end.clone(), self.end_inclusive && other.end_inclusive),
        };
        Span {
            start,
            start_inclusive,
            end,
            end_inclusive,
        }
    }

    // `other` must not start before this span.
    fn touches(&self, other: &Span) -> bool {
        match self.end.compare(&other.start) {
            Ordering::Greater => true,
            Ordering::Equal => self.end_inclusive || other.start_inclusive,
            Ordering::Less => false,
        }
    }

    fn compare_start(&self, other: &Span) -> Ordering {
        self.start
            .compare(&other.start)
            .then_with(|| other.start_inclusive.cmp(&self.start_inclusive))
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(value) = self.single_value() {
            return write!(f, "[/{}]", value);
        }
        let open = if self.start_inclusive { "[" } else { "(" };
        let close = if self.end_inclusive { "]" } else { ")" };
        write!(f, "{}/{} - /{}{}", open, self.start, self.end, close)
    }
}

/// Constraint on a single column: a union of sorted non-overlapping spans.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnConstraint {
    col: ColumnId,
    spans: Vec<Span>,
}

impl ColumnConstraint {
    /// Creates a constraint from the given spans. Empty spans are removed, overlapping spans are merged.
    pub fn new(col: ColumnId, spans: Vec<Span>) -> Self {
        let mut spans: Vec<Span> = spans.into_iter().filter(|s| !s.is_empty()).collect();
        spans.sort_by(|a, b| a.compare_start(b));

        let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last_mut() {
                Some(last) if last.touches(&span) => {
                    match last.end.compare(&span.end) {
                        Ordering::Less => {
                            last.end = span.end;
                            last.end_inclusive = span.end_inclusive;
                        }
                        Ordering::Equal => last.end_inclusive |= span.end_inclusive,
                        Ordering::Greater => {}
                    }
                }
                _ => merged.push(span),
            }
        }
        ColumnConstraint { col, spans: merged }
    }

    pub fn col(&self) -> ColumnId {
        self.col
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Returns `true` if no value satisfies this constraint.
    pub fn is_contradiction(&self) -> bool {
        self.spans.is_empty()
    }

    /// Returns `true` if this constraint is satisfied by every value including NULL.
    pub fn is_unconstrained(&self) -> bool {
        self.spans.len() == 1 && self.spans[0] == Span::unconstrained()
    }

    /// Returns `true` if this constraint rejects NULLs.
    pub fn excludes_null(&self) -> bool {
        self.spans.iter().all(|s| !s.contains_null())
    }

    /// Returns the value if this constraint allows exactly one non-NULL value.
    pub fn single_value(&self) -> Option<&ScalarValue> {
        match self.spans.as_slice() {
            [span] => span.single_value(),
            _ => None,
        }
    }

    /// Intersects this constraint with another constraint on the same column.
    pub fn intersect(&self, other: &ColumnConstraint) -> ColumnConstraint {
        assert_eq!(self.col, other.col, "Can not intersect constraints on different columns");
        let mut spans = Vec::new();
        for l in self.spans.iter() {
            for r in other.spans.iter() {
                spans.push(l.intersect(r));
            }
        }
        ColumnConstraint::new(self.col, spans)
    }

    /// Unions this constraint with another constraint on the same column.
    pub fn union(&self, other: &ColumnConstraint) -> ColumnConstraint {
        assert_eq!(self.col, other.col, "Can not union constraints on different columns");
        let spans = self.spans.iter().chain(other.spans.iter()).cloned().collect();
        ColumnConstraint::new(self.col, spans)
    }
}

impl Display for ColumnConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.spans.is_empty() {
            write!(f, "/{}: contradiction", self.col)
        } else {
            write!(f, "/{}: {}", self.col, self.spans.iter().join(" "))
        }
    }
}

/// A conjunction of column constraints. At most one constraint per column, sorted by column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Constraints {
    columns: Vec<ColumnConstraint>,
    contradiction: bool,
}

impl Constraints {
    /// Constraints that are satisfied by every row.
    pub fn unconstrained() -> Self {
        Constraints::default()
    }

    /// Constraints that are never satisfied.
    pub fn contradiction() -> Self {
        Constraints {
            columns: Vec::new(),
            contradiction: true,
        }
    }

    /// Creates constraints with a single column constraint.
    pub fn single(constraint: ColumnConstraint) -> Self {
        if constraint.is_contradiction() {
            Constraints::contradiction()
        } else if constraint.is_unconstrained() {
            Constraints::unconstrained()
        } else {
            Constraints {
                columns: vec![constraint],
                contradiction: false,
            }
        }
    }

    pub fn is_contradiction(&self) -> bool {
        self.contradiction
    }

    pub fn is_unconstrained(&self) -> bool {
        !self.contradiction && self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnConstraint] {
        &self.columns
    }

    /// Returns the constraint on the given column.
    pub fn column(&self, col: ColumnId) -> Option<&ColumnConstraint> {
        self.columns.iter().find(|c| c.col == col)
    }

    /// Columns referenced by these constraints.
    pub fn constrained_cols(&self) -> ColSet {
        self.columns.iter().map(|c| c.col).collect()
    }

    /// Columns that can not be NULL when these constraints hold.
    pub fn not_null_cols(&self) -> ColSet {
        self.columns.iter().filter(|c| c.excludes_null()).map(|c| c.col).collect()
    }

    /// Columns that have a single value when these constraints hold.
    pub fn constant_cols(&self) -> ColSet {
        self.columns.iter().filter(|c| c.single_value().is_some()).map(|c| c.col).collect()
    }

    /// Conjunction.
    pub fn intersect(&self, other: &Constraints) -> Constraints {
        if self.contradiction || other.contradiction {
            return Constraints::contradiction();
        }
        let mut columns = self.columns.clone();
        for c in other.columns.iter() {
            match columns.iter_mut().find(|l| l.col == c.col) {
                Some(existing) => *existing = existing.intersect(c),
                None => columns.push(c.clone()),
            }
        }
        if columns.iter().any(|c| c.is_contradiction()) {
            return Constraints::contradiction();
        }
        columns.sort_by_key(|c| c.col);
        Constraints {
            columns,
            contradiction: false,
        }
    }

    /// Disjunction. Returns `None` if the result can not be represented exactly:
    /// constraints on different columns can not be combined.
    pub fn union(&self, other: &Constraints) -> Option<Constraints> {
        if self.contradiction {
            return Some(other.clone());
        }
        if other.contradiction {
            return Some(self.clone());
        }
        if self.is_unconstrained() || other.is_unconstrained() {
            return Some(Constraints::unconstrained());
        }
        match (self.columns.as_slice(), other.columns.as_slice()) {
            ([l], [r]) if l.col == r.col => Some(Constraints::single(l.union(r))),
            _ => None,
        }
    }
}

impl Display for Constraints {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.contradiction {
            write!(f, "contradiction")
        } else if self.columns.is_empty() {
            write!(f, "unconstrained")
        } else {
            write!(f, "{}", self.columns.iter().join("; "))
        }
    }
}
