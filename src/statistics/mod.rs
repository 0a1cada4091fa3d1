//! Row count and selectivity estimates of relational expressions.

use std::fmt::Debug;

use crate::memo::Memo;
use crate::operators::RelExpr;
use crate::properties::Cardinality;

pub mod simple;

/// The number of rows returned by an operator in case when no statistics is available.
pub const UNKNOWN_ROW_COUNT: f64 = 1000f64;

/// Statistics associated with a relational expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    row_count: f64,
    selectivity: f64,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            row_count: UNKNOWN_ROW_COUNT,
            selectivity: Statistics::DEFAULT_SELECTIVITY,
        }
    }
}

impl Statistics {
    /// The default value of selectivity statistics.
    pub const DEFAULT_SELECTIVITY: f64 = 1.0;

    /// Creates new statistics with the given row count and selectivity.
    ///
    /// # Panics
    ///
    /// This method panics if the row_count is negative or the selectivity lies outside of `[0.0, 1.0]` bounds.
    pub fn new(row_count: f64, selectivity: f64) -> Self {
        assert!(row_count >= 0f64, "row_count must be non negative");
        assert!(
            (0f64..=Self::DEFAULT_SELECTIVITY).contains(&selectivity),
            "selectivity must be within [0.0, 1.0] range but got: {}",
            selectivity
        );
        Statistics { row_count, selectivity }
    }

    /// Creates a new statistics with row_count set to the given value.
    ///
    /// # Panics
    ///
    /// This method panics if row_count is negative.
    pub fn from_row_count(row_count: f64) -> Self {
        Statistics::new(row_count, Self::DEFAULT_SELECTIVITY)
    }

    /// The estimated number of rows returned by an operator.
    pub fn row_count(&self) -> f64 {
        self.row_count
    }

    /// The selectivity of the filters applied by an operator.
    pub fn selectivity(&self) -> f64 {
        self.selectivity
    }

    /// Returns a copy of this statistics where the row count lies within the given cardinality bounds.
    pub fn clamp(&self, cardinality: &Cardinality) -> Statistics {
        let max = if cardinality.is_unbounded() {
            f64::MAX
        } else {
            cardinality.max as f64
        };
        let row_count = self.row_count.max(cardinality.min as f64).min(max);
        Statistics {
            row_count,
            selectivity: self.selectivity,
        }
    }
}

/// Provides statistics for relational expressions.
pub trait StatisticsBuilder: Debug {
    /// Builds statistics for the given expression. Statistics of child expressions are available through the memo.
    fn build_statistics(&self, memo: &Memo, expr: &RelExpr) -> Statistics;
}
