use std::fmt::{Debug, Formatter};

use crate::cost::{Cost, CostEstimationContext, CostEstimator};
use crate::memo::Memo;
use crate::operators::relational::JoinFlags;
use crate::operators::RelExpr;
use crate::statistics::Statistics;

/// The cost of an expression that must not be chosen unless there are no other alternatives.
pub const PROHIBITIVE_COST: Cost = 1e100;

const CPU_ROW_COST: f64 = 0.01;
const SEQ_ROW_COST: f64 = 1.0;
const LOOKUP_ROW_COST: f64 = 4.0;

/// A very simple implementation of a [CostEstimator].
/// The cost of an expression is computed from estimated row counts of the expression and its inputs.
///
/// [CostEstimator]: crate::cost::CostEstimator
pub struct SimpleCostEstimator {
    _private: (),
}

impl SimpleCostEstimator {
    pub fn new() -> Self {
        SimpleCostEstimator { _private: () }
    }
}

impl Default for SimpleCostEstimator {
    fn default() -> Self {
        SimpleCostEstimator::new()
    }
}

impl CostEstimator for SimpleCostEstimator {
    fn estimate_cost(&self, memo: &Memo, expr: &RelExpr, ctx: &CostEstimationContext, statistics: &Statistics) -> Cost {
        let row_count = statistics.row_count();
        let input_rows = |i: usize| ctx.input_statistics(i).row_count();

        let own_cost = match expr {
            RelExpr::Scan(private) => {
                if private.flags.force_index && private.flags.index != private.index {
                    return PROHIBITIVE_COST;
                }
                let table = memo.metadata().table(private.table);
                let total_cols = table.table().column_count().max(1) as f64;
                let width = 1.0 + private.cols.len() as f64 / total_cols;
                // Secondary indexes store fewer columns than the primary index.
                let row_cost = if private.index == 0 {
                    SEQ_ROW_COST
                } else {
                    SEQ_ROW_COST / 2.0
                };
                row_count * row_cost * width
            }
            RelExpr::Values { rows, .. } => rows.len() as f64 * CPU_ROW_COST,
            RelExpr::Project { projections, .. } => input_rows(0) * CPU_ROW_COST * projections.len() as f64,
            RelExpr::Select { filters, .. } => input_rows(0) * CPU_ROW_COST * filters.len().max(1) as f64,
            RelExpr::Join { flags, on, .. } => {
                if flags.contains(JoinFlags::NO_HASH_JOIN) {
                    return PROHIBITIVE_COST;
                }
                let left_rows = input_rows(0);
                let right_rows = input_rows(1);
                let hashtable_access = left_rows * CPU_ROW_COST;
                // A join without equality conditions compares every pair of rows.
                let compare_cost = if on.is_empty() {
                    left_rows * right_rows * CPU_ROW_COST
                } else {
                    row_count * CPU_ROW_COST
                };
                hashtable_access + left_rows * 2.0 * CPU_ROW_COST + right_rows * CPU_ROW_COST + compare_cost
            }
            RelExpr::MergeJoin { .. } => (input_rows(0) + input_rows(1) + row_count) * CPU_ROW_COST,
            RelExpr::LookupJoin { .. } => input_rows(0) * LOOKUP_ROW_COST * CPU_ROW_COST + row_count * SEQ_ROW_COST,
            RelExpr::ZigzagJoin { .. } => row_count * LOOKUP_ROW_COST,
            RelExpr::IndexJoin { .. } => input_rows(0) * LOOKUP_ROW_COST,
            RelExpr::GroupBy { aggregations, .. } => {
                input_rows(0) * CPU_ROW_COST * (1 + aggregations.len()) as f64 + row_count * CPU_ROW_COST
            }
            RelExpr::SetOp { kind, .. } => {
                let rows = input_rows(0) + input_rows(1);
                if kind.is_distinct() {
                    rows * 2.0 * CPU_ROW_COST
                } else {
                    rows * CPU_ROW_COST
                }
            }
            RelExpr::Limit { .. } | RelExpr::Offset { .. } => row_count * CPU_ROW_COST,
            RelExpr::Sort { .. } => {
                let rows = input_rows(0).max(1.0);
                rows.ln() * rows * CPU_ROW_COST
            }
            RelExpr::Ordinality { .. } => input_rows(0) * CPU_ROW_COST,
            RelExpr::Window { windows, .. } => input_rows(0) * CPU_ROW_COST * windows.len().max(1) as f64,
            RelExpr::ProjectSet { zip, .. } => row_count * CPU_ROW_COST * zip.len().max(1) as f64,
            RelExpr::Mutation { .. } => input_rows(0) * SEQ_ROW_COST * 10.0,
            RelExpr::Explain { .. } => 0.0,
        };
        own_cost + ctx.inputs_cost()
    }
}

impl Debug for SimpleCostEstimator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimpleCostEstimator")
    }
}
