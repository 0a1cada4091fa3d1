//! Cost-model.

use std::fmt::Debug;

use crate::memo::Memo;
use crate::operators::RelExpr;
use crate::statistics::Statistics;

pub mod simple;

/// The estimated cost of an expression including the cost of its inputs. Lower is better.
pub type Cost = f64;

/// Estimates a cost of a relational expression.
pub trait CostEstimator: Debug {
    /// Estimates the cost of the given expression. `statistics` are statistics of the group of the expression.
    fn estimate_cost(&self, memo: &Memo, expr: &RelExpr, ctx: &CostEstimationContext, statistics: &Statistics) -> Cost;
}

/// Provides information that can be used to estimate a cost of an expression.
#[derive(Debug, Clone, Default)]
pub struct CostEstimationContext {
    inputs: Vec<(Cost, Statistics)>,
    subqueries: Cost,
}

impl CostEstimationContext {
    /// Creates a context from costs and statistics of the best plans of the relational inputs of an expression.
    pub fn new(inputs: Vec<(Cost, Statistics)>) -> Self {
        CostEstimationContext {
            inputs,
            subqueries: 0.0,
        }
    }

    /// Adds the cost of the best plan of a subquery referenced by scalar children of an expression.
    pub fn add_subquery_cost(&mut self, cost: Cost) {
        self.subqueries += cost;
    }

    /// The number of relational inputs.
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Returns the cost of the best plan of the i-th input.
    ///
    /// # Panics
    ///
    /// Panics if there is no such input.
    pub fn input_cost(&self, i: usize) -> Cost {
        self.inputs[i].0
    }

    /// Returns statistics of the i-th input.
    ///
    /// # Panics
    ///
    /// Panics if there is no such input.
    pub fn input_statistics(&self, i: usize) -> &Statistics {
        &self.inputs[i].1
    }

    /// The total cost of all inputs and subqueries.
    pub fn inputs_cost(&self) -> Cost {
        self.inputs.iter().map(|(cost, _)| *cost).sum::<Cost>() + self.subqueries
    }
}
