//! Cost-based optimizer. See [Optimizer].

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::catalog::{CatalogRef, DataSourceName, Privilege};
use crate::cost::simple::SimpleCostEstimator;
use crate::cost::{Cost, CostEstimationContext, CostEstimator};
use crate::error::{OptimizerError, SqlCode};
use crate::memo::{ExprId, GroupId, Memo, PhysPropsId};
use crate::meta::{Metadata, TableId};
use crate::norm::{AppliedRuleCallback, Factory, MatchedRuleCallback, RuleName};
use crate::operators::format::format_memo;
use crate::operators::relational::{ExplainPrivate, MutationKind, MutationPrivate};
use crate::operators::{Expr, Operator, RelExpr};
use crate::properties::physical::{
    build_child_required, build_provided, can_provide_ordering, subquery_required, PhysicalProps,
};
use crate::properties::OrderingChoice;

mod explore;
mod options;

pub use options::OptimizerOptions;

/// Cost-based optimizer.
///
/// Expressions of a query are built through the [factory](Optimizer::factory) which normalizes them as they are
/// added to the memo. Once the root of the query is [set](Optimizer::set_root) [optimize](Optimizer::optimize) explores
/// alternative expressions of every group and selects the cheapest plan that satisfies required physical properties.
pub struct Optimizer {
    catalog: CatalogRef,
    catalog_version: u64,
    options: OptimizerOptions,
    case_sensitive: bool,
    factory: Factory,
    coster: Box<dyn CostEstimator>,
    matched_rule: Option<MatchedRuleCallback>,
    applied_rule: Option<AppliedRuleCallback>,
    rules_applied: Rc<Cell<usize>>,
    stats: Stats,
}

impl Optimizer {
    /// Creates an optimizer that resolves tables in the given catalog.
    pub fn new(catalog: CatalogRef, options: OptimizerOptions) -> Self {
        let mut optimizer = Optimizer {
            catalog_version: catalog.version(),
            catalog,
            case_sensitive: options.case_sensitive,
            options,
            factory: Factory::new(Memo::default()),
            coster: Box::new(SimpleCostEstimator::new()),
            matched_rule: None,
            applied_rule: None,
            rules_applied: Rc::new(Cell::new(0)),
            stats: Stats::default(),
        };
        optimizer.init();
        optimizer
    }

    /// Discards the current memo and prepares this optimizer for a new query. Records the version of the catalog
    /// and takes a snapshot of the [options](OptimizerOptions).
    pub fn init(&mut self) {
        let memo = self.new_memo(Metadata::new());
        self.factory = Factory::new(memo);
        self.factory.set_disabled_rules(self.options.disabled_rules.clone());
        self.case_sensitive = self.options.case_sensitive;
        self.catalog_version = self.catalog.version();
        self.rules_applied.set(0);
        self.stats = Stats::default();
        self.install_rule_callbacks();
    }

    pub fn options(&self) -> &OptimizerOptions {
        &self.options
    }

    /// Replaces options of this optimizer. New options take effect after the next call to [init](Self::init).
    pub fn set_options(&mut self, options: OptimizerOptions) {
        self.options = options;
    }

    /// Replaces the cost model.
    pub fn set_coster(&mut self, coster: Box<dyn CostEstimator>) {
        self.coster = coster;
    }

    pub fn catalog(&self) -> &CatalogRef {
        &self.catalog
    }

    /// The factory used to build expressions of a query.
    pub fn factory(&mut self) -> &mut Factory {
        &mut self.factory
    }

    pub fn memo(&self) -> &Memo {
        self.factory.memo()
    }

    pub fn metadata(&self) -> &Metadata {
        self.factory.metadata()
    }

    /// Statistics of the last run of the optimizer.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Disables normalization and exploration rules until the next call to [init](Self::init).
    pub fn disable_optimizations(&mut self) {
        self.factory.disable_optimizations();
        self.options.explore = false;
    }

    /// Sets a callback that is called every time a normalization or an exploration rule matches an expression.
    /// If the callback returns `false` the rule is not applied.
    pub fn notify_on_matched_rule<F>(&mut self, f: F)
    where
        F: Fn(RuleName) -> bool + 'static,
    {
        self.matched_rule = Some(Rc::new(f));
        self.install_rule_callbacks();
    }

    /// Sets a callback that is called every time a normalization or an exploration rule is applied.
    pub fn notify_on_applied_rule<F>(&mut self, f: F)
    where
        F: Fn(RuleName, Operator, ExprId) + 'static,
    {
        self.applied_rule = Some(Rc::new(f));
        self.install_rule_callbacks();
    }

    fn install_rule_callbacks(&mut self) {
        let counter = self.rules_applied.clone();
        let user_callback = self.applied_rule.clone();
        let applied: AppliedRuleCallback = Rc::new(move |rule, op, id| {
            counter.set(counter.get() + 1);
            if let Some(callback) = user_callback.as_ref() {
                callback(rule, op, id);
            }
        });
        self.factory.set_rule_callbacks(self.matched_rule.clone(), Some(applied));
    }

    fn new_memo(&self, metadata: Metadata) -> Memo {
        let mut memo = Memo::new(metadata);
        memo.set_check_expressions(self.options.check_expressions);
        memo
    }

    /// Resolves the given table name, checks that the table can be read and adds it to the metadata.
    pub fn resolve_table(&mut self, name: &DataSourceName) -> Result<TableId, OptimizerError> {
        self.check_catalog_version()?;
        let name = if self.case_sensitive {
            name.clone()
        } else {
            DataSourceName {
                schema: name.schema.as_ref().map(|s| s.to_lowercase()),
                name: name.name.to_lowercase(),
            }
        };
        let (table, resolved) = self.catalog.resolve_data_source(&name)?;
        self.catalog.check_privilege(&table, Privilege::Select)?;
        log::debug!("Resolved table {}", resolved);
        Ok(self.factory.metadata_mut().add_table(table))
    }

    /// Builds a mutation operator. Fails if the current user lacks privileges required by the mutation.
    pub fn construct_mutation(
        &mut self,
        kind: MutationKind,
        input: ExprId,
        private: MutationPrivate,
    ) -> Result<ExprId, OptimizerError> {
        self.check_catalog_version()?;
        let table = self.factory.metadata().table(private.table).table().clone();
        let privileges: &[Privilege] = match kind {
            MutationKind::Insert => &[Privilege::Insert],
            MutationKind::Update => &[Privilege::Update],
            MutationKind::Delete => &[Privilege::Delete],
            MutationKind::Upsert => &[Privilege::Insert, Privilege::Update],
        };
        for privilege in privileges {
            self.catalog.check_privilege(&table, *privilege)?;
        }
        Ok(self.factory.construct_mutation(kind, input, private))
    }

    fn check_catalog_version(&self) -> Result<(), OptimizerError> {
        let version = self.catalog.version();
        if version != self.catalog_version {
            let message = format!("catalog has changed: version {} expected {}", version, self.catalog_version);
            return Err(OptimizerError::plan(SqlCode::StaleCatalog, message));
        }
        Ok(())
    }

    /// Sets the root of a query and physical properties required from it.
    pub fn set_root(&mut self, expr: ExprId, required: PhysicalProps) {
        let memo = self.factory.memo_mut();
        let required = memo.intern_phys_props(required);
        memo.set_root(expr, required);
    }

    /// A rough estimate of the number of bytes used by the memo and the metadata.
    pub fn memory_estimate(&self) -> usize {
        self.factory.memo().memory_estimate()
    }

    fn check_memory_budget(&self) -> Result<(), OptimizerError> {
        if let Some(budget) = self.options.memory_budget {
            let used = self.memory_estimate();
            if used > budget {
                return Err(OptimizerError::resource(used, budget));
            }
        }
        Ok(())
    }

    /// Returns the memo to the caller and replaces it with an empty one.
    pub fn detach_memo(&mut self) -> Memo {
        let memo = self.new_memo(Metadata::new());
        self.factory.replace_memo(memo)
    }

    /// Builds a copy of the expression `root` of the given memo in a new memo and sets it as the root.
    ///
    /// `replace` is called for every expression before it is copied. When it returns an expression that expression
    /// is used instead of the copy. The new memo starts with a copy of the metadata of the given memo so the column
    /// identifiers of both memos match.
    pub fn copy_and_replace<F>(&mut self, from: &Memo, root: ExprId, required: &PhysicalProps, mut replace: F) -> ExprId
    where
        F: FnMut(&mut Factory, &Memo, ExprId) -> Option<ExprId>,
    {
        let memo = self.new_memo(from.metadata().clone());
        self.factory.replace_memo(memo);

        let mut copied = HashMap::new();
        let root = copy_expr(&mut self.factory, from, root, &mut replace, &mut copied);
        self.set_root(root, required.clone());
        root
    }

    /// Selects the cheapest plan of the root expression.
    ///
    /// # Errors
    ///
    /// Returns an error if the root has not been set or the memo exceeds the memory budget.
    pub fn optimize(&mut self) -> Result<PlanExpr, OptimizerError> {
        let (root, required) = self
            .factory
            .memo()
            .root()
            .ok_or_else(|| OptimizerError::internal("Root expression has not been set"))?;
        self.check_memory_budget()?;

        let start_time = Instant::now();
        let ctx = OptimizationContext {
            group: self.memo().group_of(root),
            required,
        };
        log::debug!(
            "Optimizing root: {} required: {}, initial memo:\n{}",
            root,
            self.memo().phys_props(required),
            format_memo(self.memo())
        );

        let mut runtime_state = RuntimeState::default();
        runtime_state.tasks.push(Task::OptimizeGroup { ctx });
        while let Some(task) = runtime_state.tasks.pop() {
            log::trace!("{}", task);
            match task {
                Task::OptimizeGroup { ctx } => self.optimize_group(&mut runtime_state, ctx),
                Task::GroupOptimized { ctx } => self.group_optimized(&mut runtime_state, ctx),
                Task::ExploreGroup { ctx } => {
                    self.explore_group(&mut runtime_state, ctx);
                    self.check_memory_budget()?;
                }
                Task::OptimizeExprs { ctx } => self.optimize_exprs(&mut runtime_state, ctx),
                Task::EnforceProperties { ctx } => self.enforce_properties(&mut runtime_state, ctx),
                Task::OptimizeInputs { ctx, expr, inputs } => self.optimize_inputs(&mut runtime_state, ctx, expr, inputs),
            }
        }

        self.stats.rules_applied = self.rules_applied.get();
        self.stats.optimization_time = start_time.elapsed();

        let plan = copy_out_best_expr(&runtime_state, self.memo(), &ctx)?;
        log::debug!("Final memo:\n{}", format_memo(self.memo()));
        log::debug!("Stats: {:?}", self.stats);
        Ok(plan)
    }

    fn optimize_group(&mut self, runtime_state: &mut RuntimeState, ctx: OptimizationContext) {
        let state = runtime_state.state.entry(ctx).or_default();
        if state.started {
            return;
        }
        state.started = true;
        self.stats.groups_optimized += 1;

        runtime_state.tasks.push(Task::GroupOptimized { ctx });
        runtime_state.tasks.push(Task::OptimizeExprs { ctx });
        if self.options.explore {
            runtime_state.tasks.push(Task::ExploreGroup { ctx });
        }
    }

    fn group_optimized(&mut self, runtime_state: &mut RuntimeState, ctx: OptimizationContext) {
        let state = runtime_state.state.entry(ctx).or_default();
        state.optimized = true;
        if let Some(best) = state.best_expr.as_ref() {
            log::debug!("Best expr for {}: {} {} cost: {:.2}", ctx, best.expr, self.memo().rel_expr(best.expr).op(), best.cost);
        }
    }

    fn explore_group(&mut self, runtime_state: &mut RuntimeState, ctx: OptimizationContext) {
        if !runtime_state.explored.insert(ctx.group) {
            return;
        }
        let hooks = explore::ExploreHooks {
            disabled_rules: &self.options.disabled_rules,
            matched_rule: self.matched_rule.as_ref(),
            applied_rule: self.applied_rule.as_ref(),
        };
        let applied = explore::explore_group(&mut self.factory, ctx.group, &hooks);
        self.rules_applied.set(self.rules_applied.get() + applied);
        log::debug!("Explored group {}: {} rules applied", ctx.group, applied);
    }

    fn optimize_exprs(&mut self, runtime_state: &mut RuntimeState, ctx: OptimizationContext) {
        let required = self.memo().phys_props(ctx.required).clone();
        let exprs: Vec<ExprId> = self.memo().group_exprs(ctx.group).collect();

        if !required.ordering.is_any() {
            runtime_state.tasks.push(Task::EnforceProperties { ctx });
        }
        for expr in exprs.into_iter().rev() {
            if !can_provide_ordering(self.memo(), expr, &required.ordering) {
                continue;
            }
            let inputs = self.input_contexts(expr, &required);
            runtime_state.tasks.push(Task::OptimizeInputs { ctx, expr, inputs });
        }
    }

    // Sorts the best plan that provides the required properties except for the ordering.
    fn enforce_properties(&mut self, runtime_state: &mut RuntimeState, ctx: OptimizationContext) {
        let required = self.memo().phys_props(ctx.required).clone();
        assert!(!required.ordering.is_any(), "Can not apply an enforcer - no required ordering. ctx: {}", ctx);

        // The enforcer gets a group of its own. It is not added to the group it sorts, so it is never
        // an alternative of that group and an enforcer is not enforced again.
        let first = self.memo().group(ctx.group).first();
        let sort = self.factory.construct(Expr::Relational(RelExpr::Sort {
            input: first,
            ordering: required.ordering.clone(),
        }));
        let remaining = PhysicalProps {
            presentation: required.presentation,
            ordering: OrderingChoice::any(),
        };
        let input = OptimizationContext {
            group: ctx.group,
            required: self.factory.memo_mut().intern_phys_props(remaining),
        };
        self.stats.enforcers += 1;
        runtime_state.tasks.push(Task::OptimizeInputs {
            ctx,
            expr: sort,
            inputs: InputContexts::new(vec![input], Vec::new()),
        });
    }

    fn input_contexts(&mut self, expr: ExprId, required: &PhysicalProps) -> InputContexts {
        let memo = self.factory.memo();
        let inputs = memo.rel_expr(expr).inputs();
        let input_props: Vec<_> = (0..inputs.len()).map(|i| build_child_required(memo, expr, required, i)).collect();
        let subqueries = collect_subqueries(memo, expr);

        let memo = self.factory.memo_mut();
        let inputs = inputs
            .into_iter()
            .zip(input_props)
            .map(|(input, props)| OptimizationContext {
                group: memo.group_of(input),
                required: memo.intern_phys_props(props),
            })
            .collect();
        let subqueries = subqueries
            .into_iter()
            .map(|(input, props)| OptimizationContext {
                group: memo.group_of(input),
                required: memo.intern_phys_props(props),
            })
            .collect();
        InputContexts::new(inputs, subqueries)
    }

    fn optimize_inputs(
        &mut self,
        runtime_state: &mut RuntimeState,
        ctx: OptimizationContext,
        expr: ExprId,
        mut inputs: InputContexts,
    ) {
        let best_cost = runtime_state.best_cost(&ctx);
        // Stop as soon as the inputs alone cost more than the best alternative found so far.
        if let Some(inputs_cost) = runtime_state.inputs_cost(&inputs) {
            if best_cost.is_some_and(|best| inputs_cost >= best) {
                self.stats.alternatives_pruned += 1;
                log::trace!("Pruned expr {} ctx: {} inputs cost: {:.2}", expr, ctx, inputs_cost);
                return;
            }
        } else {
            log::trace!("No plan for an input of expr {} ctx: {}", expr, ctx);
            return;
        }

        if let Some(input_ctx) = inputs.next_input() {
            runtime_state.tasks.push(Task::OptimizeInputs { ctx, expr, inputs });
            runtime_state.tasks.push(Task::OptimizeGroup { ctx: input_ctx });
            return;
        }

        let memo = self.factory.memo();
        let mut cost_ctx = CostEstimationContext::new(
            inputs
                .inputs
                .iter()
                .map(|input| {
                    let cost = runtime_state.best_cost(input).unwrap_or(Cost::INFINITY);
                    (cost, memo.group(input.group).props().stats.clone())
                })
                .collect(),
        );
        for subquery in inputs.subqueries.iter() {
            cost_ctx.add_subquery_cost(runtime_state.best_cost(subquery).unwrap_or(Cost::INFINITY));
        }
        let statistics = &memo.group(ctx.group).props().stats;
        let cost = self.coster.estimate_cost(memo, memo.rel_expr(expr), &cost_ctx, statistics);
        self.stats.alternatives_costed += 1;

        log::debug!("Expr cost: {:.2} ctx: {} expr: {} {}", cost, ctx, expr, memo.rel_expr(expr).op());

        let state = runtime_state.state.entry(ctx).or_default();
        if state.best_expr.as_ref().map_or(true, |best| cost < best.cost) {
            state.best_expr = Some(BestExpr {
                expr,
                cost,
                inputs: inputs.inputs,
                subqueries: inputs.subqueries,
            });
        }
    }
}

impl Debug for Optimizer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Optimizer")
            .field("catalog_version", &self.catalog_version)
            .field("options", &self.options)
            .field("coster", &self.coster)
            .field("memo", self.factory.memo())
            .finish()
    }
}

/// The best plan of an expression.
#[derive(Debug, Clone)]
pub struct PlanExpr {
    /// The expression. Its logical properties are the logical properties of its group.
    pub expr: ExprId,
    /// Physical properties required from the expression.
    pub required: PhysPropsId,
    /// The ordering of rows the expression produces, one output column per entry.
    /// Only the prefix needed by the required ordering is kept. See [build_provided].
    pub provided: OrderingChoice,
    pub cost: Cost,
    /// Plans of the relational inputs of the expression.
    pub inputs: Vec<PlanExpr>,
    /// Plans of the subqueries referenced by scalar expressions of the expression.
    pub subqueries: Vec<PlanExpr>,
}

/// Statistics collected during a run of the optimizer.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// The number of (group, required properties) pairs optimized.
    pub groups_optimized: usize,
    pub alternatives_costed: usize,
    /// The number of alternatives discarded because their inputs were more expensive than the best alternative.
    pub alternatives_pruned: usize,
    pub enforcers: usize,
    /// Normalization and exploration rules applied since the optimizer was initialized.
    pub rules_applied: usize,
    pub optimization_time: Duration,
}

#[derive(Debug)]
enum Task {
    OptimizeGroup {
        ctx: OptimizationContext,
    },
    GroupOptimized {
        ctx: OptimizationContext,
    },
    ExploreGroup {
        ctx: OptimizationContext,
    },
    OptimizeExprs {
        ctx: OptimizationContext,
    },
    EnforceProperties {
        ctx: OptimizationContext,
    },
    OptimizeInputs {
        ctx: OptimizationContext,
        expr: ExprId,
        inputs: InputContexts,
    },
}

impl Display for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::OptimizeGroup { ctx } => write!(f, "OptimizeGroup: {}", ctx),
            Task::GroupOptimized { ctx } => write!(f, "GroupOptimized: {}", ctx),
            Task::ExploreGroup { ctx } => write!(f, "ExploreGroup: {}", ctx),
            Task::OptimizeExprs { ctx } => write!(f, "OptimizeExprs: {}", ctx),
            Task::EnforceProperties { ctx } => write!(f, "EnforceProperties: {}", ctx),
            Task::OptimizeInputs { ctx, expr, inputs } => {
                write!(f, "OptimizeInputs: {} expr: {} next input: {}", ctx, expr, inputs.next)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct OptimizationContext {
    group: GroupId,
    required: PhysPropsId,
}

impl Display for OptimizationContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ group: {} required: {} }}", self.group, self.required)
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    tasks: Vec<Task>,
    state: HashMap<OptimizationContext, GroupState>,
    explored: HashSet<GroupId>,
}

impl RuntimeState {
    fn best_cost(&self, ctx: &OptimizationContext) -> Option<Cost> {
        self.state.get(ctx).and_then(|s| s.best_expr.as_ref()).map(|best| best.cost)
    }

    // The cost of the inputs optimized so far. None if one of them has no plan.
    fn inputs_cost(&self, inputs: &InputContexts) -> Option<Cost> {
        inputs.optimized().map(|input| self.best_cost(input)).sum()
    }
}

#[derive(Debug, Default)]
struct GroupState {
    started: bool,
    optimized: bool,
    best_expr: Option<BestExpr>,
}

#[derive(Debug, Clone)]
struct BestExpr {
    expr: ExprId,
    cost: Cost,
    inputs: Vec<OptimizationContext>,
    subqueries: Vec<OptimizationContext>,
}

/// Relational inputs and subqueries of an expression. Inputs are optimized one by one.
#[derive(Debug)]
struct InputContexts {
    inputs: Vec<OptimizationContext>,
    subqueries: Vec<OptimizationContext>,
    next: usize,
}

impl InputContexts {
    fn new(inputs: Vec<OptimizationContext>, subqueries: Vec<OptimizationContext>) -> Self {
        InputContexts {
            inputs,
            subqueries,
            next: 0,
        }
    }

    fn next_input(&mut self) -> Option<OptimizationContext> {
        let ctx = self.inputs.iter().chain(self.subqueries.iter()).nth(self.next).copied();
        if ctx.is_some() {
            self.next += 1;
        }
        ctx
    }

    fn optimized(&self) -> impl Iterator<Item = &OptimizationContext> {
        self.inputs.iter().chain(self.subqueries.iter()).take(self.next)
    }
}

// Relational expressions referenced by scalar expressions of the given relational expression.
fn collect_subqueries(memo: &Memo, expr: ExprId) -> Vec<(ExprId, PhysicalProps)> {
    let mut subqueries = Vec::new();
    if !memo.logical(expr).has_subquery {
        return subqueries;
    }
    let rel_expr = memo.rel_expr(expr);
    let inputs = rel_expr.inputs();
    let mut stack: Vec<ExprId> = rel_expr.children().into_iter().filter(|c| !inputs.contains(c)).collect();
    stack.reverse();
    while let Some(id) = stack.pop() {
        if let Expr::Scalar(scalar) = memo.expr(id) {
            let relational = scalar.relational_children();
            for input in relational.iter() {
                subqueries.push((*input, subquery_required(scalar)));
            }
            for child in scalar.children().into_iter().rev() {
                if !relational.contains(&child) {
                    stack.push(child);
                }
            }
        }
    }
    subqueries
}

fn copy_out_best_expr(
    runtime_state: &RuntimeState,
    memo: &Memo,
    ctx: &OptimizationContext,
) -> Result<PlanExpr, OptimizerError> {
    let best_expr = runtime_state
        .state
        .get(ctx)
        .and_then(|s| s.best_expr.as_ref())
        .ok_or_else(|| OptimizerError::internal(format!("No best expression for {}", ctx)))?;

    let required = memo.phys_props(ctx.required);
    let inputs = best_expr
        .inputs
        .iter()
        .map(|input| copy_out_best_expr(runtime_state, memo, input))
        .collect::<Result<Vec<_>, _>>()?;
    let subqueries = best_expr
        .subqueries
        .iter()
        .map(|input| copy_out_best_expr(runtime_state, memo, input))
        .collect::<Result<Vec<_>, _>>()?;

    let input_provided: Vec<_> = inputs.iter().map(|input| input.provided.clone()).collect();
    let provided = build_provided(memo, best_expr.expr, &required.ordering, &input_provided);

    Ok(PlanExpr {
        expr: best_expr.expr,
        required: ctx.required,
        provided,
        cost: best_expr.cost,
        inputs,
        subqueries,
    })
}

fn copy_expr<F>(
    factory: &mut Factory,
    from: &Memo,
    id: ExprId,
    replace: &mut F,
    copied: &mut HashMap<ExprId, ExprId>,
) -> ExprId
where
    F: FnMut(&mut Factory, &Memo, ExprId) -> Option<ExprId>,
{
    if let Some(new_id) = copied.get(&id) {
        return *new_id;
    }
    let new_id = match replace(factory, from, id) {
        Some(new_id) => new_id,
        None => {
            let expr = from.expr(id);
            let mut children = HashMap::new();
            for child in expr.children() {
                let new_child = copy_expr(factory, from, child, replace, copied);
                children.insert(child, new_child);
            }
            let mut expr = expr.map_children(|child| children.get(&child).copied().unwrap_or(child));
            // Physical properties are interned by the memo so they must be interned in the new memo again.
            if let Expr::Relational(RelExpr::Explain { input, private }) = &expr {
                let props = from.phys_props(private.props).clone();
                expr = Expr::Relational(RelExpr::Explain {
                    input: *input,
                    private: ExplainPrivate {
                        cols: private.cols.clone(),
                        props: factory.memo_mut().intern_phys_props(props),
                    },
                });
            }
            factory.construct(expr)
        }
    };
    copied.insert(id, new_id);
    new_id
}
