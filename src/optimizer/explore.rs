//! Exploration rules. Unlike normalization rules an exploration rule does not replace an expression
//! but adds alternative expressions to its group.

use crate::memo::{ExprId, GroupId};
use crate::meta::ColumnId;
use crate::norm::{AppliedRuleCallback, Factory, MatchedRuleCallback, RuleName, RuleSet};
use crate::operators::relational::{
    IndexJoinPrivate, JoinFlags, JoinKind, LookupJoinPrivate, MergeJoinPrivate, ScanPrivate,
};
use crate::operators::scalar::CmpOp;
use crate::operators::{Operator, RelExpr, ScalarExpr};
use crate::properties::ColSet;

/// An exploration rule.
pub(crate) struct ExploreRule {
    pub name: RuleName,
    pub ops: &'static [Operator],
    /// Returns `true` if the rule can generate alternatives for the given expression.
    pub matcher: fn(&Factory, ExprId) -> bool,
    /// Builds alternatives of the given expression. Each alternative is added to the group of that expression.
    pub generate: fn(&mut Factory, ExprId) -> Vec<RelExpr>,
}

const JOINS: &[Operator] = &[
    Operator::InnerJoin,
    Operator::LeftJoin,
    Operator::FullJoin,
    Operator::SemiJoin,
    Operator::AntiJoin,
];

static RULES: &[ExploreRule] = &[
    ExploreRule {
        name: RuleName::CommuteJoin,
        ops: &[Operator::InnerJoin],
        matcher: match_commute_join,
        generate: commute_join,
    },
    ExploreRule {
        name: RuleName::GenerateIndexScans,
        ops: &[Operator::Scan],
        matcher: match_index_scans,
        generate: generate_index_scans,
    },
    ExploreRule {
        name: RuleName::GenerateMergeJoins,
        ops: JOINS,
        matcher: match_merge_joins,
        generate: generate_merge_joins,
    },
    ExploreRule {
        name: RuleName::GenerateLookupJoins,
        ops: &[Operator::InnerJoin, Operator::LeftJoin, Operator::SemiJoin, Operator::AntiJoin],
        matcher: match_lookup_joins,
        generate: generate_lookup_joins,
    },
];

/// Rule filters and notifications used during exploration.
pub(crate) struct ExploreHooks<'a> {
    pub disabled_rules: &'a RuleSet,
    pub matched_rule: Option<&'a MatchedRuleCallback>,
    pub applied_rule: Option<&'a AppliedRuleCallback>,
}

/// Applies exploration rules to every expression of the given group including the expressions
/// added by those rules. Returns the number of alternatives produced by the rules.
pub(crate) fn explore_group(factory: &mut Factory, group: GroupId, hooks: &ExploreHooks) -> usize {
    let mut applied = 0;
    let mut i = 0;
    while let Some(expr) = factory.memo().group_exprs(group).nth(i) {
        i += 1;
        let op = factory.memo().rel_expr(expr).op();
        for rule in RULES.iter().filter(|r| r.ops.contains(&op)) {
            if hooks.disabled_rules.contains(rule.name) || !(rule.matcher)(factory, expr) {
                continue;
            }
            if let Some(matched) = hooks.matched_rule {
                if !matched(rule.name) {
                    continue;
                }
            }
            for alternative in (rule.generate)(factory, expr) {
                let id = factory.memo_mut().add_to_group(alternative, group);
                log::trace!("Applied rule {} to {}: {} in group {}", rule.name, op, id, group);
                if let Some(callback) = hooks.applied_rule {
                    callback(rule.name, op, id);
                }
                applied += 1;
            }
        }
    }
    applied
}

#[derive(Debug)]
struct JoinParts<'a> {
    kind: JoinKind,
    left: ExprId,
    right: ExprId,
    on: &'a [ExprId],
    flags: JoinFlags,
}

fn join_parts(f: &Factory, id: ExprId) -> Option<JoinParts<'_>> {
    match f.memo().rel_expr(id) {
        RelExpr::Join {
            kind,
            left,
            right,
            on,
            flags,
        } => Some(JoinParts {
            kind: *kind,
            left: *left,
            right: *right,
            on,
            flags: *flags,
        }),
        _ => None,
    }
}

// Pairs of columns (left, right) compared for equality by the given join conditions.
fn equality_pairs(f: &Factory, on: &[ExprId], left_cols: &ColSet, right_cols: &ColSet) -> Vec<(ColumnId, ColumnId)> {
    let mut pairs = Vec::new();
    for item in on {
        let condition = match f.scalar_of(*item) {
            ScalarExpr::FiltersItem(condition) => *condition,
            _ => continue,
        };
        let (left, right) = match f.scalar_of(condition) {
            ScalarExpr::Comparison {
                op: CmpOp::Eq,
                left,
                right,
            } => (*left, *right),
            _ => continue,
        };
        let (l, r) = match (f.scalar_of(left), f.scalar_of(right)) {
            (ScalarExpr::Variable(l), ScalarExpr::Variable(r)) => (*l, *r),
            _ => continue,
        };
        if left_cols.contains(l) && right_cols.contains(r) {
            pairs.push((l, r));
        } else if left_cols.contains(r) && right_cols.contains(l) {
            pairs.push((r, l));
        }
    }
    pairs
}

fn match_commute_join(f: &Factory, id: ExprId) -> bool {
    join_parts(f, id).is_some_and(|join| join.kind == JoinKind::Inner)
}

fn commute_join(f: &mut Factory, id: ExprId) -> Vec<RelExpr> {
    let join = expect_expr!(join_parts(f, id), Some(join) => join);
    vec![RelExpr::Join {
        kind: join.kind,
        left: join.right,
        right: join.left,
        on: join.on.to_vec(),
        flags: join.flags,
    }]
}

// Only a scan of the primary index is explored.
fn match_index_scans(f: &Factory, id: ExprId) -> bool {
    match f.memo().rel_expr(id) {
        RelExpr::Scan(private) => {
            let table = f.metadata().table(private.table).table();
            private.index == 0 && table.index_count() > 1 && !(private.flags.force_index && private.flags.index == 0)
        }
        _ => false,
    }
}

// Adds scans of secondary indexes that contain every column of the scan. When an index does not contain
// some of the columns and index joins are allowed adds an index join over a scan of that index.
fn generate_index_scans(f: &mut Factory, id: ExprId) -> Vec<RelExpr> {
    let private = expect_expr!(f.memo().rel_expr(id), RelExpr::Scan(private) => private.clone());
    let (index_count, primary_key) = {
        let table = f.metadata().table(private.table);
        (table.table().index_count(), table.index_key_cols(0))
    };

    let mut alternatives = Vec::new();
    for index in 1..index_count {
        if private.flags.force_index && private.flags.index != index {
            continue;
        }
        let (index_cols, inverted) = {
            let table = f.metadata().table(private.table);
            (table.index_cols(index), table.table().index(index).is_inverted())
        };
        if inverted {
            continue;
        }
        if private.cols.is_subset_of(&index_cols) {
            alternatives.push(RelExpr::Scan(private.with_index(index)));
        } else if !private.flags.no_index_join {
            let mut input_cols = private.cols.intersection(&index_cols);
            input_cols.union_with(&primary_key.intersection(&index_cols));
            if input_cols.is_empty() {
                continue;
            }
            let input = f.construct_scan(ScanPrivate {
                table: private.table,
                index,
                cols: input_cols,
                flags: private.flags,
            });
            alternatives.push(RelExpr::IndexJoin {
                input,
                private: IndexJoinPrivate {
                    table: private.table,
                    cols: private.cols.clone(),
                },
            });
        }
    }
    alternatives
}

fn match_merge_joins(f: &Factory, id: ExprId) -> bool {
    match join_parts(f, id) {
        Some(join) if !join.flags.contains(JoinFlags::NO_MERGE_JOIN) => {
            let left_cols = f.output_cols(join.left);
            let right_cols = f.output_cols(join.right);
            !equality_pairs(f, join.on, left_cols, right_cols).is_empty()
        }
        _ => false,
    }
}

fn generate_merge_joins(f: &mut Factory, id: ExprId) -> Vec<RelExpr> {
    let join = expect_expr!(join_parts(f, id), Some(join) => join);
    let pairs = equality_pairs(f, join.on, f.output_cols(join.left), f.output_cols(join.right));
    let (left_eq, right_eq) = pairs.into_iter().unzip();
    vec![RelExpr::MergeJoin {
        kind: join.kind,
        left: join.left,
        right: join.right,
        on: join.on.to_vec(),
        private: MergeJoinPrivate { left_eq, right_eq },
    }]
}

// The right side of a lookup join must be a scan of a table's primary index.
fn lookup_scan(f: &Factory, join: &JoinParts) -> Option<ScanPrivate> {
    if join.flags.contains(JoinFlags::NO_LOOKUP_JOIN) || join.kind == JoinKind::Full {
        return None;
    }
    match f.memo().rel_expr(join.right) {
        RelExpr::Scan(private) if private.index == 0 => Some(private.clone()),
        _ => None,
    }
}

// Left columns that match a prefix of the key columns of the given index.
fn lookup_key_cols(f: &Factory, scan: &ScanPrivate, index: usize, pairs: &[(ColumnId, ColumnId)]) -> Vec<ColumnId> {
    let table = f.metadata().table(scan.table);
    let catalog_index = table.table().index(index);
    let mut key_cols = Vec::new();
    for i in 0..catalog_index.key_column_count() {
        let key_col = table.column_id(catalog_index.column(i).ordinal);
        match pairs.iter().find(|(_, r)| *r == key_col) {
            Some((l, _)) => key_cols.push(*l),
            None => break,
        }
    }
    key_cols
}

fn match_lookup_joins(f: &Factory, id: ExprId) -> bool {
    join_parts(f, id).is_some_and(|join| lookup_scan(f, &join).is_some())
}

fn generate_lookup_joins(f: &mut Factory, id: ExprId) -> Vec<RelExpr> {
    let join = expect_expr!(join_parts(f, id), Some(join) => join);
    let scan = expect_expr!(lookup_scan(f, &join), Some(scan) => scan);
    let pairs = equality_pairs(f, join.on, f.output_cols(join.left), f.output_cols(join.right));
    let index_count = f.metadata().table(scan.table).table().index_count();

    let mut alternatives = Vec::new();
    for index in 0..index_count {
        if scan.flags.force_index && scan.flags.index != index {
            continue;
        }
        let index_cols = f.metadata().table(scan.table).index_cols(index);
        if !scan.cols.is_subset_of(&index_cols) {
            continue;
        }
        let key_cols = lookup_key_cols(f, &scan, index, &pairs);
        if key_cols.is_empty() {
            continue;
        }
        alternatives.push(RelExpr::LookupJoin {
            kind: join.kind,
            input: join.left,
            on: join.on.to_vec(),
            private: LookupJoinPrivate {
                table: scan.table,
                index,
                key_cols,
                cols: scan.cols.clone(),
            },
        });
    }
    alternatives
}
