//! Rule names.

use std::fmt::{Display, Formatter};

use bit_set::BitSet;

/// Names of normalization and exploration rules. Names are stable and can be used as telemetry strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleName {
    // Select.
    EliminateSelect,
    DetectSelectContradiction,
    SimplifySelectFilters,
    RemoveDuplicateFilters,
    ConsolidateSelectFilters,
    SortFilters,
    MergeSelects,
    PushSelectIntoJoinLeft,
    PushSelectIntoJoinRight,

    // Join.
    SimplifyJoinFilters,
    DetectJoinContradiction,
    PushFilterIntoJoinLeft,
    PushFilterIntoJoinRight,
    SimplifyZeroCardinalityJoin,

    // Project.
    EliminateProject,
    FoldPassthroughProjections,
    MergeProjects,
    MergeProjectWithValues,

    // GroupBy.
    ReduceGroupingCols,
    ConvertGroupByToProject,

    // Limit and Offset.
    EliminateLimit,
    LimitZero,
    EliminateOffset,

    // Set operations.
    SimplifyZeroCardinalitySetOp,

    // Scalar.
    FoldNullUnary,
    FoldNullBinary,
    FoldNullComparison,
    FoldUnary,
    FoldBinary,
    FoldComparison,
    FoldCast,
    EliminateCast,
    NormalizeTupleEquality,
    FoldInEmpty,
    FoldNotInEmpty,
    FoldInConst,
    CommuteConstBinary,
    CommuteConstComparison,
    UnifyComparisonTypes,
    SimplifyAnd,
    SimplifyOr,
    NormalizeNestedAnd,
    EliminateNot,
    NegateComparison,
    FoldIsNull,
    EliminateCoalesce,
    SimplifyCase,
    ExtractRedundantConjunct,
    SimplifyRange,

    // Exploration.
    CommuteJoin,
    GenerateIndexScans,
    GenerateMergeJoins,
    GenerateLookupJoins,
}

impl RuleName {
    /// All rule names in declaration order.
    pub const ALL: &'static [RuleName] = &[
        RuleName::EliminateSelect,
        RuleName::DetectSelectContradiction,
        RuleName::SimplifySelectFilters,
        RuleName::RemoveDuplicateFilters,
        RuleName::ConsolidateSelectFilters,
        RuleName::SortFilters,
        RuleName::MergeSelects,
        RuleName::PushSelectIntoJoinLeft,
        RuleName::PushSelectIntoJoinRight,
        RuleName::SimplifyJoinFilters,
        RuleName::DetectJoinContradiction,
        RuleName::PushFilterIntoJoinLeft,
        RuleName::PushFilterIntoJoinRight,
        RuleName::SimplifyZeroCardinalityJoin,
        RuleName::EliminateProject,
        RuleName::FoldPassthroughProjections,
        RuleName::MergeProjects,
        RuleName::MergeProjectWithValues,
        RuleName::ReduceGroupingCols,
        RuleName::ConvertGroupByToProject,
        RuleName::EliminateLimit,
        RuleName::LimitZero,
        RuleName::EliminateOffset,
        RuleName::SimplifyZeroCardinalitySetOp,
        RuleName::FoldNullUnary,
        RuleName::FoldNullBinary,
        RuleName::FoldNullComparison,
        RuleName::FoldUnary,
        RuleName::FoldBinary,
        RuleName::FoldComparison,
        RuleName::FoldCast,
        RuleName::EliminateCast,
        RuleName::NormalizeTupleEquality,
        RuleName::FoldInEmpty,
        RuleName::FoldNotInEmpty,
        RuleName::FoldInConst,
        RuleName::CommuteConstBinary,
        RuleName::CommuteConstComparison,
        RuleName::UnifyComparisonTypes,
        RuleName::SimplifyAnd,
        RuleName::SimplifyOr,
        RuleName::NormalizeNestedAnd,
        RuleName::EliminateNot,
        RuleName::NegateComparison,
        RuleName::FoldIsNull,
        RuleName::EliminateCoalesce,
        RuleName::SimplifyCase,
        RuleName::ExtractRedundantConjunct,
        RuleName::SimplifyRange,
        RuleName::CommuteJoin,
        RuleName::GenerateIndexScans,
        RuleName::GenerateMergeJoins,
        RuleName::GenerateLookupJoins,
    ];

    /// Returns `true` if this is an exploration rule. Exploration rules are applied by the optimizer.
    pub fn is_explore(&self) -> bool {
        *self >= RuleName::CommuteJoin
    }

    /// Returns `true` if this is a normalization rule. Normalization rules are applied by the factory.
    pub fn is_normalize(&self) -> bool {
        !self.is_explore()
    }

    /// The stable name of this rule.
    pub fn name(&self) -> &'static str {
        match self {
            RuleName::EliminateSelect => "EliminateSelect",
            RuleName::DetectSelectContradiction => "DetectSelectContradiction",
            RuleName::SimplifySelectFilters => "SimplifySelectFilters",
            RuleName::RemoveDuplicateFilters => "RemoveDuplicateFilters",
            RuleName::ConsolidateSelectFilters => "ConsolidateSelectFilters",
            RuleName::SortFilters => "SortFilters",
            RuleName::MergeSelects => "MergeSelects",
            RuleName::PushSelectIntoJoinLeft => "PushSelectIntoJoinLeft",
            RuleName::PushSelectIntoJoinRight => "PushSelectIntoJoinRight",
            RuleName::SimplifyJoinFilters => "SimplifyJoinFilters",
            RuleName::DetectJoinContradiction => "DetectJoinContradiction",
            RuleName::PushFilterIntoJoinLeft => "PushFilterIntoJoinLeft",
            RuleName::PushFilterIntoJoinRight => "PushFilterIntoJoinRight",
            RuleName::SimplifyZeroCardinalityJoin => "SimplifyZeroCardinalityJoin",
            RuleName::EliminateProject => "EliminateProject",
            RuleName::FoldPassthroughProjections => "FoldPassthroughProjections",
            RuleName::MergeProjects => "MergeProjects",
            RuleName::MergeProjectWithValues => "MergeProjectWithValues",
            RuleName::ReduceGroupingCols => "ReduceGroupingCols",
            RuleName::ConvertGroupByToProject => "ConvertGroupByToProject",
            RuleName::EliminateLimit => "EliminateLimit",
            RuleName::LimitZero => "LimitZero",
            RuleName::EliminateOffset => "EliminateOffset",
            RuleName::SimplifyZeroCardinalitySetOp => "SimplifyZeroCardinalitySetOp",
            RuleName::FoldNullUnary => "FoldNullUnary",
            RuleName::FoldNullBinary => "FoldNullBinary",
            RuleName::FoldNullComparison => "FoldNullComparison",
            RuleName::FoldUnary => "FoldUnary",
            RuleName::FoldBinary => "FoldBinary",
            RuleName::FoldComparison => "FoldComparison",
            RuleName::FoldCast => "FoldCast",
            RuleName::EliminateCast => "EliminateCast",
            RuleName::NormalizeTupleEquality => "NormalizeTupleEquality",
            RuleName::FoldInEmpty => "FoldInEmpty",
            RuleName::FoldNotInEmpty => "FoldNotInEmpty",
            RuleName::FoldInConst => "FoldInConst",
            RuleName::CommuteConstBinary => "CommuteConstBinary",
            RuleName::CommuteConstComparison => "CommuteConstComparison",
            RuleName::UnifyComparisonTypes => "UnifyComparisonTypes",
            RuleName::SimplifyAnd => "SimplifyAnd",
            RuleName::SimplifyOr => "SimplifyOr",
            RuleName::NormalizeNestedAnd => "NormalizeNestedAnd",
            RuleName::EliminateNot => "EliminateNot",
            RuleName::NegateComparison => "NegateComparison",
            RuleName::FoldIsNull => "FoldIsNull",
            RuleName::EliminateCoalesce => "EliminateCoalesce",
            RuleName::SimplifyCase => "SimplifyCase",
            RuleName::ExtractRedundantConjunct => "ExtractRedundantConjunct",
            RuleName::SimplifyRange => "SimplifyRange",
            RuleName::CommuteJoin => "CommuteJoin",
            RuleName::GenerateIndexScans => "GenerateIndexScans",
            RuleName::GenerateMergeJoins => "GenerateMergeJoins",
            RuleName::GenerateLookupJoins => "GenerateLookupJoins",
        }
    }

    /// Returns a rule with the given name.
    pub fn from_name(name: &str) -> Option<RuleName> {
        RuleName::ALL.iter().find(|r| r.name() == name).copied()
    }
}

impl Display for RuleName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A set of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    bits: BitSet,
}

impl RuleSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        RuleSet::default()
    }

    /// Creates a set that contains every exploration rule.
    pub fn exploration_rules() -> Self {
        RuleName::ALL.iter().filter(|r| r.is_explore()).copied().collect()
    }

    pub fn add(&mut self, rule: RuleName) -> bool {
        self.bits.insert(rule as usize)
    }

    pub fn remove(&mut self, rule: RuleName) -> bool {
        self.bits.remove(rule as usize)
    }

    pub fn contains(&self, rule: RuleName) -> bool {
        self.bits.contains(rule as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns an iterator over rules of this set in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = RuleName> + '_ {
        self.bits.iter().map(|i| RuleName::ALL[i])
    }
}

impl FromIterator<RuleName> for RuleSet {
    fn from_iter<T: IntoIterator<Item = RuleName>>(iter: T) -> Self {
        let mut set = RuleSet::new();
        for rule in iter {
            set.add(rule);
        }
        set
    }
}
