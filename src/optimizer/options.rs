use crate::norm::RuleSet;

/// Options of an [optimizer](super::Optimizer). Options are read by [Optimizer::init](super::Optimizer::init).
#[derive(Debug, Clone)]
pub struct OptimizerOptions {
    /// When `false` names of tables and schemas are converted to lower case before they are resolved.
    pub case_sensitive: bool,
    /// The maximum number of bytes a memo can use. See [Optimizer::memory_estimate](super::Optimizer::memory_estimate).
    pub memory_budget: Option<usize>,
    /// Enables expression checks.
    pub check_expressions: bool,
    /// Enables exploration rules. When disabled the normalized plan is costed as is.
    pub explore: bool,
    /// Rules that must not be applied. Both normalization and exploration rules can be disabled.
    pub disabled_rules: RuleSet,
}

impl OptimizerOptions {
    pub fn with_case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    pub fn with_check_expressions(mut self, value: bool) -> Self {
        self.check_expressions = value;
        self
    }

    pub fn with_explore(mut self, value: bool) -> Self {
        self.explore = value;
        self
    }

    pub fn with_disabled_rules(mut self, rules: RuleSet) -> Self {
        self.disabled_rules = rules;
        self
    }
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        OptimizerOptions {
            case_sensitive: false,
            memory_budget: None,
            check_expressions: cfg!(debug_assertions),
            explore: true,
            disabled_rules: RuleSet::new(),
        }
    }
}
