use super::rules::{coerce_integer, coerce_string, normalize_sex, CellRule};
use crate::constants::SEX_COLUMN;
use crate::schema::{ExpectedType, SchemaMapping};

/// One column paired with the rule that rewrites its cells
#[derive(Clone)]
pub struct ColumnRule {
    pub column: String,
    /// Short label used in logs and reports
    pub rule_name: &'static str,
    pub apply: CellRule,
}

impl std::fmt::Debug for ColumnRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnRule")
            .field("column", &self.column)
            .field("rule_name", &self.rule_name)
            .finish()
    }
}

/// Ordered rule table; rules run in insertion order, so a column may be
/// touched by more than one rule.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<ColumnRule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type coercions for every schema column, followed by the sex rewrite
    pub fn from_schema(schema: &SchemaMapping) -> Self {
        let mut registry = Self::new();
        for (column, expected) in schema.iter() {
            match expected {
                ExpectedType::String => registry.register(column, "string", coerce_string),
                ExpectedType::Integer => registry.register(column, "integer", coerce_integer),
            }
        }
        registry.register(SEX_COLUMN, "sex", normalize_sex);
        registry
    }

    pub fn register(&mut self, column: &str, rule_name: &'static str, apply: CellRule) {
        self.rules.push(ColumnRule {
            column: column.to_string(),
            rule_name,
            apply,
        });
    }

    pub fn rules(&self) -> &[ColumnRule] {
        &self.rules
    }
}
