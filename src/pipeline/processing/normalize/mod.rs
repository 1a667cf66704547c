pub mod registry;
pub mod rules;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::RowTable;
use crate::error::Result;
use crate::schema::SchemaMapping;
use registry::RuleRegistry;

/// What normalization changed, per column
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NormalizationReport {
    pub rows: usize,
    /// Non-null cells a rule replaced with null
    pub nulled: BTreeMap<String, usize>,
}

impl NormalizationReport {
    pub fn total_nulled(&self) -> usize {
        self.nulled.values().sum()
    }
}

/// Trait for rewriting a decoded table into its canonical column types
pub trait Normalizer {
    fn normalize(&self, table: &mut RowTable) -> Result<NormalizationReport>;
}

/// Applies a rule table column by column. A rule whose column is missing from
/// the table fails the whole normalization.
pub struct ColumnNormalizer {
    registry: RuleRegistry,
}

impl ColumnNormalizer {
    pub fn new(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    pub fn from_schema(schema: &SchemaMapping) -> Self {
        Self::new(RuleRegistry::from_schema(schema))
    }
}

impl Normalizer for ColumnNormalizer {
    fn normalize(&self, table: &mut RowTable) -> Result<NormalizationReport> {
        let mut report = NormalizationReport {
            rows: table.len(),
            ..Default::default()
        };

        for rule in self.registry.rules() {
            let mut nulled = 0usize;
            table.map_column(&rule.column, |cell| {
                let out = (rule.apply)(cell);
                if out.is_null() && !cell.is_null() {
                    nulled += 1;
                }
                out
            })?;

            debug!(column = %rule.column, rule = rule.rule_name, nulled, "Applied column rule");
            if nulled > 0 {
                warn!(column = %rule.column, rule = rule.rule_name, nulled, "Replaced non-conforming values with null");
                *report.nulled.entry(rule.column.clone()).or_insert(0) += nulled;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CellValue;
    use crate::error::IngestError;

    fn schema() -> SchemaMapping {
        SchemaMapping::from_json_str(r#"{"name": "str", "age": "int", "pincode": "int"}"#).unwrap()
    }

    fn table() -> RowTable {
        let mut table = RowTable::new(vec!["name".into(), "age".into(), "pincode".into(), "sex".into()]);
        table.push_row(vec!["Asha".into(), CellValue::Float(31.0), CellValue::Int(560001), "Female".into()]);
        table.push_row(vec![CellValue::Int(9), "thirty".into(), CellValue::Float(560034.0), "M".into()]);
        table.push_row(vec!["".into(), CellValue::Float(27.9), CellValue::Null, CellValue::Null]);
        table
    }

    #[test]
    fn declared_columns_hold_only_their_type_or_null() {
        let mut table = table();
        ColumnNormalizer::from_schema(&schema()).normalize(&mut table).unwrap();

        assert!(table.column_values("name").unwrap().all(|v| v.is_text() || v.is_null()));
        for column in ["age", "pincode"] {
            assert!(table
                .column_values(column)
                .unwrap()
                .all(|v| matches!(v, CellValue::Int(_) | CellValue::Null)));
        }
    }

    #[test]
    fn reports_nulled_cells_per_column() {
        let mut table = table();
        let report = ColumnNormalizer::from_schema(&schema()).normalize(&mut table).unwrap();

        assert_eq!(report.rows, 3);
        assert_eq!(report.nulled.get("name"), Some(&1));
        assert_eq!(report.nulled.get("age"), Some(&1));
        assert_eq!(report.nulled.get("pincode"), None);
        assert_eq!(report.total_nulled(), 2);

        assert_eq!(table.get(2, "name"), Some(&CellValue::text("")));
        assert_eq!(table.get(2, "age"), Some(&CellValue::Int(27)));
        assert_eq!(table.get(1, "pincode"), Some(&CellValue::Int(560034)));
    }

    #[test]
    fn sex_column_is_rewritten() {
        let mut table = table();
        ColumnNormalizer::from_schema(&schema()).normalize(&mut table).unwrap();
        let sexes: Vec<_> = table.column_values("sex").unwrap().cloned().collect();
        assert_eq!(sexes, vec![CellValue::text("female"), CellValue::text("male"), CellValue::Null]);
    }

    #[test]
    fn declared_sex_type_is_applied_before_the_sex_rewrite() {
        let mut table = RowTable::new(vec!["sex".into()]);
        table.push_row(vec![CellValue::Int(1)]);
        table.push_row(vec!["unknown".into()]);

        let mut declared = table.clone();
        let schema = SchemaMapping::from_json_str(r#"{"sex": "str"}"#).unwrap();
        let report = ColumnNormalizer::from_schema(&schema).normalize(&mut declared).unwrap();
        let sexes: Vec<_> = declared.column_values("sex").unwrap().cloned().collect();
        assert_eq!(sexes, vec![CellValue::Null, CellValue::text("male")]);
        assert_eq!(report.nulled.get("sex"), Some(&1));

        let undeclared = SchemaMapping::from_json_str("{}").unwrap();
        ColumnNormalizer::from_schema(&undeclared).normalize(&mut table).unwrap();
        let sexes: Vec<_> = table.column_values("sex").unwrap().cloned().collect();
        assert_eq!(sexes, vec![CellValue::text("male"), CellValue::text("male")]);
    }

    #[test]
    fn missing_schema_column_fails() {
        let mut table = RowTable::new(vec!["name".into(), "sex".into()]);
        table.push_row(vec!["Asha".into(), "Female".into()]);
        let err = ColumnNormalizer::from_schema(&schema()).normalize(&mut table).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn(_)));
    }

    #[test]
    fn missing_sex_column_fails() {
        let mut table = RowTable::new(vec!["name".into()]);
        table.push_row(vec!["Asha".into()]);
        let schema = SchemaMapping::from_json_str(r#"{"name": "str"}"#).unwrap();
        let err = ColumnNormalizer::from_schema(&schema).normalize(&mut table).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn(c) if c == "sex"));
    }
}
