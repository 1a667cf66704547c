use crate::error::{IngestError, Result};
use serde::Serialize;
use std::fmt;

/// A single spreadsheet cell after decoding
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Date or time cell, kept as rendered text; neither textual nor numeric
    DateTime(String),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, CellValue::Text(_))
    }

    /// Canonical text used for equality joins: whole floats print without a
    /// fractional part so `560001.0` and `"560001"` meet on the same key.
    pub fn join_key(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Text(s) => canonical_key(s),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                Some(format!("{}", *f as i64))
            }
            CellValue::Float(f) if f.is_finite() => Some(f.to_string()),
            CellValue::Float(_) => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::DateTime(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Text(s) | CellValue::DateTime(s) => write!(f, "{s}"),
            CellValue::Int(i) => write!(f, "{i}"),
            // Plain decimals, never exponent notation; whole values keep a `.0`
            CellValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v}.0"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// Join key for free text: trimmed, and `"560001.0"` folded onto `"560001"`.
/// Text without a decimal point is kept verbatim so leading zeros survive.
pub fn canonical_key(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(f) if trimmed.contains('.') && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            Some(format!("{}", f as i64))
        }
        _ => Some(trimmed.to_string()),
    }
}

/// Ordered columns plus ordered rows; every row has exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RowTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding short rows with nulls and dropping cells past the last column
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column_values<'a>(&'a self, name: &str) -> Result<impl Iterator<Item = &'a CellValue> + 'a> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| IngestError::MissingColumn(name.to_string()))?;
        Ok(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Rewrite every cell of one column in place
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&CellValue) -> CellValue,
    {
        let idx = self
            .column_index(name)
            .ok_or_else(|| IngestError::MissingColumn(name.to_string()))?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        Ok(())
    }

    /// Append a column, or overwrite it if a column of that name already exists.
    /// `values` must hold one cell per row.
    pub fn set_column(&mut self, name: &str, values: Vec<CellValue>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(IngestError::Spreadsheet(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RowTable {
        let mut table = RowTable::new(vec!["name".into(), "pincode".into()]);
        table.push_row(vec!["Asha".into(), CellValue::Int(560001)]);
        table.push_row(vec!["Ravi".into()]);
        table
    }

    #[test]
    fn short_rows_are_padded_with_nulls() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, "pincode"), Some(&CellValue::Null));
    }

    #[test]
    fn map_column_reports_missing_column() {
        let mut table = sample();
        let err = table.map_column("age", |v| v.clone()).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn(c) if c == "age"));
    }

    #[test]
    fn set_column_appends_then_overwrites() {
        let mut table = sample();
        table
            .set_column("city", vec!["Bengaluru".into(), CellValue::Null])
            .unwrap();
        assert_eq!(table.columns(), &["name", "pincode", "city"]);
        table.set_column("city", vec![CellValue::Null, "Mysuru".into()]).unwrap();
        assert_eq!(table.columns().len(), 3);
        assert_eq!(table.get(1, "city"), Some(&CellValue::text("Mysuru")));
        assert!(table.set_column("city", vec![CellValue::Null]).is_err());
    }

    #[test]
    fn join_keys_line_up_across_cell_types() {
        assert_eq!(CellValue::Int(560001).join_key().as_deref(), Some("560001"));
        assert_eq!(CellValue::Float(560001.0).join_key().as_deref(), Some("560001"));
        assert_eq!(CellValue::text(" 560001 ").join_key().as_deref(), Some("560001"));
        assert_eq!(CellValue::text("  ").join_key(), None);
        assert_eq!(CellValue::Null.join_key(), None);
        assert_eq!(CellValue::Float(f64::NAN).join_key(), None);
        assert_eq!(CellValue::text("560001.0").join_key().as_deref(), Some("560001"));
        assert_eq!(canonical_key("012345").as_deref(), Some("012345"));
    }

    #[test]
    fn display_renders_nulls_empty() {
        assert_eq!(CellValue::Null.to_string(), "");
        assert_eq!(CellValue::Float(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Int(-4).to_string(), "-4");
    }

    #[test]
    fn floats_render_as_plain_decimals() {
        assert_eq!(CellValue::Float(570001.0).to_string(), "570001.0");
        assert_eq!(CellValue::Float(1e16).to_string(), "10000000000000000.0");
        assert_eq!(CellValue::Float(1e-7).to_string(), "0.0000001");
        assert_eq!(CellValue::Float(-0.25).to_string(), "-0.25");
    }
}
