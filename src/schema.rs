use crate::error::{IngestError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Primitive type a column is expected to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ExpectedType {
    #[serde(rename = "str")]
    String,
    #[serde(rename = "int")]
    Integer,
}

/// Column name -> expected type. Loaded once at startup and shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SchemaMapping {
    columns: BTreeMap<String, ExpectedType>,
}

impl SchemaMapping {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read schema file '{}': {}", path.display(), e))
        })?;
        let schema = Self::from_json_str(&content)?;
        info!(path = %path.display(), columns = schema.len(), "Loaded column schema");
        Ok(schema)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ExpectedType)> {
        self.columns.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn get(&self, column: &str) -> Option<ExpectedType> {
        self.columns.get(column).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
