use crate::constants::GCS_SCHEME;
use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage notification that triggers one invocation.
///
/// Only the bucket and object name are read; everything else the
/// notification carries (generation, metageneration, timestamps) is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageEvent {
    pub bucket: String,
    pub name: String,
}

impl StorageEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    pub fn location(&self) -> ObjectLocation {
        ObjectLocation::new(&self.bucket, &self.name)
    }
}

/// A `gs://bucket/key` address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: &str, key: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

impl FromStr for ObjectLocation {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(GCS_SCHEME)
            .ok_or_else(|| IngestError::InvalidLocation(format!("{s} (expected gs://bucket/key)")))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| IngestError::InvalidLocation(format!("{s} (missing object key)")))?;
        if bucket.is_empty() || key.is_empty() || key.ends_with('/') {
            return Err(IngestError::InvalidLocation(s.to_string()));
        }
        Ok(Self::new(bucket, key))
    }
}

impl TryFrom<String> for ObjectLocation {
    type Error = IngestError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ObjectLocation> for String {
    fn from(loc: ObjectLocation) -> Self {
        loc.to_string()
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", GCS_SCHEME, self.bucket, self.key)
    }
}

/// Analytical table addressed as `project.database.table`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    pub project_id: String,
    pub database: String,
    pub table: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.database, self.table)
    }
}

/// Which half of the two-stage deploy a target belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Staging,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Where one deploy stage writes its CSV and which external table reads it back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub environment: Environment,
    pub location: ObjectLocation,
    pub bucket: String,
    pub table: TableRef,
}
