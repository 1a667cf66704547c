use crate::constants::{DEFAULT_CITY_COLUMN, DEFAULT_POSTAL_COLUMN};
use crate::error::{IngestError, Result};
use crate::types::{DeployTarget, Environment, ObjectLocation, TableRef};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    pub warehouse: WarehouseConfig,
    pub staging: TargetConfig,
    pub production: TargetConfig,
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    pub project_id: String,
    pub database: String,
    pub staging_table: String,
    pub production_table: String,
}

/// Bucket plus the object the cleaned CSV is written to
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub location: ObjectLocation,
    pub bucket: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceConfig {
    pub location: ObjectLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Column of the uploaded sheet holding the postal code
    #[serde(default = "default_postal_column")]
    pub postal_column: String,
    /// Column appended with the looked-up city
    #[serde(default = "default_city_column")]
    pub city_column: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            postal_column: default_postal_column(),
            city_column: default_city_column(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Buckets are directories under `root`; tables read their bound CSV objects
    Local {
        #[serde(default = "default_local_root")]
        root: PathBuf,
    },
    /// Cloud Storage and BigQuery over their REST APIs
    Gcp {
        #[serde(default = "default_storage_endpoint")]
        storage_endpoint: String,
        #[serde(default = "default_bigquery_endpoint")]
        bigquery_endpoint: String,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local {
            root: default_local_root(),
        }
    }
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("ext_table_schema.json")
}

fn default_postal_column() -> String {
    DEFAULT_POSTAL_COLUMN.to_string()
}

fn default_city_column() -> String {
    DEFAULT_CITY_COLUMN.to_string()
}

fn default_local_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_storage_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_bigquery_endpoint() -> String {
    "https://bigquery.googleapis.com".to_string()
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            IngestError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("warehouse.project_id", &self.warehouse.project_id),
            ("warehouse.database", &self.warehouse.database),
            ("warehouse.staging_table", &self.warehouse.staging_table),
            ("warehouse.production_table", &self.warehouse.production_table),
            ("staging.bucket", &self.staging.bucket),
            ("production.bucket", &self.production.bucket),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(IngestError::Config(format!("{key} must not be empty")));
            }
        }

        for (section, target) in [("staging", &self.staging), ("production", &self.production)] {
            if target.location.bucket != target.bucket {
                return Err(IngestError::Config(format!(
                    "{section}.location {} is not inside bucket '{}'",
                    target.location, target.bucket
                )));
            }
        }

        if self.staging.bucket == self.production.bucket {
            return Err(IngestError::Config(
                "staging and production must use different buckets".to_string(),
            ));
        }

        Ok(())
    }

    pub fn table(&self, name: &str) -> TableRef {
        TableRef {
            project_id: self.warehouse.project_id.clone(),
            database: self.warehouse.database.clone(),
            table: name.to_string(),
        }
    }

    pub fn target(&self, environment: Environment) -> DeployTarget {
        let (target, table) = match environment {
            Environment::Staging => (&self.staging, &self.warehouse.staging_table),
            Environment::Production => (&self.production, &self.warehouse.production_table),
        };
        DeployTarget {
            environment,
            location: target.location.clone(),
            bucket: target.bucket.clone(),
            table: self.table(table),
        }
    }
}
