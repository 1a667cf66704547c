// Adapters behind the object store and warehouse ports

pub mod bigquery;
pub mod external_table;
pub mod gcs_store;
pub mod in_memory;
pub mod local_store;

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::app::ports::{ObjectStorePort, WarehousePort};
use crate::config::{BackendConfig, Config};
use crate::constants::ACCESS_TOKEN_ENV;
use crate::error::{IngestError, Result};
use crate::types::{Environment, TableRef};

static PROBE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bfrom\s+`?([\w-]+)\.([\w-]+)\.([\w-]+)`?").expect("static pattern compiles")
});

/// The `project.database.table` a probe query reads from
pub fn probed_table(sql: &str) -> Option<TableRef> {
    let caps = PROBE_TABLE.captures(sql)?;
    Some(TableRef {
        project_id: caps[1].to_string(),
        database: caps[2].to_string(),
        table: caps[3].to_string(),
    })
}

/// Concrete store and warehouse clients for one process
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn ObjectStorePort>,
    pub warehouse: Arc<dyn WarehousePort>,
}

impl Backends {
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.backend {
            BackendConfig::Local { root } => {
                info!(root = %root.display(), "Using local object store and external-table emulation");
                let store: Arc<dyn ObjectStorePort> = Arc::new(local_store::LocalObjectStore::new(root.clone()));
                let warehouse = Self::external_tables(config, store.clone());
                Ok(Self { store, warehouse })
            }
            BackendConfig::Gcp {
                storage_endpoint,
                bigquery_endpoint,
            } => {
                let token = std::env::var(ACCESS_TOKEN_ENV)
                    .map_err(|_| IngestError::Config(format!("{ACCESS_TOKEN_ENV} must be set for the gcp backend")))?;
                info!(storage = %storage_endpoint, bigquery = %bigquery_endpoint, "Using Cloud Storage and BigQuery");
                let store = Arc::new(gcs_store::GcsObjectStore::new(storage_endpoint, token.clone())?);
                let warehouse = Arc::new(bigquery::BigQueryWarehouse::new(
                    bigquery_endpoint,
                    &config.warehouse.project_id,
                    token,
                )?);
                Ok(Self { store, warehouse })
            }
        }
    }

    /// Bind each configured table to the CSV object its deploy target writes
    pub fn external_tables(config: &Config, store: Arc<dyn ObjectStorePort>) -> Arc<dyn WarehousePort> {
        let mut warehouse = external_table::ExternalTableWarehouse::new(store);
        for environment in [Environment::Staging, Environment::Production] {
            let target = config.target(environment);
            warehouse = warehouse.bind(&target.table.table, target.location);
        }
        Arc::new(warehouse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_table_is_extracted_from_quoted_and_bare_sql() {
        let quoted = probed_table("select * from `shopping-store-415510.store_data.shopper_table` limit 1;").unwrap();
        assert_eq!(quoted.project_id, "shopping-store-415510");
        assert_eq!(quoted.database, "store_data");
        assert_eq!(quoted.table, "shopper_table");

        let bare = probed_table("SELECT * FROM p.d.t;").unwrap();
        assert_eq!(bare.to_string(), "p.d.t");

        assert!(probed_table("select 1").is_none());
    }

    #[test]
    fn local_backend_builds_from_default_config() {
        let config = Config::from_toml_str(crate::config::tests::SAMPLE).unwrap();
        assert!(Backends::from_config(&config).is_ok());
    }
}
