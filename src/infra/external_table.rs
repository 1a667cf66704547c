use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use csv::ReaderBuilder;
use tracing::debug;

use crate::app::ports::{ObjectStorePort, WarehousePort};
use crate::error::{IngestError, Result};
use crate::infra::probed_table;
use crate::types::ObjectLocation;

/// Local stand-in for warehouse external tables: each table name is bound to
/// the CSV object it reads, and a probe succeeds when that CSV has a data row.
pub struct ExternalTableWarehouse {
    store: Arc<dyn ObjectStorePort>,
    tables: HashMap<String, ObjectLocation>,
}

impl ExternalTableWarehouse {
    pub fn new(store: Arc<dyn ObjectStorePort>) -> Self {
        Self {
            store,
            tables: HashMap::new(),
        }
    }

    pub fn bind(mut self, table: &str, location: ObjectLocation) -> Self {
        self.tables.insert(table.to_string(), location);
        self
    }
}

#[async_trait]
impl WarehousePort for ExternalTableWarehouse {
    async fn query_has_rows(&self, sql: &str) -> Result<bool> {
        let table = probed_table(sql).ok_or_else(|| IngestError::Query {
            message: format!("unsupported query: {sql}"),
        })?;
        let location = self.tables.get(&table.table).ok_or_else(|| IngestError::Query {
            message: format!("Not found: Table {table}"),
        })?;

        let bytes = self.store.get(&location.bucket, &location.key).await.map_err(|e| IngestError::Query {
            message: format!("external table {table} source {location} unreadable: {e}"),
        })?;

        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(bytes.as_slice());
        let has_rows = match rdr.records().next() {
            Some(record) => {
                record?;
                true
            }
            None => false,
        };
        debug!(table = %table, has_rows, "Probed external table");
        Ok(has_rows)
    }
}
