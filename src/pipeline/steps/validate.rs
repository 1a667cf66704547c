use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::app::ports::WarehousePort;
use crate::types::TableRef;

/// Result of reading an external table back after an export
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Populated,
    Empty,
    Failed(String),
}

impl ValidationOutcome {
    /// Empty and failed probes both block promotion
    pub fn is_empty_or_error(&self) -> bool {
        !matches!(self, ValidationOutcome::Populated)
    }
}

pub fn probe_sql(table: &TableRef) -> String {
    format!("select * from `{table}` limit 1;")
}

/// Fail-closed read-back check against the warehouse
pub struct Validator {
    warehouse: Arc<dyn WarehousePort>,
}

impl Validator {
    pub fn new(warehouse: Arc<dyn WarehousePort>) -> Self {
        Self { warehouse }
    }

    #[instrument(skip(self), fields(table = %table))]
    pub async fn check(&self, table: &TableRef) -> ValidationOutcome {
        match self.warehouse.query_has_rows(&probe_sql(table)).await {
            Ok(true) => {
                info!("Table returned rows");
                ValidationOutcome::Populated
            }
            Ok(false) => {
                warn!("Table returned no rows");
                ValidationOutcome::Empty
            }
            Err(e) => {
                error!(error = %e, "An error occurred during query execution");
                ValidationOutcome::Failed(e.to_string())
            }
        }
    }
}
