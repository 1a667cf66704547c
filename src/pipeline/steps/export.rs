use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::app::ports::ObjectStorePort;
use crate::constants::STAGED_OBJECT_PREFIX;
use crate::domain::RowTable;
use crate::error::{IngestError, Result};
use crate::types::DeployTarget;

/// What one export wrote and what it removed
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportReport {
    pub location: String,
    pub rows: usize,
    pub bytes: usize,
    pub sha256: String,
    /// Keys deleted from the bucket to make room for the new object
    pub removed: Vec<String>,
}

/// Serialize the table as CSV: one header row, nulls as empty fields
pub fn to_csv(table: &RowTable) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    wtr.into_inner().map_err(|e| IngestError::Io(e.into_error()))
}

/// Replaces a bucket's contents with a single CSV object.
///
/// The new CSV is uploaded under a temporary key first, every other object is
/// removed, and the upload is then promoted onto the target key. The target
/// key is never deleted outright, so readers see either the old or the new file.
pub struct Exporter {
    store: Arc<dyn ObjectStorePort>,
}

impl Exporter {
    pub fn new(store: Arc<dyn ObjectStorePort>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, table, target), fields(env = %target.environment, location = %target.location))]
    pub async fn export(&self, table: &RowTable, target: &DeployTarget) -> Result<ExportReport> {
        let bytes = to_csv(table)?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let size = bytes.len();

        let bucket = target.bucket.as_str();
        let staged_key = format!("{}{}.csv", STAGED_OBJECT_PREFIX, Uuid::new_v4());
        self.store.put(bucket, &staged_key, bytes, "text/csv").await?;
        debug!(staged_key = %staged_key, bytes = size, "Uploaded staged object");

        match self.replace(bucket, &staged_key, &target.location.key).await {
            Ok(removed) => {
                info!(rows = table.len(), bytes = size, removed = removed.len(), "Exported CSV");
                Ok(ExportReport {
                    location: target.location.to_string(),
                    rows: table.len(),
                    bytes: size,
                    sha256,
                    removed,
                })
            }
            Err(e) => {
                if let Err(cleanup) = self.store.delete(bucket, &staged_key).await {
                    warn!(staged_key = %staged_key, error = %cleanup, "Failed to remove staged object");
                }
                Err(e)
            }
        }
    }

    async fn replace(&self, bucket: &str, staged_key: &str, target_key: &str) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for key in self.store.list(bucket).await? {
            if key == staged_key || key == target_key {
                continue;
            }
            self.store.delete(bucket, &key).await?;
            debug!(key = %key, "Removed object");
            removed.push(key);
        }
        self.store.promote(bucket, staged_key, target_key).await?;
        Ok(removed)
    }
}
