use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::app::ports::{ObjectStorePort, WarehousePort};
use crate::error::{IngestError, Result};
use crate::infra::probed_table;

/// Every call made against an [`InMemoryObjectStore`], in order
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Get { bucket: String, key: String },
    Put { bucket: String, key: String },
    List { bucket: String },
    Delete { bucket: String, key: String },
    Promote { bucket: String, from: String, to: String },
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory object store for development/testing
#[derive(Default)]
pub struct InMemoryObjectStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
    operations: Mutex<Vec<StoreOp>>,
    failing_puts: Mutex<HashSet<String>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) {
        locked(&self.buckets)
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), bytes.into());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        locked(&self.buckets).get(bucket).and_then(|b| b.get(key).cloned())
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        locked(&self.buckets)
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn operations(&self) -> Vec<StoreOp> {
        locked(&self.operations).clone()
    }

    /// Make every later `put` into `bucket` fail
    pub fn fail_puts_to(&self, bucket: &str) {
        locked(&self.failing_puts).insert(bucket.to_string());
    }

    fn record(&self, op: StoreOp) {
        debug!(?op, "In-memory store call");
        locked(&self.operations).push(op);
    }

    fn not_found(bucket: &str, key: &str) -> IngestError {
        IngestError::ObjectNotFound {
            bucket: bucket.to_string(),
            name: key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorePort for InMemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.record(StoreOp::Get {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        self.object(bucket, key).ok_or_else(|| Self::not_found(bucket, key))
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        self.record(StoreOp::Put {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        if locked(&self.failing_puts).contains(bucket) {
            return Err(IngestError::Storage {
                message: format!("upload to {bucket} rejected"),
            });
        }
        self.insert(bucket, key, bytes);
        Ok(())
    }

    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        self.record(StoreOp::List {
            bucket: bucket.to_string(),
        });
        Ok(self.keys(bucket))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.record(StoreOp::Delete {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        locked(&self.buckets)
            .get_mut(bucket)
            .and_then(|b| b.remove(key))
            .map(|_| ())
            .ok_or_else(|| Self::not_found(bucket, key))
    }

    async fn promote(&self, bucket: &str, from: &str, to: &str) -> Result<()> {
        self.record(StoreOp::Promote {
            bucket: bucket.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
        let mut buckets = locked(&self.buckets);
        let objects = buckets.get_mut(bucket).ok_or_else(|| Self::not_found(bucket, from))?;
        let bytes = objects.remove(from).ok_or_else(|| Self::not_found(bucket, from))?;
        objects.insert(to.to_string(), bytes);
        Ok(())
    }
}

/// Warehouse with canned answers per table name; unknown tables error out
#[derive(Default)]
pub struct StaticWarehouse {
    answers: HashMap<String, std::result::Result<bool, String>>,
    queried: Mutex<Vec<String>>,
}

impl StaticWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: &str, answer: std::result::Result<bool, String>) -> Self {
        self.answers.insert(table.to_string(), answer);
        self
    }

    /// Table names probed so far, in order
    pub fn queried_tables(&self) -> Vec<String> {
        locked(&self.queried).clone()
    }
}

#[async_trait]
impl WarehousePort for StaticWarehouse {
    async fn query_has_rows(&self, sql: &str) -> Result<bool> {
        let table = probed_table(sql).ok_or_else(|| IngestError::Query {
            message: format!("Syntax error: {sql}"),
        })?;
        locked(&self.queried).push(table.table.clone());
        match self.answers.get(&table.table) {
            Some(Ok(has_rows)) => Ok(*has_rows),
            Some(Err(message)) => Err(IngestError::Query {
                message: message.clone(),
            }),
            None => Err(IngestError::Query {
                message: format!("Not found: Table {table}"),
            }),
        }
    }
}
