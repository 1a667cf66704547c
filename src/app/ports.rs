use async_trait::async_trait;

use crate::error::Result;

/// Bucket-addressed object storage.
///
/// Keys are bucket-relative; nested keys use `/` separators.
#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
    /// Every object key currently in the bucket
    async fn list(&self, bucket: &str) -> Result<Vec<String>>;
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;
    /// Move `from` onto `to` within one bucket, replacing whatever `to` held
    async fn promote(&self, bucket: &str, from: &str, to: &str) -> Result<()>;
}

/// Query access to the analytical warehouse
#[async_trait]
pub trait WarehousePort: Send + Sync {
    /// Run `sql` and report whether it produced at least one row
    async fn query_has_rows(&self, sql: &str) -> Result<bool>;
}
