use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
}

/// The object-storage capability, parallel to [`crate::Database`]. Any
/// operation a backend cannot represent returns the distinct unsupported
/// error, never a success with empty data.
#[async_trait(?Send)]
pub trait StorageProvider: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn create_bucket(&self, bucket: &str) -> Result<(), Error>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, Error>;

    /// `size` must equal `bytes.len()`; a mismatch is an encoding error. The
    /// payload is fully buffered; size limits belong to callers.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        size: u64,
        content_type: Option<&str>,
    ) -> Result<(), Error>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, Error>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, Error>;

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>)
        -> Result<Vec<ObjectInfo>, Error>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error>;

    async fn delete_bucket(&self, bucket: &str) -> Result<(), Error> {
        let _ = bucket;
        Err(Error::unsupported("delete_bucket", self.backend_name()))
    }

    async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_secs: u64,
    ) -> Result<String, Error> {
        let _ = (bucket, key, expires_secs);
        Err(Error::unsupported("presigned_url", self.backend_name()))
    }
}

/// Shared guard for `put_object`'s redundant size parameter.
pub fn check_put_size(bytes: &[u8], size: u64) -> Result<(), Error> {
    if bytes.len() as u64 != size {
        return Err(Error::encoding(format!(
            "declared object size {size} does not match payload length {}",
            bytes.len()
        )));
    }
    Ok(())
}
