use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

pub mod s3;

pub use s3::S3ObjectStore;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A failed call against the object store.
#[derive(Debug, Error)]
#[error("{operation} failed: {message}")]
pub struct StorageError {
    pub operation: &'static str,
    pub message: String,
}

impl StorageError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Minimal bucket/object surface the pipeline writes through.
#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    /// Succeeds only when the bucket is known to exist and is reachable.
    async fn bucket_exists(&self, bucket: &str) -> Result<(), StorageError>;

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Put-by-key: writing an existing key replaces the object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;
}
