use std::sync::Arc;

use tracing::{info, warn};

use crate::{error::PipelineError, storage::ObjectStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    Existing,
    Created,
}

/// Makes sure the target bucket exists before anything is written.
#[derive(Debug, Clone)]
pub struct StorageInitializer {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl StorageInitializer {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Any failed existence check counts as "absent": a permission or network
    /// error on HEAD still leads to one create attempt.
    pub async fn ensure_bucket(&self) -> Result<BucketStatus, PipelineError> {
        match self.store.bucket_exists(&self.bucket).await {
            Ok(()) => {
                info!(bucket = %self.bucket, "Bucket exists");
                Ok(BucketStatus::Existing)
            }
            Err(e) => {
                warn!(bucket = %self.bucket, error = %e, "Bucket check failed, creating bucket");

                self.store
                    .create_bucket(&self.bucket)
                    .await
                    .map_err(|source| PipelineError::BucketCreate {
                        bucket: self.bucket.clone(),
                        source,
                    })?;

                info!(bucket = %self.bucket, "Successfully created bucket");
                Ok(BucketStatus::Created)
            }
        }
    }
}
