use std::sync::Arc;

use tracing::info;

use crate::{
    error::PipelineError,
    model::{CaptureTimestamp, StorageObjectKey, WeatherBatch},
    storage::{JSON_CONTENT_TYPE, ObjectStore},
};

/// Writes one JSON object per city, all sharing one capture timestamp.
#[derive(Debug, Clone)]
pub struct WeatherPersister {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    namespace: String,
}

impl WeatherPersister {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            namespace: namespace.into(),
        }
    }

    pub async fn persist(
        &self,
        batch: &WeatherBatch,
    ) -> Result<Vec<StorageObjectKey>, PipelineError> {
        self.persist_at(batch, CaptureTimestamp::now()).await
    }

    /// Stops at the first failed write; cities after it are not attempted.
    pub async fn persist_at(
        &self,
        batch: &WeatherBatch,
        captured_at: CaptureTimestamp,
    ) -> Result<Vec<StorageObjectKey>, PipelineError> {
        if batch.is_empty() {
            return Err(PipelineError::NoWeatherData);
        }

        let mut written = Vec::with_capacity(batch.len());

        for (city, observation) in batch.iter() {
            let key = StorageObjectKey::new(&self.namespace, city, &captured_at);

            let body = serde_json::to_vec(&observation.stamped(&captured_at)).map_err(|source| {
                PipelineError::Serialize {
                    city: city.to_string(),
                    source,
                }
            })?;

            self.store
                .put_object(&self.bucket, key.as_str(), body, JSON_CONTENT_TYPE)
                .await
                .map_err(|source| PipelineError::PersistWrite {
                    city: city.to_string(),
                    key: key.to_string(),
                    source,
                })?;

            info!(%city, key = %key, "Saved weather data");
            written.push(key);
        }

        Ok(written)
    }
}
