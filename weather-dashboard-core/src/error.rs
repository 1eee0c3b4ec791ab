use thiserror::Error;

use crate::storage::StorageError;

/// Failures that end a pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to create bucket '{bucket}': {source}")]
    BucketCreate {
        bucket: String,
        #[source]
        source: StorageError,
    },

    #[error("malformed weather response for {city}: {source}")]
    MalformedResponse {
        city: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no weather data available")]
    NoWeatherData,

    #[error("failed to serialize {city} observation: {source}")]
    Serialize {
        city: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to save {city} data to '{key}': {source}")]
    PersistWrite {
        city: String,
        key: String,
        #[source]
        source: StorageError,
    },
}

/// A failed provider call for one city.
///
/// `Request`, `Status` and `Decode` leave the city out of the batch;
/// `Malformed` means a success response had the wrong shape and fails the fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("response body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response body is not a JSON object: {0}")]
    Malformed(#[source] serde_json::Error),
}
