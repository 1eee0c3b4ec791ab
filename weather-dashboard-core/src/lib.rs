//! Core library for the `weather-dashboard` pipeline.
//!
//! This crate defines:
//! - Configuration (TOML file plus environment overrides)
//! - The weather provider and object store abstractions
//! - The three stages: ensure bucket, fetch, persist
//! - Step retries and the recurring scheduler
//!
//! It is used by `weather-dashboard-cli`, but the stages can be driven from any async runtime.

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod schedule;
pub mod stage;
pub mod storage;

pub use config::{Config, PipelineSettings, ScheduleConfig};
pub use error::{FetchError, PipelineError};
pub use model::{
    CaptureTimestamp, CityName, ObservationSummary, StorageObjectKey, WeatherBatch,
    WeatherObservation,
};
pub use pipeline::{Pipeline, RunReport};
pub use provider::{OpenWeatherProvider, WeatherProvider};
pub use schedule::{Scheduler, StepPolicy};
pub use stage::{BucketStatus, StorageInitializer, WeatherFetcher, WeatherPersister};
pub use storage::{ObjectStore, S3ObjectStore, StorageError};
