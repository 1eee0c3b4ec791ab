use std::sync::Arc;

use tracing::info;

use crate::{
    config::PipelineSettings,
    error::{FetchError, PipelineError},
    model::StorageObjectKey,
    provider::{OpenWeatherProvider, WeatherProvider},
    schedule::{StepPolicy, run_step},
    stage::{BucketStatus, StorageInitializer, WeatherFetcher, WeatherPersister},
    storage::ObjectStore,
};

/// Outcome of one successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub bucket: BucketStatus,
    pub fetched: usize,
    pub written: Vec<StorageObjectKey>,
}

/// ensure-storage → fetch → persist, with the batch handed over as a value.
#[derive(Debug, Clone)]
pub struct Pipeline {
    initializer: StorageInitializer,
    fetcher: WeatherFetcher,
    persister: WeatherPersister,
    policy: StepPolicy,
}

impl Pipeline {
    pub fn new(
        initializer: StorageInitializer,
        fetcher: WeatherFetcher,
        persister: WeatherPersister,
        policy: StepPolicy,
    ) -> Self {
        Self {
            initializer,
            fetcher,
            persister,
            policy,
        }
    }

    /// Wire all three stages from resolved settings and the given collaborators.
    pub fn from_parts(
        settings: &PipelineSettings,
        provider: Arc<dyn WeatherProvider>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self::new(
            StorageInitializer::new(store.clone(), settings.bucket_name.clone()),
            WeatherFetcher::new(provider, settings.cities.clone()),
            WeatherPersister::new(store, settings.bucket_name.clone(), settings.namespace.clone()),
            settings.schedule.step_policy(),
        )
    }

    /// Same as [`Pipeline::from_parts`] with the OpenWeather client built from settings.
    pub fn with_store(
        settings: &PipelineSettings,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, FetchError> {
        let provider = OpenWeatherProvider::new(
            settings.api_key.clone(),
            settings.base_url.clone(),
            settings.http_timeout,
        )?;

        Ok(Self::from_parts(settings, Arc::new(provider), store))
    }

    /// One full run. Each stage gets the step policy's retries; the first stage
    /// that still fails ends the run and later stages never start.
    pub async fn run_once(&self) -> Result<RunReport, PipelineError> {
        info!(bucket = %self.initializer.bucket(), "Pipeline run starting");

        let bucket = run_step("create_bucket", self.policy, || {
            self.initializer.ensure_bucket()
        })
        .await?;

        let batch = run_step("fetch_weather_data", self.policy, || {
            self.fetcher.fetch()
        })
        .await?;
        let fetched = batch.len();

        let written = run_step("save_to_storage", self.policy, || {
            self.persister.persist(&batch)
        })
        .await?;

        info!(fetched, written = written.len(), "Pipeline run finished");

        Ok(RunReport {
            bucket,
            fetched,
            written,
        })
    }
}
