use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::{FetchError, PipelineError},
    model::{CityName, WeatherBatch},
    provider::WeatherProvider,
};

/// Pulls current conditions for every configured city, one request at a time.
#[derive(Debug, Clone)]
pub struct WeatherFetcher {
    provider: Arc<dyn WeatherProvider>,
    cities: Vec<CityName>,
}

impl WeatherFetcher {
    pub fn new(provider: Arc<dyn WeatherProvider>, cities: Vec<CityName>) -> Self {
        Self { provider, cities }
    }

    /// Network errors, non-success statuses and undecodable bodies are logged and
    /// the city is left out, so every city failing yields an empty batch.
    /// A success response without the expected fields fails the whole fetch.
    pub async fn fetch(&self) -> Result<WeatherBatch, PipelineError> {
        let mut batch = WeatherBatch::new();

        for city in &self.cities {
            let observation = match self.provider.current(city).await {
                Ok(obs) => obs,
                Err(FetchError::Malformed(source)) => {
                    return Err(PipelineError::MalformedResponse {
                        city: city.clone(),
                        source,
                    });
                }
                Err(e) => {
                    warn!(%city, error = %e, "Error fetching weather data");
                    continue;
                }
            };

            let summary = observation
                .summary()
                .map_err(|source| PipelineError::MalformedResponse {
                    city: city.clone(),
                    source,
                })?;

            info!(
                %city,
                temperature_f = summary.temperature_f,
                feels_like_f = summary.feels_like_f,
                humidity_pct = summary.humidity_pct,
                conditions = %summary.condition,
                "Weather for {city}"
            );

            batch.insert(city.clone(), observation);
        }

        info!(
            fetched = batch.len(),
            requested = self.cities.len(),
            "Weather fetch finished"
        );
        Ok(batch)
    }
}
