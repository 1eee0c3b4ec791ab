use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::FetchError, model::WeatherObservation};

pub mod openweather;

pub use openweather::OpenWeatherProvider;

/// Source of current conditions for a single city.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, city: &str) -> Result<WeatherObservation, FetchError>;
}

