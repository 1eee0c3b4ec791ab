use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Name of a city as sent to the provider in the `q` parameter.
pub type CityName = String;

/// Cities captured on every run.
pub const DEFAULT_CITIES: &[&str] = &["Philadelphia", "Seattle", "New York"];

/// Prefix every stored object key starts with.
pub const DEFAULT_NAMESPACE: &str = "weather-data";

/// Field injected into each payload right before it is written.
pub const TIMESTAMP_FIELD: &str = "timestamp";

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Raw provider response for one city at one point in time.
///
/// The payload is kept as the provider sent it; only [`ObservationSummary`]
/// reads typed values out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    payload: Map<String, Value>,
}

impl WeatherObservation {
    /// Wrap a provider payload. Anything other than a JSON object is rejected.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let payload = Map::<String, Value>::deserialize(value)?;
        Ok(Self { payload })
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.payload)
    }

    /// Extract the fields printed after each fetch.
    pub fn summary(&self) -> Result<ObservationSummary, serde_json::Error> {
        let raw = OwSummary::deserialize(&Value::Object(self.payload.clone()))?;

        let condition = raw
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| {
                <serde_json::Error as serde::de::Error>::custom("`weather` array is empty")
            })?;

        Ok(ObservationSummary {
            temperature_f: raw.main.temp,
            feels_like_f: raw.main.feels_like,
            humidity_pct: raw.main.humidity,
            condition,
        })
    }

    /// Copy of the payload with `timestamp` set to the capture time.
    pub fn stamped(&self, captured_at: &CaptureTimestamp) -> Value {
        let mut payload = self.payload.clone();
        payload.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::String(captured_at.to_string()),
        );
        Value::Object(payload)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwSummary {
    main: OwMain,
    weather: Vec<OwWeather>,
}

/// Human-readable slice of an observation, in imperial units.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSummary {
    pub temperature_f: f64,
    pub feels_like_f: f64,
    pub humidity_pct: f64,
    pub condition: String,
}

impl fmt::Display for ObservationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Temperature: {}°F", self.temperature_f)?;
        writeln!(f, "Feels like: {}°F", self.feels_like_f)?;
        writeln!(f, "Humidity: {}%", self.humidity_pct)?;
        write!(f, "Conditions: {}", self.condition)
    }
}

/// Observations gathered during one run, keyed by city in fetch order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherBatch {
    entries: Vec<(CityName, WeatherObservation)>,
}

impl WeatherBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the observation for `city`. A replaced city keeps its position.
    pub fn insert(&mut self, city: impl Into<CityName>, observation: WeatherObservation) {
        let city = city.into();
        match self.entries.iter_mut().find(|(name, _)| *name == city) {
            Some(entry) => entry.1 = observation,
            None => self.entries.push((city, observation)),
        }
    }

    pub fn get(&self, city: &str) -> Option<&WeatherObservation> {
        self.entries
            .iter()
            .find(|(name, _)| name == city)
            .map(|(_, obs)| obs)
    }

    pub fn contains(&self, city: &str) -> bool {
        self.get(city).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cities(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WeatherObservation)> {
        self.entries.iter().map(|(name, obs)| (name.as_str(), obs))
    }
}

/// Point-in-time label shared by every object written in one persist step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CaptureTimestamp(DateTime<Utc>);

impl CaptureTimestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// Parse the `YYYYMMDD-HHMMSS` form back into a timestamp.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        let naive = chrono::NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)?;
        Ok(Self(naive.and_utc()))
    }
}

impl fmt::Display for CaptureTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

/// `<namespace>/<city>-<timestamp>.json`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageObjectKey(String);

impl StorageObjectKey {
    pub fn new(namespace: &str, city: &str, captured_at: &CaptureTimestamp) -> Self {
        Self(format!("{namespace}/{city}-{captured_at}.json"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
