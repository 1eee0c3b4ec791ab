use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::{
    model::{CityName, DEFAULT_CITIES, DEFAULT_NAMESPACE},
    provider::openweather::DEFAULT_BASE_URL,
    schedule::StepPolicy,
};

pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";
pub const BUCKET_NAME_ENV: &str = "AWS_BUCKET_NAME";

/// Recurring trigger and per-step retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_minutes: u64,
    pub retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            retries: 1,
            retry_delay_secs: 300,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn step_policy(&self) -> StepPolicy {
        StepPolicy {
            retries: self.retries,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

/// Top-level configuration, stored on disk as TOML.
///
/// Example TOML:
/// ```toml
/// bucket_name = "my-weather-dashboard"
/// namespace = "weather-data"
///
/// [schedule]
/// interval_minutes = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub bucket_name: Option<String>,
    pub namespace: String,
    pub base_url: String,
    pub http_timeout_secs: u64,
    pub schedule: ScheduleConfig,

    /// Fixed city list; never read from or written to the file.
    #[serde(skip, default = "default_cities")]
    pub cities: Vec<CityName>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn default_cities() -> Vec<CityName> {
    DEFAULT_CITIES.iter().map(|c| c.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            bucket_name: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http_timeout_secs: 30,
            schedule: ScheduleConfig::default(),
            cities: default_cities(),
        }
    }
}

/// Everything a run needs, with the required values resolved.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub api_key: String,
    pub bucket_name: String,
    pub namespace: String,
    pub base_url: String,
    pub http_timeout: Duration,
    pub cities: Vec<CityName>,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load config from `path` (or the platform default), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        let mut cfg = Self::load_file(&path)?;
        cfg.apply_env(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Read the TOML file alone, or return defaults if it doesn't exist yet.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Environment wins over the file; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(bucket) = non_empty(BUCKET_NAME_ENV) {
            self.bucket_name = Some(bucket);
        }
    }

    /// Save config to `path` (or the platform default), creating parent directories as needed.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-dashboard", "weather-dashboard")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Blank values count as missing.
    pub fn api_key(&self) -> Result<&str> {
        non_blank(self.api_key.as_deref()).ok_or_else(|| {
            anyhow!(
                "No OpenWeather API key configured.\n\
                 Hint: set {API_KEY_ENV} or run `weather-dashboard configure`."
            )
        })
    }

    /// Blank values count as missing.
    pub fn bucket_name(&self) -> Result<&str> {
        non_blank(self.bucket_name.as_deref()).ok_or_else(|| {
            anyhow!(
                "No storage bucket configured.\n\
                 Hint: set {BUCKET_NAME_ENV} or run `weather-dashboard configure`."
            )
        })
    }

    /// Resolve the values every stage needs; fails if a required one is missing.
    pub fn validate(&self) -> Result<PipelineSettings> {
        let api_key = self.api_key()?.to_string();
        let bucket_name = self.bucket_name()?.to_string();

        if self.cities.is_empty() {
            return Err(anyhow!("City list is empty"));
        }

        Ok(PipelineSettings {
            api_key,
            bucket_name,
            namespace: self.namespace.clone(),
            base_url: self.base_url.clone(),
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            cities: self.cities.clone(),
            schedule: self.schedule.clone(),
        })
    }
}
