use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use weather_dashboard_core::{
    Config, OpenWeatherProvider, Pipeline, S3ObjectStore, Scheduler, WeatherProvider,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-dashboard", version, about = "Hourly city weather snapshots to S3")]
pub struct Cli {
    /// Path to the config file; defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pipeline once: ensure bucket, fetch, persist.
    Run,

    /// Run the pipeline on its schedule until Ctrl-C.
    Schedule,

    /// Fetch and print current weather for one city without storing it.
    Show {
        /// City name as understood by OpenWeather.
        city: String,
    },

    /// Interactively store the API key and bucket name in the config file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = self.config.as_deref();

        match self.command {
            Command::Run => {
                let pipeline = build_pipeline(&Config::load(config_path)?).await?;
                let report = pipeline.run_once().await?;

                for key in &report.written {
                    println!("{key}");
                }
            }
            Command::Schedule => {
                let cfg = Config::load(config_path)?;
                let interval = cfg.schedule.interval();
                let scheduler = Scheduler::new(build_pipeline(&cfg).await?, interval);

                tracing::info!(?interval, "Scheduler started");
                scheduler
                    .run_until(async {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                        }
                    })
                    .await;
            }
            Command::Show { city } => {
                let cfg = Config::load(config_path)?;
                let provider = OpenWeatherProvider::new(
                    cfg.api_key()?.to_string(),
                    cfg.base_url.clone(),
                    std::time::Duration::from_secs(cfg.http_timeout_secs),
                )?;

                let observation = provider
                    .current(&city)
                    .await
                    .with_context(|| format!("Error fetching weather data for {city}"))?;
                let summary = observation.summary()?;

                println!("Weather for {city}:");
                println!("{summary}");
            }
            Command::Configure => configure(config_path)?,
        }

        Ok(())
    }
}

async fn build_pipeline(cfg: &Config) -> anyhow::Result<Pipeline> {
    let settings = cfg.validate()?;
    let store = S3ObjectStore::from_env().await;
    let pipeline = Pipeline::with_store(&settings, Arc::new(store))?;
    Ok(pipeline)
}

fn configure(path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let mut cfg = match path {
        Some(p) => Config::load_file(p)?,
        None => Config::load_file(&Config::config_file_path()?)?,
    };

    // blank answers keep whatever the file already had
    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;

    let mut bucket = Text::new("S3 bucket name:");
    if let Some(current) = cfg.bucket_name.as_deref() {
        bucket = bucket.with_default(current);
    }
    let bucket = bucket.prompt()?;

    if let Some(key) = non_blank(&api_key) {
        cfg.api_key = Some(key);
    }
    if let Some(bucket) = non_blank(&bucket) {
        cfg.bucket_name = Some(bucket);
    }

    let written = cfg.save(path)?;
    println!("Configuration saved to {}", written.display());

    Ok(())
}

fn non_blank(input: &str) -> Option<String> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
