use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use weather_monitor::{
    DataStore, DriftCheck, DriftOutcome, ExtractJob, LocalLake, NtfyNotifier,
    OpenMeteoClient, SystemClock, TransformJob, check_files, columns::DRIFT_COLUMNS,
    config::AppConfig, notify_on_drift,
};

#[derive(Parser, Debug)]
#[command(name = "weather-monitor")]
#[command(about = "Weather data pipeline with data-drift monitoring")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch complete months missing from the raw stage
    Extract,
    /// Rebuild processed partitions from new raw data
    Transform,
    /// Run the drift check and print the outcome as JSON
    Drift {
        /// Reference CSV; compares files instead of the lake windows
        #[arg(long, requires = "current")]
        reference: Option<PathBuf>,
        /// Current CSV
        #[arg(long, requires = "reference")]
        current: Option<PathBuf>,
        /// Columns to monitor (defaults to the standard weather features)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("weather_monitor=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let lake = LocalLake::new(&config.lake.root);

    match args.command {
        Command::Extract => run_extract(&config, &lake),
        Command::Transform => {
            TransformJob::new(&lake, &SystemClock, config.weather.default_start_date).run()?;
            Ok(())
        }
        Command::Drift {
            reference,
            current,
            columns,
        } => {
            let columns = if columns.is_empty() {
                DRIFT_COLUMNS.iter().map(|c| c.to_string()).collect()
            } else {
                columns
            };

            let outcome = match (reference, current) {
                (Some(reference), Some(current)) => {
                    check_files(&reference, &current, &columns, &config.drift)?
                }
                _ => DriftCheck::new(&lake, config.drift, config.monitor.clone(), columns).run()?,
            };

            send_alert(&config, &outcome)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?
            );
            Ok(())
        }
    }
}

fn run_extract(config: &AppConfig, store: &dyn DataStore) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let api = OpenMeteoClient::new(config.weather.clone(), &config.network)?;
    tracing::info!("API client initialized for {}", config.weather.api_url);

    rt.block_on(async {
        ExtractJob::new(store, &api, &SystemClock, config.weather.default_start_date)
            .run()
            .await
    })?;
    Ok(())
}

fn send_alert(config: &AppConfig, outcome: &DriftOutcome) -> Result<()> {
    let notifications = &config.notifications;
    if !notifications.enabled {
        return Ok(());
    }
    let Some(topic) = notifications.ntfy_topic.as_deref() else {
        tracing::warn!("Notifications enabled but no ntfy topic configured");
        return Ok(());
    };

    let notifier = NtfyNotifier::new(&notifications.ntfy_url, topic, &config.network)?;
    notify_on_drift(outcome, &notifier)?;
    Ok(())
}
