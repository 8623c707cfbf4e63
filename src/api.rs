use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;

use crate::columns::{DATE_COLUMN, FEATURES};
use crate::config::{NetworkConfig, WeatherConfig};
use crate::lake::parse_date;
use crate::table::Table;

/// Daily forecast response from the Open-Meteo API.
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: Option<String>,
    pub daily: DailyBlock,
}

/// Column-oriented daily values: one array per requested variable.
#[derive(Debug, Deserialize)]
pub struct DailyBlock {
    pub time: Vec<String>,
    #[serde(flatten)]
    pub variables: HashMap<String, Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    reason: String,
}

impl ForecastResponse {
    /// Build a `date` + `variables` table, in the order of `variables`.
    ///
    /// Numbers are rendered as text and `null` as an empty cell.
    pub fn into_table<S: AsRef<str>>(mut self, variables: &[S]) -> Result<Table> {
        let n_days = self.daily.time.len();

        let mut columns = Vec::with_capacity(variables.len());
        for name in variables {
            let name = name.as_ref();
            let values = self
                .daily
                .variables
                .remove(name)
                .with_context(|| format!("Response is missing daily variable '{}'", name))?;
            if values.len() != n_days {
                anyhow::bail!(
                    "Daily variable '{}' has {} values for {} days",
                    name,
                    values.len(),
                    n_days
                );
            }
            columns.push(values);
        }

        let mut headers = vec![DATE_COLUMN.to_string()];
        headers.extend(variables.iter().map(|v| v.as_ref().to_string()));

        let rows = self
            .daily
            .time
            .iter()
            .enumerate()
            .map(|(i, day)| {
                let date = parse_date(day)?;
                let mut row = Vec::with_capacity(columns.len() + 1);
                row.push(date.format("%Y-%m-%d").to_string());
                row.extend(columns.iter().map(|c| render_cell(&c[i])));
                Ok::<_, anyhow::Error>(row)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Table::new(headers, rows)?)
    }
}

fn render_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// API client for fetching daily weather observations.
#[derive(Clone, Debug)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    weather: WeatherConfig,
}

impl OpenMeteoClient {
    /// Create a new API client with configurable timeouts.
    pub fn new(weather: WeatherConfig, network_config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, weather })
    }

    /// Request URL for the daily `FEATURES` between `start` and `end`, inclusive.
    pub fn daily_url(&self, start: NaiveDate, end: NaiveDate) -> Result<Url> {
        let params = [
            ("latitude", self.weather.latitude.to_string()),
            ("longitude", self.weather.longitude.to_string()),
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
            ("daily", FEATURES.join(",")),
            ("timezone", self.weather.timezone.clone()),
        ];
        Url::parse_with_params(&self.weather.api_url, &params)
            .with_context(|| format!("Invalid weather API URL '{}'", self.weather.api_url))
    }

    /// Fetch the daily observations between `start` and `end`, inclusive.
    pub async fn fetch_daily(&self, start: NaiveDate, end: NaiveDate) -> Result<ForecastResponse> {
        let url = self.daily_url(start, end)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request to weather API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ApiError>(&body) {
                Ok(err) => anyhow::bail!("API returned error status: {} ({})", status, err.reason),
                Err(_) => anyhow::bail!("API returned error status: {}", status),
            }
        }

        let data = response
            .json::<ForecastResponse>()
            .await
            .context("Failed to parse weather API response")?;

        Ok(data)
    }

    /// Fetch `[start, end]` as a raw-stage table.
    pub async fn fetch_table(&self, start: NaiveDate, end: NaiveDate) -> Result<Table> {
        let response = self.fetch_daily(start, end).await?;
        let table = response.into_table(FEATURES)?;
        tracing::debug!("Fetched {} days from {} to {}", table.len(), start, end);
        Ok(table)
    }
}
