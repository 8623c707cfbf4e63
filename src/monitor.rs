//! Scheduled drift check
//!
//! Compares recent processed history (the reference window) against the
//! latest rows of the prediction log (the current window) and reports the
//! outcome, optionally alerting through a [`Notifier`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    config::MonitorConfig,
    dataset::Dataset,
    drift::{self, DriftConfig, DriftReport},
    lake::DataStage,
    table::Table,
    traits::{DataStore, Notifier},
};

pub const NO_DRIFT_MESSAGE: &str = "No data drift detected.";
pub const ALERT_TITLE: &str = "Weather data drift detected";

/// Result of a drift check, as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct DriftOutcome {
    pub drift_detected: bool,
    pub message: String,
    /// Names of the drifted features, in column order
    pub drifted_features: Vec<String>,
    pub report: DriftReport,
}

impl From<DriftReport> for DriftOutcome {
    fn from(report: DriftReport) -> Self {
        let message = if report.drifted {
            report.alert()
        } else {
            NO_DRIFT_MESSAGE.to_string()
        };
        let drifted_features = report
            .drifted_features()
            .map(|f| f.column.clone())
            .collect();
        Self {
            drift_detected: report.drifted,
            message,
            drifted_features,
            report,
        }
    }
}

pub struct DriftCheck<'a> {
    store: &'a dyn DataStore,
    drift: DriftConfig,
    monitor: MonitorConfig,
    columns: Vec<String>,
}

impl<'a> DriftCheck<'a> {
    pub fn new(
        store: &'a dyn DataStore,
        drift: DriftConfig,
        monitor: MonitorConfig,
        columns: Vec<String>,
    ) -> Self {
        Self {
            store,
            drift,
            monitor,
            columns,
        }
    }

    /// Processed rows from the `reference_window_months` up to the processed
    /// manifest date.
    pub fn reference_window(&self) -> Result<Dataset> {
        let manifest = self
            .store
            .load_manifest(DataStage::Processed)?
            .context("Processed manifest not found, run transform first")?;
        let end = manifest.last_updated_date;
        let start = end
            .checked_sub_months(chrono::Months::new(self.monitor.reference_window_months))
            .context("Reference window start out of range")?;

        tracing::info!("Loading reference window {} to {}", start, end);
        let table = self.store.load_range(DataStage::Processed, start, end)?;
        Ok(table.to_dataset(&self.columns)?)
    }

    /// The most recent `current_window_rows` rows of the prediction log.
    pub fn current_window(&self) -> Result<Dataset> {
        let key = &self.monitor.predictions_key;
        let log = self
            .store
            .load_table(key)?
            .with_context(|| format!("Prediction log {} not found", key))?;

        let window = log.tail(self.monitor.current_window_rows);
        tracing::info!("Loaded {} current rows from {}", window.len(), key);
        Ok(window.to_dataset(&self.columns)?)
    }

    pub fn run(&self) -> Result<DriftOutcome> {
        let reference = self.reference_window()?;
        let current = self.current_window()?;
        tracing::info!(
            "Comparing {} reference rows with {} current rows over {} features",
            reference.n_rows(),
            current.n_rows(),
            reference.n_columns()
        );
        let report = drift::detect(&reference, &current, &self.drift)?;
        Ok(report.into())
    }
}

/// Compare two CSV files directly, projected onto `columns`.
pub fn check_files<S: AsRef<str>>(
    reference: &Path,
    current: &Path,
    columns: &[S],
    config: &DriftConfig,
) -> Result<DriftOutcome> {
    let load = |path: &Path| -> Result<Dataset> {
        let table = Table::from_path(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        table
            .to_dataset(columns)
            .with_context(|| format!("Unusable columns in {}", path.display()))
    };

    let report = drift::detect(&load(reference)?, &load(current)?, config)?;
    Ok(report.into())
}

/// Send the alert when drift was detected. Returns whether a notification went out.
pub fn notify_on_drift(outcome: &DriftOutcome, notifier: &dyn Notifier) -> Result<bool> {
    if !outcome.drift_detected {
        return Ok(false);
    }
    notifier
        .notify(ALERT_TITLE, &outcome.message)
        .context("Failed to send drift alert")?;
    tracing::info!("Drift alert sent");
    Ok(true)
}
