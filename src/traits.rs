//! Abstractions for time, side effects and storage to enable testing.
//!
//! This module provides traits for:
//! - `Clock`: Abstracting time access for deterministic testing
//! - `Notifier`: Abstracting alert delivery for testing
//! - `DataStore`: Abstracting the data lake the pipeline reads and writes

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::config::NetworkConfig;
use crate::dates::month_partitions;
use crate::lake::{DataStage, Manifest, partition_key, split_by_month};
use crate::table::Table;

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
///
/// This allows injecting mock clocks during testing to create
/// deterministic, reproducible tests for date-dependent logic.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Get the current time in the local timezone.
    fn now_local(&self) -> DateTime<Local>;

    /// Today's date in the local timezone.
    fn today(&self) -> NaiveDate {
        self.now_local().date_naive()
    }
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Mock clock for testing with controllable time.
#[derive(Debug, Clone)]
pub struct MockClock {
    utc_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            utc_time: Arc::new(Mutex::new(time)),
        }
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.utc_time.lock().unwrap() = time;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut time = self.utc_time.lock().unwrap();
        *time += duration;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc_time.lock().unwrap()
    }

    fn now_local(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }

    /// The UTC date, so tests do not depend on the host timezone.
    fn today(&self) -> NaiveDate {
        self.now_utc().date_naive()
    }
}

// ==================== Notifier Trait ====================

/// Trait for abstracting alert delivery.
///
/// This allows testing alerting logic without actually
/// sending notifications.
pub trait Notifier: Send + Sync {
    /// Send a notification with the given title and body.
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Notifier that publishes to an ntfy topic over HTTP.
#[derive(Debug, Clone)]
pub struct NtfyNotifier {
    client: reqwest::blocking::Client,
    url: String,
}

impl NtfyNotifier {
    /// Create a notifier posting to `<base_url>/<topic>`.
    ///
    /// Uses the blocking client, so it must not be called from inside an
    /// async runtime.
    pub fn new(base_url: &str, topic: &str, network_config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: format!("{}/{}", base_url.trim_end_matches('/'), topic),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for NtfyNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header("Title", title)
            .body(body.to_string())
            .send()
            .context("Failed to send notification to ntfy")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("ntfy returned error status: {}", status);
        }

        Ok(())
    }
}

/// Mock notifier for testing that records all notifications.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    notifications: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockNotifier {
    /// Create a new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all notifications that have been sent.
    pub fn get_notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    /// Check if any notification was sent.
    pub fn was_called(&self) -> bool {
        !self.notifications.lock().unwrap().is_empty()
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

// ==================== DataStore Trait ====================

/// Trait for the data lake holding tables and per-stage manifests.
pub trait DataStore: Send + Sync {
    /// Load the table stored under `key`, or `None` if there is none.
    fn load_table(&self, key: &str) -> Result<Option<Table>>;

    /// Store `table` under `key`, replacing any previous table.
    fn save_table(&self, key: &str, table: &Table) -> Result<()>;

    fn load_manifest(&self, stage: DataStage) -> Result<Option<Manifest>>;

    fn save_manifest(&self, stage: DataStage, manifest: &Manifest) -> Result<()>;

    /// Concatenate every month partition of `stage` overlapping `[start, end]`.
    ///
    /// Absent months are skipped; finding none at all is an error.
    fn load_range(&self, stage: DataStage, start: NaiveDate, end: NaiveDate) -> Result<Table> {
        let mut combined = Table::default();
        let mut loaded = 0;

        for (year, month) in month_partitions(start, end) {
            let key = partition_key(stage, year, month);
            match self.load_table(&key)? {
                Some(table) => {
                    combined
                        .append(table)
                        .with_context(|| format!("Partition {} has unexpected columns", key))?;
                    loaded += 1;
                }
                None => tracing::warn!("Partition {} not found, skipping", key),
            }
        }

        if loaded == 0 {
            anyhow::bail!("No {} partitions found between {} and {}", stage, start, end);
        }

        tracing::info!(
            "Combined {} dataset: {} rows from {} partitions",
            stage,
            combined.len(),
            loaded
        );
        Ok(combined)
    }

    /// Write `table` as one partition per month. Returns the partition count.
    fn save_partitioned(&self, stage: DataStage, table: &Table) -> Result<usize> {
        let partitions = split_by_month(table)?;
        for ((year, month), partition) in &partitions {
            self.save_table(&partition_key(stage, *year, *month), partition)?;
        }
        Ok(partitions.len())
    }
}

/// In-memory data store for testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<HashMap<String, Table>>>,
    manifests: Arc<Mutex<HashMap<DataStage, Manifest>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of all stored tables, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.tables.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl DataStore for MemoryStore {
    fn load_table(&self, key: &str) -> Result<Option<Table>> {
        Ok(self.tables.lock().unwrap().get(key).cloned())
    }

    fn save_table(&self, key: &str, table: &Table) -> Result<()> {
        self.tables
            .lock()
            .unwrap()
            .insert(key.to_string(), table.clone());
        Ok(())
    }

    fn load_manifest(&self, stage: DataStage) -> Result<Option<Manifest>> {
        Ok(self.manifests.lock().unwrap().get(&stage).copied())
    }

    fn save_manifest(&self, stage: DataStage, manifest: &Manifest) -> Result<()> {
        self.manifests.lock().unwrap().insert(stage, *manifest);
        Ok(())
    }
}
