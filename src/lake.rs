//! Month-partitioned data lake on the local filesystem.
//!
//! Layout, relative to the lake root:
//! - `data/<stage>/year=<Y>/month=<M>/data.csv`
//! - `data/<stage>/manifest.json`, recording the last date written to the stage

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::columns::DATE_COLUMN;
use crate::table::Table;
use crate::traits::DataStore;

/// Area of the lake a table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataStage {
    /// Observations as returned by the weather API
    Raw,
    /// Cleaned observations with derived features
    Processed,
}

impl DataStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataStage::Raw => "raw",
            DataStage::Processed => "processed",
        }
    }
}

impl fmt::Display for DataStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress marker stored next to each stage's partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub last_updated_date: NaiveDate,
}

impl Manifest {
    pub fn new(last_updated_date: NaiveDate) -> Self {
        Self { last_updated_date }
    }
}

pub fn partition_key(stage: DataStage, year: i32, month: u32) -> String {
    format!("data/{}/year={}/month={}/data.csv", stage, year, month)
}

pub fn manifest_key(stage: DataStage) -> String {
    format!("data/{}/manifest.json", stage)
}

/// Group rows by the year and month of their `date` cell.
pub fn split_by_month(table: &Table) -> Result<BTreeMap<(i32, u32), Table>> {
    let dates = table
        .column_values(DATE_COLUMN)
        .context("Table has no date column to partition by")?
        .into_iter()
        .map(parse_date)
        .collect::<Result<Vec<_>>>()?;

    let mut groups: BTreeMap<(i32, u32), Vec<Vec<String>>> = BTreeMap::new();
    for (date, row) in dates.into_iter().zip(table.rows()) {
        groups
            .entry((date.year(), date.month()))
            .or_default()
            .push(row.clone());
    }

    groups
        .into_iter()
        .map(|(month, rows)| Ok::<_, anyhow::Error>((month, Table::new(table.headers().to_vec(), rows)?)))
        .collect()
}

/// Parse a `date` cell. Accepts `YYYY-MM-DD` with an optional time suffix.
pub fn parse_date(cell: &str) -> Result<NaiveDate> {
    let trimmed = cell.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'", cell))
}

/// Filesystem-backed [`DataStore`].
#[derive(Debug, Clone)]
pub struct LocalLake {
    root: PathBuf,
}

impl LocalLake {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse JSON in {}", path.display()))?;
        Ok(Some(value))
    }

    pub fn save_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.path(key);
        ensure_parent(&path)?;
        let bytes = serde_json::to_vec_pretty(value).context("Failed to serialize JSON")?;
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!("Saved JSON to {}", key);
        Ok(())
    }
}

impl DataStore for LocalLake {
    fn load_table(&self, key: &str) -> Result<Option<Table>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let table = Table::from_path(&path)
            .with_context(|| format!("Failed to load table {}", path.display()))?;
        Ok(Some(table))
    }

    fn save_table(&self, key: &str, table: &Table) -> Result<()> {
        let path = self.path(key);
        ensure_parent(&path)?;
        let file = fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        table
            .write_csv(file)
            .with_context(|| format!("Failed to write table {}", path.display()))?;
        tracing::debug!("Saved {} rows to {}", table.len(), key);
        Ok(())
    }

    fn load_manifest(&self, stage: DataStage) -> Result<Option<Manifest>> {
        self.load_json(&manifest_key(stage))
    }

    fn save_manifest(&self, stage: DataStage, manifest: &Manifest) -> Result<()> {
        self.save_json(&manifest_key(stage), manifest)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}
