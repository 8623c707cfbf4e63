//! Transformation job
//!
//! Turns raw partitions into processed ones: removed columns dropped, early
//! rows filtered, gaps filled with the column median and calendar features
//! appended.

use std::f64::consts::PI;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};

use crate::{
    columns::{DATE_COLUMN, REMOVED},
    extract::next_start,
    lake::{DataStage, Manifest, parse_date},
    table::{Table, parse_cell},
    traits::{Clock, DataStore},
    validate::validate_processed,
};

/// Rows dated before this year are discarded.
pub const MIN_YEAR: i32 = 2018;

/// Clean `table` and append the derived calendar features.
pub fn process_table(table: &Table) -> Result<Table> {
    let table = table.drop_columns(REMOVED);

    let date_idx = table
        .column_index(DATE_COLUMN)
        .context("Raw table has no date column")?;
    for (i, row) in table.rows().iter().enumerate() {
        parse_date(&row[date_idx]).with_context(|| format!("Bad date in row {}", i))?;
    }
    let mut table = table.filter_rows(|row| {
        parse_date(&row[date_idx])
            .map(|d| d.year() >= MIN_YEAR)
            .unwrap_or(false)
    });

    let numeric: Vec<String> = table
        .headers()
        .iter()
        .filter(|h| h.as_str() != DATE_COLUMN)
        .cloned()
        .collect();
    for name in &numeric {
        fill_with_median(&mut table, name)?;
    }

    let dates = table
        .column_values(DATE_COLUMN)?
        .into_iter()
        .map(parse_date)
        .collect::<Result<Vec<NaiveDate>>>()?;
    append_calendar_features(&mut table, &dates)?;

    Ok(table)
}

fn fill_with_median(table: &mut Table, name: &str) -> Result<()> {
    let values = table
        .column_values(name)?
        .into_iter()
        .enumerate()
        .map(|(row, cell)| {
            parse_cell(cell)
                .map_err(|v| anyhow::anyhow!("Column '{}' row {} is not numeric: '{}'", name, row, v))
        })
        .collect::<Result<Vec<Option<f64>>>>()?;

    if values.iter().all(Option::is_some) {
        return Ok(());
    }
    let Some(median) = median(values.iter().flatten().copied()) else {
        tracing::debug!("Column {} has no values, leaving gaps", name);
        return Ok(());
    };

    let filled = values
        .into_iter()
        .zip(table.column_values(name)?)
        .map(|(value, cell)| match value {
            Some(_) => cell.to_string(),
            None => median.to_string(),
        })
        .collect();
    table.set_column(name, filled)?;
    Ok(())
}

/// Median of the values, averaging the middle pair for even counts.
pub fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn append_calendar_features(table: &mut Table, dates: &[NaiveDate]) -> Result<()> {
    let month = |d: &NaiveDate| cyclical_encode(f64::from(d.month()), 12.0);
    let year = |d: &NaiveDate| cyclical_encode(f64::from(d.ordinal()), 365.25);

    table.push_column("year", render(dates, |d| d.year().to_string()))?;
    table.push_column("month", render(dates, |d| d.month().to_string()))?;
    table.push_column("day_of_month", render(dates, |d| d.day().to_string()))?;
    table.push_column(
        "day_of_week",
        render(dates, |d| d.weekday().num_days_from_monday().to_string()),
    )?;
    table.push_column("day_of_year", render(dates, |d| d.ordinal().to_string()))?;
    table.push_column("month_sin", render(dates, |d| month(d).0.to_string()))?;
    table.push_column("month_cos", render(dates, |d| month(d).1.to_string()))?;
    table.push_column("year_sin", render(dates, |d| year(d).0.to_string()))?;
    table.push_column("year_cos", render(dates, |d| year(d).1.to_string()))?;
    Ok(())
}

/// Cyclical encoding for periodic features
fn cyclical_encode(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

fn render(dates: &[NaiveDate], f: impl Fn(&NaiveDate) -> String) -> Vec<String> {
    dates.iter().map(f).collect()
}

/// Summary of a completed transformation run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSummary {
    pub rows_processed: usize,
    pub partitions_written: usize,
    /// New processed manifest date, `None` when already up to date
    pub last_updated_date: Option<NaiveDate>,
}

pub struct TransformJob<'a> {
    store: &'a dyn DataStore,
    clock: &'a dyn Clock,
    default_start: NaiveDate,
}

impl<'a> TransformJob<'a> {
    pub fn new(store: &'a dyn DataStore, clock: &'a dyn Clock, default_start: NaiveDate) -> Self {
        Self {
            store,
            clock,
            default_start,
        }
    }

    pub fn run(&self) -> Result<TransformSummary> {
        let raw = self
            .store
            .load_manifest(DataStage::Raw)?
            .context("Raw manifest not found, run extract first")?;

        let processed = self.store.load_manifest(DataStage::Processed)?;
        if processed.is_some_and(|p| p.last_updated_date >= raw.last_updated_date) {
            tracing::info!(
                "Processed data is up to date through {}",
                raw.last_updated_date
            );
            return Ok(TransformSummary {
                rows_processed: 0,
                partitions_written: 0,
                last_updated_date: None,
            });
        }

        let start = next_start(self.store, DataStage::Processed, self.default_start)?;
        let today = self.clock.today();
        tracing::info!("Processing raw data from {} to {}...", start, today);

        let raw_table = self.store.load_range(DataStage::Raw, start, today)?;
        let processed_table = process_table(&raw_table)?;
        let partitions_written = self
            .store
            .save_partitioned(DataStage::Processed, &processed_table)?;

        let errors = validate_processed(self.store, start, raw.last_updated_date)?;
        if !errors.is_empty() {
            anyhow::bail!("Processed data validation failed: {}", errors.join("; "));
        }

        self.store
            .save_manifest(DataStage::Processed, &Manifest::new(raw.last_updated_date))?;

        tracing::info!(
            "Processed {} rows into {} partitions, processed data complete through {}",
            processed_table.len(),
            partitions_written,
            raw.last_updated_date
        );

        Ok(TransformSummary {
            rows_processed: processed_table.len(),
            partitions_written,
            last_updated_date: Some(raw.last_updated_date),
        })
    }
}
