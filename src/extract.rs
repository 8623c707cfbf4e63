//! Extraction job
//!
//! Pulls every complete month not yet present in the raw stage from the
//! weather API, writes it as month partitions and advances the raw manifest.

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};

use crate::{
    api::OpenMeteoClient,
    dates::valid_date_ranges,
    lake::{DataStage, Manifest},
    traits::{Clock, DataStore},
    validate::validate_raw,
};

/// Summary of a completed extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractSummary {
    pub ranges: Vec<(NaiveDate, NaiveDate)>,
    pub rows_fetched: usize,
    pub partitions_written: usize,
    /// New raw manifest date, `None` when nothing was pending
    pub last_updated_date: Option<NaiveDate>,
}

pub struct ExtractJob<'a> {
    store: &'a dyn DataStore,
    api: &'a OpenMeteoClient,
    clock: &'a dyn Clock,
    default_start: NaiveDate,
}

impl<'a> ExtractJob<'a> {
    pub fn new(
        store: &'a dyn DataStore,
        api: &'a OpenMeteoClient,
        clock: &'a dyn Clock,
        default_start: NaiveDate,
    ) -> Self {
        Self {
            store,
            api,
            clock,
            default_start,
        }
    }

    /// Ranges still missing from the raw stage, up to the clock's today.
    pub fn pending_ranges(&self) -> Result<Vec<(NaiveDate, NaiveDate)>> {
        let start = next_start(self.store, DataStage::Raw, self.default_start)?;
        Ok(valid_date_ranges(start, self.clock.today()))
    }

    pub async fn run(&self) -> Result<ExtractSummary> {
        let ranges = self.pending_ranges()?;
        let mut summary = ExtractSummary {
            ranges: ranges.clone(),
            rows_fetched: 0,
            partitions_written: 0,
            last_updated_date: None,
        };

        let (Some(&(first_start, _)), Some(&(_, last_end))) = (ranges.first(), ranges.last())
        else {
            tracing::info!("Raw data is up to date, nothing to extract");
            return Ok(summary);
        };

        for (start, end) in ranges {
            tracing::info!("Fetching data from {} to {}...", start, end);
            let table = self
                .api
                .fetch_table(start, end)
                .await
                .with_context(|| format!("Failed to fetch weather data for {} to {}", start, end))?;

            summary.rows_fetched += table.len();
            summary.partitions_written += self.store.save_partitioned(DataStage::Raw, &table)?;
        }

        let errors = validate_raw(self.store, first_start, last_end)?;
        if !errors.is_empty() {
            anyhow::bail!("Raw data validation failed: {}", errors.join("; "));
        }

        self.store
            .save_manifest(DataStage::Raw, &Manifest::new(last_end))?;
        summary.last_updated_date = Some(last_end);

        tracing::info!(
            "Extracted {} rows into {} partitions, raw data complete through {}",
            summary.rows_fetched,
            summary.partitions_written,
            last_end
        );
        Ok(summary)
    }
}

/// First date not yet covered by `stage`: the day after its manifest date,
/// or `default_start` when the stage has no manifest.
pub fn next_start(store: &dyn DataStore, stage: DataStage, default_start: NaiveDate) -> Result<NaiveDate> {
    match store.load_manifest(stage)? {
        Some(manifest) => manifest
            .last_updated_date
            .checked_add_days(Days::new(1))
            .context("Manifest date out of range"),
        None => Ok(default_start),
    }
}
