//! Stage validation
//!
//! Checks the partitions a job just wrote before its manifest is advanced:
//! the column set, leftover gaps in processed data and one row per day over
//! the validated span. Each function returns the list of problems found;
//! an empty list means the stage is accepted.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::{
    columns::{DATE_COLUMN, DERIVED, FEATURES, REMOVED},
    dates::month_partitions,
    lake::{DataStage, partition_key, parse_date},
    table::{Table, parse_cell},
    traits::DataStore,
    transform::MIN_YEAR,
};

/// Reported missing dates are capped at this many examples.
const SHOWN_MISSING_DATES: usize = 3;

/// `date` followed by every requested variable.
pub fn raw_columns() -> Vec<&'static str> {
    let mut columns = vec![DATE_COLUMN];
    columns.extend_from_slice(FEATURES);
    columns
}

/// `date`, the kept variables, then the derived calendar features.
pub fn processed_columns() -> Vec<&'static str> {
    let mut columns = vec![DATE_COLUMN];
    columns.extend(FEATURES.iter().copied().filter(|f| !REMOVED.contains(f)));
    columns.extend_from_slice(DERIVED);
    columns
}

/// Validate raw partitions covering `[start, end]`.
pub fn validate_raw(store: &dyn DataStore, start: NaiveDate, end: NaiveDate) -> Result<Vec<String>> {
    let table = load_span(store, DataStage::Raw, start, end)?;

    let mut errors = Vec::new();
    check_missing_columns(&table, &raw_columns(), &mut errors);
    check_dates(&table, start, end, &mut errors)?;
    Ok(errors)
}

/// Validate processed partitions covering `[start, end]`.
///
/// Days before [`MIN_YEAR`] are never processed and are not expected.
pub fn validate_processed(
    store: &dyn DataStore,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<String>> {
    let floor = NaiveDate::from_ymd_opt(MIN_YEAR, 1, 1).context("Invalid minimum year")?;
    let start = start.max(floor);
    if start > end {
        tracing::info!("No processed data to validate before {}", end);
        return Ok(Vec::new());
    }
    let table = load_span(store, DataStage::Processed, start, end)?;

    let expected = processed_columns();
    let mut errors = Vec::new();
    check_missing_columns(&table, &expected, &mut errors);

    let extra: Vec<&str> = table
        .headers()
        .iter()
        .map(String::as_str)
        .filter(|h| !expected.contains(h))
        .collect();
    if !extra.is_empty() {
        errors.push(format!("Found unexpected columns: {:?}", extra));
    }

    let with_gaps: Vec<&str> = table
        .headers()
        .iter()
        .map(String::as_str)
        .filter(|h| expected.contains(h))
        .filter(|h| {
            table
                .column_values(h)
                .map(|cells| cells.iter().any(|c| matches!(parse_cell(c), Ok(None))))
                .unwrap_or(false)
        })
        .collect();
    if !with_gaps.is_empty() {
        errors.push(format!("Null values found in columns: {:?}", with_gaps));
    }

    check_dates(&table, start, end, &mut errors)?;
    Ok(errors)
}

/// Rows of every partition of `stage` touching `[start, end]`, restricted to that span.
///
/// Unlike [`DataStore::load_range`], an absent partition is an error here.
fn load_span(store: &dyn DataStore, stage: DataStage, start: NaiveDate, end: NaiveDate) -> Result<Table> {
    let mut combined = Table::default();
    for (year, month) in month_partitions(start, end) {
        let key = partition_key(stage, year, month);
        let partition = store
            .load_table(&key)?
            .with_context(|| format!("Required partition {} not found", key))?;
        combined
            .append(partition)
            .with_context(|| format!("Partition {} has unexpected columns", key))?;
    }

    let date_idx = combined
        .column_index(DATE_COLUMN)
        .context("Partitions have no date column")?;
    let in_span = combined.filter_rows(|row| {
        parse_date(&row[date_idx]).is_ok_and(|d| d >= start && d <= end)
    });
    if in_span.is_empty() {
        anyhow::bail!("No {} data found between {} and {}", stage, start, end);
    }

    tracing::info!(
        "Validating {} {} rows from {} to {}",
        in_span.len(),
        stage,
        start,
        end
    );
    Ok(in_span)
}

fn check_missing_columns(table: &Table, expected: &[&str], errors: &mut Vec<String>) {
    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|c| table.column_index(c).is_none())
        .collect();
    if !missing.is_empty() {
        errors.push(format!("Missing expected columns: {:?}", missing));
    }
}

fn check_dates(table: &Table, start: NaiveDate, end: NaiveDate, errors: &mut Vec<String>) -> Result<()> {
    let present = table
        .column_values(DATE_COLUMN)?
        .into_iter()
        .map(parse_date)
        .collect::<Result<BTreeSet<NaiveDate>>>()?;

    let missing: Vec<NaiveDate> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !present.contains(d))
        .collect();
    if !missing.is_empty() {
        let shown: Vec<String> = missing
            .iter()
            .take(SHOWN_MISSING_DATES)
            .map(|d| d.to_string())
            .collect();
        errors.push(format!(
            "Missing data for {} dates. First {} missing: {:?}",
            missing.len(),
            shown.len(),
            shown
        ));
    }
    Ok(())
}
