//! Text tables read from and written to CSV.
//!
//! A [`Table`] is the raw tabular form exchanged with the data lake and the
//! weather API. It may carry non-numeric columns such as `date`; numeric
//! projections are produced with [`Table::to_dataset`].

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::dataset::{Column, Dataset, DatasetError};

/// Tokens treated as a missing value when coercing cells to numbers.
const MISSING_TOKENS: [&str; 6] = ["", "nan", "NaN", "NA", "null", "None"];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("header mismatch: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),
    #[error("column '{0}' not found")]
    MissingColumn(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TableError> {
        let expected = headers.len();
        if let Some((row, found)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != expected)
            .map(|(i, r)| (i, r.len()))
        {
            return Err(TableError::RowWidth {
                row,
                expected,
                found,
            });
        }
        Ok(Self { headers, rows })
    }

    pub fn read_csv<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(String::from).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(String::from).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;

        Self::new(headers, rows)
    }

    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let file = File::open(path)?;
        Self::read_csv(file)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), TableError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cells of column `name`, top to bottom.
    pub fn column_values(&self, name: &str) -> Result<Vec<&str>, TableError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Append the rows of `other`. A header-less table adopts `other`'s headers.
    pub fn append(&mut self, other: Table) -> Result<(), TableError> {
        if self.headers.is_empty() && self.rows.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.headers != other.headers {
            return Err(TableError::HeaderMismatch {
                expected: self.headers.clone(),
                found: other.headers,
            });
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Keep only the last `n` rows.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.rows.len().saturating_sub(n);
        Self {
            headers: self.headers.clone(),
            rows: self.rows[start..].to_vec(),
        }
    }

    pub fn filter_rows(&self, mut keep: impl FnMut(&[String]) -> bool) -> Self {
        Self {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| keep(r.as_slice()))
                .cloned()
                .collect(),
        }
    }

    /// Remove every column listed in `names`; unknown names are ignored.
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let keep: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !names.iter().any(|n| n.as_ref() == h.as_str()))
            .map(|(i, _)| i)
            .collect();

        Self {
            headers: keep.iter().map(|&i| self.headers[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| keep.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        }
    }

    pub fn push_column(&mut self, name: &str, values: Vec<String>) -> Result<(), TableError> {
        if self.column_index(name).is_some() {
            return Err(TableError::DuplicateColumn(name.to_string()));
        }
        if values.len() != self.rows.len() {
            return Err(TableError::RowWidth {
                row: values.len().min(self.rows.len()),
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        self.headers.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Replace the cells of an existing column.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<(), TableError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        if values.len() != self.rows.len() {
            return Err(TableError::RowWidth {
                row: values.len().min(self.rows.len()),
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
        Ok(())
    }

    /// Coerce the named columns to numbers, in the order given.
    pub fn to_dataset<S: AsRef<str>>(&self, names: &[S]) -> Result<Dataset, DatasetError> {
        let columns = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let idx = self
                    .column_index(name)
                    .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))?;
                let values = self
                    .rows
                    .iter()
                    .enumerate()
                    .map(|(row, cells)| {
                        parse_cell(&cells[idx]).map_err(|value| DatasetError::NonNumeric {
                            column: name.to_string(),
                            row,
                            value,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Column::new(name, values))
            })
            .collect::<Result<Vec<_>, DatasetError>>()?;

        Dataset::new(columns)
    }
}

/// Parse one cell. `Ok(None)` for a missing value, `Err` carries the raw text.
pub fn parse_cell(cell: &str) -> Result<Option<f64>, String> {
    let trimmed = cell.trim();
    if MISSING_TOKENS.contains(&trimmed) {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_nan() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(_) => Err(cell.to_string()),
    }
}
