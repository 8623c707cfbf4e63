//! Numeric datasets: ordered, equally sized columns of optional `f64` values.

use std::collections::HashSet;

use thiserror::Error;

/// Errors raised while building or projecting a [`Dataset`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DatasetError {
    #[error("column '{column}' has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("column '{0}' not found")]
    MissingColumn(String),
    #[error("column '{column}' row {row}: cannot convert '{value}' to a number")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
}

/// A named numeric series. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: Vec<Option<f64>>,
}

impl Column {
    /// Build a column from optional values. NaN is stored as missing.
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values: values
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()))
                .collect(),
        }
    }

    /// Build a column from plain values, treating NaN as missing.
    pub fn from_values(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Self::new(name, values.into_iter().map(Some))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Fraction of missing values. An empty column reports `0.0`.
    pub fn missing_rate(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.missing_count() as f64 / self.values.len() as f64
    }

    /// The non-missing values, in original order.
    pub fn present(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    fn tail(&self, n: usize) -> Self {
        let start = self.values.len().saturating_sub(n);
        Self {
            name: self.name.clone(),
            values: self.values[start..].to_vec(),
        }
    }
}

/// An ordered collection of equally sized, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Result<Self, DatasetError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(DatasetError::DuplicateColumn(column.name().to_string()));
            }
        }

        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(DatasetError::RaggedColumn {
                    column: bad.name().to_string(),
                    expected,
                    found: bad.len(),
                });
            }
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Project onto `names`, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, DatasetError> {
        let columns = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.column(name)
                    .cloned()
                    .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(columns)
    }

    /// Keep only the last `n` rows.
    pub fn tail(&self, n: usize) -> Self {
        Self {
            columns: self.columns.iter().map(|c| c.tail(n)).collect(),
        }
    }
}
