//! Data drift detection between a reference window and a current window.
//!
//! Every shared column is checked twice:
//! - missingness: the absolute change in the fraction of missing values
//! - distribution: a two-sample Kolmogorov-Smirnov test on the present values
//!
//! Per-column results are then aggregated into a single verdict.

pub mod alert;
pub mod ks;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::{Column, Dataset};

pub use alert::{ALERT_HEADER, compose_alert};
pub use ks::{ks_pvalue, ks_statistic};

/// Thresholds controlling when a feature, and the whole run, counts as drifted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Significance level for the KS test.
    pub alpha: f64,
    /// Largest tolerated change in missing rate.
    pub missing_threshold: f64,
    /// Fraction of drifted features needed for an overall verdict.
    /// `0.0` means any drifted feature is enough.
    pub require_fraction: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            missing_threshold: 0.10,
            require_fraction: 0.0,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriftError {
    #[error("reference and current columns differ: reference {reference:?}, current {current:?}")]
    ColumnMismatch {
        reference: Vec<String>,
        current: Vec<String>,
    },
}

/// Drift findings for one feature column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureDrift {
    pub column: String,
    /// KS distance, `None` when either side has no present values.
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub missing_delta: f64,
    pub missing_flag: bool,
    pub distribution_flag: bool,
    pub drift: bool,
}

/// Outcome of one detection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub drifted: bool,
    pub drifted_count: usize,
    /// One entry per column, in input column order.
    pub features: Vec<FeatureDrift>,
}

impl DriftReport {
    pub fn feature(&self, column: &str) -> Option<&FeatureDrift> {
        self.features.iter().find(|f| f.column == column)
    }

    pub fn drifted_features(&self) -> impl Iterator<Item = &FeatureDrift> {
        self.features.iter().filter(|f| f.drift)
    }

    pub fn drift_fraction(&self) -> f64 {
        self.drifted_count as f64 / self.features.len().max(1) as f64
    }

    /// Human-readable alert listing every drifted feature.
    pub fn alert(&self) -> String {
        compose_alert(&self.features)
    }
}

/// Evaluate missingness and distribution drift for a single column pair.
pub fn evaluate_feature(reference: &Column, current: &Column, config: &DriftConfig) -> FeatureDrift {
    let missing_delta = (reference.missing_rate() - current.missing_rate()).abs();
    let missing_flag = missing_delta > config.missing_threshold;

    let ref_values = reference.present();
    let cur_values = current.present();

    let (statistic, p_value) = match ks_statistic(&ref_values, &cur_values) {
        Some(d) => (Some(d), ks_pvalue(d, ref_values.len(), cur_values.len())),
        None => (None, None),
    };
    let distribution_flag = p_value.is_some_and(|p| p < config.alpha);

    FeatureDrift {
        column: reference.name().to_string(),
        statistic,
        p_value,
        missing_delta,
        missing_flag,
        distribution_flag,
        drift: missing_flag || distribution_flag,
    }
}

/// Compare `current` against `reference`, column by column.
///
/// Both datasets must have the same column names in the same order.
pub fn detect(
    reference: &Dataset,
    current: &Dataset,
    config: &DriftConfig,
) -> Result<DriftReport, DriftError> {
    let ref_names = reference.column_names();
    let cur_names = current.column_names();
    if ref_names != cur_names {
        return Err(DriftError::ColumnMismatch {
            reference: ref_names.into_iter().map(String::from).collect(),
            current: cur_names.into_iter().map(String::from).collect(),
        });
    }

    let features: Vec<FeatureDrift> = reference
        .columns()
        .iter()
        .zip(current.columns())
        .map(|(r, c)| evaluate_feature(r, c, config))
        .collect();

    let mut report = DriftReport {
        drifted: false,
        drifted_count: 0,
        features,
    };

    for feature in report.drifted_features() {
        tracing::debug!(
            column = %feature.column,
            statistic = ?feature.statistic,
            p_value = ?feature.p_value,
            missing_delta = feature.missing_delta,
            "Feature drifted"
        );
    }
    report.drifted_count = report.drifted_features().count();

    // A zero fraction is not "at least 0% drifted", which would always hold.
    report.drifted = if config.require_fraction > 0.0 {
        report.drift_fraction() >= config.require_fraction
    } else {
        report.drifted_count > 0
    };

    tracing::info!(
        "Drift check: {}/{} features drifted, overall drift = {}",
        report.drifted_count,
        report.features.len(),
        report.drifted
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(columns: Vec<Column>) -> Dataset {
        Dataset::new(columns).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = DriftConfig::default();
        assert_eq!(config.alpha, 0.01);
        assert_eq!(config.missing_threshold, 0.10);
        assert_eq!(config.require_fraction, 0.0);
    }

    #[test]
    fn test_identical_columns_do_not_drift() {
        let column = Column::from_values("temp", [1.0, 2.0, 3.0, 4.0, 5.0]);
        let result = evaluate_feature(&column, &column, &DriftConfig::default());

        assert_eq!(result.statistic, Some(0.0));
        assert_eq!(result.p_value, Some(1.0));
        assert_eq!(result.missing_delta, 0.0);
        assert!(!result.missing_flag);
        assert!(!result.distribution_flag);
        assert!(!result.drift);
    }

    #[test]
    fn test_missingness_flag() {
        let reference = Column::from_values("rain", (0..10).map(f64::from));
        let current = Column::new(
            "rain",
            (0..10).map(|i| if i < 2 { None } else { Some(f64::from(i)) }),
        );

        let result = evaluate_feature(&reference, &current, &DriftConfig::default());
        assert!((result.missing_delta - 0.2).abs() < 1e-12);
        assert!(result.missing_flag);
        assert!(result.drift);
    }

    #[test]
    fn test_missing_delta_at_threshold_does_not_flag() {
        let reference = Column::from_values("rain", [1.0, 2.0, 3.0, 4.0]);
        let current = Column::new("rain", [Some(1.0), Some(2.0), Some(3.0), None]);

        let config = DriftConfig {
            missing_threshold: 0.25,
            ..DriftConfig::default()
        };
        let result = evaluate_feature(&reference, &current, &config);
        assert_eq!(result.missing_delta, 0.25);
        assert!(!result.missing_flag);
    }

    #[test]
    fn test_all_missing_column_has_undefined_statistic() {
        let reference = Column::from_values("snow", [1.0, 2.0]);
        let current = Column::new("snow", [None, None]);

        let result = evaluate_feature(&reference, &current, &DriftConfig::default());
        assert_eq!(result.statistic, None);
        assert_eq!(result.p_value, None);
        assert!(!result.distribution_flag);
        assert_eq!(result.missing_delta, 1.0);
        assert!(result.missing_flag);
        assert!(result.drift);
    }

    #[test]
    fn test_detect_rejects_mismatched_columns() {
        let reference = dataset(vec![
            Column::from_values("a", [1.0]),
            Column::from_values("b", [1.0]),
        ]);
        let current = dataset(vec![
            Column::from_values("b", [1.0]),
            Column::from_values("a", [1.0]),
        ]);

        let err = detect(&reference, &current, &DriftConfig::default()).unwrap_err();
        assert_eq!(
            err,
            DriftError::ColumnMismatch {
                reference: vec!["a".to_string(), "b".to_string()],
                current: vec!["b".to_string(), "a".to_string()],
            }
        );
    }

    #[test]
    fn test_detect_empty_datasets() {
        let report = detect(
            &Dataset::default(),
            &Dataset::default(),
            &DriftConfig::default(),
        )
        .unwrap();
        assert!(!report.drifted);
        assert_eq!(report.drifted_count, 0);
        assert!(report.features.is_empty());
        assert_eq!(report.drift_fraction(), 0.0);
    }

    #[test]
    fn test_require_fraction_branches() {
        let stable = Column::from_values("stable", [1.0, 2.0, 3.0]);
        let reference = dataset(vec![
            Column::from_values("gone", [1.0, 2.0, 3.0]),
            stable.clone(),
        ]);
        let current = dataset(vec![Column::new("gone", [None, None, None]), stable]);

        let any = detect(&reference, &current, &DriftConfig::default()).unwrap();
        assert!(any.drifted);
        assert_eq!(any.drifted_count, 1);
        assert_eq!(any.drift_fraction(), 0.5);

        let half = DriftConfig {
            require_fraction: 0.5,
            ..DriftConfig::default()
        };
        assert!(detect(&reference, &current, &half).unwrap().drifted);

        let all = DriftConfig {
            require_fraction: 1.0,
            ..DriftConfig::default()
        };
        assert!(!detect(&reference, &current, &all).unwrap().drifted);
    }

    #[test]
    fn test_report_preserves_column_order() {
        let reference = dataset(vec![
            Column::from_values("z", [1.0]),
            Column::from_values("a", [1.0]),
            Column::from_values("m", [1.0]),
        ]);
        let report = detect(&reference, &reference, &DriftConfig::default()).unwrap();
        let order: Vec<&str> = report.features.iter().map(|f| f.column.as_str()).collect();
        assert_eq!(order, vec!["z", "a", "m"]);
        assert!(report.feature("a").is_some());
        assert!(report.feature("b").is_none());
    }

    #[test]
    fn test_report_serializes_undefined_as_null() {
        let reference = dataset(vec![Column::new("x", [None])]);
        let report = detect(&reference, &reference, &DriftConfig::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["features"][0]["statistic"].is_null());
        assert!(json["features"][0]["p_value"].is_null());
        assert_eq!(json["drifted"], false);
    }
}
