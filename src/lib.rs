//! Weather Monitor Library
//!
//! Data-drift detection for a daily weather ETL pipeline, together with the
//! extract and transform jobs that maintain the month-partitioned data lake
//! the drift check reads from.

pub mod api;
pub mod columns;
pub mod config;
pub mod dataset;
pub mod dates;
pub mod drift;
pub mod extract;
pub mod lake;
pub mod monitor;
pub mod table;
pub mod traits;
pub mod transform;
pub mod validate;

// Re-export commonly used types
pub use api::{ForecastResponse, OpenMeteoClient};
pub use config::AppConfig;
pub use dataset::{Column, Dataset, DatasetError};
pub use drift::{
    DriftConfig, DriftError, DriftReport, FeatureDrift, compose_alert, detect, evaluate_feature,
    ks_pvalue, ks_statistic,
};
pub use extract::{ExtractJob, ExtractSummary};
pub use lake::{DataStage, LocalLake, Manifest};
pub use monitor::{DriftCheck, DriftOutcome, check_files, notify_on_drift};
pub use table::{Table, TableError};
pub use traits::{
    Clock, DataStore, MemoryStore, MockClock, MockNotifier, Notifier, NtfyNotifier, SystemClock,
};
pub use transform::{TransformJob, TransformSummary, process_table};
pub use validate::{validate_processed, validate_raw};
