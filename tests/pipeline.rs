//! End-to-end tests over a filesystem lake.
//!
//! Raw partitions are written to a temporary directory, transformed, and
//! then checked for drift against a prediction log.

use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use tempfile::tempdir;
use weather_monitor::{
    DataStage, DataStore, DriftCheck, DriftConfig, LocalLake, Manifest, MockClock, MockNotifier,
    Notifier, NtfyNotifier, Table, TransformJob, check_files,
    columns::DERIVED,
    config::{MonitorConfig, NetworkConfig},
    monitor::{ALERT_TITLE, NO_DRIFT_MESSAGE},
    notify_on_drift,
    validate::raw_columns,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, header, method, path},
};

const MONITORED: [&str; 2] = ["temperature_2m_max", "rain_sum"];

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Raw rows with every requested variable for each day of `[start, end]`,
/// with a gap in `rain_sum` on the 10th.
fn raw_table(start: NaiveDate, end: NaiveDate) -> Table {
    let columns = raw_columns();
    let rows = start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|d| {
            columns
                .iter()
                .map(|c| match *c {
                    "date" => d.to_string(),
                    "sunrise" | "sunset" => format!("{}T07:30", d),
                    "temperature_2m_max" => (10.0 + f64::from(d.day() % 7)).to_string(),
                    "rain_sum" if d.day() == 10 => String::new(),
                    "rain_sum" => format!("{:.1}", f64::from(d.day() % 3)),
                    _ => "1.0".to_string(),
                })
                .collect()
        })
        .collect();
    Table::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
}

fn clock_on(y: i32, m: u32, d: u32) -> MockClock {
    MockClock::new(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
}

fn seed_raw(lake: &LocalLake, start: NaiveDate, end: NaiveDate) {
    lake.save_partitioned(DataStage::Raw, &raw_table(start, end))
        .unwrap();
    lake.save_manifest(DataStage::Raw, &Manifest::new(end))
        .unwrap();
}

fn monitor_config() -> MonitorConfig {
    MonitorConfig {
        current_window_rows: 14,
        reference_window_months: 24,
        predictions_key: "logs/daily_predictions.csv".to_string(),
    }
}

fn columns() -> Vec<String> {
    MONITORED.iter().map(|s| s.to_string()).collect()
}

fn write_csv(path: &Path, text: &str) {
    fs::write(path, text).unwrap();
}

#[test]
fn test_transform_writes_processed_partitions() {
    let dir = tempdir().unwrap();
    let lake = LocalLake::new(dir.path());
    seed_raw(&lake, date(2023, 11, 1), date(2024, 1, 31));

    let clock = clock_on(2024, 2, 15);
    let summary = TransformJob::new(&lake, &clock, date(2023, 11, 1))
        .run()
        .unwrap();
    assert_eq!(summary.rows_processed, 30 + 31 + 31);
    assert_eq!(summary.partitions_written, 3);

    let january = lake
        .load_table("data/processed/year=2024/month=1/data.csv")
        .unwrap()
        .expect("processed partition on disk");
    assert!(january.column_index("sunrise").is_none());
    for derived in DERIVED {
        assert!(january.column_index(derived).is_some(), "missing {}", derived);
    }
    // the gap on the 10th is filled
    assert!(january.column_values("rain_sum").unwrap().iter().all(|c| !c.is_empty()));

    let manifest = fs::read_to_string(dir.path().join("data/processed/manifest.json")).unwrap();
    assert!(manifest.contains("2024-01-31"));
}

#[test]
fn test_transform_rejects_gap_in_raw_history() {
    let dir = tempdir().unwrap();
    let lake = LocalLake::new(dir.path());
    seed_raw(&lake, date(2023, 12, 1), date(2024, 1, 31));

    // November was never extracted
    let result = TransformJob::new(&lake, &clock_on(2024, 2, 15), date(2023, 11, 1)).run();
    assert!(result.is_err());
    assert!(!dir.path().join("data/processed/manifest.json").exists());
}

#[test]
fn test_transform_is_incremental() {
    let dir = tempdir().unwrap();
    let lake = LocalLake::new(dir.path());
    seed_raw(&lake, date(2023, 12, 1), date(2023, 12, 31));

    let clock = clock_on(2024, 1, 5);
    let job = TransformJob::new(&lake, &clock, date(2023, 12, 1));
    job.run().unwrap();
    clock.advance(chrono::Duration::days(1));
    assert_eq!(job.run().unwrap().rows_processed, 0);

    seed_raw(&lake, date(2024, 1, 1), date(2024, 1, 31));
    clock.set_time(Utc.with_ymd_and_hms(2024, 2, 5, 12, 0, 0).unwrap());
    let second = job.run().unwrap();
    assert_eq!(second.rows_processed, 31);
    assert_eq!(second.partitions_written, 1);
}

#[test]
fn test_drift_check_without_drift() {
    let dir = tempdir().unwrap();
    let lake = LocalLake::new(dir.path());
    seed_raw(&lake, date(2023, 1, 1), date(2023, 12, 31));
    TransformJob::new(&lake, &clock_on(2024, 1, 10), date(2023, 1, 1))
        .run()
        .unwrap();

    // Recent predictions drawn from the same pattern
    let recent = raw_table(date(2024, 1, 1), date(2024, 1, 20)).drop_columns(&["sunrise", "sunset"]);
    let rain = recent.column_index("rain_sum").unwrap();
    let recent = recent.filter_rows(|row| !row[rain].is_empty());
    lake.save_table(&monitor_config().predictions_key, &recent)
        .unwrap();

    let outcome = DriftCheck::new(&lake, DriftConfig::default(), monitor_config(), columns())
        .run()
        .unwrap();

    assert!(!outcome.drift_detected, "{}", outcome.message);
    assert_eq!(outcome.message, NO_DRIFT_MESSAGE);
    assert_eq!(outcome.report.features.len(), 2);
}

#[test]
fn test_drift_check_detects_shift_and_notifies() {
    let dir = tempdir().unwrap();
    let lake = LocalLake::new(dir.path());
    seed_raw(&lake, date(2023, 1, 1), date(2023, 12, 31));
    TransformJob::new(&lake, &clock_on(2024, 1, 10), date(2023, 1, 1))
        .run()
        .unwrap();

    let mut log = String::from("date,temperature_2m_max,rain_sum\n");
    for day in 1..=20 {
        log.push_str(&format!("2024-01-{:02},{},\n", day, 40 + day));
    }
    let predictions = Table::read_csv(log.as_bytes()).unwrap();
    lake.save_table(&monitor_config().predictions_key, &predictions)
        .unwrap();

    let outcome = DriftCheck::new(&lake, DriftConfig::default(), monitor_config(), columns())
        .run()
        .unwrap();
    assert!(outcome.drift_detected);

    let temp = outcome.report.feature("temperature_2m_max").unwrap();
    assert_eq!(temp.statistic, Some(1.0));
    assert!(temp.distribution_flag);

    let rain = outcome.report.feature("rain_sum").unwrap();
    assert!(rain.missing_flag);
    assert_eq!(rain.statistic, None);

    let notifier = MockNotifier::new();
    assert!(notify_on_drift(&outcome, &notifier).unwrap());
    let sent = notifier.get_notifications();
    assert_eq!(sent[0].0, ALERT_TITLE);
    assert!(sent[0].1.contains("Feature 'temperature_2m_max'"));
    assert!(sent[0].1.contains("Feature 'rain_sum'"));
}

#[test]
fn test_drift_check_requires_processed_data() {
    let dir = tempdir().unwrap();
    let lake = LocalLake::new(dir.path());

    let result = DriftCheck::new(&lake, DriftConfig::default(), monitor_config(), columns()).run();
    assert!(result.is_err());
}

#[test]
fn test_check_files() {
    let dir = tempdir().unwrap();
    let reference = dir.path().join("reference.csv");
    let current = dir.path().join("current.csv");
    write_csv(&reference, "a,b\n1,1\n2,2\n3,3\n4,4\n5,5\n");
    write_csv(&current, "a,b\n1,\n2,\n3,\n4,4\n5,5\n");

    let outcome = check_files(&reference, &current, &["a", "b"], &DriftConfig::default()).unwrap();
    assert!(outcome.drift_detected);
    assert!(!outcome.report.feature("a").unwrap().drift);
    assert!(outcome.report.feature("b").unwrap().missing_flag);
}

#[test]
fn test_check_files_unknown_column() {
    let dir = tempdir().unwrap();
    let reference = dir.path().join("reference.csv");
    write_csv(&reference, "a\n1\n");

    let result = check_files(&reference, &reference, &["z"], &DriftConfig::default());
    assert!(result.is_err());
}

/// The ntfy notifier posts the alert body with a title header.
#[tokio::test(flavor = "multi_thread")]
async fn test_ntfy_notifier_posts_alert() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/weather-drift"))
        .and(header("Title", ALERT_TITLE))
        .and(body_string("drift body"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let notifier = NtfyNotifier::new(&uri, "weather-drift", &NetworkConfig::default())?;
        notifier.notify(ALERT_TITLE, "drift body")
    })
    .await
    .unwrap();

    assert!(result.is_ok(), "{:?}", result.err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ntfy_notifier_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let uri = mock_server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let notifier = NtfyNotifier::new(&uri, "weather-drift", &NetworkConfig::default())?;
        notifier.notify(ALERT_TITLE, "drift body")
    })
    .await
    .unwrap();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("403"));
}
