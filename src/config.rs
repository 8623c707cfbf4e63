use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::drift::DriftConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub lake: LakeConfig,
    pub weather: WeatherConfig,
    pub network: NetworkConfig,
    pub drift: DriftConfig,
    pub monitor: MonitorConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LakeConfig {
    /// Directory holding the `data/` tree
    pub root: PathBuf,
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("lake"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    pub api_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    /// First day fetched when the raw stage has no manifest yet.
    ///
    /// Inclusive: this day itself is extracted, whereas a manifest date is
    /// already covered and extraction resumes the day after it.
    pub default_start_date: NaiveDate,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_url: "https://historical-forecast-api.open-meteo.com/v1/forecast".to_string(),
            latitude: 43.7064,
            longitude: -79.3986,
            timezone: "America/New_York".to_string(),
            default_start_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Most recent prediction-log rows forming the current window
    pub current_window_rows: usize,
    /// Months of processed data before the manifest date forming the reference window
    pub reference_window_months: u32,
    /// Lake key of the prediction log
    pub predictions_key: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            current_window_rows: 14,
            reference_window_months: 24,
            predictions_key: "logs/daily_predictions.csv".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub ntfy_url: String,
    /// Ntfy topic receiving drift alerts (e.g., "weather-drift-alerts")
    pub ntfy_topic: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ntfy_url: "https://ntfy.sh".to_string(),
            ntfy_topic: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present - production uses env vars directly)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weather-monitor");

        let builder = Config::builder()
            // 1. Load default values
            // Lake
            .set_default("lake.root", "lake")?
            // Weather
            .set_default(
                "weather.api_url",
                "https://historical-forecast-api.open-meteo.com/v1/forecast",
            )?
            .set_default("weather.latitude", 43.7064)?
            .set_default("weather.longitude", -79.3986)?
            .set_default("weather.timezone", "America/New_York")?
            .set_default("weather.default_start_date", "2018-01-01")?
            // Network
            .set_default("network.request_timeout_secs", 30)?
            .set_default("network.connect_timeout_secs", 10)?
            // Drift thresholds used by the scheduled check
            .set_default("drift.alpha", 0.01)?
            .set_default("drift.missing_threshold", 0.10)?
            .set_default("drift.require_fraction", 0.35)?
            // Monitor windows
            .set_default("monitor.current_window_rows", 14)?
            .set_default("monitor.reference_window_months", 24)?
            .set_default("monitor.predictions_key", "logs/daily_predictions.csv")?
            // Notifications
            .set_default("notifications.enabled", false)?
            .set_default("notifications.ntfy_url", "https://ntfy.sh")?
            .set_default("notifications.ntfy_topic", None::<String>)?

            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))

            // 4. Load from Environment variables (WEATHER__DRIFT__ALPHA=...)
            .add_source(Environment::with_prefix("WEATHER").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Default Value Tests ====================

    #[test]
    fn test_lake_config_defaults() {
        let config = LakeConfig::default();
        assert_eq!(config.root, PathBuf::from("lake"));
    }

    #[test]
    fn test_weather_config_defaults() {
        let config = WeatherConfig::default();
        assert!(config.api_url.starts_with("https://"));
        assert_eq!(config.latitude, 43.7064);
        assert_eq!(config.longitude, -79.3986);
        assert_eq!(config.timezone, "America/New_York");
        assert_eq!(
            config.default_start_date,
            NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_network_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn test_monitor_config_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.current_window_rows, 14);
        assert_eq!(config.reference_window_months, 24);
        assert_eq!(config.predictions_key, "logs/daily_predictions.csv");
    }

    #[test]
    fn test_notification_config_defaults() {
        let config = NotificationConfig::default();
        assert!(!config.enabled);
        assert!(config.ntfy_topic.is_none());
    }

    // ==================== Config Loading Tests ====================

    #[test]
    fn test_config_load_with_defaults() {
        // Should succeed even without a config file (uses defaults)
        let result = AppConfig::load();
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn test_loaded_config_has_expected_structure() {
        let config = AppConfig::load().expect("Config should load");

        assert!(!config.weather.api_url.is_empty());
        assert!(config.network.request_timeout_secs > 0);
        assert!(config.monitor.current_window_rows > 0);
        assert!(config.monitor.reference_window_months > 0);
        assert!(config.drift.missing_threshold > 0.0);
    }

    #[test]
    fn test_config_structs_are_debug() {
        let config = NetworkConfig::default();
        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("NetworkConfig"));
        assert!(debug_str.contains("request_timeout_secs"));
    }

    // ==================== Environment Variable Override Tests ====================

    /// Helper to safely set and remove environment variables in tests.
    /// SAFETY: These tests run sequentially and clean up after themselves.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        // SAFETY: Test environment, single-threaded access
        unsafe {
            std::env::set_var(key, value);
        }
        let result = f();
        unsafe {
            std::env::remove_var(key);
        }
        result
    }

    /// Helper to safely set multiple environment variables in tests.
    fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        // SAFETY: Test environment, single-threaded access
        for (key, value) in vars {
            unsafe {
                std::env::set_var(key, value);
            }
        }
        let result = f();
        for (key, _) in vars {
            unsafe {
                std::env::remove_var(key);
            }
        }
        result
    }

    #[test]
    fn test_env_var_overrides_api_url() {
        let env_key = "WEATHER__WEATHER__API_URL";
        let test_url = "https://test.example.com/v1/forecast";

        let config = with_env_var(env_key, test_url, || {
            AppConfig::load().expect("Config should load")
        });

        assert_eq!(
            config.weather.api_url, test_url,
            "Environment variable should override weather.api_url"
        );
    }

    #[test]
    fn test_env_var_overrides_drift_thresholds() {
        let vars = [
            ("WEATHER__DRIFT__ALPHA", "0.05"),
            ("WEATHER__DRIFT__MISSING_THRESHOLD", "0.2"),
        ];

        let config = with_env_vars(&vars, || AppConfig::load().expect("Config should load"));

        assert_eq!(config.drift.alpha, 0.05);
        assert_eq!(config.drift.missing_threshold, 0.2);
    }

    #[test]
    fn test_env_var_overrides_monitor_window() {
        let env_key = "WEATHER__MONITOR__CURRENT_WINDOW_ROWS";

        let config = with_env_var(env_key, "30", || {
            AppConfig::load().expect("Config should load")
        });

        assert_eq!(config.monitor.current_window_rows, 30);
    }

    #[test]
    fn test_env_var_overrides_notifications() {
        let vars = [
            ("WEATHER__NOTIFICATIONS__ENABLED", "true"),
            ("WEATHER__NOTIFICATIONS__NTFY_TOPIC", "drift-alerts"),
        ];

        let config = with_env_vars(&vars, || AppConfig::load().expect("Config should load"));

        assert!(config.notifications.enabled);
        assert_eq!(config.notifications.ntfy_topic.as_deref(), Some("drift-alerts"));
    }

    // ==================== Config Value Validation Tests ====================

    #[test]
    fn test_config_drift_thresholds_in_range() {
        let config = AppConfig::load().expect("Config should load");

        assert!(config.drift.alpha > 0.0 && config.drift.alpha < 1.0);
        assert!((0.0..=1.0).contains(&config.drift.require_fraction));
    }

    #[test]
    fn test_config_default_values_are_reasonable() {
        let network = NetworkConfig::default();
        assert!(
            network.request_timeout_secs >= network.connect_timeout_secs,
            "Request timeout should be >= connect timeout"
        );

        let drift = DriftConfig::default();
        assert!(drift.alpha < drift.missing_threshold);
    }
}
