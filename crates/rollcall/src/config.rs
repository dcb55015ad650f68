//! Configuration management for rollcall.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::dates::{self, MeetingSchedule};
use crate::error::{Error, Result};
use crate::stats::{StatisticsPolicy, DEFAULT_STABLE_TOLERANCE, DEFAULT_TREND_WINDOW};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "rollcall";

/// Default sheet database file name.
const DATABASE_FILE_NAME: &str = "sheet.db";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "ROLLCALL_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `ROLLCALL_`, sections split on `__`,
///    e.g. `ROLLCALL_SHEET__REQUEST_TIMEOUT_MS`)
/// 2. TOML config file at `~/.config/rollcall/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sheet configuration.
    pub sheet: SheetConfig,
    /// Meeting schedule configuration.
    pub meeting: MeetingConfig,
    /// Statistics configuration.
    pub statistics: StatisticsConfig,
}

/// Sheet-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Path to the sheet database file.
    /// Defaults to `~/.local/share/rollcall/sheet.db`
    pub database_path: Option<PathBuf>,
    /// Upper bound on a single sheet call, in milliseconds.
    pub request_timeout_ms: u64,
}

/// Meeting schedule configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingConfig {
    /// Weekday of the meeting (`mon` .. `sun`, or the full name).
    pub weekday: String,
    /// Start time as `HH:MM`.
    pub start_time: String,
}

/// Statistics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Number of recent meetings in the trend.
    pub trend_window: usize,
    /// Trend changes within this many percentage points count as stable.
    pub stable_tolerance: f64,
    /// Dates with no meeting, as `YYYY-MM-DD`.
    pub skipped_dates: Vec<String>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            request_timeout_ms: 15_000,
        }
    }
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            weekday: "thu".to_string(),
            start_time: "19:00".to_string(),
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            trend_window: DEFAULT_TREND_WINDOW,
            stable_tolerance: DEFAULT_STABLE_TOLERANCE,
            skipped_dates: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `ROLLCALL_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.sheet.request_timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.statistics.trend_window == 0 {
            return Err(Error::ConfigValidation {
                message: "trend_window must be at least 1".to_string(),
            });
        }

        let tolerance = self.statistics.stable_tolerance;
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(Error::ConfigValidation {
                message: format!("stable_tolerance must be zero or positive, got {tolerance}"),
            });
        }

        self.schedule()?;
        self.skipped_dates()?;
        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.sheet
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.sheet.request_timeout_ms)
    }

    /// The meeting schedule.
    ///
    /// # Errors
    ///
    /// Returns an error if the weekday or start time does not parse.
    pub fn schedule(&self) -> Result<MeetingSchedule> {
        MeetingSchedule::parse(&self.meeting.weekday, &self.meeting.start_time)
    }

    /// The statistics policy.
    ///
    /// # Errors
    ///
    /// Returns an error if a skipped date does not parse.
    pub fn policy(&self) -> Result<StatisticsPolicy> {
        Ok(StatisticsPolicy {
            trend_window: self.statistics.trend_window,
            stable_tolerance: self.statistics.stable_tolerance,
            skipped_dates: self.skipped_dates()?,
        })
    }

    fn skipped_dates(&self) -> Result<BTreeSet<chrono::NaiveDate>> {
        self.statistics
            .skipped_dates
            .iter()
            .map(|text| {
                dates::parse_user_date(text).map_err(|_| Error::ConfigValidation {
                    message: format!("invalid skipped date: {text}"),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{NaiveDate, NaiveTime, Weekday};

    use super::*;

    fn write_temp_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "rollcall_config_{}_{name}.toml",
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.sheet.database_path.is_none());
        assert_eq!(config.sheet.request_timeout_ms, 15_000);
        assert_eq!(config.meeting.weekday, "thu");
        assert_eq!(config.meeting.start_time, "19:00");
        assert_eq!(config.statistics.trend_window, 10);
        assert!(config.statistics.skipped_dates.is_empty());
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.sheet.request_timeout_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("request_timeout_ms"));
    }

    #[test]
    fn test_validate_zero_trend_window() {
        let mut config = Config::default();
        config.statistics.trend_window = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("trend_window"));
    }

    #[test]
    fn test_validate_negative_or_nan_tolerance() {
        let mut config = Config::default();
        config.statistics.stable_tolerance = -1.0;
        assert!(config.validate().is_err());

        config.statistics.stable_tolerance = f64::NAN;
        assert!(config.validate().is_err());

        config.statistics.stable_tolerance = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_schedule() {
        let mut config = Config::default();
        config.meeting.weekday = "someday".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.meeting.start_time = "7pm".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("start_time"));
    }

    #[test]
    fn test_validate_bad_skipped_date() {
        let mut config = Config::default();
        config.statistics.skipped_dates = vec!["next week".to_string()];

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("skipped date"));
    }

    #[test]
    fn test_schedule_and_policy() {
        let mut config = Config::default();
        config.meeting.weekday = "Tuesday".to_string();
        config.meeting.start_time = "18:30".to_string();
        config.statistics.skipped_dates = vec!["2024-12-26".to_string()];

        let schedule = config.schedule().unwrap();
        assert_eq!(schedule.weekday, Weekday::Tue);
        assert_eq!(
            schedule.start_time,
            NaiveTime::from_hms_opt(18, 30, 0).unwrap()
        );

        let policy = config.policy().unwrap();
        assert_eq!(policy.trend_window, 10);
        assert!(policy
            .skipped_dates
            .contains(&NaiveDate::from_ymd_opt(2024, 12, 26).unwrap()));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("sheet.db"));
        assert!(path.to_string_lossy().contains("rollcall"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.sheet.database_path = Some(PathBuf::from("/custom/path/sheet.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/sheet.sqlite")
        );
    }

    #[test]
    fn test_request_timeout() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("rollcall"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());

        let config = result.unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_toml_sections() {
        let path = write_temp_config(
            "sections",
            r#"
[sheet]
request_timeout_ms = 2500

[meeting]
weekday = "wed"

[statistics]
trend_window = 6
skipped_dates = ["2024-12-25"]
"#,
        );

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.sheet.request_timeout_ms, 2500);
        assert_eq!(config.meeting.weekday, "wed");
        assert_eq!(config.meeting.start_time, "19:00");
        assert_eq!(config.statistics.trend_window, 6);
        assert_eq!(config.statistics.skipped_dates, ["2024-12-25"]);

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = write_temp_config("invalid", "[statistics]\ntrend_window = 0\n");

        let result = Config::load_from(Some(path.clone()));
        assert!(matches!(result, Err(Error::ConfigValidation { .. })));

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_reports_type_errors() {
        let path = write_temp_config("types", "[sheet]\nrequest_timeout_ms = \"soon\"\n");

        let result = Config::load_from(Some(path.clone()));
        assert!(matches!(result, Err(Error::ConfigLoad(_))));

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_config_serialize() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("request_timeout_ms"));
        assert!(json.contains("stable_tolerance"));
    }

    #[test]
    fn test_statistics_config_deserialize() {
        let json = r#"{"trend_window": 4}"#;
        let statistics: StatisticsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(statistics.trend_window, 4);
        assert!((statistics.stable_tolerance - 5.0).abs() < f64::EPSILON);
    }
}
