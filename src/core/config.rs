use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::BwError;

/// Tolerance applied when checking that the metric weights sum to 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.001;

pub const MAX_SAMPLING_FREQUENCY_SECONDS: u64 = 3_600;
pub const MAX_SMOOTHING_WINDOW_MINUTES: u64 = 1_440;
pub const MAX_MINIMUM_PRESSURE_DURATION_SECONDS: u64 = 86_400;
pub const MAX_DATA_RETENTION_DAYS: u64 = 3_650;

const SECONDS_PER_DAY: u64 = 86_400;

/// Application configuration, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampling_frequency_seconds: u64,
    pub smoothing_window_minutes: u64,
    pub minimum_pressure_duration_seconds: u64,
    pub thresholds: Thresholds,
    pub metric_weights: MetricWeights,
    pub data_retention_days: u64,
    pub verbose_logging: bool,
    /// How an unavailable sub-metric contributes to the pressure score
    pub partial_metric_policy: PartialMetricPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub yellow: f64,
    pub red: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricWeights {
    pub page_faults: f64,
    pub available_ram: f64,
    pub committed_ratio: f64,
}

/// Policy for sub-metrics the platform could not deliver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialMetricPolicy {
    /// Score the missing metric as 0 (no pressure). Under-reports during degradation.
    #[default]
    Neutral,
    /// Reuse the last sub-score seen for that metric.
    CarryForward,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling_frequency_seconds: 5,
            smoothing_window_minutes: 5,
            minimum_pressure_duration_seconds: 30,
            thresholds: Thresholds::default(),
            metric_weights: MetricWeights::default(),
            data_retention_days: 30,
            verbose_logging: false,
            partial_metric_policy: PartialMetricPolicy::Neutral,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            yellow: 60.0,
            red: 80.0,
        }
    }
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            page_faults: 0.5,
            available_ram: 0.3,
            committed_ratio: 0.2,
        }
    }
}

impl MetricWeights {
    pub fn sum(&self) -> f64 {
        self.page_faults + self.available_ram + self.committed_ratio
    }
}

impl Config {
    /// Load from the default location, writing defaults if no file exists yet
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load from an explicit path.
    ///
    /// A missing file yields defaults (which are then saved); an unparsable
    /// file yields defaults with a warning. Values are not validated here.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config file at {:?}, creating defaults", path);
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if data.trim().is_empty() {
            return Ok(Config::default());
        }

        match serde_json::from_str(&data) {
            Ok(config) => {
                log::info!("Configuration loaded from {:?}", path);
                Ok(config)
            }
            Err(e) => {
                log::warn!("Invalid config file {:?} ({}), using defaults", path, e);
                Ok(Config::default())
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(path, data)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("bwatch").join("config.json"))
    }

    /// Default location of the history database
    pub fn get_database_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().with_context(|| "Could not determine data directory")?;

        Ok(data_dir.join("bwatch").join("history.db"))
    }

    /// Check every numeric contract the pressure engine relies on.
    pub fn validate(&self) -> crate::Result<()> {
        for (name, value, min, max) in [
            (
                "sampling_frequency_seconds",
                self.sampling_frequency_seconds,
                1,
                MAX_SAMPLING_FREQUENCY_SECONDS,
            ),
            (
                "smoothing_window_minutes",
                self.smoothing_window_minutes,
                1,
                MAX_SMOOTHING_WINDOW_MINUTES,
            ),
            (
                "minimum_pressure_duration_seconds",
                self.minimum_pressure_duration_seconds,
                0,
                MAX_MINIMUM_PRESSURE_DURATION_SECONDS,
            ),
            (
                "data_retention_days",
                self.data_retention_days,
                1,
                MAX_DATA_RETENTION_DAYS,
            ),
        ] {
            if !(min..=max).contains(&value) {
                return Err(BwError::configuration(format!(
                    "{} must be within {}-{}, got {}",
                    name, min, max, value
                )));
            }
        }

        let Thresholds { yellow, red } = self.thresholds;
        for (name, value) in [("thresholds.yellow", yellow), ("thresholds.red", red)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(BwError::configuration(format!(
                    "{} must be within 0-100, got {}",
                    name, value
                )));
            }
        }
        if yellow >= red {
            return Err(BwError::configuration(format!(
                "thresholds.yellow ({}) must be lower than thresholds.red ({})",
                yellow, red
            )));
        }

        let weights = self.metric_weights;
        for (name, value) in [
            ("metric_weights.page_faults", weights.page_faults),
            ("metric_weights.available_ram", weights.available_ram),
            ("metric_weights.committed_ratio", weights.committed_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BwError::configuration(format!(
                    "{} must be within 0-1, got {}",
                    name, value
                )));
            }
        }
        let sum = weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(BwError::configuration(format!(
                "metric_weights must sum to 1.0, got {:.4}",
                sum
            )));
        }

        Ok(())
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.sampling_frequency_seconds)
    }

    pub fn smoothing_window(&self) -> Duration {
        Duration::from_secs(self.smoothing_window_minutes.saturating_mul(60))
    }

    pub fn minimum_pressure_duration(&self) -> Duration {
        Duration::from_secs(self.minimum_pressure_duration_seconds)
    }

    pub fn retention(&self) -> Duration {
        retention_days(self.data_retention_days)
    }
}

/// `days` as a duration, saturating instead of overflowing.
pub fn retention_days(days: u64) -> Duration {
    Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let config = Config {
            metric_weights: MetricWeights {
                page_faults: 0.5,
                available_ram: 0.5,
                committed_ratio: 0.2,
            },
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, BwError::Configuration(_)));
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_weights_within_tolerance_accepted() {
        let config = Config {
            metric_weights: MetricWeights {
                page_faults: 0.3334,
                available_ram: 0.3333,
                committed_ratio: 0.3333,
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yellow_must_be_below_red() {
        let config = Config {
            thresholds: Thresholds {
                yellow: 80.0,
                red: 80.0,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let config = Config {
            thresholds: Thresholds {
                yellow: 60.0,
                red: 120.0,
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("thresholds.red"));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let config = Config {
            sampling_frequency_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            smoothing_window_minutes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let config = Config {
            smoothing_window_minutes: 1_000_000_000,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("smoothing_window_minutes"));

        let config = Config {
            data_retention_days: u64::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            minimum_pressure_duration_seconds: MAX_MINIMUM_PRESSURE_DURATION_SECONDS + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            smoothing_window_minutes: MAX_SMOOTHING_WINDOW_MINUTES,
            data_retention_days: MAX_DATA_RETENTION_DAYS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_helpers_saturate() {
        let config = Config {
            smoothing_window_minutes: u64::MAX,
            data_retention_days: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.smoothing_window(), Duration::from_secs(u64::MAX));
        assert_eq!(config.retention(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_partial_json_merges_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"thresholds": {"red": 90}, "sampling_frequency_seconds": 10}"#)
                .unwrap();

        assert_eq!(config.sampling_frequency_seconds, 10);
        assert_eq!(config.thresholds.red, 90.0);
        assert_eq!(config.thresholds.yellow, 60.0);
        assert_eq!(config.metric_weights, MetricWeights::default());
    }

    #[test]
    fn test_policy_serializes_snake_case() {
        let json = serde_json::to_string(&PartialMetricPolicy::CarryForward).unwrap();
        assert_eq!(json, "\"carry_forward\"");
    }
}
