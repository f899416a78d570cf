//! Tunable parameters for the analyzers.
//!
//! Every default reproduces the constants the dashboard has always used, so
//! `AnalyticsConfig::default()` is the reference behavior. Configuration can be
//! loaded from JSON; missing fields fall back to their defaults.
//!
//! ```rust
//! use pulse_engine::config::AnalyticsConfig;
//!
//! let config = AnalyticsConfig::from_json_str(r#"{ "anomaly": { "zThreshold": 2.0 } }"#).unwrap();
//! assert_eq!(config.anomaly.z_threshold, 2.0);
//! assert_eq!(config.anomaly.critical_z, 3.0);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorContext, Result};

/// Configuration for the z-score anomaly detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnomalyConfig {
    /// |z| must exceed this to be reported (default: 1.5).
    pub z_threshold: f64,
    /// |z| at or above this is a warning (default: 2.0).
    pub warning_z: f64,
    /// |z| at or above this is critical (default: 3.0).
    pub critical_z: f64,
    /// Minimum number of history points (default: 2).
    pub min_history: usize,
    /// Number of trailing history points carried on an anomaly (default: 7).
    pub trend_window: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: 1.5,
            warning_z: 2.0,
            critical_z: 3.0,
            min_history: 2,
            trend_window: 7,
        }
    }
}

/// Configuration for the threshold evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThresholdConfig {
    /// Width of the warning band as a fraction of |threshold| (default: 0.10).
    pub warning_margin_ratio: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            warning_margin_ratio: 0.10,
        }
    }
}

/// Configuration for the revenue forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForecastConfig {
    /// Two-sided z value for the prediction interval (default: 1.96).
    pub confidence_z: f64,
    /// Confidence level reported alongside the interval (default: 0.95).
    pub confidence_level: f64,
    /// Half-width of the flat fallback band as a fraction of the prediction (default: 0.10).
    pub fallback_band_ratio: f64,
    /// Days of synthetic history generated from MRR when no revenue trend exists (default: 30).
    pub synthetic_history_days: usize,
    /// Daily growth rate (percent) beyond which the trend is growing or declining (default: 0.001).
    pub growth_epsilon: f64,
    /// Prepend fitted historical points carrying `actual` to the forecast (default: false).
    pub include_history: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            confidence_z: 1.96,
            confidence_level: 0.95,
            fallback_band_ratio: 0.10,
            synthetic_history_days: 30,
            growth_epsilon: 0.001,
            include_history: false,
        }
    }
}

/// Top-level configuration shared by the analysis runner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsConfig {
    pub anomaly: AnomalyConfig,
    pub threshold: ThresholdConfig,
    pub forecast: ForecastConfig,
}

impl AnalyticsConfig {
    /// Flags smaller deviations and widens the warning band.
    pub fn sensitive() -> Self {
        Self {
            anomaly: AnomalyConfig {
                z_threshold: 1.0,
                warning_z: 1.5,
                critical_z: 2.5,
                ..AnomalyConfig::default()
            },
            threshold: ThresholdConfig {
                warning_margin_ratio: 0.20,
            },
            forecast: ForecastConfig::default(),
        }
    }

    /// Only flags large deviations; requires more history.
    pub fn conservative() -> Self {
        Self {
            anomaly: AnomalyConfig {
                z_threshold: 2.0,
                warning_z: 2.5,
                critical_z: 3.5,
                min_history: 7,
                ..AnomalyConfig::default()
            },
            threshold: ThresholdConfig {
                warning_margin_ratio: 0.05,
            },
            forecast: ForecastConfig::default(),
        }
    }

    /// Sets the anomaly detector configuration.
    pub fn with_anomaly(mut self, anomaly: AnomalyConfig) -> Self {
        self.anomaly = anomaly;
        self
    }

    /// Sets the threshold evaluator configuration.
    pub fn with_threshold(mut self, threshold: ThresholdConfig) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the forecaster configuration.
    pub fn with_forecast(mut self, forecast: ForecastConfig) -> Self {
        self.forecast = forecast;
        self
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Reading config file {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("Loading config file {}", path.display()))
    }

    /// Checks that the values are usable by the analyzers.
    pub fn validate(&self) -> Result<()> {
        let a = &self.anomaly;
        for (name, value) in [
            ("anomaly.zThreshold", a.z_threshold),
            ("anomaly.warningZ", a.warning_z),
            ("anomaly.criticalZ", a.critical_z),
        ] {
            ensure_finite_non_negative(name, value)?;
        }
        if !(a.z_threshold <= a.warning_z && a.warning_z <= a.critical_z) {
            return Err(EngineError::configuration(format!(
                "anomaly thresholds must be ordered zThreshold <= warningZ <= criticalZ, got {} / {} / {}",
                a.z_threshold, a.warning_z, a.critical_z
            )));
        }
        if a.min_history < 2 {
            return Err(EngineError::configuration(
                "anomaly.minHistory must be at least 2",
            ));
        }

        ensure_finite_non_negative(
            "threshold.warningMarginRatio",
            self.threshold.warning_margin_ratio,
        )?;

        let f = &self.forecast;
        ensure_finite_non_negative("forecast.confidenceZ", f.confidence_z)?;
        ensure_finite_non_negative("forecast.fallbackBandRatio", f.fallback_band_ratio)?;
        ensure_finite_non_negative("forecast.growthEpsilon", f.growth_epsilon)?;
        if !(f.confidence_level > 0.0 && f.confidence_level < 1.0) {
            return Err(EngineError::configuration(format!(
                "forecast.confidenceLevel must be in (0, 1), got {}",
                f.confidence_level
            )));
        }
        if f.synthetic_history_days == 0 {
            return Err(EngineError::configuration(
                "forecast.syntheticHistoryDays must be positive",
            ));
        }

        Ok(())
    }
}

fn ensure_finite_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::configuration(format!(
            "{name} must be finite and non-negative, got: {value}"
        )));
    }
    Ok(())
}
