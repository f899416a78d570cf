//! Z-score anomaly detection for dashboard metrics.
//!
//! A current observation is compared against the mean and population standard
//! deviation of its recent history. Observations more than `z_threshold`
//! standard deviations away are reported with a severity derived from how far
//! out they lie.
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use pulse_engine::analyzers::anomaly::{AnomalyDirection, AnomalySeverity, ZScoreDetector};
//! use pulse_engine::analyzers::{MetricType, TrendPoint};
//!
//! let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
//! let history = vec![TrendPoint::new(day(1), 10.0), TrendPoint::new(day(2), 20.0)];
//!
//! let detector = ZScoreDetector::new();
//! let anomaly = detector
//!     .detect(MetricType::Revenue, "Revenue", &history, 25.0)
//!     .expect("two standard deviations above the mean");
//!
//! assert_eq!(anomaly.severity, AnomalySeverity::Warning);
//! assert_eq!(anomaly.direction, AnomalyDirection::Spike);
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::analyzers::stats;
use crate::analyzers::types::{generate_id, MetricType, TrendPoint};
use crate::config::AnomalyConfig;

/// How far outside normal behavior an anomaly lies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Whether the observation is above or below the expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyDirection {
    Spike,
    Drop,
}

/// A detected deviation in a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub id: String,
    pub metric: MetricType,
    pub metric_label: String,
    /// The observed value.
    pub value: f64,
    /// Mean of the history the value was compared against.
    pub expected_value: f64,
    /// Absolute z-score.
    pub deviation: f64,
    pub direction: AnomalyDirection,
    pub severity: AnomalySeverity,
    pub detected_at: DateTime<Utc>,
    /// Trailing history points for visualization; not part of the decision.
    pub trend: Vec<TrendPoint>,
}

/// Seam for pluggable detection strategies used by the analysis runner.
pub trait AnomalyDetector: Send + Sync {
    /// Checks `current` against `history`, returning `None` when there is nothing to report.
    fn detect_at(
        &self,
        metric: MetricType,
        label: &str,
        history: &[TrendPoint],
        current: f64,
        now: DateTime<Utc>,
    ) -> Option<Anomaly>;

    /// Returns the name of this detection strategy.
    fn name(&self) -> &str;

    /// Returns a description of this detection strategy.
    fn description(&self) -> &str;
}

/// Mean and spread of a history, with the current value's score against them.
#[derive(Debug, Clone, Copy)]
struct Standardized {
    mean: f64,
    std_dev: f64,
    z: f64,
}

/// Detects anomalies using the z-score of the current value against history.
#[derive(Debug, Clone, Default)]
pub struct ZScoreDetector {
    config: AnomalyConfig,
}

impl ZScoreDetector {
    /// Creates a detector with the default thresholds (1.5 / 2 / 3).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detector with custom thresholds.
    pub fn with_config(config: AnomalyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Checks `current` against `history` using the current time.
    pub fn detect(
        &self,
        metric: MetricType,
        label: &str,
        history: &[TrendPoint],
        current: f64,
    ) -> Option<Anomaly> {
        self.detect_at(metric, label, history, current, Utc::now())
    }

    /// Signed z-score of `current` against `values`.
    ///
    /// Zero when the values have no spread.
    pub fn z_score(values: &[f64], current: f64) -> f64 {
        Self::standardize(values, current).z
    }

    fn standardize(values: &[f64], current: f64) -> Standardized {
        let mean = stats::mean(values);
        let std_dev = stats::stddev(values, mean);
        let z = if std_dev == 0.0 {
            0.0
        } else {
            (current - mean) / std_dev
        };
        Standardized { mean, std_dev, z }
    }

    /// Maps an absolute z-score to a severity. Critical wins over warning.
    pub fn severity_for(&self, abs_z: f64) -> AnomalySeverity {
        if abs_z >= self.config.critical_z {
            AnomalySeverity::Critical
        } else if abs_z >= self.config.warning_z {
            AnomalySeverity::Warning
        } else {
            AnomalySeverity::Info
        }
    }
}

impl AnomalyDetector for ZScoreDetector {
    #[instrument(skip(self, history, label), fields(history_size = history.len()))]
    fn detect_at(
        &self,
        metric: MetricType,
        label: &str,
        history: &[TrendPoint],
        current: f64,
        now: DateTime<Utc>,
    ) -> Option<Anomaly> {
        if history.len() < self.config.min_history {
            debug!(
                metric = %metric,
                required = self.config.min_history,
                "Insufficient history for z-score detection"
            );
            return None;
        }

        let values: Vec<f64> = history.iter().map(|p| p.value).collect();
        let Standardized { mean, std_dev, z } = Self::standardize(&values, current);
        let abs_z = z.abs();

        if abs_z <= self.config.z_threshold {
            debug!(metric = %metric, z_score = z, "Value within normal range");
            return None;
        }

        let severity = self.severity_for(abs_z);
        let direction = if z > 0.0 {
            AnomalyDirection::Spike
        } else {
            AnomalyDirection::Drop
        };
        debug!(
            metric = %metric,
            z_score = z,
            mean = mean,
            std_dev = std_dev,
            severity = %severity,
            "Anomaly detected"
        );

        let window = self.config.trend_window.min(history.len());
        Some(Anomaly {
            id: generate_id(&format!("anomaly-{metric}"), now),
            metric,
            metric_label: label.to_string(),
            value: current,
            expected_value: mean,
            deviation: abs_z,
            direction,
            severity,
            detected_at: now,
            trend: history[history.len() - window..].to_vec(),
        })
    }

    fn name(&self) -> &str {
        "ZScore"
    }

    fn description(&self) -> &str {
        "Detects anomalies using statistical Z-score analysis"
    }
}
