//! Shared input types for the analyzers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single observation in a daily metric series.
///
/// Series handed to the analyzers are ordered by `date`, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Calendar date, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub value: f64,
}

impl TrendPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Dashboard metrics that can be monitored for anomalies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Revenue,
    Mrr,
    ActiveUsers,
    NewSignups,
    ChurnRate,
    ConversionRate,
    Arpu,
    SessionDuration,
    PageViews,
    ErrorRate,
}

impl MetricType {
    pub const ALL: [MetricType; 10] = [
        Self::Revenue,
        Self::Mrr,
        Self::ActiveUsers,
        Self::NewSignups,
        Self::ChurnRate,
        Self::ConversionRate,
        Self::Arpu,
        Self::SessionDuration,
        Self::PageViews,
        Self::ErrorRate,
    ];

    /// Returns the wire identifier of the metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Mrr => "mrr",
            Self::ActiveUsers => "active_users",
            Self::NewSignups => "new_signups",
            Self::ChurnRate => "churn_rate",
            Self::ConversionRate => "conversion_rate",
            Self::Arpu => "arpu",
            Self::SessionDuration => "session_duration",
            Self::PageViews => "page_views",
            Self::ErrorRate => "error_rate",
        }
    }

    /// Returns the default display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Revenue => "Revenue",
            Self::Mrr => "Monthly Recurring Revenue",
            Self::ActiveUsers => "Active Users",
            Self::NewSignups => "New Signups",
            Self::ChurnRate => "Churn Rate",
            Self::ConversionRate => "Conversion Rate",
            Self::Arpu => "Average Revenue Per User",
            Self::SessionDuration => "Session Duration",
            Self::PageViews => "Page Views",
            Self::ErrorRate => "Error Rate",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricType {
    type Err = crate::error::EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                crate::error::EngineError::invalid_input("metric", format!("unknown metric '{s}'"))
            })
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates an identifier that is distinct across near-simultaneous calls.
///
/// Format: `{prefix}-{unix millis}-{process-wide sequence}`.
pub(crate) fn generate_id(prefix: &str, at: DateTime<Utc>) -> String {
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{seq}", at.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_point_serializes_calendar_date() {
        let point = TrendPoint::new(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(), 12.5);
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json["date"], "2024-03-09");
        assert_eq!(json["value"], 12.5);
    }

    #[test]
    fn test_metric_type_round_trips_through_str() {
        for metric in MetricType::ALL {
            assert_eq!(metric.as_str().parse::<MetricType>().unwrap(), metric);
            assert_eq!(
                serde_json::to_value(metric).unwrap(),
                serde_json::Value::String(metric.as_str().to_string())
            );
        }
        assert!("bounce_rate".parse::<MetricType>().is_err());
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let now = Utc::now();
        let a = generate_id("anomaly", now);
        let b = generate_id("anomaly", now);
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("anomaly-{}-", now.timestamp_millis())));
    }
}
