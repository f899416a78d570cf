//! # Pulse - Metrics Analysis for Business Dashboards
//!
//! Pulse is the statistical core behind a business-analytics dashboard. Given
//! metric values and their recent history it flags anomalies, evaluates
//! user-defined threshold alerts, ranks performance against SaaS industry
//! benchmarks and projects revenue forward with prediction intervals.
//!
//! Every computation is pure and synchronous. Data access, persistence,
//! scheduling and notification delivery belong to the caller.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use chrono::NaiveDate;
//! use pulse_engine::prelude::*;
//!
//! let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
//! let history = vec![
//!     TrendPoint::new(day(1), 1_000.0),
//!     TrendPoint::new(day(2), 1_040.0),
//!     TrendPoint::new(day(3), 980.0),
//!     TrendPoint::new(day(4), 1_010.0),
//! ];
//!
//! let request = AnalysisRequest {
//!     series: vec![MetricSeries::new(MetricType::Revenue, history, 1_600.0)],
//!     rules: vec![ThresholdRule::new(
//!         "churn-ceiling",
//!         "Churn ceiling",
//!         "churn_rate",
//!         ThresholdOperator::Gt,
//!         5.0,
//!     )],
//!     current_values: HashMap::from([("churn_rate".to_string(), 6.2)]),
//!     benchmark_values: HashMap::from([("churn_rate".to_string(), 6.2)]),
//!     forecast: None,
//! };
//!
//! let report = AnalysisRunner::new().run(&request);
//! assert_eq!(report.anomalies[0].severity, AnomalySeverity::Critical);
//! assert!(report.alerts[0].status.is_breached());
//! assert_eq!(report.benchmarks[0].tier, PerformanceTier::Average);
//! ```
//!
//! ## Configuration
//!
//! All tunable constants live in [`config::AnalyticsConfig`]. Its `Default`
//! reproduces the standard behavior; it can also be loaded from JSON:
//!
//! ```rust
//! use pulse_engine::config::AnalyticsConfig;
//!
//! let config = AnalyticsConfig::from_json_str(r#"{"anomaly": {"zThreshold": 2.0}}"#).unwrap();
//! assert_eq!(config.anomaly.z_threshold, 2.0);
//! assert_eq!(config.anomaly.critical_z, 3.0);
//! ```
//!
//! ## Logging
//!
//! Analyzers emit `tracing` events at their decision points. Binaries can use
//! [`logging::setup::init_logging`] for a ready-made subscriber.

pub mod analyzers;
pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;

pub use error::{EngineError, Result};
