//! Statistical analyzers for dashboard metrics.
//!
//! Each analyzer is a pure, synchronous computation over values supplied by the
//! caller. None of them perform I/O or keep state between calls, so they can be
//! shared freely across threads.
//!
//! ## Available Analyzers
//!
//! - **Anomaly Detection** (`anomaly`): z-score test of the latest value against recent history
//! - **Threshold Alerts** (`threshold`): user-defined rules with a warning band near the limit
//! - **Industry Benchmarks** (`benchmark`): percentile rank and tier against a static SaaS catalog
//! - **Revenue Forecasting** (`forecast`): linear trend projection with prediction intervals
//! - **Analysis Runner** (`runner`): batch orchestration producing a single report
//!
//! The numeric helpers they share live in [`stats`].
//!
//! ## Example Usage
//!
//! ```rust
//! use pulse_engine::analyzers::{BenchmarkComparator, PerformanceTier};
//!
//! let comparator = BenchmarkComparator::new();
//! let comparison = comparator.compare("churn_rate", 4.0).unwrap();
//!
//! assert_eq!(comparison.percentile_rank, 63);
//! assert_eq!(comparison.tier, PerformanceTier::AboveAverage);
//! assert_eq!(comparison.next_tier, Some(PerformanceTier::TopQuartile));
//! ```

pub mod anomaly;
pub mod benchmark;
pub mod forecast;
pub mod runner;
pub mod stats;
pub mod threshold;
pub mod types;

pub use anomaly::{Anomaly, AnomalyDetector, AnomalyDirection, AnomalySeverity, ZScoreDetector};
pub use benchmark::{
    industry_benchmark, metric_definition, percentile_rank, BenchmarkCatalog, BenchmarkCategory,
    BenchmarkComparator, BenchmarkComparison, BenchmarkMetric, IndustryBenchmark,
    PerformanceTier, Percentiles, ValueFormat,
};
pub use forecast::{
    ForecastDataPoint, ForecastPeriod, RevenueForecast, RevenueForecaster, RevenueMetrics,
    RevenueTrendPoint, SubscriptionMetrics, TrendDirection,
};
pub use runner::{
    AlertSummary, AnalysisReport, AnalysisRequest, AnalysisRunner, AnalysisRunnerBuilder,
    BenchmarkSummary, ForecastRequest, MetricSeries,
};
pub use stats::Regression;
pub use threshold::{
    AlertStatus, ThresholdAlert, ThresholdEvaluator, ThresholdOperator, ThresholdRule,
};
pub use types::{MetricType, TrendPoint};
