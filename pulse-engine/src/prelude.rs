//! Prelude for commonly used types and traits in pulse-engine.

pub use crate::analyzers::{
    AlertStatus, AnalysisReport, AnalysisRequest, AnalysisRunner, Anomaly, AnomalyDetector,
    AnomalySeverity, BenchmarkComparator, ForecastPeriod, MetricSeries, MetricType,
    PerformanceTier, RevenueForecaster, ThresholdEvaluator, ThresholdOperator, ThresholdRule,
    TrendPoint, ZScoreDetector,
};
pub use crate::config::AnalyticsConfig;
pub use crate::error::{EngineError, ErrorContext, Result};
pub use crate::logging::LogConfig;
