//! Batch orchestration of the analyzers for a dashboard refresh.
//!
//! The [`AnalysisRunner`] owns one instance of each analyzer, configured from a
//! single [`AnalyticsConfig`], and turns an [`AnalysisRequest`] into an
//! [`AnalysisReport`] with sorted results and summary counts.
//!
//! ```rust
//! use std::collections::HashMap;
//! use pulse_engine::analyzers::runner::{AnalysisRequest, AnalysisRunner};
//!
//! let runner = AnalysisRunner::new();
//! let request = AnalysisRequest {
//!     benchmark_values: HashMap::from([("churn_rate".to_string(), 4.0)]),
//!     ..AnalysisRequest::default()
//! };
//!
//! let report = runner.run(&request);
//! assert_eq!(report.benchmark_summary.total, 1);
//! assert!(report.forecast.is_none());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::analyzers::anomaly::{Anomaly, AnomalyDetector, ZScoreDetector};
use crate::analyzers::benchmark::{
    BenchmarkCatalog, BenchmarkComparator, BenchmarkComparison, PerformanceTier,
};
use crate::analyzers::forecast::{
    ForecastPeriod, RevenueForecast, RevenueForecaster, RevenueMetrics, SubscriptionMetrics,
};
use crate::analyzers::stats;
use crate::analyzers::threshold::{ThresholdAlert, ThresholdEvaluator, ThresholdRule};
use crate::analyzers::types::{MetricType, TrendPoint};
use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::logging::{truncate_field, LogConfig};
use crate::{log_decision, log_summary, perf_debug};

/// History and latest value for one dashboard metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeries {
    pub metric: MetricType,
    /// Display label; the metric's default label is used when empty.
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub history: Vec<TrendPoint>,
    pub current: f64,
}

impl MetricSeries {
    pub fn new(metric: MetricType, history: Vec<TrendPoint>, current: f64) -> Self {
        Self {
            metric,
            label: metric.label().to_string(),
            history,
            current,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn display_label(&self) -> &str {
        if self.label.is_empty() {
            self.metric.label()
        } else {
            &self.label
        }
    }
}

/// Inputs for a revenue projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRequest {
    #[serde(default)]
    pub subscription: SubscriptionMetrics,
    #[serde(default)]
    pub revenue: RevenueMetrics,
    pub period: ForecastPeriod,
}

/// Everything needed for one dashboard refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub series: Vec<MetricSeries>,
    pub rules: Vec<ThresholdRule>,
    /// Current values keyed by the metric id used in threshold rules.
    pub current_values: HashMap<String, f64>,
    /// User values keyed by benchmark metric id.
    pub benchmark_values: HashMap<String, f64>,
    pub forecast: Option<ForecastRequest>,
}

/// Alert counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    pub total: usize,
    pub breached: usize,
    pub warning: usize,
    pub normal: usize,
}

impl AlertSummary {
    pub fn from_alerts(alerts: &[ThresholdAlert]) -> Self {
        alerts.iter().fold(Self::default(), |mut summary, alert| {
            summary.total += 1;
            if alert.status.is_breached() {
                summary.breached += 1;
            } else if alert.status.is_warning() {
                summary.warning += 1;
            } else {
                summary.normal += 1;
            }
            summary
        })
    }
}

/// Distribution of benchmark comparisons across tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkSummary {
    pub total: usize,
    pub by_tier: BTreeMap<PerformanceTier, usize>,
    /// Mean percentile rank, one decimal. Zero when there are no comparisons.
    pub average_percentile: f64,
}

impl BenchmarkSummary {
    pub fn from_comparisons(comparisons: &[BenchmarkComparison]) -> Self {
        let mut by_tier = BTreeMap::new();
        for comparison in comparisons {
            *by_tier.entry(comparison.tier).or_insert(0) += 1;
        }
        let ranks: Vec<f64> = comparisons
            .iter()
            .map(|c| f64::from(c.percentile_rank))
            .collect();

        Self {
            total: comparisons.len(),
            by_tier,
            average_percentile: stats::round_to(stats::mean(&ranks), 1),
        }
    }
}

/// Combined output of a dashboard refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Critical first, then by deviation.
    pub anomalies: Vec<Anomaly>,
    /// In rule order.
    pub alerts: Vec<ThresholdAlert>,
    pub alert_summary: AlertSummary,
    /// Sorted by metric id.
    pub benchmarks: Vec<BenchmarkComparison>,
    pub benchmark_summary: BenchmarkSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<RevenueForecast>,
    pub generated_at: DateTime<Utc>,
}

/// Runs every analyzer over a dashboard's metrics.
pub struct AnalysisRunner {
    detector: Box<dyn AnomalyDetector>,
    evaluator: ThresholdEvaluator,
    comparator: BenchmarkComparator,
    forecaster: RevenueForecaster,
    config: AnalyticsConfig,
    log_config: LogConfig,
}

impl Default for AnalysisRunner {
    fn default() -> Self {
        Self::from_parts(
            AnalyticsConfig::default(),
            LogConfig::default(),
            None,
            None,
        )
    }
}

impl AnalysisRunner {
    /// Creates a runner with the default configuration and the standard catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new builder for the analysis runner.
    pub fn builder() -> AnalysisRunnerBuilder {
        AnalysisRunnerBuilder::default()
    }

    fn from_parts(
        config: AnalyticsConfig,
        log_config: LogConfig,
        detector: Option<Box<dyn AnomalyDetector>>,
        catalog: Option<Arc<BenchmarkCatalog>>,
    ) -> Self {
        let detector: Box<dyn AnomalyDetector> = match detector {
            Some(detector) => detector,
            None => Box::new(ZScoreDetector::with_config(config.anomaly.clone())),
        };
        let comparator = catalog
            .map(BenchmarkComparator::with_catalog)
            .unwrap_or_default();

        Self {
            detector,
            evaluator: ThresholdEvaluator::with_config(config.threshold.clone()),
            comparator,
            forecaster: RevenueForecaster::with_config(config.forecast.clone()),
            config,
            log_config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Name of the anomaly detection strategy in use.
    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Detects anomalies across `series` using the current time.
    pub fn detect_anomalies(&self, series: &[MetricSeries]) -> Vec<Anomaly> {
        self.detect_anomalies_at(series, Utc::now())
    }

    /// Detects anomalies across `series`, most severe first.
    #[instrument(skip(self, series), fields(metrics = series.len()))]
    pub fn detect_anomalies_at(&self, series: &[MetricSeries], now: DateTime<Utc>) -> Vec<Anomaly> {
        let mut anomalies: Vec<Anomaly> = series
            .iter()
            .filter_map(|s| {
                perf_debug!(
                    self.log_config,
                    metric = %s.metric,
                    history_size = s.history.len(),
                    current_value = s.current,
                    "Checking metric for anomalies"
                );
                let anomaly = self.detector.detect_at(
                    s.metric,
                    s.display_label(),
                    &s.history,
                    s.current,
                    now,
                );
                log_decision!(
                    self.log_config,
                    metric = %s.metric,
                    detector = self.detector.name(),
                    flagged = anomaly.is_some(),
                    "Anomaly check complete"
                );
                anomaly
            })
            .collect();

        anomalies.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.deviation.total_cmp(&a.deviation))
        });

        log_summary!(
            self.log_config,
            checked = series.len(),
            anomalies = anomalies.len(),
            "Anomaly detection finished"
        );
        anomalies
    }

    /// Evaluates `rules` using the current time.
    pub fn evaluate_rules(
        &self,
        rules: &[ThresholdRule],
        current_values: &HashMap<String, f64>,
    ) -> Vec<ThresholdAlert> {
        self.evaluate_rules_at(rules, current_values, Utc::now())
    }

    /// Evaluates every enabled rule whose metric has a current value.
    #[instrument(skip(self, rules, current_values), fields(rules = rules.len()))]
    pub fn evaluate_rules_at(
        &self,
        rules: &[ThresholdRule],
        current_values: &HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> Vec<ThresholdAlert> {
        let alerts: Vec<ThresholdAlert> = rules
            .iter()
            .filter_map(|rule| {
                if !rule.enabled {
                    debug!(rule_id = %rule.id, "Skipping disabled threshold rule");
                    return None;
                }
                let Some(&current) = current_values.get(&rule.metric) else {
                    debug!(
                        rule_id = %rule.id,
                        metric = %rule.metric,
                        "No current value for threshold rule metric"
                    );
                    return None;
                };
                let alert = self.evaluator.evaluate_at(rule, current, now);
                log_decision!(
                    self.log_config,
                    rule_id = %rule.id,
                    status = ?alert.status,
                    message = %truncate_field(&alert.message, self.log_config.max_field_length),
                    "Threshold rule evaluated"
                );
                Some(alert)
            })
            .collect();

        let summary = AlertSummary::from_alerts(&alerts);
        log_summary!(
            self.log_config,
            evaluated = summary.total,
            breached = summary.breached,
            warning = summary.warning,
            "Threshold evaluation finished"
        );
        alerts
    }

    /// Compares user values with the industry benchmarks, sorted by metric id.
    #[instrument(skip(self, values), fields(metrics = values.len()))]
    pub fn compare_benchmarks(&self, values: &HashMap<String, f64>) -> Vec<BenchmarkComparison> {
        let mut comparisons: Vec<BenchmarkComparison> = values
            .iter()
            .filter_map(|(metric_id, value)| {
                let comparison = self.comparator.compare(metric_id, *value);
                match &comparison {
                    Some(c) => log_decision!(
                        self.log_config,
                        metric_id = %metric_id,
                        percentile_rank = c.percentile_rank,
                        tier = %c.tier,
                        "Benchmark compared"
                    ),
                    None => debug!(metric_id = %metric_id, "No benchmark for metric"),
                }
                comparison
            })
            .collect();
        comparisons.sort_by(|a, b| a.metric.id.cmp(&b.metric.id));
        comparisons
    }

    /// Projects revenue using the current time.
    pub fn forecast(&self, request: &ForecastRequest) -> RevenueForecast {
        self.forecaster
            .forecast(&request.subscription, &request.revenue, request.period)
    }

    /// Runs every analyzer over `request` using the current time.
    pub fn run(&self, request: &AnalysisRequest) -> AnalysisReport {
        self.run_at(request, Utc::now())
    }

    /// Runs every analyzer over `request`, stamping results with `now`.
    #[instrument(skip(self, request))]
    pub fn run_at(&self, request: &AnalysisRequest, now: DateTime<Utc>) -> AnalysisReport {
        let anomalies = self.detect_anomalies_at(&request.series, now);
        let alerts = self.evaluate_rules_at(&request.rules, &request.current_values, now);
        let alert_summary = AlertSummary::from_alerts(&alerts);
        let benchmarks = self.compare_benchmarks(&request.benchmark_values);
        let benchmark_summary = BenchmarkSummary::from_comparisons(&benchmarks);
        let forecast = request.forecast.as_ref().map(|f| {
            self.forecaster
                .forecast_at(&f.subscription, &f.revenue, f.period, now)
        });

        info!(
            anomalies = anomalies.len(),
            breached = alert_summary.breached,
            benchmarks = benchmark_summary.total,
            forecast = forecast.is_some(),
            "Analysis complete"
        );

        AnalysisReport {
            anomalies,
            alerts,
            alert_summary,
            benchmarks,
            benchmark_summary,
            forecast,
            generated_at: now,
        }
    }
}

/// Builder for [`AnalysisRunner`].
#[derive(Default)]
pub struct AnalysisRunnerBuilder {
    config: AnalyticsConfig,
    log_config: LogConfig,
    detector: Option<Box<dyn AnomalyDetector>>,
    catalog: Option<Arc<BenchmarkCatalog>>,
}

impl AnalysisRunnerBuilder {
    /// Sets the analyzer configuration.
    pub fn config(mut self, config: AnalyticsConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the logging configuration.
    pub fn log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Replaces the default z-score detector.
    pub fn detector(mut self, detector: Box<dyn AnomalyDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Uses a custom benchmark catalog instead of the standard one.
    pub fn catalog(mut self, catalog: Arc<BenchmarkCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Validates the configuration and builds the runner.
    pub fn build(self) -> Result<AnalysisRunner> {
        self.config.validate()?;
        Ok(AnalysisRunner::from_parts(
            self.config,
            self.log_config,
            self.detector,
            self.catalog,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::anomaly::AnomalySeverity;
    use crate::analyzers::threshold::{AlertStatus, ThresholdOperator};
    use crate::config::AnomalyConfig;
    use crate::error::EngineError;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
    }

    fn history(values: &[f64]) -> Vec<TrendPoint> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| TrendPoint::new(start + Duration::days(i as i64), *v))
            .collect()
    }

    #[test]
    fn test_anomalies_sorted_by_severity_then_deviation() {
        let runner = AnalysisRunner::new();
        // mean 15, stddev 5 for every series
        let series = vec![
            MetricSeries::new(MetricType::Revenue, history(&[10.0, 20.0]), 24.0),
            MetricSeries::new(MetricType::Mrr, history(&[10.0, 20.0]), 35.0),
            MetricSeries::new(MetricType::ActiveUsers, history(&[10.0, 20.0]), 15.0),
            MetricSeries::new(MetricType::ErrorRate, history(&[10.0, 20.0]), 27.0),
            MetricSeries::new(MetricType::ChurnRate, history(&[10.0, 20.0]), -2.5),
        ];

        let anomalies = runner.detect_anomalies_at(&series, now());
        let order: Vec<(MetricType, AnomalySeverity)> =
            anomalies.iter().map(|a| (a.metric, a.severity)).collect();
        assert_eq!(
            order,
            vec![
                (MetricType::Mrr, AnomalySeverity::Critical),
                (MetricType::ChurnRate, AnomalySeverity::Critical),
                (MetricType::ErrorRate, AnomalySeverity::Warning),
                (MetricType::Revenue, AnomalySeverity::Info),
            ]
        );
        assert_eq!(anomalies[0].metric_label, MetricType::Mrr.label());
    }

    #[test]
    fn test_custom_label_is_used() {
        let runner = AnalysisRunner::new();
        let series = [MetricSeries::new(MetricType::PageViews, history(&[10.0, 20.0]), 40.0)
            .with_label("Docs Page Views")];
        let anomalies = runner.detect_anomalies_at(&series, now());
        assert_eq!(anomalies[0].metric_label, "Docs Page Views");
    }

    #[test]
    fn test_rules_skip_disabled_and_missing_values() {
        let runner = AnalysisRunner::new();
        let rules = vec![
            ThresholdRule::new("r1", "High churn", "churn_rate", ThresholdOperator::Gt, 5.0),
            ThresholdRule::new("r2", "Low MRR", "mrr", ThresholdOperator::Lt, 10_000.0)
                .with_enabled(false),
            ThresholdRule::new("r3", "Error spike", "error_rate", ThresholdOperator::Gte, 2.0),
            ThresholdRule::new("r4", "Signups", "new_signups", ThresholdOperator::Lt, 100.0),
        ];
        let values = HashMap::from([
            ("churn_rate".to_string(), 6.5),
            ("mrr".to_string(), 5_000.0),
            ("error_rate".to_string(), 1.9),
        ]);

        let alerts = runner.evaluate_rules_at(&rules, &values, now());
        let ids: Vec<&str> = alerts.iter().map(|a| a.rule.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);
        assert_eq!(alerts[0].status, AlertStatus::Breached);
        assert_eq!(alerts[0].breached_at, Some(now()));
        assert_eq!(alerts[1].status, AlertStatus::Warning);

        let summary = AlertSummary::from_alerts(&alerts);
        assert_eq!(
            summary,
            AlertSummary {
                total: 2,
                breached: 1,
                warning: 1,
                normal: 0
            }
        );
    }

    #[test]
    fn test_benchmarks_sorted_and_summarized() {
        let runner = AnalysisRunner::new();
        let values = HashMap::from([
            ("gross_margin".to_string(), 65.0),
            ("churn_rate".to_string(), 4.0),
            ("not_a_metric".to_string(), 1.0),
        ]);

        let comparisons = runner.compare_benchmarks(&values);
        let ids: Vec<&str> = comparisons.iter().map(|c| c.metric.id.as_str()).collect();
        assert_eq!(ids, vec!["churn_rate", "gross_margin"]);

        let summary = BenchmarkSummary::from_comparisons(&comparisons);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.by_tier.get(&PerformanceTier::AboveAverage), Some(&1));
        assert_eq!(summary.by_tier.get(&PerformanceTier::Average), Some(&1));
        // ranks 63 and 38
        assert_eq!(summary.average_percentile, 50.5);
    }

    #[test]
    fn test_empty_summaries() {
        assert_eq!(AlertSummary::from_alerts(&[]), AlertSummary::default());
        let summary = BenchmarkSummary::from_comparisons(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average_percentile, 0.0);
        assert!(summary.by_tier.is_empty());
    }

    #[test]
    fn test_run_combines_everything() {
        let runner = AnalysisRunner::new();
        let request = AnalysisRequest {
            series: vec![MetricSeries::new(
                MetricType::Revenue,
                history(&[100.0, 102.0, 98.0, 101.0, 99.0]),
                180.0,
            )],
            rules: vec![ThresholdRule::new(
                "r1",
                "MRR floor",
                "mrr",
                ThresholdOperator::Lt,
                1_000.0,
            )],
            current_values: HashMap::from([("mrr".to_string(), 3_000.0)]),
            benchmark_values: HashMap::from([("arpu".to_string(), 250.0)]),
            forecast: Some(ForecastRequest {
                subscription: SubscriptionMetrics {
                    mrr: 3_000.0,
                    ..Default::default()
                },
                revenue: RevenueMetrics::default(),
                period: ForecastPeriod::Days30,
            }),
        };

        let report = runner.run_at(&request, now());
        assert_eq!(report.generated_at, now());
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.alert_summary.normal, 1);
        assert_eq!(report.benchmarks[0].tier, PerformanceTier::TopDecile);
        let forecast = report.forecast.as_ref().unwrap();
        assert_eq!(forecast.generated_at, now());
        assert_eq!(forecast.forecast.len(), 30);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["alertSummary"]["normal"], 1);
        assert_eq!(json["benchmarkSummary"]["byTier"]["top_decile"], 1);
        assert!(json["generatedAt"].is_string());
    }

    #[test]
    fn test_report_omits_missing_forecast() {
        let report = AnalysisRunner::new().run_at(&AnalysisRequest::default(), now());
        assert!(report.anomalies.is_empty());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("forecast").is_none());
    }

    #[test]
    fn test_request_from_json() {
        let request: AnalysisRequest = serde_json::from_str(
            r#"{
                "series": [{"metric": "mrr", "history": [{"date": "2024-03-01", "value": 10.0}], "current": 12.0}],
                "currentValues": {"mrr": 12.0},
                "forecast": {"period": "90d"}
            }"#,
        )
        .unwrap();
        assert_eq!(request.series[0].display_label(), "Monthly Recurring Revenue");
        assert!(request.rules.is_empty());
        assert_eq!(request.forecast.unwrap().period, ForecastPeriod::Days90);
    }

    #[test]
    fn test_builder_validates_config() {
        let bad = AnalyticsConfig::default().with_anomaly(AnomalyConfig {
            warning_z: 5.0,
            critical_z: 4.0,
            ..AnomalyConfig::default()
        });
        let err = AnalysisRunner::builder().config(bad).build().err().unwrap();
        assert!(matches!(err, EngineError::Configuration(_)));

        let runner = AnalysisRunner::builder()
            .config(AnalyticsConfig::sensitive())
            .log_config(LogConfig::verbose())
            .build()
            .unwrap();
        assert_eq!(runner.config().anomaly.z_threshold, 1.0);
        assert_eq!(runner.detector_name(), "ZScore");
    }

    struct AlwaysFlag;

    impl AnomalyDetector for AlwaysFlag {
        fn detect_at(
            &self,
            metric: MetricType,
            label: &str,
            _history: &[TrendPoint],
            current: f64,
            now: DateTime<Utc>,
        ) -> Option<Anomaly> {
            Some(Anomaly {
                id: format!("test-{metric}"),
                metric,
                metric_label: label.to_string(),
                value: current,
                expected_value: current,
                deviation: 0.0,
                direction: crate::analyzers::anomaly::AnomalyDirection::Spike,
                severity: AnomalySeverity::Info,
                detected_at: now,
                trend: Vec::new(),
            })
        }

        fn name(&self) -> &str {
            "AlwaysFlag"
        }

        fn description(&self) -> &str {
            "Flags every metric"
        }
    }

    #[test]
    fn test_custom_detector() {
        let runner = AnalysisRunner::builder()
            .detector(Box::new(AlwaysFlag))
            .build()
            .unwrap();
        let series = [MetricSeries::new(MetricType::Arpu, Vec::new(), 42.0)];
        let anomalies = runner.detect_anomalies_at(&series, now());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(runner.detector_name(), "AlwaysFlag");
    }
}
