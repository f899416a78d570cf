//! Reference data for industry benchmarking.
//!
//! The standard catalog is built once on first access and never mutated, so it
//! can be shared freely across threads. Custom catalogs can be loaded from JSON
//! with the same shape.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Grouping used by the benchmark views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkCategory {
    Growth,
    Retention,
    Revenue,
    Efficiency,
    Engagement,
}

impl fmt::Display for BenchmarkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Growth => "growth",
            Self::Retention => "retention",
            Self::Revenue => "revenue",
            Self::Efficiency => "efficiency",
            Self::Engagement => "engagement",
        };
        f.write_str(s)
    }
}

/// How a metric value should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    Percent,
    Currency,
    Ratio,
    Months,
    Number,
}

/// Static definition of a benchmarkable metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkMetric {
    pub id: String,
    pub label: String,
    pub category: BenchmarkCategory,
    pub unit: String,
    pub format: ValueFormat,
    /// False for metrics such as churn where smaller values are better.
    pub higher_is_better: bool,
    pub description: String,
}

/// Performance-percentile cut points.
///
/// `p90` is always the best-performing boundary: for lower-is-better metrics
/// it is numerically the smallest of the four.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
}

/// Published industry distribution for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryBenchmark {
    pub metric_id: String,
    pub percentiles: Percentiles,
    pub data_year: u16,
    pub source: String,
}

/// Lookup tables of metric definitions and their industry benchmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkCatalog {
    metrics: Vec<BenchmarkMetric>,
    benchmarks: Vec<IndustryBenchmark>,
    #[serde(skip)]
    metric_index: HashMap<String, usize>,
    #[serde(skip)]
    benchmark_index: HashMap<String, usize>,
}

impl BenchmarkCatalog {
    /// Builds a catalog from definitions and benchmarks.
    ///
    /// Later entries with a duplicate id replace earlier ones in lookups.
    pub fn new(metrics: Vec<BenchmarkMetric>, benchmarks: Vec<IndustryBenchmark>) -> Self {
        let metric_index = metrics
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
        let benchmark_index = benchmarks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.metric_id.clone(), i))
            .collect();
        Self {
            metrics,
            benchmarks,
            metric_index,
            benchmark_index,
        }
    }

    /// Returns the shared built-in catalog.
    pub fn standard() -> Arc<BenchmarkCatalog> {
        Arc::clone(&STANDARD_CATALOG)
    }

    /// Parses a catalog from `{"metrics": [...], "benchmarks": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BenchmarkCatalog = serde_json::from_str(json)?;
        let catalog = Self::new(raw.metrics, raw.benchmarks);
        catalog.validate()?;
        Ok(catalog)
    }

    /// Checks that every benchmark has finite cut points ordered by performance.
    pub fn validate(&self) -> Result<()> {
        for benchmark in &self.benchmarks {
            let Some(metric) = self.metric(&benchmark.metric_id) else {
                return Err(EngineError::configuration(format!(
                    "benchmark for unknown metric '{}'",
                    benchmark.metric_id
                )));
            };
            let p = benchmark.percentiles;
            let points = [p.p25, p.median, p.p75, p.p90];
            if points.iter().any(|v| !v.is_finite()) {
                return Err(EngineError::configuration(format!(
                    "benchmark '{}' has non-finite percentiles",
                    metric.id
                )));
            }
            let ordered = points.windows(2).all(|w| {
                if metric.higher_is_better {
                    w[0] <= w[1]
                } else {
                    w[0] >= w[1]
                }
            });
            if !ordered {
                return Err(EngineError::configuration(format!(
                    "benchmark '{}' percentiles are not ordered by performance",
                    metric.id
                )));
            }
        }
        Ok(())
    }

    pub fn metric(&self, id: &str) -> Option<&BenchmarkMetric> {
        self.metric_index.get(id).map(|&i| &self.metrics[i])
    }

    pub fn benchmark(&self, metric_id: &str) -> Option<&IndustryBenchmark> {
        self.benchmark_index
            .get(metric_id)
            .map(|&i| &self.benchmarks[i])
    }

    /// All metric definitions in catalog order.
    pub fn metrics(&self) -> &[BenchmarkMetric] {
        &self.metrics
    }

    pub fn metrics_by_category(&self, category: BenchmarkCategory) -> Vec<&BenchmarkMetric> {
        self.metrics
            .iter()
            .filter(|m| m.category == category)
            .collect()
    }
}

/// Looks up a metric definition in the built-in catalog.
pub fn metric_definition(id: &str) -> Option<&'static BenchmarkMetric> {
    Lazy::force(&STANDARD_CATALOG).metric(id)
}

/// Looks up an industry benchmark in the built-in catalog.
pub fn industry_benchmark(metric_id: &str) -> Option<&'static IndustryBenchmark> {
    Lazy::force(&STANDARD_CATALOG).benchmark(metric_id)
}

static STANDARD_CATALOG: Lazy<Arc<BenchmarkCatalog>> = Lazy::new(|| {
    let rows = [
        (
            "mrr_growth_rate",
            "MRR Growth Rate",
            BenchmarkCategory::Growth,
            "%",
            ValueFormat::Percent,
            true,
            "Month-over-month growth of monthly recurring revenue",
            [2.0, 5.0, 8.0, 12.0],
            "OpenView SaaS Benchmarks",
        ),
        (
            "churn_rate",
            "Customer Churn Rate",
            BenchmarkCategory::Retention,
            "%",
            ValueFormat::Percent,
            false,
            "Share of paying customers lost per month",
            [8.0, 5.0, 3.0, 1.5],
            "SaaS Capital Retention Report",
        ),
        (
            "net_revenue_retention",
            "Net Revenue Retention",
            BenchmarkCategory::Retention,
            "%",
            ValueFormat::Percent,
            true,
            "Recurring revenue kept from existing customers including expansion",
            [90.0, 100.0, 110.0, 120.0],
            "SaaS Capital Retention Report",
        ),
        (
            "gross_margin",
            "Gross Margin",
            BenchmarkCategory::Efficiency,
            "%",
            ValueFormat::Percent,
            true,
            "Revenue remaining after cost of goods sold",
            [60.0, 70.0, 78.0, 85.0],
            "KeyBanc SaaS Survey",
        ),
        (
            "ltv_cac_ratio",
            "LTV:CAC Ratio",
            BenchmarkCategory::Efficiency,
            "x",
            ValueFormat::Ratio,
            true,
            "Customer lifetime value divided by acquisition cost",
            [1.5, 3.0, 4.5, 6.0],
            "KeyBanc SaaS Survey",
        ),
        (
            "cac_payback_months",
            "CAC Payback Period",
            BenchmarkCategory::Efficiency,
            "months",
            ValueFormat::Months,
            false,
            "Months of gross margin needed to recover acquisition cost",
            [24.0, 15.0, 10.0, 6.0],
            "KeyBanc SaaS Survey",
        ),
        (
            "burn_multiple",
            "Burn Multiple",
            BenchmarkCategory::Efficiency,
            "x",
            ValueFormat::Ratio,
            false,
            "Net burn divided by net new ARR",
            [3.0, 2.0, 1.5, 1.0],
            "OpenView SaaS Benchmarks",
        ),
        (
            "arpu",
            "Average Revenue Per User",
            BenchmarkCategory::Revenue,
            "$",
            ValueFormat::Currency,
            true,
            "Monthly recurring revenue divided by paying accounts",
            [25.0, 50.0, 100.0, 200.0],
            "OpenView SaaS Benchmarks",
        ),
        (
            "trial_conversion_rate",
            "Trial Conversion Rate",
            BenchmarkCategory::Growth,
            "%",
            ValueFormat::Percent,
            true,
            "Share of trials that convert to paid plans",
            [10.0, 15.0, 22.0, 30.0],
            "OpenView Product Benchmarks",
        ),
        (
            "dau_mau_ratio",
            "DAU/MAU Ratio",
            BenchmarkCategory::Engagement,
            "%",
            ValueFormat::Percent,
            true,
            "Daily active users as a share of monthly active users",
            [10.0, 20.0, 30.0, 45.0],
            "Mixpanel Product Benchmarks",
        ),
    ];

    let mut metrics = Vec::with_capacity(rows.len());
    let mut benchmarks = Vec::with_capacity(rows.len());
    for row in rows {
        let (id, label, category, unit, format, higher_is_better, description, cuts, source) = row;
        let [p25, median, p75, p90] = cuts;
        metrics.push(BenchmarkMetric {
            id: id.to_string(),
            label: label.to_string(),
            category,
            unit: unit.to_string(),
            format,
            higher_is_better,
            description: description.to_string(),
        });
        benchmarks.push(IndustryBenchmark {
            metric_id: id.to_string(),
            percentiles: Percentiles {
                p25,
                median,
                p75,
                p90,
            },
            data_year: 2024,
            source: source.to_string(),
        });
    }

    Arc::new(BenchmarkCatalog::new(metrics, benchmarks))
});
