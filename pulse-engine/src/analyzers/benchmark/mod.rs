//! Industry benchmark comparison.
//!
//! A user's metric value is placed on the industry distribution by
//! piecewise-linear interpolation between the published cut points
//! (p25, median, p75, p90). The interpolation is direction-aware: for
//! lower-is-better metrics the brackets are mirrored so that a smaller value
//! earns a higher rank.
//!
//! Published data stops at p25. Below it the rank is extrapolated towards an
//! *estimated* boundary of `p25 * 0.5` (higher-is-better) or `p25 * 1.5`
//! (lower-is-better) that stands in for p10. That boundary is a heuristic, not
//! measured data. When p25 is zero or negative the scaled boundary would sit on
//! the better side of p25, so the p25-to-median spread is mirrored below p25
//! instead. Ranks are floored at 5 and capped at 95.
//!
//! ```rust
//! use pulse_engine::analyzers::benchmark::{BenchmarkComparator, PerformanceTier};
//!
//! let comparator = BenchmarkComparator::new();
//! let churn = comparator.compare("churn_rate", 1.0).unwrap();
//! assert_eq!(churn.percentile_rank, 95);
//! assert_eq!(churn.tier, PerformanceTier::TopDecile);
//! assert!(churn.value_to_next_tier.is_none());
//!
//! assert!(comparator.compare("not_a_metric", 1.0).is_none());
//! ```

pub mod catalog;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use catalog::{
    industry_benchmark, metric_definition, BenchmarkCatalog, BenchmarkCategory, BenchmarkMetric,
    IndustryBenchmark, Percentiles, ValueFormat,
};

use crate::analyzers::stats::{interpolate_linear, round_to};

/// Ordered performance buckets derived from percentile rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    BelowAverage,
    Average,
    AboveAverage,
    TopQuartile,
    TopDecile,
}

impl PerformanceTier {
    pub const ALL: [PerformanceTier; 5] = [
        Self::BelowAverage,
        Self::Average,
        Self::AboveAverage,
        Self::TopQuartile,
        Self::TopDecile,
    ];

    /// Tier for a percentile rank.
    pub fn from_percentile(rank: f64) -> Self {
        if rank >= 90.0 {
            Self::TopDecile
        } else if rank >= 75.0 {
            Self::TopQuartile
        } else if rank >= 50.0 {
            Self::AboveAverage
        } else if rank >= 25.0 {
            Self::Average
        } else {
            Self::BelowAverage
        }
    }

    /// The next better tier, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::BelowAverage => Some(Self::Average),
            Self::Average => Some(Self::AboveAverage),
            Self::AboveAverage => Some(Self::TopQuartile),
            Self::TopQuartile => Some(Self::TopDecile),
            Self::TopDecile => None,
        }
    }

    /// The benchmark value a metric has to reach to enter this tier.
    pub fn entry_value(&self, percentiles: &Percentiles) -> Option<f64> {
        match self {
            Self::BelowAverage => None,
            Self::Average => Some(percentiles.p25),
            Self::AboveAverage => Some(percentiles.median),
            Self::TopQuartile => Some(percentiles.p75),
            Self::TopDecile => Some(percentiles.p90),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BelowAverage => "Below Average",
            Self::Average => "Average",
            Self::AboveAverage => "Above Average",
            Self::TopQuartile => "Top Quartile",
            Self::TopDecile => "Top Decile",
        }
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A user's standing against the industry benchmark for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkComparison {
    pub metric: BenchmarkMetric,
    pub user_value: f64,
    pub benchmark: IndustryBenchmark,
    /// Estimated percentile, 0 to 100.
    pub percentile_rank: u8,
    pub tier: PerformanceTier,
    pub diff_from_median: f64,
    /// Percentage difference from the median, one decimal. Zero when the median is zero.
    pub diff_from_median_percent: f64,
    /// Improvement still needed to reach `next_tier`. `None` at the top tier.
    pub value_to_next_tier: Option<f64>,
    pub next_tier: Option<PerformanceTier>,
}

/// Estimated percentile rank of `value` within the benchmark distribution.
///
/// Returns an unrounded rank in `[5, 95]`.
pub fn percentile_rank(value: f64, p: &Percentiles, higher_is_better: bool) -> f64 {
    // `gain(a, b)` is how far `a` is past `b` in the "better" direction
    let gain = |a: f64, b: f64| if higher_is_better { a - b } else { b - a };

    if gain(value, p.p90) >= 0.0 {
        95.0
    } else if gain(value, p.p75) >= 0.0 {
        interpolate_linear(gain(value, p.p75), gain(p.p90, p.p75), 75.0, 15.0)
    } else if gain(value, p.median) >= 0.0 {
        interpolate_linear(gain(value, p.median), gain(p.p75, p.median), 50.0, 25.0)
    } else if gain(value, p.p25) >= 0.0 {
        interpolate_linear(gain(value, p.p25), gain(p.median, p.p25), 25.0, 25.0)
    } else {
        let estimated_p10 = if higher_is_better {
            p.p25 * 0.5
        } else {
            p.p25 * 1.5
        };
        let range = gain(p.p25, estimated_p10);
        if range > 0.0 {
            return interpolate_linear(gain(value, estimated_p10), range, 10.0, 15.0).max(5.0);
        }

        // p25 <= 0 puts the scaled boundary on the wrong side of p25, so mirror
        // the p25-to-median spread below p25 instead
        let spread = gain(p.median, p.p25);
        if spread > 0.0 {
            interpolate_linear(gain(value, p.p25) + spread, spread, 10.0, 15.0).max(5.0)
        } else {
            5.0
        }
    }
}

/// Compares metric values against a benchmark catalog.
#[derive(Debug, Clone)]
pub struct BenchmarkComparator {
    catalog: Arc<BenchmarkCatalog>,
}

impl Default for BenchmarkComparator {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkComparator {
    /// Creates a comparator over the built-in catalog.
    pub fn new() -> Self {
        Self::with_catalog(BenchmarkCatalog::standard())
    }

    pub fn with_catalog(catalog: Arc<BenchmarkCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &BenchmarkCatalog {
        &self.catalog
    }

    /// Compares `user_value` against the benchmark for `metric_id`.
    ///
    /// Returns `None` when the metric or its benchmark is not in the catalog.
    pub fn compare(&self, metric_id: &str, user_value: f64) -> Option<BenchmarkComparison> {
        let Some(metric) = self.catalog.metric(metric_id) else {
            debug!(metric = metric_id, "No benchmark definition for metric");
            return None;
        };
        let Some(benchmark) = self.catalog.benchmark(metric_id) else {
            debug!(metric = metric_id, "No industry benchmark for metric");
            return None;
        };
        let p = &benchmark.percentiles;

        let rank = percentile_rank(user_value, p, metric.higher_is_better)
            .round()
            .clamp(0.0, 100.0);
        let tier = PerformanceTier::from_percentile(rank);

        let diff_from_median = user_value - p.median;
        let diff_from_median_percent = if p.median == 0.0 {
            0.0
        } else {
            round_to(diff_from_median / p.median * 100.0, 1)
        };

        let next_tier = tier.next();
        let value_to_next_tier = next_tier
            .and_then(|next| next.entry_value(p))
            .map(|target| {
                let needed = if metric.higher_is_better {
                    target - user_value
                } else {
                    user_value - target
                };
                needed.max(0.0)
            });

        debug!(
            metric = metric_id,
            user_value = user_value,
            percentile_rank = rank,
            tier = %tier,
            "Compared metric against benchmark"
        );

        Some(BenchmarkComparison {
            metric: metric.clone(),
            user_value,
            benchmark: benchmark.clone(),
            percentile_rank: rank as u8,
            tier,
            diff_from_median,
            diff_from_median_percent,
            value_to_next_tier,
            next_tier,
        })
    }
}
