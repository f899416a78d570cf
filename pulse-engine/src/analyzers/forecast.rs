//! Revenue forecasting from a linear trend.
//!
//! The forecaster fits an ordinary-least-squares line through the daily
//! revenue history and projects it forward with a 95% prediction interval.
//!
//! The regression runs against the *position* of each point in the series,
//! not its calendar date. This assumes evenly spaced daily samples: a series
//! with missing days is fitted as if it were contiguous, and projected dates
//! simply continue one day at a time from the last observation.
//!
//! When the residual spread is zero (a perfect fit) or there is too little
//! history to estimate it, the interval falls back to a flat ±10% band around
//! the prediction. That band is a presentation default, not a statistically
//! derived interval.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::analyzers::stats::{self, Regression};
use crate::analyzers::types::TrendPoint;
use crate::config::ForecastConfig;
use crate::error::EngineError;

/// Forecast horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForecastPeriod {
    #[serde(rename = "30d")]
    Days30,
    #[serde(rename = "90d")]
    Days90,
    #[serde(rename = "12m")]
    Months12,
}

impl ForecastPeriod {
    /// Number of daily points projected for this horizon.
    pub fn days(&self) -> usize {
        match self {
            Self::Days30 => 30,
            Self::Days90 => 90,
            Self::Months12 => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days30 => "30d",
            Self::Days90 => "90d",
            Self::Months12 => "12m",
        }
    }
}

impl fmt::Display for ForecastPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastPeriod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "30d" => Ok(Self::Days30),
            "90d" => Ok(Self::Days90),
            "12m" => Ok(Self::Months12),
            other => Err(EngineError::invalid_input(
                "period",
                format!("expected one of 30d, 90d, 12m, got '{other}'"),
            )),
        }
    }
}

/// Current subscription figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionMetrics {
    pub mrr: f64,
    pub arr: f64,
    pub active_subscriptions: u64,
    pub churn_rate: f64,
}

/// One day of revenue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueTrendPoint {
    pub date: NaiveDate,
    #[serde(default)]
    pub gross_revenue: f64,
    #[serde(default)]
    pub refunds: f64,
    pub net_revenue: f64,
}

/// Revenue figures with their daily history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RevenueMetrics {
    pub total_revenue: f64,
    /// Daily net revenue, oldest first.
    pub revenue_trend: Vec<RevenueTrendPoint>,
}

/// Direction of the fitted trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Growing,
    Declining,
    Stable,
}

/// One projected (or fitted historical) day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastDataPoint {
    pub date: NaiveDate,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
    /// Observed value; only present for points inside the supplied history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<f64>,
}

/// A revenue projection over a forecast period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueForecast {
    pub period: ForecastPeriod,
    pub forecast: Vec<ForecastDataPoint>,
    #[serde(rename = "startingMRR")]
    pub starting_mrr: f64,
    /// Last projected daily value times 30.
    #[serde(rename = "projectedMRR")]
    pub projected_mrr: f64,
    /// Sum of all projected daily values.
    pub projected_total_revenue: f64,
    pub trend: TrendDirection,
    /// Slope as a percentage of mean daily revenue.
    pub daily_growth_rate: f64,
    /// Daily rate compounded over 30 days.
    pub monthly_growth_rate: f64,
    pub confidence_level: f64,
    pub generated_at: DateTime<Utc>,
}

/// Fitted model plus the statistics needed for prediction intervals.
#[derive(Debug, Clone, Copy)]
struct TrendModel {
    regression: Regression,
    n: usize,
    mean_x: f64,
    sum_sq_dev_x: f64,
    residual_std: f64,
}

impl TrendModel {
    fn fit(values: &[f64]) -> Self {
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64, *v))
            .collect();
        let regression = stats::linear_regression(&points);
        let n = values.len();

        let mean_x = if n == 0 { 0.0 } else { (n as f64 - 1.0) / 2.0 };
        let sum_sq_dev_x = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();

        // two fitted parameters leave n - 2 degrees of freedom
        let residual_std = if n > 2 {
            let ssr: f64 = points
                .iter()
                .map(|&(x, y)| (y - regression.predict(x)).powi(2))
                .sum();
            (ssr / (n - 2) as f64).sqrt()
        } else {
            0.0
        };

        Self {
            regression,
            n,
            mean_x,
            sum_sq_dev_x,
            residual_std,
        }
    }
}

/// Projects revenue forward from its history.
#[derive(Debug, Clone, Default)]
pub struct RevenueForecaster {
    config: ForecastConfig,
}

impl RevenueForecaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ForecastConfig) -> Self {
        Self { config }
    }

    /// Forecasts revenue for `period` using the current time.
    pub fn forecast(
        &self,
        subscription: &SubscriptionMetrics,
        revenue: &RevenueMetrics,
        period: ForecastPeriod,
    ) -> RevenueForecast {
        self.forecast_at(subscription, revenue, period, Utc::now())
    }

    /// Forecasts revenue for `period`, treating `now` as the generation time.
    #[instrument(skip(self, subscription, revenue), fields(history_size = revenue.revenue_trend.len()))]
    pub fn forecast_at(
        &self,
        subscription: &SubscriptionMetrics,
        revenue: &RevenueMetrics,
        period: ForecastPeriod,
        now: DateTime<Utc>,
    ) -> RevenueForecast {
        let history = self.historical_series(subscription, revenue, now.date_naive());
        let values: Vec<f64> = history.iter().map(|p| p.value).collect();
        let model = TrendModel::fit(&values);
        let slope = model.regression.slope;

        debug!(
            points = model.n,
            slope = slope,
            intercept = model.regression.intercept,
            residual_std = model.residual_std,
            "Fitted revenue trend"
        );

        let mut forecast = Vec::with_capacity(period.days());
        if self.config.include_history {
            forecast.extend(history.iter().enumerate().map(|(i, point)| {
                let mut fitted = self.project(&model, i as f64, point.date);
                fitted.actual = Some(point.value);
                fitted
            }));
        }

        // a non-empty history is guaranteed: synthetic days are at least one
        let anchor = history
            .last()
            .map(|p| p.date)
            .unwrap_or_else(|| now.date_naive());
        let projected: Vec<ForecastDataPoint> = (1..=period.days())
            .map(|day| {
                let x = (model.n + day - 1) as f64;
                self.project(&model, x, anchor + Duration::days(day as i64))
            })
            .collect();

        let projected_total_revenue = projected.iter().map(|p| p.predicted).sum();
        let projected_mrr = projected.last().map_or(0.0, |p| p.predicted * 30.0);

        let mean_value = stats::mean(&values);
        let daily_growth_rate = if mean_value == 0.0 {
            0.0
        } else {
            slope / mean_value * 100.0
        };
        let monthly_growth_rate = ((1.0 + daily_growth_rate / 100.0).powi(30) - 1.0) * 100.0;
        let trend = if daily_growth_rate > self.config.growth_epsilon {
            TrendDirection::Growing
        } else if daily_growth_rate < -self.config.growth_epsilon {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        };

        forecast.extend(projected);

        RevenueForecast {
            period,
            forecast,
            starting_mrr: subscription.mrr,
            projected_mrr,
            projected_total_revenue,
            trend,
            daily_growth_rate,
            monthly_growth_rate,
            confidence_level: self.config.confidence_level,
            generated_at: now,
        }
    }

    /// Daily history to fit: the revenue trend when present, otherwise MRR
    /// spread evenly over the synthetic window ending `today`.
    fn historical_series(
        &self,
        subscription: &SubscriptionMetrics,
        revenue: &RevenueMetrics,
        today: NaiveDate,
    ) -> Vec<TrendPoint> {
        if !revenue.revenue_trend.is_empty() {
            return revenue
                .revenue_trend
                .iter()
                .map(|p| TrendPoint::new(p.date, p.net_revenue))
                .collect();
        }

        let days = self.config.synthetic_history_days.max(1);
        debug!(
            days = days,
            mrr = subscription.mrr,
            "No revenue trend supplied, synthesizing history from MRR"
        );
        let daily = subscription.mrr / days as f64;
        (0..days)
            .map(|i| TrendPoint::new(today - Duration::days((days - 1 - i) as i64), daily))
            .collect()
    }

    fn project(&self, model: &TrendModel, x: f64, date: NaiveDate) -> ForecastDataPoint {
        let predicted = model.regression.predict(x).max(0.0);

        let (lower, upper) = if model.residual_std == 0.0 || model.n < 2 {
            let band = self.config.fallback_band_ratio;
            (predicted * (1.0 - band), predicted * (1.0 + band))
        } else {
            let n = model.n as f64;
            let standard_error = model.residual_std
                * (1.0 + 1.0 / n + (x - model.mean_x).powi(2) / model.sum_sq_dev_x).sqrt();
            let margin = self.config.confidence_z * standard_error;
            ((predicted - margin).max(0.0), predicted + margin)
        };

        ForecastDataPoint {
            date,
            predicted,
            lower: lower.max(0.0),
            upper,
            actual: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EPS: f64 = 1e-6;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn revenue(values: &[f64]) -> RevenueMetrics {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        RevenueMetrics {
            total_revenue: values.iter().sum(),
            revenue_trend: values
                .iter()
                .enumerate()
                .map(|(i, v)| RevenueTrendPoint {
                    date: start + Duration::days(i as i64),
                    gross_revenue: *v,
                    refunds: 0.0,
                    net_revenue: *v,
                })
                .collect(),
        }
    }

    #[test]
    fn test_period_days_and_parsing() {
        assert_eq!(ForecastPeriod::Days30.days(), 30);
        assert_eq!(ForecastPeriod::Days90.days(), 90);
        assert_eq!(ForecastPeriod::Months12.days(), 365);
        assert_eq!("12m".parse::<ForecastPeriod>().unwrap(), ForecastPeriod::Months12);
        assert!("6m".parse::<ForecastPeriod>().is_err());
        assert_eq!(serde_json::to_value(ForecastPeriod::Days90).unwrap(), "90d");
    }

    #[test]
    fn test_synthetic_history_from_mrr() {
        let subscription = SubscriptionMetrics {
            mrr: 3_000.0,
            ..Default::default()
        };
        let forecast = RevenueForecaster::new().forecast_at(
            &subscription,
            &RevenueMetrics::default(),
            ForecastPeriod::Days30,
            now(),
        );

        assert_eq!(forecast.forecast.len(), 30);
        assert_eq!(forecast.trend, TrendDirection::Stable);
        assert_eq!(forecast.starting_mrr, 3_000.0);
        assert!((forecast.projected_mrr - 3_000.0).abs() < EPS);
        assert!((forecast.projected_total_revenue - 3_000.0).abs() < EPS);
        // synthetic history ends today, so projections start tomorrow
        assert_eq!(
            forecast.forecast[0].date,
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
        );
        // perfect fit falls back to the flat ±10% band
        let first = &forecast.forecast[0];
        assert!((first.lower - 90.0).abs() < EPS);
        assert!((first.upper - 110.0).abs() < EPS);
    }

    #[test]
    fn test_growing_series() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + 10.0 * i as f64).collect();
        let forecast = RevenueForecaster::new().forecast_at(
            &SubscriptionMetrics::default(),
            &revenue(&values),
            ForecastPeriod::Days30,
            now(),
        );

        assert_eq!(forecast.trend, TrendDirection::Growing);
        // day 1 continues the line at x = 20
        assert!((forecast.forecast[0].predicted - 300.0).abs() < EPS);
        assert!((forecast.forecast[29].predicted - 590.0).abs() < EPS);
        assert!((forecast.projected_mrr - 590.0 * 30.0).abs() < 1e-4);

        // slope 10 over mean 195
        let daily = 10.0 / 195.0 * 100.0;
        assert!((forecast.daily_growth_rate - daily).abs() < EPS);
        let monthly = ((1.0 + daily / 100.0).powi(30) - 1.0) * 100.0;
        assert!((forecast.monthly_growth_rate - monthly).abs() < EPS);
        assert_eq!(forecast.confidence_level, 0.95);
    }

    #[test]
    fn test_declining_series_floors_at_zero() {
        let values: Vec<f64> = (0..10).map(|i| 1_000.0 - 50.0 * i as f64).collect();
        let forecast = RevenueForecaster::new().forecast_at(
            &SubscriptionMetrics::default(),
            &revenue(&values),
            ForecastPeriod::Months12,
            now(),
        );

        assert_eq!(forecast.trend, TrendDirection::Declining);
        assert_eq!(forecast.forecast.len(), 365);
        for point in &forecast.forecast {
            assert!(point.predicted >= 0.0);
            assert!(point.lower >= 0.0);
            assert!(point.upper >= point.predicted);
        }
        assert_eq!(forecast.forecast[364].predicted, 0.0);
        assert_eq!(forecast.projected_mrr, 0.0);
    }

    #[test]
    fn test_flat_slope_with_noise_has_widening_interval() {
        // palindromic series: slope is exactly zero, residuals are not
        let values = [100.0, 120.0, 80.0, 100.0, 100.0, 80.0, 120.0, 100.0];
        let forecast = RevenueForecaster::new().forecast_at(
            &SubscriptionMetrics::default(),
            &revenue(&values),
            ForecastPeriod::Days90,
            now(),
        );

        assert_eq!(forecast.trend, TrendDirection::Stable);
        assert_eq!(forecast.daily_growth_rate, 0.0);
        let first = forecast.forecast[0].predicted;
        for point in &forecast.forecast {
            assert!((point.predicted - first).abs() < EPS);
        }
        let widths: Vec<f64> = forecast.forecast.iter().map(|p| p.upper - p.lower).collect();
        assert!(widths.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_prediction_interval_formula() {
        let values = [100.0, 120.0, 80.0, 100.0, 100.0, 80.0, 120.0, 100.0];
        let forecast = RevenueForecaster::new().forecast_at(
            &SubscriptionMetrics::default(),
            &revenue(&values),
            ForecastPeriod::Days30,
            now(),
        );

        // SSR = 1600 over 6 degrees of freedom; x = 8, mean x = 3.5, Sxx = 42
        let residual_std = (1600.0f64 / 6.0).sqrt();
        let se = residual_std * (1.0 + 1.0 / 8.0 + (8.0f64 - 3.5).powi(2) / 42.0).sqrt();
        let first = &forecast.forecast[0];
        assert!((first.predicted - 100.0).abs() < EPS);
        assert!((first.upper - (100.0 + 1.96 * se)).abs() < EPS);
        assert!((first.lower - (100.0 - 1.96 * se)).abs() < EPS);
    }

    #[test]
    fn test_gapped_history_is_fitted_by_position() {
        let contiguous = revenue(&[100.0, 110.0, 125.0, 130.0]);
        let mut gapped = contiguous.clone();
        // same values, but the last two days arrive a week late
        for point in gapped.revenue_trend.iter_mut().skip(2) {
            point.date += Duration::days(7);
        }

        let forecaster = RevenueForecaster::new();
        let a = forecaster.forecast_at(
            &SubscriptionMetrics::default(),
            &contiguous,
            ForecastPeriod::Days30,
            now(),
        );
        let b = forecaster.forecast_at(
            &SubscriptionMetrics::default(),
            &gapped,
            ForecastPeriod::Days30,
            now(),
        );

        assert_eq!(a.daily_growth_rate, b.daily_growth_rate);
        assert_eq!(a.projected_total_revenue, b.projected_total_revenue);
        // projected dates continue from the last observed date
        assert_eq!(b.forecast[0].date - a.forecast[0].date, Duration::days(7));
    }

    #[test]
    fn test_short_histories_use_fallback_band() {
        let forecaster = RevenueForecaster::new();
        for values in [&[250.0][..], &[100.0, 200.0][..]] {
            let forecast = forecaster.forecast_at(
                &SubscriptionMetrics::default(),
                &revenue(values),
                ForecastPeriod::Days30,
                now(),
            );
            for point in &forecast.forecast {
                assert!((point.upper - point.predicted * 1.1).abs() < EPS);
                assert!((point.lower - point.predicted * 0.9).abs() < EPS);
            }
        }
    }

    #[test]
    fn test_zero_revenue_has_no_nan() {
        let forecast = RevenueForecaster::new().forecast_at(
            &SubscriptionMetrics::default(),
            &RevenueMetrics::default(),
            ForecastPeriod::Days30,
            now(),
        );
        assert_eq!(forecast.trend, TrendDirection::Stable);
        assert_eq!(forecast.daily_growth_rate, 0.0);
        assert_eq!(forecast.monthly_growth_rate, 0.0);
        assert!(forecast
            .forecast
            .iter()
            .all(|p| p.predicted == 0.0 && p.lower == 0.0 && p.upper == 0.0));
    }

    #[test]
    fn test_include_history_prepends_actuals() {
        let forecaster = RevenueForecaster::with_config(ForecastConfig {
            include_history: true,
            ..ForecastConfig::default()
        });
        let values = [100.0, 110.0, 120.0];
        let forecast = forecaster.forecast_at(
            &SubscriptionMetrics::default(),
            &revenue(&values),
            ForecastPeriod::Days30,
            now(),
        );

        assert_eq!(forecast.forecast.len(), 33);
        assert_eq!(forecast.forecast[0].actual, Some(100.0));
        assert_eq!(forecast.forecast[2].actual, Some(120.0));
        assert!(forecast.forecast[3..].iter().all(|p| p.actual.is_none()));
        // totals only count projected days: 130 + ... + 420
        let expected: f64 = (0..30).map(|d| 130.0 + 10.0 * d as f64).sum();
        assert!((forecast.projected_total_revenue - expected).abs() < 1e-6);

        let json = serde_json::to_value(&forecast).unwrap();
        assert_eq!(json["forecast"][0]["actual"], 100.0);
        assert!(json["forecast"][3].get("actual").is_none());
        assert!(json.get("startingMRR").is_some());
        assert!(json.get("projectedMRR").is_some());
        assert_eq!(json["period"], "30d");
    }
}
