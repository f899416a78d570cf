//! Builds a dashboard report from sample data and prints it as JSON.
//!
//! ```bash
//! RUST_LOG=pulse_engine=debug cargo run --example dashboard_report
//! ```

use std::collections::HashMap;

use chrono::{Duration, Utc};
use pulse_engine::analyzers::forecast::{RevenueMetrics, RevenueTrendPoint, SubscriptionMetrics};
use pulse_engine::analyzers::runner::ForecastRequest;
use pulse_engine::logging::setup::{init_logging, LoggingConfig};
use pulse_engine::prelude::*;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::development())?;

    let today = Utc::now().date_naive();
    let history = |values: &[f64]| -> Vec<TrendPoint> {
        let start = today - Duration::days(values.len() as i64);
        values
            .iter()
            .enumerate()
            .map(|(i, v)| TrendPoint::new(start + Duration::days(i as i64), *v))
            .collect()
    };

    let revenue_trend: Vec<RevenueTrendPoint> = (0..60)
        .map(|i| {
            let net = 1_400.0 + 12.0 * i as f64 + if i % 7 == 5 { -180.0 } else { 0.0 };
            RevenueTrendPoint {
                date: today - Duration::days(60 - i),
                gross_revenue: net + 40.0,
                refunds: 40.0,
                net_revenue: net,
            }
        })
        .collect();

    let request = AnalysisRequest {
        series: vec![
            MetricSeries::new(
                MetricType::ActiveUsers,
                history(&[4_210.0, 4_180.0, 4_260.0, 4_240.0, 4_300.0, 4_190.0, 4_275.0]),
                3_120.0,
            ),
            MetricSeries::new(
                MetricType::ConversionRate,
                history(&[3.1, 3.3, 2.9, 3.0, 3.2, 3.1, 3.0]),
                3.1,
            ),
        ],
        rules: vec![
            ThresholdRule::new("r-churn", "Churn ceiling", "churn_rate", ThresholdOperator::Gt, 5.0),
            ThresholdRule::new("r-mrr", "MRR floor", "mrr", ThresholdOperator::Lt, 45_000.0),
        ],
        current_values: HashMap::from([
            ("churn_rate".to_string(), 4.7),
            ("mrr".to_string(), 48_500.0),
        ]),
        benchmark_values: HashMap::from([
            ("churn_rate".to_string(), 4.7),
            ("mrr_growth_rate".to_string(), 6.4),
            ("ltv_cac_ratio".to_string(), 3.4),
            ("dau_mau_ratio".to_string(), 18.0),
        ]),
        forecast: Some(ForecastRequest {
            subscription: SubscriptionMetrics {
                mrr: 48_500.0,
                arr: 582_000.0,
                active_subscriptions: 612,
                churn_rate: 4.7,
            },
            revenue: RevenueMetrics {
                total_revenue: revenue_trend.iter().map(|p| p.net_revenue).sum(),
                revenue_trend,
            },
            period: ForecastPeriod::Days90,
        }),
    };

    let runner = AnalysisRunner::builder()
        .config(AnalyticsConfig::default())
        .log_config(LogConfig::verbose())
        .build()?;
    let report = runner.run(&request);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
