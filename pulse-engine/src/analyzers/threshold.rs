//! Threshold rule evaluation.
//!
//! A rule compares one metric against a fixed value. Evaluation classifies the
//! current value into three states: `breached` when the comparison holds,
//! `warning` when the value sits inside a proximity band on the safe side of
//! the threshold, and `normal` otherwise.
//!
//! The evaluator keeps no state between calls. Debouncing ("alert after N
//! consecutive breaches") belongs to the caller.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analyzers::types::generate_id;
use crate::config::ThresholdConfig;

/// Comparison applied between the current value and the rule's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdOperator {
    Gt,
    Lt,
    Gte,
    Lte,
    /// Any operator string this version does not recognise. Never breaches.
    #[serde(other)]
    Unknown,
}

impl ThresholdOperator {
    /// Returns true when `value` breaches `threshold` under this operator.
    pub fn is_breached(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Gte => value >= threshold,
            Self::Lte => value <= threshold,
            Self::Unknown => false,
        }
    }

    /// Human-readable comparison verb used in alert messages.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Gt => "above",
            Self::Lt => "below",
            Self::Gte => "at or above",
            Self::Lte => "at or below",
            Self::Unknown => "compared against",
        }
    }
}

impl fmt::Display for ThresholdOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// An alerting rule configured by a dashboard user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdRule {
    pub id: String,
    pub name: String,
    /// Identifier of the metric the rule watches.
    pub metric: String,
    pub operator: ThresholdOperator,
    /// The threshold value.
    pub value: f64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl ThresholdRule {
    /// Creates an enabled rule.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        metric: impl Into<String>,
        operator: ThresholdOperator,
        value: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            metric: metric.into(),
            operator,
            value,
            enabled: true,
        }
    }

    /// Sets whether the rule is enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Classification of a single rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Normal,
    Warning,
    Breached,
}

impl AlertStatus {
    pub fn is_breached(&self) -> bool {
        matches!(self, AlertStatus::Breached)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, AlertStatus::Warning)
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, AlertStatus::Normal)
    }
}

/// Outcome of evaluating one rule against one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdAlert {
    pub id: String,
    pub rule: ThresholdRule,
    pub current_value: f64,
    pub status: AlertStatus,
    /// Present only when `status` is `breached`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breached_at: Option<DateTime<Utc>>,
    pub message: String,
}

/// Evaluates threshold rules.
#[derive(Debug, Clone, Default)]
pub struct ThresholdEvaluator {
    config: ThresholdConfig,
}

impl ThresholdEvaluator {
    /// Creates an evaluator with the default 10% warning band.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// Evaluates `rule` against `current` using the current time.
    pub fn evaluate(&self, rule: &ThresholdRule, current: f64) -> ThresholdAlert {
        self.evaluate_at(rule, current, Utc::now())
    }

    /// Evaluates `rule` against `current`, stamping breaches with `now`.
    pub fn evaluate_at(
        &self,
        rule: &ThresholdRule,
        current: f64,
        now: DateTime<Utc>,
    ) -> ThresholdAlert {
        if rule.operator == ThresholdOperator::Unknown {
            warn!(
                rule_id = %rule.id,
                metric = %rule.metric,
                "Threshold rule has an unrecognised operator; treating as not breached"
            );
        }

        let status = self.classify(rule.operator, current, rule.value);
        debug!(
            rule_id = %rule.id,
            metric = %rule.metric,
            current_value = current,
            threshold = rule.value,
            status = ?status,
            "Evaluated threshold rule"
        );

        ThresholdAlert {
            id: generate_id(&format!("alert-{}", rule.id), now),
            rule: rule.clone(),
            current_value: current,
            status,
            breached_at: status.is_breached().then_some(now),
            message: alert_message(rule, current, status),
        }
    }

    /// Classifies `value` against `threshold` without building an alert.
    pub fn classify(&self, operator: ThresholdOperator, value: f64, threshold: f64) -> AlertStatus {
        if operator.is_breached(value, threshold) {
            return AlertStatus::Breached;
        }

        let margin = threshold.abs() * self.config.warning_margin_ratio;
        let approaching = match operator {
            ThresholdOperator::Gt | ThresholdOperator::Gte => value >= threshold - margin,
            ThresholdOperator::Lt | ThresholdOperator::Lte => value <= threshold + margin,
            ThresholdOperator::Unknown => false,
        };

        if approaching {
            AlertStatus::Warning
        } else {
            AlertStatus::Normal
        }
    }
}

/// Formats a value with two decimals unless it is integral.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn alert_message(rule: &ThresholdRule, current: f64, status: AlertStatus) -> String {
    let current = format_value(current);
    let threshold = format_value(rule.value);
    let verb = rule.operator.verb();
    match status {
        AlertStatus::Breached => format!(
            "{}: {} is {current}, {verb} the threshold of {threshold}",
            rule.name, rule.metric
        ),
        AlertStatus::Warning => format!(
            "{}: {} is {current}, approaching the threshold of {threshold} (alerts when {verb})",
            rule.name, rule.metric
        ),
        AlertStatus::Normal => format!(
            "{}: {} is {current}, within limits (alerts when {verb} {threshold})",
            rule.name, rule.metric
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(operator: ThresholdOperator, value: f64) -> ThresholdRule {
        ThresholdRule::new("r1", "Revenue ceiling", "revenue", operator, value)
    }

    #[test]
    fn test_gt_three_states() {
        let evaluator = ThresholdEvaluator::new();
        let rule = rule(ThresholdOperator::Gt, 100.0);

        let breached = evaluator.evaluate(&rule, 120.0);
        assert_eq!(breached.status, AlertStatus::Breached);
        assert!(breached.breached_at.is_some());

        let warning = evaluator.evaluate(&rule, 95.0);
        assert_eq!(warning.status, AlertStatus::Warning);
        assert!(warning.breached_at.is_none());

        let normal = evaluator.evaluate(&rule, 80.0);
        assert_eq!(normal.status, AlertStatus::Normal);
        assert!(normal.breached_at.is_none());
    }

    #[test]
    fn test_boundaries_per_operator() {
        let evaluator = ThresholdEvaluator::new();
        // equality only breaches the inclusive operators
        assert_eq!(
            evaluator.classify(ThresholdOperator::Gt, 100.0, 100.0),
            AlertStatus::Warning
        );
        assert_eq!(
            evaluator.classify(ThresholdOperator::Gte, 100.0, 100.0),
            AlertStatus::Breached
        );
        assert_eq!(
            evaluator.classify(ThresholdOperator::Lt, 100.0, 100.0),
            AlertStatus::Warning
        );
        assert_eq!(
            evaluator.classify(ThresholdOperator::Lte, 100.0, 100.0),
            AlertStatus::Breached
        );
        // warning band edge is inclusive
        assert_eq!(
            evaluator.classify(ThresholdOperator::Gt, 90.0, 100.0),
            AlertStatus::Warning
        );
        assert_eq!(
            evaluator.classify(ThresholdOperator::Lt, 110.0, 100.0),
            AlertStatus::Warning
        );
        assert_eq!(
            evaluator.classify(ThresholdOperator::Lt, 111.0, 100.0),
            AlertStatus::Normal
        );
    }

    #[test]
    fn test_negative_threshold_uses_absolute_margin() {
        let evaluator = ThresholdEvaluator::new();
        // margin is |−50| * 0.1 = 5
        assert_eq!(
            evaluator.classify(ThresholdOperator::Lt, -46.0, -50.0),
            AlertStatus::Warning
        );
        assert_eq!(
            evaluator.classify(ThresholdOperator::Lt, -44.0, -50.0),
            AlertStatus::Normal
        );
    }

    #[test]
    fn test_unknown_operator_never_breaches() {
        let json = r#"{"id":"r9","name":"Bad rule","metric":"mrr","operator":"between","value":10,"enabled":true}"#;
        let rule: ThresholdRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.operator, ThresholdOperator::Unknown);

        let alert = ThresholdEvaluator::new().evaluate(&rule, 1_000_000.0);
        assert_eq!(alert.status, AlertStatus::Normal);
        assert!(alert.breached_at.is_none());
    }

    #[test]
    fn test_breached_at_absent_from_json_unless_breached() {
        let evaluator = ThresholdEvaluator::new();
        let rule = rule(ThresholdOperator::Gt, 100.0);

        let json = serde_json::to_value(evaluator.evaluate(&rule, 95.0)).unwrap();
        assert!(json.get("breachedAt").is_none());
        assert_eq!(json["status"], "warning");

        let json = serde_json::to_value(evaluator.evaluate(&rule, 101.0)).unwrap();
        assert!(json["breachedAt"].is_string());
        assert_eq!(json["rule"]["operator"], "gt");
        assert_eq!(json["currentValue"], 101.0);
    }

    #[test]
    fn test_messages() {
        let evaluator = ThresholdEvaluator::new();
        let rule = rule(ThresholdOperator::Gt, 100.0);

        assert_eq!(
            evaluator.evaluate(&rule, 120.0).message,
            "Revenue ceiling: revenue is 120, above the threshold of 100"
        );
        assert_eq!(
            evaluator.evaluate(&rule, 95.5).message,
            "Revenue ceiling: revenue is 95.50, approaching the threshold of 100 (alerts when above)"
        );
        assert_eq!(
            evaluator.evaluate(&rule, 12.346).message,
            "Revenue ceiling: revenue is 12.35, within limits (alerts when above 100)"
        );
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(-3.0), "-3");
        assert_eq!(format_value(0.5), "0.50");
        assert_eq!(format_value(1.005), "1.00");
    }

    #[test]
    fn test_custom_margin() {
        let evaluator = ThresholdEvaluator::with_config(ThresholdConfig {
            warning_margin_ratio: 0.5,
        });
        assert_eq!(
            evaluator.classify(ThresholdOperator::Gte, 60.0, 100.0),
            AlertStatus::Warning
        );
    }
}
