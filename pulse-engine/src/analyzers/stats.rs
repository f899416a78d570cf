//! Numeric toolkit shared by the analyzers.
//!
//! Every function here is total: empty or degenerate inputs resolve to a
//! defined value instead of `NaN` or a panic.

/// Arithmetic mean. Returns `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation around a precomputed mean.
///
/// No Bessel correction. Returns `0.0` when fewer than two values are given.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Maps `position` within `range` onto `base + [0, span]`.
///
/// A zero-width range resolves to the midpoint `base + span / 2`.
pub fn interpolate_linear(position: f64, range: f64, base: f64, span: f64) -> f64 {
    if range == 0.0 {
        return base + span / 2.0;
    }
    base + (position / range) * span
}

/// Rounds to the given number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Least-squares line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

impl Regression {
    /// Evaluates the fitted line at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Ordinary least squares over `(x, y)` pairs.
///
/// - no points: slope and intercept are zero
/// - one point: horizontal line through it
/// - all x equal: slope zero, intercept at the mean of y
pub fn linear_regression(points: &[(f64, f64)]) -> Regression {
    match points {
        [] => return Regression::default(),
        [(_, y)] => {
            return Regression {
                slope: 0.0,
                intercept: *y,
            }
        }
        _ => {}
    }

    let n = points.len() as f64;
    let (sum_x, sum_y, sum_xy, sum_xx) = points.iter().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sx, sy, sxy, sxx), &(x, y)| (sx + x, sy + y, sxy + x * y, sxx + x * x),
    );

    let denominator = n * sum_xx - sum_x * sum_x;
    let slope = if denominator == 0.0 {
        0.0
    } else {
        (n * sum_xy - sum_x * sum_y) / denominator
    };
    let intercept = (sum_y - slope * sum_x) / n;

    Regression { slope, intercept }
}
