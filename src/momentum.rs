//! Crossover momentum signal over a time series.
//!
//! The signal is the difference of a fast and a slow exponentially weighted
//! mean, scaled by the exponentially weighted standard deviation. All
//! averages use the recursive form `y_t = (1 - a) * y_{t-1} + a * x_t` with
//! `y_0 = x_0` and `a = 2 / (span + 1)`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MomentumParams {
    pub fast: usize,
    pub slow: usize,
    pub vol_look_back: usize,
    pub min_periods: usize,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            fast: 10,
            slow: 5,
            vol_look_back: 5,
            min_periods: 5,
        }
    }
}

/// Smoothing factor for `span`. A span below one has no meaningful decay.
fn alpha(span: usize) -> Option<f64> {
    (span >= 1).then(|| 2.0 / (span as f64 + 1.0))
}

/// Weight of each observation in the recursive average ending at the last
/// point. The first observation carries `(1 - a)^(n-1)`, every later one
/// `a * (1 - a)^(n-1-i)`; they sum to one.
fn weights(len: usize, a: f64) -> impl Iterator<Item = f64> {
    (0..len).map(move |i| {
        let age = (len - 1 - i) as i32;
        if i == 0 {
            (1.0 - a).powi(age)
        } else {
            a * (1.0 - a).powi(age)
        }
    })
}

/// Last value of the exponentially weighted mean, `None` for an empty series
/// or a zero span.
pub fn ewm_mean(xs: &[f64], span: usize) -> Option<f64> {
    let a = alpha(span)?;
    let (&first, rest) = xs.split_first()?;
    Some(rest.iter().fold(first, |y, &x| (1.0 - a) * y + a * x))
}

/// Last value of the bias-corrected exponentially weighted standard
/// deviation. `None` for a zero span or when fewer than two observations
/// carry weight.
pub fn ewm_std(xs: &[f64], span: usize) -> Option<f64> {
    let a = alpha(span)?;
    let mean = ewm_mean(xs, span)?;
    let (var, sum_sq) = weights(xs.len(), a)
        .zip(xs)
        .fold((0.0, 0.0), |(var, sum_sq), (w, &x)| {
            (var + w * (x - mean).powi(2), sum_sq + w * w)
        });
    let correction = 1.0 - sum_sq;
    if correction <= f64::EPSILON {
        return None;
    }
    Some((var / correction).sqrt())
}

/// Momentum at the last point of `xs`, or `None` when the series is shorter
/// than `min_periods`, has no volatility, or any span is zero.
pub fn momentum(xs: &[f64], params: &MomentumParams) -> Option<f64> {
    if xs.len() < params.min_periods.max(1) {
        return None;
    }
    let cross_over = ewm_mean(xs, params.fast)? - ewm_mean(xs, params.slow)?;
    let vol = ewm_std(xs, params.vol_look_back)?;
    if !(vol.is_finite() && vol > 0.0) {
        return None;
    }
    Some(cross_over / vol)
}
