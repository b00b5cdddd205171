//! Indicator series over bar slices.
//!
//! Every function returns one entry per input element. `None` marks a value
//! that is not available yet (lookback not filled) or that depends on a
//! missing input.

use market_gateway::models::bar::Bar;

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn rolling(
    values: &[f64],
    period: usize,
    reduce: impl Fn(&[f64]) -> f64,
) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for (offset, window) in values.windows(period).enumerate() {
        if window.iter().all(|v| v.is_finite()) {
            out[offset + period - 1] = finite(reduce(window));
        }
    }
    out
}

/// Highest value over the trailing `period` elements, inclusive.
pub fn rolling_max(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().copied().fold(f64::MIN, f64::max))
}

/// Lowest value over the trailing `period` elements, inclusive.
pub fn rolling_min(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().copied().fold(f64::MAX, f64::min))
}

/// Simple moving average.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// True range. The first bar has no prior close, so its value is `None`.
pub fn true_range(bars: &[Bar]) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, bar) = (&pair[0], &pair[1]);
        let tr = (bar.high - bar.low)
            .max((bar.high - prev.close).abs())
            .max((bar.low - prev.close).abs());
        out[i + 1] = finite(tr);
    }
    out
}

/// Average true range with Wilder smoothing.
///
/// The first value sits at index `period` and is the plain mean of the first
/// `period` true ranges; after that `atr = (prev × (period − 1) + tr) / period`.
/// A missing true range makes the rest of the series unavailable.
pub fn atr(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let tr = true_range(bars);
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() <= period {
        return out;
    }

    let seed: Option<f64> = tr[1..=period].iter().copied().sum();
    let Some(seed) = seed else {
        return out;
    };
    let mut prev = seed / period as f64;
    out[period] = Some(prev);

    let p = period as f64;
    for i in period + 1..bars.len() {
        let Some(range) = tr[i] else {
            break;
        };
        prev = (prev * (p - 1.0) + range) / p;
        out[i] = Some(prev);
    }
    out
}

/// One-bar rate of change in percent: `(v / prev − 1) × 100`.
pub fn roc_pct(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for (i, pair) in values.windows(2).enumerate() {
        if pair[0] != 0.0 {
            out[i + 1] = finite((pair[1] / pair[0] - 1.0) * 100.0);
        }
    }
    out
}

/// Bars elapsed since the condition was last true.
///
/// 0 on a bar where it holds, the distance to the most recent such bar
/// otherwise, `None` before it first holds.
pub fn bars_since(condition: &[bool]) -> Vec<Option<usize>> {
    let mut last = None;
    condition
        .iter()
        .enumerate()
        .map(|(i, &hit)| {
            if hit {
                last = Some(i);
            }
            last.map(|at| i - at)
        })
        .collect()
}
