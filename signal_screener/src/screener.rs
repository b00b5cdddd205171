use chrono::{DateTime, Utc};
use market_gateway::models::{
    bar::{Bar, BarField},
    bar_series::{BarSeries, chronological},
};
use serde::Serialize;
use tracing::warn;

use crate::{
    errors::ScreenError,
    indicators::{atr, bars_since, roc_pct, rolling_max, rolling_min, sma},
    params::ScreenerParams,
};

/// Indicator state of one bar. `None` means not available yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub rolling_high: Option<f64>,
    pub rolling_low: Option<f64>,
    pub atr: Option<f64>,
    pub roc_pct: Option<f64>,
    /// Quarter of the channel height.
    pub diff: Option<f64>,
    /// Bottom of the channel's upper quartile.
    pub buy_zone: Option<f64>,
    pub breakout: bool,
    pub bars_since_breakout: Option<usize>,
    pub volume_ma: Option<f64>,
    /// Open above the prior bar's low.
    pub no_gap_down: bool,
    pub price_filter: bool,
    pub limit_price: Option<f64>,
    pub stop_loss: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Buy,
    Sell,
}

/// A bar on which a buy or sell condition held.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub ticker: String,
    pub kind: SignalKind,
    pub timestamp: DateTime<Utc>,
    pub row: IndicatorRow,
}

/// Buy and sell signals of one ticker, each ascending by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenResult {
    pub buys: Vec<Signal>,
    pub sells: Vec<Signal>,
    /// Timestamp of the newest bar that was screened.
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl ScreenResult {
    pub fn signal_count(&self) -> usize {
        self.buys.len() + self.sells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal_count() == 0
    }

    /// The buy signal on the newest bar, if the newest bar triggered one.
    pub fn current_buy(&self) -> Option<&Signal> {
        self.buys
            .last()
            .filter(|s| Some(s.timestamp) == self.last_timestamp)
    }
}

fn lt(value: Option<f64>, bound: Option<f64>) -> bool {
    matches!((value, bound), (Some(v), Some(b)) if v < b)
}

fn gt(value: Option<f64>, bound: Option<f64>) -> bool {
    matches!((value, bound), (Some(v), Some(b)) if v > b)
}

/// Channel-breakout pullback screen.
///
/// A buy is a sharp one-bar drop into the lower three quarters of the
/// trailing close channel shortly after the channel broke out upward. A sell
/// is a close above the buy zone by `profit_threshold` percent or below the
/// ATR stop.
#[derive(Debug, Clone)]
pub struct Screener {
    params: ScreenerParams,
}

impl Screener {
    pub fn new(params: ScreenerParams) -> Result<Self, ScreenError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ScreenerParams {
        &self.params
    }

    /// Evaluates one ticker's series.
    ///
    /// Pure: the series is not modified and the result depends only on the
    /// bars and the parameters. Bars are screened in timestamp order even if
    /// the series was assembled out of order.
    pub fn evaluate(&self, ticker: &str, series: &BarSeries) -> Result<ScreenResult, ScreenError> {
        let ordered = chronological(series.bars.clone());
        if ordered.len() < self.params.channel_period {
            return Err(ScreenError::InsufficientData {
                required: self.params.channel_period,
                actual: ordered.len(),
            });
        }

        let (bars, filled) = forward_fill(&ordered)?;
        if filled > 0 {
            warn!(ticker, filled, "series has missing values, forward filled");
        }

        let rows = self.compute_indicators(&bars);
        Ok(ScreenResult {
            buys: self.signals(ticker, &rows, SignalKind::Buy),
            sells: self.signals(ticker, &rows, SignalKind::Sell),
            last_timestamp: bars.last().map(|b| b.timestamp),
        })
    }

    fn signals(&self, ticker: &str, rows: &[IndicatorRow], kind: SignalKind) -> Vec<Signal> {
        rows.iter()
            .filter(|row| match kind {
                SignalKind::Buy => self.is_buy(row),
                SignalKind::Sell => self.is_sell(row),
            })
            .map(|row| Signal {
                ticker: ticker.to_string(),
                kind,
                timestamp: row.timestamp,
                row: row.clone(),
            })
            .collect()
    }

    /// Computes the indicator rows for bars ascending by timestamp.
    pub fn compute_indicators(&self, bars: &[Bar]) -> Vec<IndicatorRow> {
        let p = &self.params;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

        let highs = rolling_max(&closes, p.channel_period);
        let lows = rolling_min(&closes, p.channel_period);
        let atrs = atr(bars, p.atr_period);
        let rocs = roc_pct(&closes);
        let volume_ma = sma(&volumes, p.volume_ma_period);

        let breakouts: Vec<bool> = (0..bars.len())
            .map(|i| i > 0 && gt(Some(closes[i]), highs[i - 1]))
            .collect();
        let since = bars_since(&breakouts);

        bars.iter()
            .enumerate()
            .map(|(i, bar)| {
                let prior = i.checked_sub(1);
                let prior_low = prior.map(|j| bars[j].low);
                let prior_atr = prior.and_then(|j| atrs[j]);

                let diff = highs[i].zip(lows[i]).map(|(h, l)| (h - l) / 4.0);
                let buy_zone = lows[i].zip(diff).map(|(l, d)| l + d * 3.0);
                let limit_price = prior_low
                    .zip(prior_atr)
                    .map(|(low, a)| low - a * p.atr_multiple);
                let stop_loss = limit_price.zip(atrs[i]).map(|(limit, a)| limit - a);

                IndicatorRow {
                    timestamp: bar.timestamp,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                    rolling_high: highs[i],
                    rolling_low: lows[i],
                    atr: atrs[i],
                    roc_pct: rocs[i],
                    diff,
                    buy_zone,
                    breakout: breakouts[i],
                    bars_since_breakout: since[i],
                    volume_ma: volume_ma[i],
                    no_gap_down: gt(Some(bar.open), prior_low),
                    price_filter: bar.close > p.min_price,
                    limit_price,
                    stop_loss,
                }
            })
            .collect()
    }

    pub fn is_buy(&self, row: &IndicatorRow) -> bool {
        let p = &self.params;
        lt(row.roc_pct, Some(p.roc_trigger_pct))
            && lt(Some(row.close), row.buy_zone)
            && row
                .bars_since_breakout
                .is_some_and(|n| n < p.channel_break_window)
            && row.no_gap_down
            && gt(row.volume_ma, Some(p.min_volume))
            && row.price_filter
    }

    pub fn is_sell(&self, row: &IndicatorRow) -> bool {
        let trigger = row
            .buy_zone
            .map(|zone| zone * (1.0 + self.params.profit_threshold / 100.0));
        gt(Some(row.close), trigger) || lt(Some(row.close), row.stop_loss)
    }
}

/// Copies `bars`, replacing each missing value with the previous bar's.
///
/// Returns the number of values filled. A field missing from every bar is an
/// error. Leading gaps stay missing.
pub fn forward_fill(bars: &[Bar]) -> Result<(Vec<Bar>, usize), ScreenError> {
    for field in BarField::ALL {
        if bars.iter().all(|b| b.get(field).is_nan()) {
            return Err(ScreenError::MissingField { field });
        }
    }

    let mut out = bars.to_vec();
    let mut filled = 0;
    for i in 1..out.len() {
        for field in BarField::ALL {
            let prev = out[i - 1].get(field);
            if out[i].get(field).is_nan() && !prev.is_nan() {
                out[i].set(field, prev);
                filled += 1;
            }
        }
    }
    Ok((out, filled))
}
