//! A collection of time-series bars for a specific instrument and timeframe.

use crate::models::{bar::Bar, contract::InstrumentId, timeframe::TimeFrame};

/// Represents a complete set of time-series data for a single instrument.
///
/// Bars are kept ascending by timestamp with no duplicate timestamps; use
/// [`BarSeries::new`] to get that ordering from unsorted input.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    /// The gateway instrument this data represents.
    pub instrument: InstrumentId,
    /// The time interval for each bar in the series.
    pub timeframe: TimeFrame,
    /// The collection of OHLCV bars.
    pub bars: Vec<Bar>,
}

/// Sorts bars ascending by timestamp. Of bars sharing a timestamp, the one
/// that came last in the input is kept. The sort is stable.
pub fn chronological(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|b| b.timestamp);
    let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match deduped.last_mut() {
            Some(prev) if prev.timestamp == bar.timestamp => *prev = bar,
            _ => deduped.push(bar),
        }
    }
    deduped
}

impl BarSeries {
    /// Builds a series, sorting bars by timestamp. When a timestamp repeats,
    /// the bar that came last in the input wins.
    pub fn new(instrument: InstrumentId, timeframe: TimeFrame, bars: Vec<Bar>) -> Self {
        Self {
            instrument,
            timeframe,
            bars: chronological(bars),
        }
    }

    pub fn empty(instrument: InstrumentId, timeframe: TimeFrame) -> Self {
        Self {
            instrument,
            timeframe,
            bars: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}
