//! Canonical in-memory representation of a time-series bar (OHLCV).
//!
//! This struct is the standard output of [`MarketGateway::historical_bars`](crate::providers::MarketGateway::historical_bars)
//! and the standard input of the screener.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single time-series bar (OHLCV) for a given timestamp.
///
/// A value the gateway did not supply is carried as `f64::NAN` so that a bar
/// always has all five fields; consumers decide how to treat the gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    /// The timestamp for this bar (UTC).
    pub timestamp: DateTime<Utc>,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Volume traded during the bar interval.
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn get(&self, field: BarField) -> f64 {
        match field {
            BarField::Open => self.open,
            BarField::High => self.high,
            BarField::Low => self.low,
            BarField::Close => self.close,
            BarField::Volume => self.volume,
        }
    }

    pub fn set(&mut self, field: BarField, value: f64) {
        match field {
            BarField::Open => self.open = value,
            BarField::High => self.high = value,
            BarField::Low => self.low = value,
            BarField::Close => self.close = value,
            BarField::Volume => self.volume = value,
        }
    }
}

/// The five required OHLCV fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BarField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl BarField {
    pub const ALL: [BarField; 5] = [
        BarField::Open,
        BarField::High,
        BarField::Low,
        BarField::Close,
        BarField::Volume,
    ];
}

impl fmt::Display for BarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BarField::Open => "open",
            BarField::High => "high",
            BarField::Low => "low",
            BarField::Close => "close",
            BarField::Volume => "volume",
        };
        f.write_str(name)
    }
}
